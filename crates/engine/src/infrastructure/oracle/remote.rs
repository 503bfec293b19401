//! Oracle backed by a text-generation service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herotycoon_domain::ActionKind;

use super::fallback::{FallbackOracle, FALLBACK_REASONING};
use super::prompt_templates::PromptTemplates;
use super::response_parser::{parse_decision, parse_text};
use super::OracleError;
use crate::infrastructure::ports::{
    DecisionContext, DecisionOracle, DecisionSource, DescribeKind, DescribeSubject, HeroDecision,
    HeroView, LlmPort, LlmRequest, LlmResponse,
};

const DECISION_TEMPERATURE: f32 = 0.8;
const DECISION_MAX_TOKENS: u32 = 400;
const DESCRIBE_TEMPERATURE: f32 = 0.9;
const DESCRIBE_MAX_TOKENS: u32 = 300;

pub struct RemoteOracle {
    llm: Arc<dyn LlmPort>,
    templates: PromptTemplates,
    timeout: Duration,
    fallback: FallbackOracle,
}

impl RemoteOracle {
    pub fn new(
        llm: Arc<dyn LlmPort>,
        templates: PromptTemplates,
        timeout: Duration,
        fallback: FallbackOracle,
    ) -> Self {
        Self {
            llm,
            templates,
            timeout,
            fallback,
        }
    }

    /// One bounded call; a timeout is just another failure.
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, OracleError> {
        match tokio::time::timeout(self.timeout, self.llm.generate(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(OracleError::Llm(e)),
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        }
    }

    async fn try_choose(
        &self,
        hero: &HeroView,
        available: &[ActionKind],
        context: &DecisionContext,
    ) -> Result<HeroDecision, OracleError> {
        let prompt = self.templates.hero_decision(hero, available, context);
        let request = LlmRequest::prompt(prompt)
            .with_temperature(DECISION_TEMPERATURE)
            .with_max_tokens(Some(DECISION_MAX_TOKENS));
        let response = self.generate(request).await?;

        let raw = parse_decision(&response.content)?;
        let action = ActionKind::new(&raw.chosen_action);
        if !available.contains(&action) {
            return Err(OracleError::ActionNotOffered(raw.chosen_action));
        }

        let reasoning = if raw.reasoning.is_empty() {
            FALLBACK_REASONING.to_string()
        } else {
            raw.reasoning
        };
        Ok(HeroDecision {
            action,
            reasoning,
            source: DecisionSource::Oracle,
        })
    }

    async fn try_describe(
        &self,
        subject: &DescribeSubject,
        kind: DescribeKind,
    ) -> Result<String, OracleError> {
        let request = LlmRequest::prompt(self.templates.describe(subject, kind))
            .with_temperature(DESCRIBE_TEMPERATURE)
            .with_max_tokens(Some(DESCRIBE_MAX_TOKENS));
        let response = self.generate(request).await?;
        parse_text(&response.content)
    }
}

#[async_trait]
impl DecisionOracle for RemoteOracle {
    async fn choose_action(
        &self,
        hero: &HeroView,
        available: &[ActionKind],
        context: &DecisionContext,
    ) -> HeroDecision {
        if available.is_empty() {
            return self.fallback.decide(available);
        }

        match self.try_choose(hero, available, context).await {
            Ok(decision) => {
                tracing::debug!(hero = %hero.name, action = %decision.action, "Oracle chose action");
                decision
            }
            Err(e) => {
                tracing::warn!(hero = %hero.name, error = %e, "Oracle decision failed, using fallback");
                self.fallback.decide(available)
            }
        }
    }

    async fn describe(&self, subject: DescribeSubject, kind: DescribeKind) -> String {
        match self.try_describe(&subject, kind).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    subject = subject.name(),
                    kind = kind.as_str(),
                    error = %e,
                    "Oracle describe failed, using fallback"
                );
                self.fallback.text(&subject, kind)
            }
        }
    }
}
