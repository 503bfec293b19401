//! Deterministic oracle used when no text-generation service is configured,
//! and as the degradation path for the remote oracle.

use std::sync::Arc;

use async_trait::async_trait;
use herotycoon_domain::ActionKind;

use crate::infrastructure::ports::{
    DecisionContext, DecisionOracle, DecisionSource, DescribeKind, DescribeSubject, HeroDecision,
    HeroView, RandomPort,
};

pub const FALLBACK_REASONING: &str = "I'll go with my instincts on this one.";

pub struct FallbackOracle {
    random: Arc<dyn RandomPort>,
}

impl FallbackOracle {
    pub fn new(random: Arc<dyn RandomPort>) -> Self {
        Self { random }
    }

    /// Uniform pick from `available`; `rest` when nothing is offered.
    pub fn decide(&self, available: &[ActionKind]) -> HeroDecision {
        let action = if available.is_empty() {
            ActionKind::from(ActionKind::REST)
        } else {
            let last = (available.len() - 1) as i32;
            let index = self.random.gen_range(0, last).clamp(0, last) as usize;
            available[index].clone()
        };
        HeroDecision {
            action,
            reasoning: FALLBACK_REASONING.to_string(),
            source: DecisionSource::Fallback,
        }
    }

    pub fn text(&self, subject: &DescribeSubject, kind: DescribeKind) -> String {
        match (subject, kind) {
            (DescribeSubject::World { name, .. }, _) => format!(
                "{} is a land of old roads and older secrets, waiting for a guild bold enough to claim it.",
                name
            ),
            (DescribeSubject::Hero { name, class }, DescribeKind::Backstory) => format!(
                "{} is a {} who left home in search of fortune and found a guild instead.",
                name, class
            ),
            (DescribeSubject::Hero { name, .. }, DescribeKind::Lore) => {
                format!("Few songs are sung of {} yet.", name)
            }
        }
    }
}

#[async_trait]
impl DecisionOracle for FallbackOracle {
    async fn choose_action(
        &self,
        _hero: &HeroView,
        available: &[ActionKind],
        _context: &DecisionContext,
    ) -> HeroDecision {
        self.decide(available)
    }

    async fn describe(&self, subject: DescribeSubject, kind: DescribeKind) -> String {
        self.text(&subject, kind)
    }
}
