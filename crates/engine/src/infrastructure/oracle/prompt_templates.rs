//! Prompt templates for the decision oracle.
//!
//! Templates use `{placeholder}` substitution. Each can be replaced wholesale
//! through an environment variable; see [`key_to_env_var`].

use herotycoon_domain::{ActionKind, Trait};

use crate::infrastructure::ports::{DecisionContext, DescribeKind, DescribeSubject, HeroView};

pub mod keys {
    /// Ask a hero, in character, which action to take next.
    pub const HERO_DECISION: &str = "prompt.hero_decision";
    /// Free-text lore or backstory.
    pub const DESCRIBE: &str = "prompt.describe";
}

pub mod defaults {
    pub const HERO_DECISION: &str = r#"You are {name}, a {class} with this personality:
{personality}

Current status:
- Health: {health}/{max_health}
- Energy: {energy}/{max_energy}
- Mood: {mood}/100
- Goals: {goals}
- Master relationship: Trust {trust}, Respect {respect}, Fear {fear}

Available actions: {available_actions}

Context: {context}

Choose ONE action and explain your reasoning in character. Format as JSON:
{
    "chosenAction": "action_name",
    "reasoning": "Your thought process as this character"
}"#;

    pub const DESCRIBE: &str = r#"Write the {kind} of {subject} for a fantasy hero management game. {detail}
Keep it to two or three sentences of plain prose. No markdown, no JSON, no title."#;
}

/// `prompt.hero_decision` -> `PROMPT_HERO_DECISION`
pub fn key_to_env_var(key: &str) -> String {
    key.replace('.', "_").to_ascii_uppercase()
}

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    hero_decision: String,
    describe: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl PromptTemplates {
    /// Overrides replace the built-in defaults when present.
    pub fn new(hero_decision: Option<String>, describe: Option<String>) -> Self {
        Self {
            hero_decision: hero_decision.unwrap_or_else(|| defaults::HERO_DECISION.to_string()),
            describe: describe.unwrap_or_else(|| defaults::DESCRIBE.to_string()),
        }
    }

    pub fn hero_decision(
        &self,
        hero: &HeroView,
        available: &[ActionKind],
        context: &DecisionContext,
    ) -> String {
        let personality = hero
            .personality
            .entries()
            .iter()
            .map(|(name, value)| format!("- {}: {}/100", trait_label(*name), value))
            .collect::<Vec<_>>()
            .join("\n");
        let goals = if hero.goals.is_empty() {
            "none yet".to_string()
        } else {
            hero.goals.join(", ")
        };
        let actions = available
            .iter()
            .map(ActionKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let context = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());

        render(
            &self.hero_decision,
            &[
                ("name", hero.name.clone()),
                ("class", hero.class.to_string()),
                ("personality", personality),
                ("health", hero.stats.health.to_string()),
                ("max_health", hero.stats.max_health.to_string()),
                ("energy", hero.stats.energy.to_string()),
                ("max_energy", hero.stats.max_energy.to_string()),
                ("mood", hero.mood.to_string()),
                ("goals", goals),
                ("trust", hero.master_relation.trust.to_string()),
                ("respect", hero.master_relation.respect.to_string()),
                ("fear", hero.master_relation.fear.to_string()),
                ("available_actions", actions),
                ("context", context),
            ],
        )
    }

    pub fn describe(&self, subject: &DescribeSubject, kind: DescribeKind) -> String {
        let (subject_text, detail) = match subject {
            DescribeSubject::World { name, seed } => (
                format!("the world \"{}\"", name),
                format!("The world was generated from the seed \"{}\".", seed),
            ),
            DescribeSubject::Hero { name, class } => (
                format!("the hero {}", name),
                format!("{} is a {} who has just joined a guild.", name, class),
            ),
        };
        render(
            &self.describe,
            &[
                ("kind", kind.as_str().to_string()),
                ("subject", subject_text),
                ("detail", detail),
            ],
        )
    }
}

fn trait_label(name: Trait) -> String {
    let raw = name.name();
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Substitute `{key}` placeholders. Unknown placeholders are left as-is.
fn render(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herotycoon_domain::{GuildId, Hero, HeroClass, TimeOfDay};

    fn view() -> HeroView {
        let hero = Hero::recruit(GuildId::new(), "Brakka", HeroClass::Berserker, Utc::now())
            .unwrap()
            .with_goals(vec!["Win the arena".into()]);
        HeroView::from(&hero)
    }

    #[test]
    fn decision_prompt_fills_every_placeholder() {
        let templates = PromptTemplates::default();
        let context = DecisionContext {
            time_of_day: Some(TimeOfDay::Night),
            ..Default::default()
        };
        let prompt = templates.hero_decision(
            &view(),
            &[ActionKind::from("train"), ActionKind::from("rest")],
            &context,
        );

        assert!(prompt.starts_with("You are Brakka, a Berserker"));
        assert!(prompt.contains("- Courage: 80/100"));
        assert!(prompt.contains("Available actions: train, rest"));
        assert!(prompt.contains(r#"Context: {"timeOfDay":"night"}"#));
        assert!(prompt.contains("Goals: Win the arena"));
        // The JSON example braces survive rendering.
        assert!(prompt.contains("\"chosenAction\": \"action_name\""));
    }

    #[test]
    fn override_template_is_used() {
        let templates = PromptTemplates::new(Some("{name} picks from {available_actions}".into()), None);
        let prompt = templates.hero_decision(
            &view(),
            &[ActionKind::from("quest")],
            &DecisionContext::default(),
        );
        assert_eq!(prompt, "Brakka picks from quest");
    }

    #[test]
    fn describe_prompt_names_subject() {
        let prompt = PromptTemplates::default().describe(
            &DescribeSubject::World {
                name: "Eldoria".into(),
                seed: "abc".into(),
            },
            DescribeKind::Lore,
        );
        assert!(prompt.starts_with("Write the lore of the world \"Eldoria\""));
        assert!(prompt.contains("seed \"abc\""));
    }

    #[test]
    fn env_var_names() {
        assert_eq!(key_to_env_var(keys::HERO_DECISION), "PROMPT_HERO_DECISION");
        assert_eq!(key_to_env_var(keys::DESCRIBE), "PROMPT_DESCRIBE");
    }
}
