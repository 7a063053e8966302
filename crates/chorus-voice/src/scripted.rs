//! Rule-based replies answered without an LLM pass.
//!
//! A small keyword table checked before the language model on every
//! user turn. A hit short-circuits the LLM stage entirely, which is
//! both cheaper and markedly faster than inference for the handful of
//! questions that dominate support traffic.

/// One keyword rule.
#[derive(Debug, Clone)]
pub struct ScriptedRule {
    /// Case-insensitive substring to look for in the user's utterance.
    pub keyword: String,
    /// Canned reply spoken when the keyword matches.
    pub reply: String,
}

/// Ordered rule table; first match wins.
#[derive(Debug, Clone)]
pub struct ScriptedReplies {
    rules: Vec<ScriptedRule>,
}

impl ScriptedReplies {
    /// The stock rule set.
    pub fn new() -> Self {
        Self {
            rules: vec![
                ScriptedRule {
                    keyword: "refund".to_string(),
                    reply: "Our refund policy is 30 days no questions asked.".to_string(),
                },
                ScriptedRule {
                    keyword: "hello".to_string(),
                    reply: "Hello! How can I help you today?".to_string(),
                },
            ],
        }
    }

    /// Builds a table from caller-supplied rules.
    pub fn from_rules(rules: Vec<ScriptedRule>) -> Self {
        Self { rules }
    }

    /// Returns the reply for the first matching rule, if any.
    pub fn reply_for(&self, user_input: &str) -> Option<&str> {
        let lowered = user_input.to_lowercase();
        self.rules
            .iter()
            .find(|rule| lowered.contains(&rule.keyword.to_lowercase()))
            .map(|rule| rule.reply.as_str())
    }
}

impl Default for ScriptedReplies {
    fn default() -> Self {
        Self::new()
    }
}
