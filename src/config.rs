//! Configuration loaded from the environment

use crate::engine::DEFAULT_MAX_RENDER_PASSES;

const DEFAULT_NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that.";

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on chained render callbacks for one step (at least 1)
    pub max_render_passes: usize,
    /// Prepended to the current step when a message matches no response
    pub not_understood_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_render_passes: DEFAULT_MAX_RENDER_PASSES,
            not_understood_text: DEFAULT_NOT_UNDERSTOOD.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; invalid values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_render_passes: lookup("FLOWBOT_MAX_RENDER_PASSES")
                .and_then(|v| v.trim().parse().ok())
                .filter(|passes| *passes > 0)
                .unwrap_or(defaults.max_render_passes),
            not_understood_text: lookup("FLOWBOT_NOT_UNDERSTOOD")
                .filter(|text| !text.trim().is_empty())
                .unwrap_or(defaults.not_understood_text),
        }
    }
}

/// Console channel settings
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Conversation all console input belongs to
    pub conversation_id: String,
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            conversation_id: lookup("FLOWBOT_CONVERSATION_ID")
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}
