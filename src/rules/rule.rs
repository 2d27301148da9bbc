use serde::{Deserialize, Serialize};

use crate::config::RuleConfig;
use crate::error::{AppError, Result};

/// Keyword rule: switch to `target_scene` when a description mentions any keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// Lower-cased, trimmed, never empty
    pub keywords: Vec<String>,
    pub target_scene: String,
    pub enabled: bool,
    pub cooldown_ms: u64,
    pub trigger_count: u64,
}

impl Rule {
    /// Create a rule from comma separated keywords
    pub fn new(keywords: &str, target_scene: &str, cooldown_ms: u64) -> Result<Self> {
        let keywords = parse_keywords(keywords);
        if keywords.is_empty() {
            return Err(AppError::BadRequest("Rule needs at least one keyword".to_string()));
        }
        let target_scene = target_scene.trim();
        if target_scene.is_empty() {
            return Err(AppError::BadRequest("Rule needs a target scene".to_string()));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            keywords,
            target_scene: target_scene.to_string(),
            enabled: true,
            cooldown_ms,
            trigger_count: 0,
        })
    }

    pub fn from_config(config: &RuleConfig, default_cooldown_ms: u64) -> Result<Self> {
        let mut rule = Self::new(
            &config.keywords,
            &config.scene,
            config.cooldown_ms.unwrap_or(default_cooldown_ms),
        )?;
        rule.enabled = config.enabled;
        Ok(rule)
    }

    /// Whether any keyword occurs in `lowered` (already lower-cased text)
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Split, trim and lower-case a comma separated keyword list
pub fn parse_keywords(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
