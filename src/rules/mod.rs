//! Keyword-driven automatic scene switching

pub mod engine;
pub mod rule;

pub use engine::{SceneRuleEngine, TriggerRecord};
pub use rule::Rule;
