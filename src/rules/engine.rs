//! Keyword scene rules
//!
//! Scene descriptions from an external classifier are matched against the
//! rule list in order; the first enabled rule with a keyword in the text wins.
//! One engine-wide trigger time gates every rule, so at most one switch
//! happens per cooldown window however many descriptions arrive.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::rule::Rule;
use crate::config::RulesConfig;
use crate::error::Result;
use crate::events::{EventBus, SystemEvent};
use crate::switcher::Switcher;

/// The last successful trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerRecord {
    pub rule: Rule,
    pub description: String,
    pub at: DateTime<Utc>,
}

struct EngineState {
    enabled: bool,
    rules: Vec<Rule>,
    default_cooldown_ms: u64,
    last_trigger_at: Option<Instant>,
    last_trigger: Option<TriggerRecord>,
}

pub struct SceneRuleEngine {
    switcher: Arc<dyn Switcher>,
    events: Arc<EventBus>,
    state: Mutex<EngineState>,
    /// One description is processed at a time
    processing: tokio::sync::Mutex<()>,
}

impl SceneRuleEngine {
    pub fn new(switcher: Arc<dyn Switcher>, events: Arc<EventBus>, default_cooldown_ms: u64) -> Self {
        Self {
            switcher,
            events,
            state: Mutex::new(EngineState {
                enabled: false,
                rules: Vec::new(),
                default_cooldown_ms,
                last_trigger_at: None,
                last_trigger: None,
            }),
            processing: tokio::sync::Mutex::new(()),
        }
    }

    /// Build an engine with the rules from configuration
    ///
    /// Invalid rules are skipped with a warning.
    pub fn from_config(
        switcher: Arc<dyn Switcher>,
        events: Arc<EventBus>,
        config: &RulesConfig,
    ) -> Self {
        let engine = Self::new(switcher, events, config.cooldown_ms);
        {
            let mut state = engine.state.lock();
            state.enabled = config.enabled;
            for rule_config in &config.list {
                match Rule::from_config(rule_config, config.cooldown_ms) {
                    Ok(rule) => state.rules.push(rule),
                    Err(e) => warn!("Skipping rule for scene '{}': {}", rule_config.scene, e),
                }
            }
            info!(
                "Loaded {} scene rules ({})",
                state.rules.len(),
                if state.enabled { "enabled" } else { "disabled" }
            );
        }
        engine
    }

    pub fn enable(&self) {
        self.state.lock().enabled = true;
        info!("Scene rules enabled");
    }

    pub fn disable(&self) {
        self.state.lock().enabled = false;
        info!("Scene rules disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Set the cooldown of every rule, and of rules added later
    pub fn set_cooldown(&self, cooldown_ms: u64) {
        let mut state = self.state.lock();
        state.default_cooldown_ms = cooldown_ms;
        for rule in &mut state.rules {
            rule.cooldown_ms = cooldown_ms;
        }
    }

    /// Add a rule from comma separated keywords
    pub fn add_rule(&self, keywords: &str, scene: &str) -> Result<Rule> {
        let mut state = self.state.lock();
        let rule = Rule::new(keywords, scene, state.default_cooldown_ms)?;
        debug!("Added rule {:?} -> '{}'", rule.keywords, rule.target_scene);
        state.rules.push(rule.clone());
        Ok(rule)
    }

    pub fn remove_rule(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        state.rules.len() != before
    }

    pub fn set_rule_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut state = self.state.lock();
        match state.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.state.lock().rules.clone()
    }

    pub fn last_trigger(&self) -> Option<TriggerRecord> {
        self.state.lock().last_trigger.clone()
    }

    /// First enabled rule matching `description`, ignoring cooldown and switcher state
    pub fn match_description(&self, description: &str) -> Option<Rule> {
        let lowered = description.to_lowercase();
        self.state
            .lock()
            .rules
            .iter()
            .find(|r| r.enabled && r.matches(&lowered))
            .cloned()
    }

    /// Switch scenes if `description` matches a rule
    ///
    /// Returns the rule that triggered a switch. A no-op when the engine is
    /// disabled, the switcher is not ready, the cooldown has not elapsed or
    /// the target scene is already current. Switch failures are logged and
    /// leave the trigger state untouched.
    pub async fn process_description(&self, description: &str) -> Option<Rule> {
        let _processing = self.processing.lock().await;

        if !self.is_enabled() || description.trim().is_empty() {
            return None;
        }
        if !self.switcher.is_ready() {
            debug!("Switcher not ready, ignoring description");
            return None;
        }

        let rule = self.match_description(description)?;
        let last_trigger_at = self.state.lock().last_trigger_at;
        if let Some(last) = last_trigger_at {
            if last.elapsed() < Duration::from_millis(rule.cooldown_ms) {
                debug!("Rule for '{}' matched inside cooldown", rule.target_scene);
                return None;
            }
        }
        if self.switcher.session().is_current(&rule.target_scene) {
            return None;
        }

        match self.switcher.switch_scene(&rule.target_scene).await {
            Ok(true) => Some(self.record_trigger(rule, description)),
            Ok(false) => None,
            Err(e) => {
                warn!("Rule switch to '{}' failed: {}", rule.target_scene, e);
                None
            }
        }
    }

    fn record_trigger(&self, rule: Rule, description: &str) -> Rule {
        let now = Utc::now();
        let triggered = {
            let mut state = self.state.lock();
            state.last_trigger_at = Some(Instant::now());
            // The rule may have been removed while the switch was in flight
            let triggered = match state.rules.iter_mut().find(|r| r.id == rule.id) {
                Some(stored) => {
                    stored.trigger_count += 1;
                    stored.clone()
                }
                None => Rule {
                    trigger_count: rule.trigger_count + 1,
                    ..rule
                },
            };
            state.last_trigger = Some(TriggerRecord {
                rule: triggered.clone(),
                description: description.to_string(),
                at: now,
            });
            triggered
        };

        info!(
            "Rule triggered: {} -> '{}'",
            triggered.keywords.join(", "),
            triggered.target_scene
        );
        self.events.publish(SystemEvent::RuleTriggered {
            rule_id: triggered.id.clone(),
            keywords: triggered.keywords.clone(),
            scene: triggered.target_scene.clone(),
            description: description.to_string(),
            timestamp: now,
        });
        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switcher::testing::FakeSwitcher;
    use crate::switcher::ConnectionState;

    fn engine(switcher: Arc<FakeSwitcher>) -> (SceneRuleEngine, Arc<EventBus>) {
        let events = Arc::new(EventBus::new());
        let engine = SceneRuleEngine::new(switcher, events.clone(), 5000);
        engine.add_rule("whiteboard, marker", "Board Cam").unwrap();
        engine.add_rule("laptop", "Screen Share").unwrap();
        engine.enable();
        (engine, events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_switches_scene() {
        let switcher = FakeSwitcher::ready();
        let (engine, events) = engine(switcher.clone());
        let mut rx = events.subscribe();

        let rule = engine
            .process_description("Someone writes on the WHITEBOARD")
            .await
            .unwrap();

        assert_eq!(rule.target_scene, "Board Cam");
        assert_eq!(rule.trigger_count, 1);
        assert_eq!(switcher.calls(), vec!["switch:Board Cam"]);
        assert_eq!(engine.rules()[0].trigger_count, 1);
        assert_eq!(
            engine.last_trigger().unwrap().description,
            "Someone writes on the WHITEBOARD"
        );
        match rx.recv().await.unwrap() {
            SystemEvent::RuleTriggered { scene, keywords, .. } => {
                assert_eq!(scene, "Board Cam");
                assert_eq!(keywords, vec!["whiteboard", "marker"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_allows_one_switch_per_window() {
        let switcher = FakeSwitcher::ready();
        let (engine, _) = engine(switcher.clone());

        assert!(engine.process_description("a whiteboard").await.is_some());
        assert!(engine.process_description("a laptop").await.is_none());
        tokio::time::advance(Duration::from_millis(4999)).await;
        assert!(engine.process_description("a laptop").await.is_none());
        assert_eq!(switcher.calls().len(), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(engine.process_description("a laptop").await.is_some());
        assert_eq!(switcher.calls(), vec!["switch:Board Cam", "switch:Screen Share"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_scene_not_switched() {
        let switcher = FakeSwitcher::ready();
        let events = Arc::new(EventBus::new());
        let engine = SceneRuleEngine::new(switcher.clone(), events, 5000);
        engine.add_rule("speaker", "Camera 1").unwrap();
        engine.enable();

        assert!(engine.process_description("a speaker on stage").await.is_none());
        assert!(switcher.calls().is_empty());
        assert_eq!(engine.rules()[0].trigger_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_and_not_ready_are_noops() {
        let switcher = FakeSwitcher::ready();
        let (engine, _) = engine(switcher.clone());

        engine.disable();
        assert!(engine.process_description("a whiteboard").await.is_none());

        engine.enable();
        switcher.session.lock().connection_state = ConnectionState::Disconnected;
        assert!(engine.process_description("a whiteboard").await.is_none());
        assert!(switcher.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_rule_skipped() {
        let switcher = FakeSwitcher::ready();
        let (engine, _) = engine(switcher.clone());
        let id = engine.rules()[0].id.clone();
        assert!(engine.set_rule_enabled(&id, false));

        let rule = engine
            .process_description("a laptop next to a whiteboard")
            .await
            .unwrap();
        assert_eq!(rule.target_scene, "Screen Share");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_switch_keeps_trigger_state() {
        let switcher = FakeSwitcher::ready();
        *switcher.fail_switch.lock() = true;
        let (engine, _) = engine(switcher.clone());

        assert!(engine.process_description("a whiteboard").await.is_none());
        assert!(engine.last_trigger().is_none());
        assert_eq!(engine.rules()[0].trigger_count, 0);

        // No cooldown was started by the failure
        *switcher.fail_switch.lock() = false;
        assert!(engine.process_description("a whiteboard").await.is_some());
    }

    #[test]
    fn test_rule_management() {
        let (engine, _) = engine(FakeSwitcher::ready());
        assert_eq!(engine.rules().len(), 2);

        let id = engine.rules()[1].id.clone();
        assert!(engine.remove_rule(&id));
        assert!(!engine.remove_rule(&id));
        assert!(!engine.set_rule_enabled(&id, true));

        engine.set_cooldown(1000);
        assert!(engine.rules().iter().all(|r| r.cooldown_ms == 1000));
        assert_eq!(engine.add_rule("podium", "Wide").unwrap().cooldown_ms, 1000);
        assert!(engine.add_rule(" , ", "Wide").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = RulesConfig {
            enabled: true,
            cooldown_ms: 2000,
            list: vec![
                crate::config::RuleConfig {
                    keywords: "guest".to_string(),
                    scene: "Interview".to_string(),
                    enabled: true,
                    cooldown_ms: None,
                },
                crate::config::RuleConfig {
                    keywords: "".to_string(),
                    scene: "Broken".to_string(),
                    enabled: true,
                    cooldown_ms: None,
                },
            ],
        };
        let engine =
            SceneRuleEngine::from_config(FakeSwitcher::ready(), Arc::new(EventBus::new()), &config);
        assert!(engine.is_enabled());
        let rules = engine.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].cooldown_ms, 2000);
        assert_eq!(
            engine.match_description("Our GUEST arrives").map(|r| r.target_scene),
            Some("Interview".to_string())
        );
    }
}
