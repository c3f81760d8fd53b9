use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub const QUICK_ACTION_COOLDOWN_MS: u64 = 1000;

/// Shared slot for actions that carry no identifying field.
pub const SHARED_COOLDOWN_KEY: &str = "__quick_action__";

/// Identifying fields of whatever triggered an action.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl ActionSource {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// First non-empty of `id`, `app_id`, `app_name`, `label`.
    pub fn cooldown_key(&self) -> String {
        [&self.id, &self.app_id, &self.app_name, &self.label]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| SHARED_COOLDOWN_KEY.to_string())
    }
}

impl From<&str> for ActionSource {
    fn from(value: &str) -> Self {
        Self::id(value)
    }
}

impl From<String> for ActionSource {
    fn from(value: String) -> Self {
        Self::id(value)
    }
}

/// Last trigger time per action key. Entries are overwritten, never evicted.
#[derive(Debug)]
pub struct CooldownTable {
    window: Duration,
    last_triggered: HashMap<String, Instant>,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::new(Duration::from_millis(QUICK_ACTION_COOLDOWN_MS))
    }
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_triggered: HashMap::new(),
        }
    }

    pub fn try_acquire(&mut self, source: &ActionSource) -> bool {
        self.try_acquire_at(source, Instant::now())
    }

    /// Records `now` and returns `true` unless the same key fired less than one
    /// window ago; a rejected attempt does not move the timestamp.
    pub fn try_acquire_at(&mut self, source: &ActionSource, now: Instant) -> bool {
        let key = source.cooldown_key();
        if let Some(last) = self.last_triggered.get(&key) {
            if now.saturating_duration_since(*last) < self.window {
                log::debug!("Cooldown active for '{}'", key);
                return false;
            }
        }
        self.last_triggered.insert(key, now);
        true
    }

}
