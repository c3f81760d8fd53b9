//! Kid-mode buttons loaded from `quick_actions.json`.
//!
//! Every entry is resolved into a closed [`Action`] when the file is loaded, so
//! a misspelled handler or an unknown app is reported up front instead of
//! doing nothing when the button is pressed.

use crate::app_catalog::{AppDirectory, YOUTUBE_APP_ID};
use crate::cooldown::ActionSource;
use crate::error::{AppError, AppResult};
use crate::step::{parse_step, Step, StepKind};
use crate::transport::encode_path_segment;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickActionConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub handler: Option<String>,
    /// A single value or an array.
    #[serde(default)]
    pub args: Option<Value>,
}

impl QuickActionConfig {
    pub fn source(&self) -> ActionSource {
        ActionSource {
            id: self.id.clone(),
            app_id: self.app_id.clone(),
            app_name: self.app_name.clone(),
            label: self.label.clone(),
        }
    }

    pub fn arg_list(&self) -> Vec<String> {
        fn as_text(value: &Value) -> String {
            match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        }
        match &self.args {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(as_text).collect(),
            Some(single) => vec![as_text(single)],
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuickActionFile {
    #[serde(default)]
    pub special_buttons: Vec<QuickActionConfig>,
    #[serde(default)]
    pub quick_launch: Vec<QuickActionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Step(Step),
    RunMacro(String),
    RunFavoriteMacro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    SendKey,
    LaunchApp,
    Wait,
    RunMacro,
    RunFavoriteMacro,
}

/// Named handlers a button file may refer to.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    handlers: HashMap<String, Handler>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register("sendKey", Handler::SendKey);
        registry.register("launchApp", Handler::LaunchApp);
        registry.register("wait", Handler::Wait);
        registry.register("runMacro", Handler::RunMacro);
        registry.register("runFavoriteMacro", Handler::RunFavoriteMacro);
        registry
    }
}

impl ActionRegistry {
    pub fn register(&mut self, name: &str, handler: Handler) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }

    pub fn resolve(&self, name: &str, args: &[String]) -> AppResult<Action> {
        let handler = self
            .get(name)
            .ok_or_else(|| AppError::config(format!("unknown handler '{}'", name)))?;
        let first = args.first().map(|s| s.trim()).unwrap_or_default();
        let missing = |what: &str| AppError::config(format!("handler '{}' needs {}", name, what));

        let action = match handler {
            Handler::SendKey => Action::Step(
                parse_step(StepKind::Key, first).map_err(|_| missing("a key argument"))?,
            ),
            Handler::LaunchApp => {
                if first.is_empty() {
                    return Err(missing("an app id argument"));
                }
                Action::Step(Step::Launch {
                    app_id: first.to_string(),
                    params: args.get(1).map(|s| s.trim().to_string()).unwrap_or_default(),
                    label: args.get(2).map(|s| s.trim().to_string()).unwrap_or_default(),
                })
            }
            Handler::Wait => Action::Step(
                parse_step(StepKind::Delay, first)
                    .map_err(|e| AppError::config(format!("handler '{}': {}", name, e)))?,
            ),
            Handler::RunMacro => {
                if first.is_empty() {
                    return Err(missing("a macro id argument"));
                }
                Action::RunMacro(first.to_string())
            }
            Handler::RunFavoriteMacro => Action::RunFavoriteMacro,
        };
        Ok(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickAction {
    pub source: ActionSource,
    pub label: String,
    pub action: Action,
}

impl QuickAction {
    pub fn cooldown_key(&self) -> String {
        self.source.cooldown_key()
    }
}

/// `appName` entries are looked up in `apps`, so the result depends on what the
/// device reported when the file was loaded.
pub fn resolve_quick_action(
    registry: &ActionRegistry,
    apps: &AppDirectory,
    config: &QuickActionConfig,
) -> AppResult<QuickAction> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let label = non_empty(&config.label);
    let app_name = non_empty(&config.app_name);

    let is_youtube = config
        .kind
        .as_deref()
        .is_some_and(|kind| kind.eq_ignore_ascii_case("youtube"));

    let action = if let (true, Some(video_id)) = (is_youtube, non_empty(&config.video_id)) {
        Action::Step(Step::Launch {
            app_id: YOUTUBE_APP_ID.to_string(),
            params: format!("contentId={}", encode_path_segment(&video_id)),
            label: label.clone().unwrap_or_default(),
        })
    } else if let Some(app_id) = non_empty(&config.app_id)
        .or_else(|| app_name.as_deref().and_then(|name| apps.resolve_id(name)))
    {
        let params = non_empty(&config.content_id)
            .map(|content| format!("contentID={}", encode_path_segment(&content)))
            .unwrap_or_default();
        Action::Step(Step::Launch {
            app_id,
            params,
            label: label.clone().or_else(|| app_name.clone()).unwrap_or_default(),
        })
    } else if let Some(name) = app_name.as_deref() {
        return Err(AppError::config(format!(
            "couldn't find {} on this Roku",
            name
        )));
    } else if let Some(handler) = non_empty(&config.handler) {
        registry.resolve(&handler, &config.arg_list())?
    } else {
        return Err(AppError::config("missing an action"));
    };

    let display = match (label.or(app_name), &action) {
        (Some(label), _) => label,
        (None, Action::Step(step)) => step.describe(),
        (None, Action::RunMacro(id)) => format!("Run {}", id),
        (None, Action::RunFavoriteMacro) => "Magic Button".to_string(),
    };

    Ok(QuickAction {
        source: config.source(),
        label: display,
        action,
    })
}

/// Resolves every entry; all problems are reported together. Two entries may
/// not share a cooldown key, since the key is what a press refers to.
pub fn resolve_file(
    registry: &ActionRegistry,
    apps: &AppDirectory,
    file: &QuickActionFile,
) -> AppResult<Vec<QuickAction>> {
    let mut actions = Vec::new();
    let mut problems = Vec::new();
    let mut seen_keys = HashSet::new();

    for config in file.special_buttons.iter().chain(file.quick_launch.iter()) {
        let key = config.source().cooldown_key();
        if !seen_keys.insert(key.clone()) {
            problems.push(format!("'{}': duplicate key", key));
            continue;
        }
        match resolve_quick_action(registry, apps, config) {
            Ok(action) => actions.push(action),
            Err(AppError::Config(msg)) => problems.push(format!("'{}': {}", key, msg)),
            Err(e) => problems.push(format!("'{}': {}", key, e)),
        }
    }

    if problems.is_empty() {
        Ok(actions)
    } else {
        Err(AppError::config(format!(
            "invalid quick actions: {}",
            problems.join("; ")
        )))
    }
}

/// A missing file means no buttons.
pub fn load_quick_actions(
    path: &Path,
    registry: &ActionRegistry,
    apps: &AppDirectory,
) -> AppResult<Vec<QuickAction>> {
    if !path.exists() {
        log::info!("No quick action file at {:?}", path);
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let file: QuickActionFile = serde_json::from_str(&content)
        .map_err(|e| AppError::config(format!("Failed to parse {:?}: {}", path, e)))?;
    let actions = resolve_file(registry, apps, &file)?;
    log::info!("Loaded {} quick actions from {:?}", actions.len(), path);
    Ok(actions)
}
