use crate::app_catalog::resolve_app_name;
use crate::error::StepError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One instruction of a macro. Persisted as `{"type": "key" | "launch" | "delay", ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    #[serde(rename = "key")]
    KeyPress { key: String },
    Launch {
        #[serde(rename = "appId")]
        app_id: String,
        #[serde(default)]
        params: String,
        #[serde(default)]
        label: String,
    },
    Delay {
        #[serde(rename = "duration")]
        duration_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Key,
    Launch,
    Delay,
}

impl FromStr for StepKind {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "key" => Ok(Self::Key),
            "launch" => Ok(Self::Launch),
            "delay" => Ok(Self::Delay),
            other => Err(StepError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Key => "key",
            Self::Launch => "launch",
            Self::Delay => "delay",
        };
        f.write_str(name)
    }
}

/// Pieces of a `"<appId>[?<params>][|<label>]"` launch value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchValue {
    pub app_id: String,
    pub params: String,
    pub label: String,
}

/// The label is split off at the last `|`, then the app id at the first `?`.
pub fn parse_launch_value(raw: &str) -> LaunchValue {
    let (endpoint, label) = match raw.rfind('|') {
        Some(idx) => (&raw[..idx], raw[idx + 1..].trim()),
        None => (raw, ""),
    };
    let endpoint = endpoint.trim();
    let (app_id, params) = match endpoint.split_once('?') {
        Some((app_id, params)) => (app_id, params),
        None => (endpoint, ""),
    };

    LaunchValue {
        app_id: app_id.trim().to_string(),
        params: params.trim().to_string(),
        label: label.to_string(),
    }
}

pub fn parse_step(kind: StepKind, raw_value: &str) -> Result<Step, StepError> {
    let value = raw_value.trim();
    if value.is_empty() {
        return Err(StepError::EmptyInput);
    }

    match kind {
        StepKind::Key => Ok(Step::KeyPress {
            key: value.to_string(),
        }),
        StepKind::Launch => {
            let LaunchValue {
                app_id,
                params,
                label,
            } = parse_launch_value(value);
            if app_id.is_empty() {
                return Err(StepError::MissingAppId);
            }
            Ok(Step::Launch {
                app_id,
                params,
                label,
            })
        }
        StepKind::Delay => {
            let duration: i64 = value
                .parse()
                .map_err(|_| StepError::InvalidDuration(value.to_string()))?;
            let duration_ms =
                u64::try_from(duration).map_err(|_| StepError::InvalidDuration(value.to_string()))?;
            Ok(Step::Delay { duration_ms })
        }
    }
}

impl Step {
    /// Label shown for a launch: the explicit one, else the catalog name.
    pub fn launch_label(app_id: &str, label: &str) -> String {
        if label.is_empty() {
            resolve_app_name(app_id)
        } else {
            label.to_string()
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Step::KeyPress { key } => format!("Press {}", key),
            Step::Launch {
                app_id,
                params,
                label,
            } => {
                let label = Self::launch_label(app_id, label);
                if params.is_empty() {
                    format!("Launch {}", label)
                } else {
                    format!("Launch {} ({})", label, params)
                }
            }
            Step::Delay { duration_ms } => {
                if duration_ms % 1000 == 0 {
                    format!("Wait {}s", duration_ms / 1000)
                } else {
                    // one decimal, half rounds up
                    let tenths = duration_ms.saturating_add(50) / 100;
                    format!("Wait {}.{}s", tenths / 10, tenths % 10)
                }
            }
        }
    }
}

pub fn describe(step: &Step) -> String {
    step.describe()
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
