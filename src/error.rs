use thiserror::Error;

/// Rejections produced while turning raw user input into a [`crate::step::Step`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Enter a value for the macro step.")]
    EmptyInput,

    #[error("Launch steps need an app ID.")]
    MissingAppId,

    #[error("Delay steps must be a positive number of milliseconds, got '{0}'.")]
    InvalidDuration(String),

    #[error("Unknown step type: {0}")]
    UnknownKind(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid Roku address: {0}")]
    InvalidAddress(String),

    #[error("Network error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if let Some(status) = value.status() {
            Self::Status(status.as_u16())
        } else if value.is_decode() {
            Self::Http(format!("Failed to decode response: {value}"))
        } else {
            Self::Http(value.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stored value for '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacroError {
    #[error("Give your macro a name before saving.")]
    EmptyName,

    #[error("Add at least one step to the macro.")]
    EmptyStepList,

    #[error("Macro not found.")]
    NotFound(String),

    #[error("A macro is already running.")]
    AlreadyRunning,

    #[error("Enter the Roku IP address in settings first.")]
    NoDeviceConfigured,

    #[error("Set a macro as the Magic Button in Settings first.")]
    NoFavorite,

    #[error("{0}")]
    Transport(#[from] TransportError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hang on, that action is already starting...")]
    CoolingDown(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;
