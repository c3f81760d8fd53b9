use serde::Serialize;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

/// Where user-facing status messages go. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel);

    fn info(&self, message: &str) {
        self.notify(message, NotifyLevel::Info);
    }

    fn success(&self, message: &str) {
        self.notify(message, NotifyLevel::Success);
    }

    fn error(&self, message: &str) {
        self.notify(message, NotifyLevel::Error);
    }
}

/// Sends status messages to the log when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info | NotifyLevel::Success => log::info!("{}", message),
            NotifyLevel::Error => log::error!("{}", message),
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, message: &str, level: NotifyLevel) {
        (**self).notify(message, level);
    }
}
