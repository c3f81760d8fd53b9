//! Fakes shared by the integration tests.
#![allow(dead_code)]

use roku_remote::error::TransportError;
use roku_remote::notify::{Notifier, NotifyLevel};
use roku_remote::transport::{DeviceAddress, DeviceTransport};
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Key(String),
    Launch { app_id: String, params: String },
}

/// Records every device command with the (virtual) time it was issued.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<(Call, Instant)>>,
    failing_key: Mutex<Option<String>>,
    failing_app: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key presses of `key` fail with HTTP 500 from now on.
    pub fn fail_on_key(&self, key: &str) {
        *self.failing_key.lock().unwrap() = Some(key.to_string());
    }

    /// Launches of `app_id` fail with HTTP 500 from now on.
    pub fn fail_on_launch(&self, app_id: &str) {
        *self.failing_app.lock().unwrap() = Some(app_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeviceTransport for RecordingTransport {
    async fn send_key_press(&self, _device: &DeviceAddress, key: &str) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((Call::Key(key.to_string()), Instant::now()));
        if self.failing_key.lock().unwrap().as_deref() == Some(key) {
            return Err(TransportError::Status(500));
        }
        Ok(())
    }

    async fn launch_app(
        &self,
        _device: &DeviceAddress,
        app_id: &str,
        params: &str,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((
            Call::Launch {
                app_id: app_id.to_string(),
                params: params.to_string(),
            },
            Instant::now(),
        ));
        if self.failing_app.lock().unwrap().as_deref() == Some(app_id) {
            return Err(TransportError::Status(500));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(NotifyLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|(_, text)| text).collect()
    }

    pub fn last(&self) -> Option<(NotifyLevel, String)> {
        self.messages.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }
}

pub fn device() -> DeviceAddress {
    DeviceAddress::parse("192.168.1.100").unwrap()
}
