use crate::error::{MacroError, TransportError};
use crate::macro_store::{Macro, MacroSource};
use crate::notify::Notifier;
use crate::step::Step;
use crate::transport::{DeviceAddress, DeviceTransport};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Pause after every key press, before the next command.
pub const KEY_SETTLE_MS: u64 = 300;
/// Pause after every launch.
pub const LAUNCH_SETTLE_MS: u64 = 1500;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunnerStatus {
    pub state: RunnerState,
    pub macro_id: Option<String>,
    pub macro_name: Option<String>,
    /// 1-based index of the step in flight, 0 before the first one.
    pub current_step: usize,
    pub total_steps: usize,
    /// `Completed` or `Failed` for the most recent run.
    pub last_outcome: Option<RunnerState>,
    pub last_error: Option<String>,
}

impl RunnerStatus {
    fn idle() -> Self {
        Self {
            state: RunnerState::Idle,
            macro_id: None,
            macro_name: None,
            current_step: 0,
            total_steps: 0,
            last_outcome: None,
            last_error: None,
        }
    }

    pub fn progress(&self) -> f32 {
        if self.total_steps == 0 {
            return 0.0;
        }
        (self.current_step as f32 / self.total_steps as f32) * 100.0
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub macro_id: String,
    pub name: String,
    pub steps_executed: usize,
}

/// Puts the runner back to `Idle` however the run ends, including when the
/// run future is dropped part-way.
struct RunGuard<'a> {
    status: &'a Mutex<RunnerStatus>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if status.state == RunnerState::Running {
            status.last_outcome = Some(RunnerState::Failed);
            status.last_error = Some("Macro run was interrupted".to_string());
        }
        status.state = RunnerState::Idle;
    }
}

/// Executes macros one at a time against a device.
pub struct MacroRunner<T, N> {
    transport: T,
    notifier: N,
    status: Mutex<RunnerStatus>,
}

impl<T: DeviceTransport, N: Notifier> MacroRunner<T, N> {
    pub fn new(transport: T, notifier: N) -> Self {
        Self {
            transport,
            notifier,
            status: Mutex::new(RunnerStatus::idle()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn status(&self) -> RunnerStatus {
        self.lock_status().clone()
    }

    pub fn state(&self) -> RunnerState {
        self.lock_status().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    fn lock_status(&self) -> MutexGuard<'_, RunnerStatus> {
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs every step of `macro_id` in order, stopping at the first device error.
    /// Rejected immediately with `AlreadyRunning` while another run is in flight.
    pub async fn run<M>(
        &self,
        macros: &M,
        device: Option<&DeviceAddress>,
        macro_id: &str,
    ) -> Result<RunReport, MacroError>
    where
        M: MacroSource + Sync + ?Sized,
    {
        let (target, device, _guard) = match self.begin(macros, device, macro_id) {
            Ok(started) => started,
            Err(e) => {
                log::warn!("Macro '{}' not started: {}", macro_id, e);
                self.notifier.error(&e.to_string());
                return Err(e);
            }
        };

        log::info!(
            "Running macro '{}' ({} steps) on {}",
            target.name,
            target.steps.len(),
            device
        );
        self.notifier
            .info(&format!("Running macro \"{}\"...", target.name));

        for (index, step) in target.steps.iter().enumerate() {
            self.lock_status().current_step = index + 1;
            if let Err(e) = self.execute_step(&device, step).await {
                log::error!(
                    "Macro '{}' failed at step {} ({}): {}",
                    target.name,
                    index + 1,
                    step,
                    e
                );
                self.finish(RunnerState::Failed, Some(e.to_string()));
                self.notifier.error(&format!("Macro stopped: {}", e));
                return Err(MacroError::Transport(e));
            }
        }

        self.finish(RunnerState::Completed, None);
        log::info!("Macro '{}' finished", target.name);
        self.notifier
            .success(&format!("Macro \"{}\" finished!", target.name));

        Ok(RunReport {
            macro_id: target.id,
            name: target.name,
            steps_executed: target.steps.len(),
        })
    }

    /// Check-and-set of the run slot; no await happens in here.
    fn begin<M>(
        &self,
        macros: &M,
        device: Option<&DeviceAddress>,
        macro_id: &str,
    ) -> Result<(Macro, DeviceAddress, RunGuard<'_>), MacroError>
    where
        M: MacroSource + ?Sized,
    {
        let mut status = self.lock_status();
        if status.state != RunnerState::Idle {
            return Err(MacroError::AlreadyRunning);
        }
        let target = macros
            .macro_by_id(macro_id)
            .ok_or_else(|| MacroError::NotFound(macro_id.to_string()))?;
        let device = device.cloned().ok_or(MacroError::NoDeviceConfigured)?;

        *status = RunnerStatus {
            state: RunnerState::Running,
            macro_id: Some(target.id.clone()),
            macro_name: Some(target.name.clone()),
            current_step: 0,
            total_steps: target.steps.len(),
            last_outcome: status.last_outcome,
            last_error: None,
        };

        Ok((
            target,
            device,
            RunGuard {
                status: &self.status,
            },
        ))
    }

    fn finish(&self, outcome: RunnerState, error: Option<String>) {
        let mut status = self.lock_status();
        status.state = outcome;
        status.last_outcome = Some(outcome);
        status.last_error = error;
    }

    async fn execute_step(&self, device: &DeviceAddress, step: &Step) -> Result<(), TransportError> {
        match step {
            Step::KeyPress { key } => {
                self.transport.send_key_press(device, key).await?;
                tokio::time::sleep(Duration::from_millis(KEY_SETTLE_MS)).await;
            }
            Step::Launch {
                app_id,
                params,
                label,
            } => {
                let label = Step::launch_label(app_id, label);
                self.notifier
                    .info(&format!("Macro launching {}...", label));
                self.transport.launch_app(device, app_id, params).await?;
                tokio::time::sleep(Duration::from_millis(LAUNCH_SETTLE_MS)).await;
            }
            Step::Delay { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
            }
        }
        Ok(())
    }
}
