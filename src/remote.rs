use crate::app_catalog::AppDirectory;
use crate::cooldown::{ActionSource, CooldownTable};
use crate::draft::MacroDraft;
use crate::error::{AppError, AppResult, MacroError};
use crate::macro_store::{Macro, MacroStore, Persisted};
use crate::notify::Notifier;
use crate::quick_actions::{self, Action, ActionRegistry, QuickAction};
use crate::runner::{MacroRunner, RunReport, RunnerStatus};
use crate::settings::{save_settings, Settings};
use crate::step::{Step, StepKind};
use crate::storage::KeyValueStorage;
use crate::transport::{
    ActiveApp, DeviceAddress, DeviceInfo, DeviceTransport, InstalledApp, MediaPlayer, RokuHttpClient,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub address: String,
    pub device: DeviceInfo,
    pub active_app: Option<ActiveApp>,
    pub media_player: Option<MediaPlayer>,
    /// `false` when the device refused `/query/apps` and `apps` is the common list.
    pub apps_listed: bool,
    pub apps: Vec<InstalledApp>,
}

/// Everything the remote screen can do, behind one handle.
///
/// Locks are never held across an await. The runner's status lock may take
/// the store lock, never the other way round.
pub struct Remote<S, T, N> {
    store: Mutex<MacroStore<S>>,
    draft: Mutex<MacroDraft>,
    runner: MacroRunner<T, Arc<N>>,
    notifier: Arc<N>,
    cooldowns: Mutex<CooldownTable>,
    settings: Mutex<Settings>,
    settings_dir: Option<PathBuf>,
    registry: ActionRegistry,
    apps: Mutex<AppDirectory>,
    quick_actions: Mutex<Vec<QuickAction>>,
    quick_actions_path: Mutex<Option<PathBuf>>,
}

impl<S, T, N> Remote<S, T, N>
where
    S: KeyValueStorage,
    T: DeviceTransport,
    N: Notifier,
{
    pub fn new(storage: S, transport: T, notifier: Arc<N>, settings: Settings) -> Self {
        let cooldowns = CooldownTable::new(Duration::from_millis(settings.quick_action_cooldown_ms));
        let runner = MacroRunner::new(transport, notifier.clone());
        Self {
            store: Mutex::new(MacroStore::open(storage)),
            draft: Mutex::new(MacroDraft::new()),
            runner,
            notifier,
            cooldowns: Mutex::new(cooldowns),
            settings: Mutex::new(settings),
            settings_dir: None,
            registry: ActionRegistry::default(),
            apps: Mutex::new(AppDirectory::new()),
            quick_actions: Mutex::new(Vec::new()),
            quick_actions_path: Mutex::new(None),
        }
    }

    /// Settings changes are written to `settings.json` in `dir`.
    pub fn with_settings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings_dir = Some(dir.into());
        self
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn runner(&self) -> &MacroRunner<T, Arc<N>> {
        &self.runner
    }

    pub fn status(&self) -> RunnerStatus {
        self.runner.status()
    }

    // Draft

    pub fn add_step(&self, kind: StepKind, raw_value: &str) -> AppResult<Step> {
        let mut draft = lock(&self.draft);
        Ok(draft.add(kind, raw_value)?.clone())
    }

    pub fn remove_step(&self, index: usize) -> Option<Step> {
        lock(&self.draft).remove(index)
    }

    pub fn discard_draft(&self) {
        lock(&self.draft).clear();
    }

    pub fn draft_steps(&self) -> Vec<Step> {
        lock(&self.draft).steps().to_vec()
    }

    pub fn draft_descriptions(&self) -> Vec<String> {
        lock(&self.draft).descriptions()
    }

    /// Saves the draft as a new macro. A rejected save leaves the draft as it was.
    pub fn save_draft(&self, name: &str, favorite: bool) -> AppResult<Macro> {
        let mut draft = lock(&self.draft);
        let steps = if name.trim().is_empty() || draft.is_empty() {
            Vec::new()
        } else {
            draft.take()
        };
        let created = lock(&self.store).create(name, steps, favorite);
        drop(draft);
        let saved = match created {
            Ok(saved) => saved,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return Err(e.into());
            }
        };
        self.notifier
            .success(&format!("Saved macro \"{}\".", saved.value.name));
        Ok(self.report_persisted(saved))
    }

    // Saved macros

    pub fn list_macros(&self) -> Vec<Macro> {
        lock(&self.store).macros().to_vec()
    }

    pub fn favorite_macro(&self) -> Option<Macro> {
        lock(&self.store).find_favorite().cloned()
    }

    /// Returns the macro's new favorite flag.
    pub fn toggle_favorite(&self, macro_id: &str) -> AppResult<bool> {
        let toggled = lock(&self.store).toggle_favorite(macro_id)?;
        Ok(self.report_persisted(toggled))
    }

    pub fn delete_macro(&self, macro_id: &str) -> AppResult<Macro> {
        let deleted = lock(&self.store).delete(macro_id);
        let deleted = match deleted {
            Ok(deleted) => deleted,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return Err(e.into());
            }
        };
        self.notifier.info("Macro deleted.");
        Ok(self.report_persisted(deleted))
    }

    fn report_persisted<V>(&self, persisted: Persisted<V>) -> V {
        if let Some(e) = &persisted.warning {
            self.notifier
                .error(&format!("Could not save macros: {}", e));
        }
        persisted.value
    }

    // Runs

    pub async fn run_macro(&self, macro_id: &str) -> AppResult<RunReport> {
        let device = self.device();
        Ok(self
            .runner
            .run(&self.store, device.as_ref(), macro_id)
            .await?)
    }

    /// Runs the macro marked as the Magic Button.
    pub async fn run_favorite(&self) -> AppResult<RunReport> {
        let Some(favorite) = self.favorite_macro() else {
            let e = MacroError::NoFavorite;
            self.notifier.error(&e.to_string());
            return Err(e.into());
        };
        self.run_macro(&favorite.id).await
    }

    /// Like [`Self::run_macro`], but ignored while the macro's button is cooling down.
    pub async fn trigger_macro(&self, macro_id: &str) -> AppResult<RunReport> {
        self.acquire_cooldown(&ActionSource::id(macro_id))?;
        self.run_macro(macro_id).await
    }

    fn acquire_cooldown(&self, source: &ActionSource) -> AppResult<()> {
        if lock(&self.cooldowns).try_acquire(source) {
            return Ok(());
        }
        let e = AppError::CoolingDown(source.cooldown_key());
        self.notifier.info(&e.to_string());
        Err(e)
    }

    // Quick actions

    pub fn set_quick_actions(&self, actions: Vec<QuickAction>) {
        *lock(&self.quick_actions) = actions;
    }

    /// Replaces the buttons with the ones in `path`. On error the current
    /// buttons stay.
    pub fn load_quick_actions(&self, path: &Path) -> AppResult<usize> {
        let apps = lock(&self.apps).clone();
        let actions = quick_actions::load_quick_actions(path, &self.registry, &apps)?;
        let count = actions.len();
        self.set_quick_actions(actions);
        *lock(&self.quick_actions_path) = Some(path.to_path_buf());
        Ok(count)
    }

    pub fn quick_actions(&self) -> Vec<QuickAction> {
        lock(&self.quick_actions).clone()
    }

    pub async fn trigger_quick_action(&self, key: &str) -> AppResult<()> {
        let found = lock(&self.quick_actions)
            .iter()
            .find(|action| action.cooldown_key() == key)
            .cloned();
        let Some(quick) = found else {
            self.notifier.error("That action is not ready yet.");
            return Err(AppError::config(format!("unknown quick action '{}'", key)));
        };

        self.acquire_cooldown(&quick.source)?;
        log::info!("Quick action '{}' ({})", quick.label, key);

        match quick.action {
            Action::Step(Step::KeyPress { key: pressed }) => self.send_key(&pressed).await,
            Action::Step(Step::Launch {
                app_id,
                params,
                label,
            }) => self.launch_app(&app_id, &params, &label).await,
            Action::Step(Step::Delay { duration_ms }) => {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                Ok(())
            }
            Action::RunMacro(macro_id) => self.run_macro(&macro_id).await.map(|_| ()),
            Action::RunFavoriteMacro => self.run_favorite().await.map(|_| ()),
        }
    }

    // Apps

    /// Apps on the device, or the common list when it never reported any.
    pub fn apps(&self) -> Vec<InstalledApp> {
        lock(&self.apps).apps()
    }

    /// Replaces the app list. The last loaded button file is resolved again so
    /// `appName` entries pick up the new ids.
    pub fn set_installed_apps(&self, installed: Vec<InstalledApp>) {
        log::info!("{} apps reported by the device", installed.len());
        *lock(&self.apps) = AppDirectory::from_installed(installed);
        let path = lock(&self.quick_actions_path).clone();
        if let Some(path) = path {
            if let Err(e) = self.load_quick_actions(&path) {
                log::warn!("Quick actions not reloaded after app refresh: {}", e);
            }
        }
    }

    // One-shot device commands

    pub async fn send_key(&self, key: &str) -> AppResult<()> {
        let device = self.require_device()?;
        match self.runner.transport().send_key_press(&device, key).await {
            Ok(()) => {
                log::debug!("Sent key {}", key);
                Ok(())
            }
            Err(e) => {
                log::error!("Key press {} failed: {}", key, e);
                self.notifier
                    .error(&format!("Failed to send key {}: {}", key, e));
                Err(e.into())
            }
        }
    }

    pub async fn launch_app(&self, app_id: &str, params: &str, label: &str) -> AppResult<()> {
        let device = self.require_device()?;
        let label = Step::launch_label(app_id, label);
        self.notifier.info(&format!("Launching {}...", label));
        match self.runner.transport().launch_app(&device, app_id, params).await {
            Ok(()) => {
                self.notifier.success(&format!("Launched {}!", label));
                Ok(())
            }
            Err(e) => {
                log::error!("Launch of {} failed: {}", app_id, e);
                self.notifier
                    .error(&format!("Failed to launch {}: {}", label, e));
                Err(e.into())
            }
        }
    }

    // Settings

    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    pub fn device(&self) -> Option<DeviceAddress> {
        lock(&self.settings).device()
    }

    fn require_device(&self) -> AppResult<DeviceAddress> {
        self.device().ok_or_else(|| {
            let e = MacroError::NoDeviceConfigured;
            self.notifier.error(&e.to_string());
            AppError::from(e)
        })
    }

    pub fn set_device_address(&self, raw: &str) -> AppResult<()> {
        let mut settings = lock(&self.settings);
        settings.set_device_address(raw)?;
        log::info!("Device address set to {:?}", settings.device_address);
        self.persist_settings(&settings)
    }

    fn persist_settings(&self, settings: &Settings) -> AppResult<()> {
        match &self.settings_dir {
            Some(dir) => save_settings(dir, settings),
            None => Ok(()),
        }
    }
}

impl<S, N> Remote<S, RokuHttpClient, N>
where
    S: KeyValueStorage,
    N: Notifier,
{
    /// Asks the device for its apps. A refused query falls back to the common
    /// list instead of failing.
    pub async fn refresh_apps(&self) -> AppResult<Vec<InstalledApp>> {
        let device = self.require_device()?;
        match self.runner.transport().apps(&device).await {
            Ok(installed) => self.set_installed_apps(installed),
            Err(e) => {
                log::warn!("Apps query failed, using common apps: {}", e);
                self.notifier
                    .info("Your Roku blocked the apps query. Showing common apps.");
                self.set_installed_apps(Vec::new());
            }
        }
        Ok(self.apps())
    }

    pub async fn now_playing(&self) -> AppResult<Option<MediaPlayer>> {
        let device = self.require_device()?;
        Ok(self.runner.transport().media_player(&device).await?)
    }

    /// Queries the device, its apps and what is on screen. Only the
    /// device-info query is required; the others leave their fields empty.
    pub async fn device_status(&self) -> AppResult<DeviceStatus> {
        let device = self.require_device()?;
        let client = self.runner.transport();
        self.notifier.info("Connecting to Roku...");

        let info = match client.device_info(&device).await {
            Ok(info) => info,
            Err(e) => {
                self.notifier.error(&format!(
                    "Connection failed: {}. Check the Roku IP in settings.",
                    e
                ));
                return Err(e.into());
            }
        };
        let apps = self.refresh_apps().await?;
        let active_app = client.active_app(&device).await.unwrap_or_else(|e| {
            log::warn!("Active app query failed: {}", e);
            None
        });
        let media_player = client.media_player(&device).await.unwrap_or_else(|e| {
            log::warn!("Media player query failed: {}", e);
            None
        });

        self.notifier.success("Connected successfully!");
        Ok(DeviceStatus {
            address: device.to_string(),
            device: info,
            active_app,
            media_player,
            apps_listed: lock(&self.apps).has_installed(),
            apps,
        })
    }
}
