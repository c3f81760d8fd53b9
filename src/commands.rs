use crate::error::AppError;
use crate::macro_store::Macro;
use crate::notify::{Notifier, NotifyLevel};
use crate::remote::{DeviceStatus, Remote};
use crate::runner::{RunReport, RunnerStatus};
use crate::settings::Settings;
use crate::step::{Step, StepKind};
use crate::storage::FileStorage;
use crate::transport::{InstalledApp, MediaPlayer, RokuHttpClient};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager, State};

pub type DesktopRemote = Remote<FileStorage, RokuHttpClient, TauriNotifier>;

pub const STATUS_EVENT: &str = "status";

#[derive(Serialize, Debug, Clone)]
struct StatusEvent<'a> {
    message: &'a str,
    level: NotifyLevel,
}

/// Forwards notifications to the webview as `status` events.
pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        if let Err(e) = self.app.emit(STATUS_EVENT, StatusEvent { message, level }) {
            log::warn!("Failed to emit status '{}': {}", message, e);
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct MacroView {
    pub id: String,
    pub name: String,
    pub favorite: bool,
    pub steps: Vec<Step>,
    pub descriptions: Vec<String>,
}

impl From<Macro> for MacroView {
    fn from(m: Macro) -> Self {
        let descriptions = m.descriptions();
        Self {
            id: m.id,
            name: m.name,
            favorite: m.favorite,
            steps: m.steps,
            descriptions,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DraftView {
    pub steps: Vec<Step>,
    pub descriptions: Vec<String>,
}

impl DraftView {
    fn of(remote: &DesktopRemote) -> Self {
        Self {
            steps: remote.draft_steps(),
            descriptions: remote.draft_descriptions(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct QuickActionView {
    pub key: String,
    pub label: String,
}

// Settings

#[tauri::command]
pub fn get_settings(remote: State<'_, DesktopRemote>) -> Settings {
    remote.settings()
}

#[tauri::command]
pub fn set_device_address(remote: State<'_, DesktopRemote>, address: String) -> Result<(), String> {
    remote.set_device_address(&address)?;
    remote.notifier().success("IP address saved! Click \"Check Status\" to connect.");
    Ok(())
}

// Draft

#[tauri::command]
pub fn add_step(
    remote: State<'_, DesktopRemote>,
    kind: String,
    value: String,
) -> Result<DraftView, String> {
    let kind: StepKind = kind.parse().map_err(AppError::from)?;
    remote.add_step(kind, &value)?;
    Ok(DraftView::of(&remote))
}

#[tauri::command]
pub fn remove_step(remote: State<'_, DesktopRemote>, index: usize) -> DraftView {
    remote.remove_step(index);
    DraftView::of(&remote)
}

#[tauri::command]
pub fn get_draft(remote: State<'_, DesktopRemote>) -> DraftView {
    DraftView::of(&remote)
}

#[tauri::command]
pub fn discard_draft(remote: State<'_, DesktopRemote>) {
    remote.discard_draft();
}

#[tauri::command]
pub fn save_macro(
    remote: State<'_, DesktopRemote>,
    name: String,
    favorite: bool,
) -> Result<MacroView, String> {
    Ok(remote.save_draft(&name, favorite)?.into())
}

// Macros

#[tauri::command]
pub fn list_macros(remote: State<'_, DesktopRemote>) -> Vec<MacroView> {
    remote.list_macros().into_iter().map(MacroView::from).collect()
}

#[tauri::command]
pub fn toggle_favorite(remote: State<'_, DesktopRemote>, macro_id: String) -> Result<bool, String> {
    Ok(remote.toggle_favorite(&macro_id)?)
}

#[tauri::command]
pub fn delete_macro(remote: State<'_, DesktopRemote>, macro_id: String) -> Result<(), String> {
    remote.delete_macro(&macro_id)?;
    Ok(())
}

#[tauri::command]
pub async fn run_macro(
    remote: State<'_, DesktopRemote>,
    macro_id: String,
) -> Result<RunReport, String> {
    Ok(remote.run_macro(&macro_id).await?)
}

#[tauri::command]
pub async fn trigger_macro(
    remote: State<'_, DesktopRemote>,
    macro_id: String,
) -> Result<RunReport, String> {
    Ok(remote.trigger_macro(&macro_id).await?)
}

#[tauri::command]
pub async fn run_favorite_macro(remote: State<'_, DesktopRemote>) -> Result<RunReport, String> {
    Ok(remote.run_favorite().await?)
}

#[tauri::command]
pub fn get_runner_status(remote: State<'_, DesktopRemote>) -> RunnerStatus {
    remote.status()
}

// Quick actions

#[tauri::command]
pub fn list_quick_actions(remote: State<'_, DesktopRemote>) -> Vec<QuickActionView> {
    remote
        .quick_actions()
        .into_iter()
        .map(|action| QuickActionView {
            key: action.cooldown_key(),
            label: action.label,
        })
        .collect()
}

#[tauri::command]
pub fn reload_quick_actions(app: AppHandle, remote: State<'_, DesktopRemote>) -> Result<usize, String> {
    let app_data_dir = app.path().app_data_dir().map_err(|e| e.to_string())?;
    let path = remote.settings().quick_actions_file(&app_data_dir);
    Ok(remote.load_quick_actions(&path)?)
}

#[tauri::command]
pub async fn trigger_quick_action(
    remote: State<'_, DesktopRemote>,
    key: String,
) -> Result<(), String> {
    Ok(remote.trigger_quick_action(&key).await?)
}

// Device

#[tauri::command]
pub async fn send_key(remote: State<'_, DesktopRemote>, key: String) -> Result<(), String> {
    Ok(remote.send_key(&key).await?)
}

#[tauri::command]
pub async fn launch_app(
    remote: State<'_, DesktopRemote>,
    app_id: String,
    params: Option<String>,
    label: Option<String>,
) -> Result<(), String> {
    Ok(remote
        .launch_app(
            &app_id,
            params.as_deref().unwrap_or_default(),
            label.as_deref().unwrap_or_default(),
        )
        .await?)
}

#[tauri::command]
pub async fn device_status(remote: State<'_, DesktopRemote>) -> Result<DeviceStatus, String> {
    Ok(remote.device_status().await?)
}

#[tauri::command]
pub fn list_apps(remote: State<'_, DesktopRemote>) -> Vec<InstalledApp> {
    remote.apps()
}

#[tauri::command]
pub async fn refresh_apps(remote: State<'_, DesktopRemote>) -> Result<Vec<InstalledApp>, String> {
    Ok(remote.refresh_apps().await?)
}

#[tauri::command]
pub async fn now_playing(remote: State<'_, DesktopRemote>) -> Result<Option<MediaPlayer>, String> {
    Ok(remote.now_playing().await?)
}
