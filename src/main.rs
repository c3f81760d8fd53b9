// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use roku_remote::commands::*;
use roku_remote::settings::load_settings;
use roku_remote::storage::FileStorage;
use roku_remote::transport::RokuHttpClient;
use roku_remote::Remote;
use std::sync::Arc;
use tauri::Manager;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            let settings = load_settings(&app_data_dir).unwrap_or_else(|e| {
                log::warn!("Using default settings: {}", e);
                Default::default()
            });
            let quick_actions_file = settings.quick_actions_file(&app_data_dir);

            let notifier = Arc::new(TauriNotifier::new(app.handle().clone()));
            let remote: DesktopRemote = Remote::new(
                FileStorage::new(&app_data_dir),
                RokuHttpClient::new()?,
                notifier,
                settings,
            )
            .with_settings_dir(&app_data_dir);

            if let Err(e) = remote.load_quick_actions(&quick_actions_file) {
                log::error!("Kid-mode buttons disabled: {}", e);
                remote
                    .notifier()
                    .error("Could not load kid-mode buttons. Check quick_actions.json.");
            }

            app.manage(remote);
            log::info!("Roku remote ready, data in {:?}", app_data_dir);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_settings,
            set_device_address,
            add_step,
            remove_step,
            get_draft,
            discard_draft,
            save_macro,
            list_macros,
            toggle_favorite,
            delete_macro,
            run_macro,
            trigger_macro,
            run_favorite_macro,
            get_runner_status,
            list_quick_actions,
            reload_quick_actions,
            trigger_quick_action,
            send_key,
            launch_app,
            device_status,
            list_apps,
            refresh_apps,
            now_playing,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
