use crate::transport::InstalledApp;
use std::collections::HashMap;

/// Well-known Roku channel ids, used when a launch has no explicit label or when
/// `/query/apps` is unavailable.
pub const COMMON_APPS: &[(&str, &str)] = &[
    ("12", "Netflix"),
    ("13", "Amazon Prime Video"),
    ("2213", "Hulu"),
    ("837", "YouTube"),
    ("41468", "Disney+"),
    ("593099", "Apple TV+"),
    ("61322", "HBO Max"),
    ("74519", "Peacock TV"),
    ("151908", "Plex"),
    ("2285", "Spotify"),
    ("19977", "Pandora"),
    ("50539", "The Roku Channel"),
];

pub const YOUTUBE_APP_ID: &str = "837";

/// Display name for an app id; unknown ids render as `App {id}`.
pub fn resolve_app_name(app_id: &str) -> String {
    COMMON_APPS
        .iter()
        .find(|(id, _)| *id == app_id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("App {}", app_id))
}

/// Case-insensitive reverse lookup by display name.
pub fn resolve_app_id(name: &str) -> Option<&'static str> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    COMMON_APPS
        .iter()
        .find(|(_, app_name)| app_name.to_lowercase() == normalized)
        .map(|(id, _)| *id)
}

/// Apps reported by the device, with the well-known catalog behind them.
#[derive(Debug, Clone, Default)]
pub struct AppDirectory {
    installed: Vec<InstalledApp>,
    by_name: HashMap<String, String>,
}

impl AppDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_installed(installed: Vec<InstalledApp>) -> Self {
        let by_name = installed
            .iter()
            .map(|app| (app.name.trim().to_lowercase(), app.id.clone()))
            .collect();
        Self { installed, by_name }
    }

    /// `false` until the device answered `/query/apps` with at least one app.
    pub fn has_installed(&self) -> bool {
        !self.installed.is_empty()
    }

    /// Installed apps, or the well-known catalog when the device listed none.
    pub fn apps(&self) -> Vec<InstalledApp> {
        if self.has_installed() {
            return self.installed.clone();
        }
        COMMON_APPS
            .iter()
            .map(|&(id, name)| InstalledApp {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect()
    }

    /// Installed names win over the catalog; both ignore case and surrounding whitespace.
    pub fn resolve_id(&self, name: &str) -> Option<String> {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        self.by_name
            .get(&normalized)
            .cloned()
            .or_else(|| resolve_app_id(&normalized).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve_to_names() {
        assert_eq!(resolve_app_name("12"), "Netflix");
        assert_eq!(resolve_app_name("41468"), "Disney+");
    }

    #[test]
    fn unknown_id_falls_back() {
        assert_eq!(resolve_app_name("999"), "App 999");
    }

    #[test]
    fn reverse_lookup_ignores_case_and_whitespace() {
        assert_eq!(resolve_app_id("  youtube "), Some("837"));
        assert_eq!(resolve_app_id("the roku channel"), Some("50539"));
        assert_eq!(resolve_app_id("Crunchyroll"), None);
        assert_eq!(resolve_app_id(""), None);
    }

    fn installed(id: &str, name: &str) -> InstalledApp {
        InstalledApp {
            id: id.into(),
            name: name.into(),
        }
    }

    #[test]
    fn empty_directory_uses_the_catalog() {
        let directory = AppDirectory::new();
        assert!(!directory.has_installed());
        assert_eq!(directory.apps().len(), COMMON_APPS.len());
        assert_eq!(directory.resolve_id("Netflix").as_deref(), Some("12"));
    }

    #[test]
    fn installed_apps_win_over_the_catalog() {
        let directory = AppDirectory::from_installed(vec![
            installed("99001", "Netflix"),
            installed("2595", "Crunchyroll"),
        ]);
        assert_eq!(directory.apps().len(), 2);
        assert_eq!(directory.resolve_id(" netflix ").as_deref(), Some("99001"));
        assert_eq!(directory.resolve_id("CRUNCHYROLL").as_deref(), Some("2595"));
        assert_eq!(directory.resolve_id("Hulu").as_deref(), Some("2213"));
        assert_eq!(directory.resolve_id("Nope TV"), None);
    }
}
