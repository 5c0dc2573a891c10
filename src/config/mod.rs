pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::Settings;

use crate::error::AppResult;

const DEFAULT_PROFILE: &str = "default";

pub fn resolve_profile(requested: &str) -> String {
    match requested.trim() {
        "" => DEFAULT_PROFILE.to_string(),
        name => name.to_string(),
    }
}

pub fn load_settings(paths: &AppPaths, profile: &str) -> AppResult<Settings> {
    let settings = settings::load(paths.settings_file(profile))?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(paths: &AppPaths, profile: &str, settings: &Settings) -> AppResult<()> {
    settings::save(paths.settings_file(profile), settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_settings_load_back() {
        let root = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::from_roots(&root.path().join("config"), &root.path().join("data"))
            .expect("paths");
        let settings = Settings {
            client_id: Some("client.apps.googleusercontent.com".to_string()),
            label_name: Some("Auto-replied".to_string()),
            ..Settings::default()
        };
        save_settings(&paths, "work", &settings).expect("save");

        let loaded = load_settings(&paths, "work").expect("load");
        assert_eq!(loaded.label_name(), "Auto-replied");
        assert!(load_settings(&paths, "other").expect("missing file").client_id.is_none());
    }

    #[test]
    fn blank_profile_falls_back_to_default() {
        assert_eq!(resolve_profile("   "), "default");
        assert_eq!(resolve_profile(" work "), "work");
    }
}
