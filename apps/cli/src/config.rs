use std::{fs, path::Path, time::Duration};

use client_core::{transport::DEFAULT_REQUEST_TIMEOUT, SessionConfig};
use serde::Deserialize;
use shared::domain::SessionMode;
use tracing::warn;

pub const SETTINGS_FILE: &str = "handfont.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub max_batch_files: usize,
    pub low_confidence_threshold: usize,
    pub default_font_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_batch_files: session.max_batch_files,
            low_confidence_threshold: session.low_confidence_threshold,
            default_font_name: session.default_font_name,
        }
    }
}

/// Optional overrides read from the settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    max_batch_files: Option<usize>,
    low_confidence_threshold: Option<usize>,
    default_font_name: Option<String>,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn session_config(&self, mode: SessionMode) -> SessionConfig {
        SessionConfig {
            mode,
            max_batch_files: self.max_batch_files,
            low_confidence_threshold: self.low_confidence_threshold,
            default_font_name: self.default_font_name.clone(),
        }
    }

    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.max_batch_files {
            self.max_batch_files = v;
        }
        if let Some(v) = file_cfg.low_confidence_threshold {
            self.low_confidence_threshold = v;
        }
        if let Some(v) = file_cfg.default_font_name {
            self.default_font_name = v;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("HANDFONT_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = var("APP__SERVER_URL") {
            self.server_url = v;
        }

        if let Some(parsed) = var("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = parsed;
        }
        if let Some(parsed) = var("APP__MAX_BATCH_FILES").and_then(|v| v.parse().ok()) {
            self.max_batch_files = parsed;
        }
        if let Some(parsed) = var("APP__LOW_CONFIDENCE_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.low_confidence_threshold = parsed;
        }

        if let Some(v) = var("APP__DEFAULT_FONT_NAME") {
            self.default_font_name = v;
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

fn load_settings_from(path: &Path, var: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => settings.apply_file(file_cfg),
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable settings file"),
        }
    }
    settings.apply_env(var);

    settings
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn temp_settings_file(contents: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("handfont_settings_test_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let settings = load_settings_from(Path::new("/nonexistent/handfont.toml"), no_env);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_batch_files, 100);
        assert_eq!(settings.low_confidence_threshold, 5);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = temp_settings_file(
            "server_url = \"http://fonts.local:8080\"\nmax_batch_files = 20\n",
        );

        let settings = load_settings_from(&path, no_env);

        assert_eq!(settings.server_url, "http://fonts.local:8080");
        assert_eq!(settings.max_batch_files, 20);
        assert_eq!(settings.request_timeout_secs, 30);
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn environment_wins_over_file_and_ignores_bad_numbers() {
        let path = temp_settings_file("server_url = \"http://from-file\"\n");
        let env_vars: HashMap<&str, &str> = HashMap::from([
            ("APP__SERVER_URL", "http://from-env"),
            ("APP__REQUEST_TIMEOUT_SECS", "5"),
            ("APP__MAX_BATCH_FILES", "lots"),
        ]);

        let settings = load_settings_from(&path, |key| env_vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.server_url, "http://from-env");
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.max_batch_files, 100);
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn unreadable_file_is_ignored() {
        let path = temp_settings_file("server_url = [not toml");
        let settings = load_settings_from(&path, no_env);
        assert_eq!(settings, Settings::default());
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn session_config_carries_limits_and_mode() {
        let settings = Settings {
            max_batch_files: 12,
            low_confidence_threshold: 3,
            default_font_name: "Mine".into(),
            ..Settings::default()
        };

        let config = settings.session_config(SessionMode::Freeform);

        assert_eq!(config.mode, SessionMode::Freeform);
        assert_eq!(config.max_batch_files, 12);
        assert_eq!(config.low_confidence_threshold, 3);
        assert_eq!(config.default_font_name, "Mine");
    }
}
