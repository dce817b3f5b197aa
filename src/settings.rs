use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub retry: bool,
    pub context_window: usize,
    pub workers: usize,
    pub session_dir: Option<String>,
    pub session_max_age_minutes: u64,
    pub soffice: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            timeout_secs: 120,
            retry: true,
            context_window: 1,
            workers: 4,
            session_dir: None,
            session_max_age_minutes: 30,
            soffice: "soffice".to_string(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_minutes * 60)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    captioner: Option<CaptionerSettings>,
    pipeline: Option<PipelineSettings>,
    session: Option<SessionSettings>,
    convert: Option<ConvertSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct CaptionerSettings {
    endpoint: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    retry: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    context_window: Option<usize>,
    workers: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSettings {
    dir: Option<String>,
    max_age_minutes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConvertSettings {
    soffice: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(captioner) = incoming.captioner {
            if let Some(endpoint) = captioner.endpoint {
                if !endpoint.trim().is_empty() {
                    self.endpoint = endpoint.trim_end_matches('/').to_string();
                }
            }
            if let Some(model) = captioner.model {
                if !model.trim().is_empty() {
                    self.model = model;
                }
            }
            if let Some(timeout) = captioner.timeout_secs {
                if timeout > 0 {
                    self.timeout_secs = timeout;
                }
            }
            if let Some(retry) = captioner.retry {
                self.retry = retry;
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(window) = pipeline.context_window {
                self.context_window = window;
            }
            if let Some(workers) = pipeline.workers {
                if workers > 0 {
                    self.workers = workers;
                }
            }
        }
        if let Some(session) = incoming.session {
            if let Some(dir) = session.dir {
                if !dir.trim().is_empty() {
                    self.session_dir = Some(dir);
                }
            }
            if let Some(age) = session.max_age_minutes {
                self.session_max_age_minutes = age;
            }
        }
        if let Some(convert) = incoming.convert {
            if let Some(soffice) = convert.soffice {
                if !soffice.trim().is_empty() {
                    self.soffice = soffice;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".slide-captioner"))
        }
    })
}
