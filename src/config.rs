use crate::error::ConfigError;
use crate::parser::Route;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Tasks,
    Weather,
}

impl Variant {
    pub fn route(self) -> Route {
        match self {
            Variant::Tasks => Route::Tasks,
            Variant::Weather => Route::Weather,
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tasks" | "task" | "todo" => Ok(Variant::Tasks),
            "weather" => Ok(Variant::Weather),
            other => Err(ConfigError::InvalidVariant(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub task_api_url: String,
    pub category_api_url: String,
    pub weather_api_url: String,
    pub lookup_api_url: String,
    pub history_api_url: String,
    pub variant: Variant,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            task_api_url: "http://localhost:8080/api/tasks".to_string(),
            category_api_url: "http://localhost:8080/api/category".to_string(),
            weather_api_url: "http://localhost:8080/api/weather".to_string(),
            lookup_api_url: "http://localhost:8080/api/lookup".to_string(),
            history_api_url: "http://localhost:8080/api".to_string(),
            variant: Variant::Tasks,
        }
    }
}

// Shape of config.toml; every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    task_api_url: Option<String>,
    category_api_url: Option<String>,
    weather_api_url: Option<String>,
    lookup_api_url: Option<String>,
    history_api_url: Option<String>,
    variant: Option<String>,
}

impl Config {
    /// Defaults, then the TOML file, then `SMART_TODO_*` environment variables.
    pub fn load(path_override: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        let path = path_override
            .map(Path::to_path_buf)
            .or_else(default_config_path);
        if let Some(path) = path {
            if path.exists() || path_override.is_some() {
                info!(path = %path.display(), "loading config file");
                config.apply_file(&path)?;
            } else {
                debug!(path = %path.display(), "no config file, using defaults");
            }
        }

        config.apply_env(|key| env::var(key).ok())?;
        config.trim_urls();
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        merge(&mut self.task_api_url, file.task_api_url);
        merge(&mut self.category_api_url, file.category_api_url);
        merge(&mut self.weather_api_url, file.weather_api_url);
        merge(&mut self.lookup_api_url, file.lookup_api_url);
        merge(&mut self.history_api_url, file.history_api_url);
        if let Some(variant) = file.variant {
            self.variant = variant.parse()?;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        merge(&mut self.task_api_url, lookup("SMART_TODO_TASK_API_URL"));
        merge(&mut self.category_api_url, lookup("SMART_TODO_CATEGORY_API_URL"));
        merge(&mut self.weather_api_url, lookup("SMART_TODO_WEATHER_API_URL"));
        merge(&mut self.lookup_api_url, lookup("SMART_TODO_LOOKUP_API_URL"));
        merge(&mut self.history_api_url, lookup("SMART_TODO_HISTORY_API_URL"));
        if let Some(variant) = lookup("SMART_TODO_VARIANT") {
            self.variant = variant.parse()?;
        }
        Ok(())
    }

    fn trim_urls(&mut self) {
        for url in [
            &mut self.task_api_url,
            &mut self.category_api_url,
            &mut self.weather_api_url,
            &mut self.lookup_api_url,
            &mut self.history_api_url,
        ] {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
    }
}

fn merge(slot: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        *slot = value;
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("smart-todo").join("config.toml"))
}

pub fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("smart-todo").join("smart-todo.log"))
}
