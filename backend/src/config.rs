use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::inspection::assessment::{ClassSetError, VEGETABLE_TYPES};
use crate::inspection::ClassSet;

pub const DEFAULT_CONFIG_PATH: &str = "config/inspector.yaml";
const MIB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value `{value}` for {key}")]
    InvalidOverride { key: String, value: String },
    #[error("Invalid vegetable types: {0}")]
    ClassSet(#[from] ClassSetError),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub max_upload_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub vegetable_types: Vec<String>,
    pub static_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("vegetable_quality_model.pt"),
            max_upload_bytes: 32 * MIB,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vegetable_types: VEGETABLE_TYPES.iter().map(|s| s.to_string()).collect(),
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// Reads the YAML file named by `INSPECTOR_CONFIG` (or the default path),
    /// then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("INSPECTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            log::info!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Applies `HOST`, `PORT`, `MODEL_PATH`, `MAX_UPLOAD_MB` and `STATIC_DIR`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidOverride {
                key: "PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model_path = PathBuf::from(model_path);
        }
        if let Some(max_mb) = lookup("MAX_UPLOAD_MB") {
            let invalid = || ConfigError::InvalidOverride {
                key: "MAX_UPLOAD_MB".into(),
                value: max_mb.clone(),
            };
            let mb: u64 = max_mb.parse().map_err(|_| invalid())?;
            self.max_upload_bytes = mb.checked_mul(MIB).ok_or_else(invalid)?;
        }
        if let Some(static_dir) = lookup("STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(static_dir));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be greater than zero".into(),
            ));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "allowed_extensions must not be empty".into(),
            ));
        }
        self.class_set()?;
        Ok(())
    }

    pub fn class_set(&self) -> Result<ClassSet, ConfigError> {
        Ok(ClassSet::new(self.vegetable_types.clone())?)
    }

    pub fn max_upload_mb(&self) -> f64 {
        self.max_upload_bytes as f64 / MIB as f64
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_upload_bytes, 32 * 1024 * 1024);
        assert_eq!(config.max_upload_mb(), 32.0);
        assert_eq!(config.vegetable_types.len(), 15);
        assert!(config.is_allowed_extension("JPG"));
        assert!(!config.is_allowed_extension("svg"));
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            "port: 8080\nvegetable_types: [Tomato, Carrot]\nstatic_dir: web\n",
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.class_set().unwrap().len(), 2);
        assert_eq!(config.static_dir, Some(PathBuf::from("web")));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[
                ("PORT", "9000"),
                ("MODEL_PATH", "/models/veg.pt"),
                ("MAX_UPLOAD_MB", "4"),
            ]))
            .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.model_path, PathBuf::from("/models/veg.pt"));
        assert_eq!(config.max_upload_bytes, 4 * 1024 * 1024);
    }

    #[test]
    fn rejects_malformed_override() {
        let mut config = AppConfig::default();
        let err = config.apply_overrides(lookup(&[("PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn upload_limit_override_must_fit_in_bytes() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[("MAX_UPLOAD_MB", "18446744073709551615")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidOverride { key, .. } => assert_eq!(key, "MAX_UPLOAD_MB"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(config.max_upload_bytes, 32 * MIB);

        config
            .apply_overrides(lookup(&[("MAX_UPLOAD_MB", "17592186044415")]))
            .unwrap();
        assert_eq!(config.max_upload_bytes, 17_592_186_044_415 * MIB);
    }

    #[test]
    fn validation_catches_bad_tables() {
        let config = AppConfig::from_yaml_str("vegetable_types: []").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ClassSet(ClassSetError::Empty))
        ));

        let config = AppConfig::from_yaml_str("max_upload_bytes: 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn reads_config_file() {
        let path = std::env::temp_dir().join(format!("inspector-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "host: 127.0.0.1\nallowed_extensions: [png]\n").unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.allowed_extensions, ["png"]);

        let missing = AppConfig::from_file(Path::new("/nonexistent/inspector.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
