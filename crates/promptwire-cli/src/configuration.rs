use crate::error::{to_env_var, SettingsError, ENV_PREFIX};
use config::{Config, Environment, File, FileFormat};
use promptwire::models::message::ContextConfiguration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct EngineSettings {
    /// Token budget used when a build request does not carry one
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// HuggingFace `tokenizer.json` for exact token counts
    #[serde(default)]
    pub tokenizer: Option<PathBuf>,
    /// Model name used when a command does not name one
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            tokenizer: None,
            model: None,
        }
    }
}

impl EngineSettings {
    pub fn require_model(&self) -> Result<&str, SettingsError> {
        self.model.as_deref().ok_or_else(|| SettingsError::MissingEnvVar {
            env_var: to_env_var("engine.model"),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    /// Load defaults, then the optional TOML file, then `PROMPTWIRE_*` variables
    pub fn new(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("engine.max_tokens", default_max_tokens() as u64)?
            .set_default("log.level", default_log_level())?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            match err {
                config::ConfigError::NotFound(field) => SettingsError::MissingEnvVar {
                    env_var: to_env_var(&field),
                },
                config::ConfigError::Type {
                    key: Some(ref key),
                    ..
                } => SettingsError::InvalidValue {
                    env_var: to_env_var(key),
                    message: err.to_string(),
                },
                other => SettingsError::Other(other),
            }
        })
    }
}

fn default_max_tokens() -> usize {
    ContextConfiguration::DEFAULT_MAX_TOKENS
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("PROMPTWIRE_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.engine.max_tokens, 8192);
        assert_eq!(settings.engine.tokenizer, None);
        assert_eq!(settings.engine.model, None);
        assert_eq!(settings.log.level, "warn");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("PROMPTWIRE_ENGINE__MAX_TOKENS", "2048");
        env::set_var("PROMPTWIRE_ENGINE__MODEL", "qwen2.5-7b-instruct");
        env::set_var("PROMPTWIRE_LOG__LEVEL", "debug");

        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.engine.max_tokens, 2048);
        assert_eq!(settings.engine.model.as_deref(), Some("qwen2.5-7b-instruct"));
        assert_eq!(settings.log.level, "debug");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_file_then_environment() {
        clean_env();
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[engine]\nmax_tokens = 1024\nmodel = \"gemma-2-9b-it\"\ntokenizer = \"/models/gemma/tokenizer.json\"\n"
        )
        .unwrap();
        env::set_var("PROMPTWIRE_ENGINE__MAX_TOKENS", "4096");

        let settings = Settings::new(Some(file.path())).unwrap();
        assert_eq!(settings.engine.max_tokens, 4096);
        assert_eq!(settings.engine.model.as_deref(), Some("gemma-2-9b-it"));
        assert_eq!(
            settings.engine.tokenizer,
            Some(PathBuf::from("/models/gemma/tokenizer.json"))
        );

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_an_error() {
        clean_env();
        let result = Settings::new(Some(Path::new("/nonexistent/promptwire.toml")));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_value_is_an_error() {
        clean_env();
        env::set_var("PROMPTWIRE_ENGINE__MAX_TOKENS", "plenty");
        assert!(Settings::new(None).is_err());
        clean_env();
    }

    #[test]
    fn test_require_model_names_the_variable() {
        let engine = EngineSettings::default();
        match engine.require_model() {
            Err(SettingsError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "PROMPTWIRE_ENGINE__MODEL")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
