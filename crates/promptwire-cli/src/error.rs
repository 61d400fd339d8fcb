use thiserror::Error;

pub const ENV_PREFIX: &str = "PROMPTWIRE";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Missing setting, set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {env_var}: {message}")]
    InvalidValue { env_var: String, message: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted settings path.
pub fn to_env_var(field_path: &str) -> String {
    let path = field_path
        .split('.')
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("__");
    format!("{}_{}", ENV_PREFIX, path)
}
