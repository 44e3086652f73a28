use crate::app_config::{AppConfig, Environment, ProviderConfig, ProviderKind};
use crate::ConfigError;

pub const DEFAULT_MODEL_ID: &str = "ProsusAI/finbert";
pub const DEFAULT_INFERENCE_URL: &str =
    "https://api-inference.huggingface.co/models/ProsusAI/finbert";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if any value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values count as unset so `FOO=` in a .env file does not leak through.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("FINSENT_ENV", "development"))?;
    let bind_addr = parse_addr("FINSENT_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("FINSENT_LOG_LEVEL", "info");

    let kind = parse_provider_kind(&or_default("FINSENT_PROVIDER", "local"))?;
    let model_id = or_default("FINSENT_MODEL_ID", DEFAULT_MODEL_ID);
    let model_revision = or_default("FINSENT_MODEL_REVISION", "main");
    let model_dir = optional("FINSENT_MODEL_DIR").map(PathBuf::from);

    let max_sequence_length = parse_usize("FINSENT_MAX_SEQUENCE_LENGTH", "512")?;
    if max_sequence_length == 0 {
        return Err(invalid(
            "FINSENT_MAX_SEQUENCE_LENGTH",
            "must be greater than zero".to_string(),
        ));
    }

    let inference_url = or_default("FINSENT_INFERENCE_URL", DEFAULT_INFERENCE_URL);
    let inference_timeout_secs = parse_u64("FINSENT_INFERENCE_TIMEOUT_SECS", "30")?;
    if inference_timeout_secs == 0 {
        return Err(invalid(
            "FINSENT_INFERENCE_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let huggingface_api_key = optional("HUGGINGFACE_API_KEY");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        provider: ProviderConfig {
            kind,
            model_id,
            model_revision,
            model_dir,
            max_sequence_length,
            inference_url,
            inference_timeout_secs,
            huggingface_api_key,
        },
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FINSENT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

fn parse_provider_kind(s: &str) -> Result<ProviderKind, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(ProviderKind::Local),
        "remote" | "huggingface" | "hf" => Ok(ProviderKind::Remote),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FINSENT_PROVIDER".to_string(),
            reason: format!("expected 'local' or 'remote', got '{other}'"),
        }),
    }
}
