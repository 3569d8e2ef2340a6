// --- File: crates/clinicbot_config/src/lib.rs ---
use config::{Config, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use tracing::debug;

pub mod env_vars;
pub mod models;

pub use config::ConfigError;
pub use models::*;

/// Loads the application configuration.
///
/// Sources, lowest precedence first:
/// 1. `<config dir>/default.{toml,yaml,json}`
/// 2. `<config dir>/<RUN_ENV>.{toml,yaml,json}` (`RUN_ENV` defaults to `debug`)
/// 3. flat variables of earlier deployments (`BOT_TOKEN`, `CALENDAR_ID`, ...)
/// 4. `CLINICBOT__SECTION__KEY` variables
///
/// The config dir is `config` unless `CLINICBOT_CONFIG_DIR` points elsewhere.
/// `"secret_from_env"` markers are resolved last. The result is not validated;
/// call [`AppConfig::validate`] before use.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let config_dir = env::var("CLINICBOT_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let prefix = env_vars::get_config_prefix();

    let default_path = format!("{config_dir}/default");
    let env_path = format!("{config_dir}/{run_env}");
    debug!(%default_path, %env_path, %prefix, "loading configuration");

    let builder = Config::builder()
        .add_source(File::with_name(&default_path).required(false))
        .add_source(File::with_name(&env_path).required(false))
        .add_source(env_vars::legacy_environment())
        .add_source(Environment::with_prefix(&prefix).separator(env_vars::CONFIG_SEPARATOR));

    let raw_config: AppConfig = builder.build()?.try_deserialize()?;
    apply_env_overrides_from_marker(raw_config)
}

/// Replaces `"secret_from_env"` markers in the serialized config with environment values.
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, ConfigError> {
    let mut json = serde_json::to_value(&config)
        .map_err(|err| ConfigError::Message(format!("failed to serialize config: {err}")))?;
    if env_vars::inject_env_vars(&mut json) {
        debug!("secrets injected from environment");
    }
    serde_json::from_value(json)
        .map_err(|err| ConfigError::Message(format!("failed to rebuild config: {err}")))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Loads the dotenv file into the process environment exactly once.
///
/// `DOTENV_OVERRIDE` selects the file, `.env` otherwise. A missing file is
/// not an error. Returns the path that was used.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_replaced_from_secret_variable() {
        env::set_var("CLINICBOT_SECRET_TELEGRAM_BOT_TOKEN", "42:secret");
        let mut config = AppConfig::default();
        config.telegram.bot_token = env_vars::SECRET_MARKER.to_string();

        let config = apply_env_overrides_from_marker(config).unwrap();

        assert_eq!(config.telegram.bot_token, "42:secret");
        env::remove_var("CLINICBOT_SECRET_TELEGRAM_BOT_TOKEN");
    }

    #[test]
    fn file_layer_is_deserialized_with_defaults() {
        let raw = r#"
            [telegram]
            bot_token = "1:x"
            admin_id = "777"

            [schedule]
            work_start_hour = 10
        "#;
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.telegram.admin_id.as_deref(), Some("777"));
        assert_eq!(config.schedule.work_start_hour, 10);
        assert_eq!(config.schedule.work_end_hour, 18, "unset keys keep defaults");
        assert_eq!(config.database.url, "sqlite:data/clinicbot.db");
    }
}
