//! Environment variable naming for the clinic bot.
//!
//! Three families of variables are understood:
//!
//! * structured overrides, `CLINICBOT__<SECTION>__<KEY>` (prefix configurable via `PREFIX`);
//! * secrets referenced by a `"secret_from_env"` marker, `CLINICBOT_SECRET_<SECTION>_<KEY>`;
//! * the flat names used by earlier deployments (`BOT_TOKEN`, `CALENDAR_ID`, `DB_HOST`, ...).

use std::env;

use config::{Environment, Map};
use tracing::warn;

/// The default prefix for configuration environment variables
pub const DEFAULT_PREFIX: &str = "CLINICBOT";

/// The prefix for secret environment variables
pub const SECRET_PREFIX: &str = "CLINICBOT_SECRET";

/// The separator for configuration environment variables
pub const CONFIG_SEPARATOR: &str = "__";

/// The separator for secret environment variables
pub const SECRET_SEPARATOR: &str = "_";

/// Marker value that is replaced by a secret read from the environment.
pub const SECRET_MARKER: &str = "secret_from_env";

/// Flat variable name and the config path it feeds.
const LEGACY_VARS: &[(&str, &str)] = &[
    ("BOT_TOKEN", "telegram.bot_token"),
    ("ADMIN_ID", "telegram.admin_id"),
    ("CALENDAR_ID", "gcal.calendar_id"),
    ("GOOGLE_CREDENTIALS_FILE", "gcal.key_path"),
    ("WORK_START_HOUR", "schedule.work_start_hour"),
    ("WORK_END_HOUR", "schedule.work_end_hour"),
    ("DATABASE_URL", "database.url"),
    ("LOG_LEVEL", "logging.level"),
];

/// Get the prefix for configuration environment variables
pub fn get_config_prefix() -> String {
    env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string())
}

/// Convert a configuration path to an environment variable name
///
/// `"schedule.work_start_hour"` becomes `"CLINICBOT__SCHEDULE__WORK_START_HOUR"`.
pub fn config_path_to_env_var(path: &str) -> String {
    let prefix = get_config_prefix();
    let path = path.replace('.', CONFIG_SEPARATOR);
    format!("{}{}{}", prefix, CONFIG_SEPARATOR, path).to_uppercase()
}

/// Convert a secret path to an environment variable name
///
/// `"telegram.bot_token"` becomes `"CLINICBOT_SECRET_TELEGRAM_BOT_TOKEN"`.
pub fn secret_path_to_env_var(path: &str) -> String {
    let path = path.replace('.', SECRET_SEPARATOR);
    format!("{}{}{}", SECRET_PREFIX, SECRET_SEPARATOR, path).to_uppercase()
}

/// Flat name of a secret path, `"telegram.bot_token"` becomes `"TELEGRAM_BOT_TOKEN"`.
pub fn legacy_secret_path_to_env_var(path: &str) -> String {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() < 2 {
        return path.to_uppercase();
    }

    let section = parts[0];
    let key = parts[1..].join(SECRET_SEPARATOR);
    format!("{}_{}", section, key).to_uppercase()
}

/// Get an environment variable for a secret path, new naming first.
pub fn get_secret_env_var(path: &str) -> Option<String> {
    let env_var = secret_path_to_env_var(path);
    if let Ok(value) = env::var(&env_var) {
        return Some(value);
    }

    let legacy_env_var = legacy_secret_path_to_env_var(path);
    if let Ok(value) = env::var(&legacy_env_var) {
        return Some(value);
    }

    // BOT_TOKEN and friends
    LEGACY_VARS
        .iter()
        .find(|(_, target)| *target == path)
        .and_then(|(name, _)| env::var(name).ok())
}

/// Collects the flat variables of earlier deployments into a config source.
///
/// The keys are rewritten to the `SECTION__KEY` form so the source merges with
/// the file layers like any other environment source. When no `DATABASE_URL`
/// is given but `DB_HOST` is, a PostgreSQL URL is assembled from the `DB_*`
/// variables.
pub fn legacy_environment() -> Environment {
    let vars: Map<String, String> = env::vars().collect();
    Environment::default()
        .separator(CONFIG_SEPARATOR)
        .source(Some(legacy_overrides(&vars)))
}

/// Pure part of [`legacy_environment`], separated for testing.
pub fn legacy_overrides(vars: &Map<String, String>) -> Map<String, String> {
    let mut overrides = Map::new();
    for (name, path) in LEGACY_VARS {
        if let Some(value) = vars.get(*name).filter(|v| !v.is_empty()) {
            overrides.insert(path.replace('.', CONFIG_SEPARATOR).to_uppercase(), value.clone());
        }
    }

    if !overrides.contains_key("DATABASE__URL") {
        if let Some(url) = postgres_url_from_parts(vars) {
            overrides.insert("DATABASE__URL".to_string(), url);
        }
    }
    overrides
}

fn postgres_url_from_parts(vars: &Map<String, String>) -> Option<String> {
    let host = vars.get("DB_HOST").filter(|h| !h.is_empty())?;
    let port = vars.get("DB_PORT").map(String::as_str).unwrap_or("5432");
    let user = vars.get("DB_USER").map(String::as_str).unwrap_or("postgres");
    let name = vars.get("DB_NAME").map(String::as_str).unwrap_or("postgres");
    let credentials = match vars.get("DB_PASSWORD").filter(|p| !p.is_empty()) {
        Some(password) => format!("{user}:{password}"),
        None => user.to_string(),
    };
    Some(format!("postgres://{credentials}@{host}:{port}/{name}"))
}

/// Replaces every `"secret_from_env"` string inside a JSON value.
///
/// Returns `true` if any value was replaced. Missing variables are logged and
/// the marker is left in place so validation can report it.
pub fn inject_env_vars(value: &mut serde_json::Value) -> bool {
    use serde_json::Value;

    fn walk(path: Vec<String>, obj: &mut Value) -> bool {
        let mut replaced = false;

        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    let mut new_path = path.clone();
                    new_path.push(k.to_string());
                    replaced |= walk(new_path, v);
                }
            }
            Value::String(s) if s == SECRET_MARKER => {
                let path_str = path.join(".");
                if let Some(env_val) = get_secret_env_var(&path_str) {
                    *s = env_val;
                    replaced = true;
                } else {
                    warn!(path = %path_str, "no environment variable found for secret");
                }
            }
            _ => {}
        }

        replaced
    }

    walk(vec![], value)
}
