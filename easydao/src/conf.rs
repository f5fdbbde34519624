use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DaoConf {
    pub database_url: String,

    pub max_connections: u32,

    /// Create the entity table when an engine is opened.
    pub create_table: bool,

    pub drop_if_exists: bool,

    /// Chunk size for batch inserts; `None` sends one statement per batch.
    pub batch_size: Option<usize>,

    pub log_init: bool,
}

impl Default for DaoConf {
    fn default() -> Self {
        Self {
            database_url: "mysql://localhost/easydao".to_string(),
            max_connections: 5,
            create_table: true,
            drop_if_exists: false,
            batch_size: None,
            log_init: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

impl DaoConf {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        #[cfg(test)]
        {
            dotenvy::from_filename_override(".env.test").ok();
        }

        #[cfg(all(debug_assertions, not(test)))]
        {
            dotenvy::from_filename_override(".env.dev").ok();
        }

        #[cfg(not(any(debug_assertions, test)))]
        {
            dotenvy::from_filename_override(".env.prod").ok();
        }

        Self::from_vars()
    }

    /// Reads the `DATABASE_URL` and `EASYDAO_*` variables already present in
    /// the process environment. Missing or malformed values keep defaults.
    pub fn from_vars() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: env_parse("EASYDAO_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            create_table: env_flag("EASYDAO_CREATE_TABLE").unwrap_or(defaults.create_table),
            drop_if_exists: env_flag("EASYDAO_DROP_IF_EXISTS").unwrap_or(defaults.drop_if_exists),
            batch_size: env_parse("EASYDAO_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .or(defaults.batch_size),
            log_init: env_flag("EASYDAO_LOG_INIT").unwrap_or(defaults.log_init),
        }
    }

    /// Installs a `fmt` subscriber filtered by `RUST_LOG` when `log_init` is
    /// set. A subscriber installed earlier is left in place.
    pub fn init_logging(&self) {
        if self.log_init {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = DaoConf::default();
        assert_eq!(conf.max_connections, 5);
        assert!(conf.create_table);
        assert!(!conf.drop_if_exists);
        assert_eq!(conf.batch_size, None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let conf: DaoConf = serde_json::from_str(
            r#"{"database_url":"mysql://db/app","max_connections":2,"create_table":false,
                "drop_if_exists":true,"batch_size":100,"log_init":false}"#,
        )
        .unwrap();
        assert_eq!(conf.database_url, "mysql://db/app");
        assert_eq!(conf.batch_size, Some(100));
        assert!(conf.drop_if_exists);
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let conf = DaoConf::default();
        conf.init_logging();
        conf.init_logging();
    }
}
