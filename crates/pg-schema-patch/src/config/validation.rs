//! Configuration validation.

use super::Config;
use crate::error::{PatchError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_db(&config.source, "source")?;

    if let Some(target) = &config.target {
        validate_db(target, "target")?;

        // Comparing a database against itself is always a no-op diff.
        if config.source.host == target.host
            && config.source.port == target.port
            && config.source.database == target.database
        {
            return Err(PatchError::Config(
                "source and target cannot be the same database".into(),
            ));
        }
    }

    if config.schema.is_empty() {
        return Err(PatchError::Config("schema is required".into()));
    }

    if config.conventions.attr_prefix_order.is_empty() {
        return Err(PatchError::Config(
            "conventions.attr_prefix_order must not be empty".into(),
        ));
    }

    Ok(())
}

fn validate_db(db: &super::DbConfig, side: &str) -> Result<()> {
    if db.host.is_empty() {
        return Err(PatchError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(PatchError::Config(format!("{}.database is required", side)));
    }
    if db.user.is_empty() {
        return Err(PatchError::Config(format!("{}.user is required", side)));
    }
    match db.ssl_mode.as_str() {
        "disable" | "require" | "verify-ca" | "verify-full" => Ok(()),
        other => Err(PatchError::Config(format!(
            "{}.ssl_mode '{}' is invalid. Valid options: disable, require, verify-ca, verify-full",
            side, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Conventions, DbConfig};

    fn db(host: &str, database: &str) -> DbConfig {
        DbConfig {
            host: host.to_string(),
            port: 5432,
            database: database.to_string(),
            user: "postgres".to_string(),
            password: "password".to_string(),
            ssl_mode: "disable".to_string(),
            session_timeout_ms: None,
        }
    }

    fn valid_config() -> Config {
        Config {
            source: db("qa-db", "app_qa"),
            target: Some(db("demo-db", "app_demo")),
            schema: "public".to_string(),
            conventions: Conventions::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_database_rejected() {
        let mut config = valid_config();
        config.target = Some(config.source.clone());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_target_optional() {
        let mut config = valid_config();
        config.target = None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.source.ssl_mode = "prefer".to_string();
        assert!(validate(&config).is_err());
    }
}
