// src/config/validate.rs

use crate::config::model::{Config, RawConfig};
use crate::errors::{PrivexecError, Result};

impl TryFrom<RawConfig> for Config {
    type Error = PrivexecError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw.auth, raw.queue))
    }
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    if cfg.auth.retry_budget == 0 {
        return Err(PrivexecError::Config(
            "[auth].retry_budget must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.auth.credential_ttl_secs == 0 {
        return Err(PrivexecError::Config(
            "[auth].credential_ttl_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    // The probe must stay cheap; anything longer stalls the whole retry
    // loop on a wrong password.
    if cfg.auth.validation_timeout_secs == 0 || cfg.auth.validation_timeout_secs > 5 {
        return Err(PrivexecError::Config(format!(
            "[auth].validation_timeout_secs must be between 1 and 5 (got {})",
            cfg.auth.validation_timeout_secs
        )));
    }

    if cfg.queue.command_capacity == 0 {
        return Err(PrivexecError::Config(
            "[queue].command_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{AuthSection, QueueSection};

    fn raw() -> RawConfig {
        RawConfig {
            auth: AuthSection::default(),
            queue: QueueSection::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(Config::try_from(raw()).is_ok());
    }

    #[test]
    fn rejects_zero_retry_budget() {
        let mut cfg = raw();
        cfg.auth.retry_budget = 0;
        assert!(matches!(
            Config::try_from(cfg),
            Err(PrivexecError::Config(_))
        ));
    }

    #[test]
    fn rejects_oversized_validation_timeout() {
        let mut cfg = raw();
        cfg.auth.validation_timeout_secs = 30;
        let err = Config::try_from(cfg).unwrap_err();
        assert!(err.to_string().contains("validation_timeout_secs"));
    }

    #[test]
    fn rejects_zero_command_capacity() {
        let mut cfg = raw();
        cfg.queue.command_capacity = 0;
        assert!(matches!(
            Config::try_from(cfg),
            Err(PrivexecError::Config(_))
        ));
    }
}
