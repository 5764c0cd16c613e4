// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks retry budget, TTL, probe timeout, and channel capacity sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(&path)?;
    let config = Config::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve the default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Privexec.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_validates_a_full_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[auth]\nretry_budget = 2\ncredential_ttl_secs = 60\nvalidation_timeout_secs = 3\n\n[queue]\ncommand_capacity = 16\n"
        )
        .expect("write config");

        let cfg = load_and_validate(file.path()).expect("valid config");
        assert_eq!(cfg.retry_budget(), 2);
        assert_eq!(cfg.credential_ttl().as_secs(), 60);
        assert_eq!(cfg.validation_timeout().as_secs(), 3);
        assert_eq!(cfg.command_capacity(), 16);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[auth]\nretry_budget = 5").expect("write config");

        let cfg = load_and_validate(file.path()).expect("valid config");
        assert_eq!(cfg.retry_budget(), 5);
        assert_eq!(cfg.credential_ttl().as_secs(), 300);
    }
}
