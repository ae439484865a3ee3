//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::EngineConfig;
use common::Error;
use std::path::PathBuf;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_non_negative_f64(raw: &str, env_name: &str) -> Result<f64, Error> {
    let parsed = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{env_name} must be a number >= 0")))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(Error::Config(format!("{env_name} must be a number >= 0")));
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

/// Apply `POLL_*` overrides. `lookup` abstracts the environment so the
/// precedence rules can be exercised without mutating process state.
pub fn apply_env_overrides<F>(config: &mut EngineConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("POLL_SIM_TRIALS") {
        config.simulation.trials = parse_positive_u32(&raw, "POLL_SIM_TRIALS")?;
    }
    if let Some(raw) = lookup("POLL_SIM_VOLATILITY") {
        config.simulation.volatility = parse_non_negative_f64(&raw, "POLL_SIM_VOLATILITY")?;
    }
    if let Some(raw) = lookup("POLL_SIM_UNDECIDED") {
        config.simulation.undecided_percent = parse_non_negative_f64(&raw, "POLL_SIM_UNDECIDED")?;
    }
    if let Some(raw) = lookup("POLL_SIM_TURNOUT_VARIATION") {
        config.simulation.turnout_variation =
            parse_non_negative_f64(&raw, "POLL_SIM_TURNOUT_VARIATION")?;
    }
    if let Some(raw) = lookup("POLL_SIM_SEED") {
        let seed = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::Config("POLL_SIM_SEED must be an unsigned integer".into()))?;
        config.seed = Some(seed);
    }
    if let Some(raw) = lookup("POLL_LOG_SINGLE_SOURCE") {
        config.aggregation.log_single_source = parse_bool(&raw);
    }
    Ok(())
}

/// Reject configs the engine would refuse at run time, listing every issue.
pub fn validate_config(config: &EngineConfig) -> Result<(), Error> {
    match config.simulation.validate() {
        Ok(()) => Ok(()),
        Err(Error::InvalidConfig(issues)) => Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.replace("; ", "\n - ")
        ))),
        Err(e) => Err(e),
    }
}

/// Load engine configuration from environment and optional config file.
pub fn load_config() -> Result<EngineConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = EngineConfig::default();

    // 3. Try loading config.toml (or POLL_ENGINE_CONFIG) if it exists.
    let config_path = std::env::var("POLL_ENGINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 4. Override with environment variables (highest priority).
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = EngineConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("POLL_SIM_TRIALS", "2500"),
                ("POLL_SIM_VOLATILITY", "0.2"),
                ("POLL_SIM_SEED", "42"),
                ("POLL_LOG_SINGLE_SOURCE", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(config.simulation.trials, 2500);
        assert_eq!(config.simulation.volatility, 0.2);
        assert_eq!(config.simulation.undecided_percent, 15.0);
        assert_eq!(config.seed, Some(42));
        assert!(!config.aggregation.log_single_source);
    }

    #[test]
    fn test_zero_trials_rejected() {
        let mut config = EngineConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("POLL_SIM_TRIALS", "0")])).unwrap_err();
        assert!(err.to_string().contains("POLL_SIM_TRIALS"));
    }

    #[test]
    fn test_validate_reports_out_of_range_volatility() {
        let mut config = EngineConfig::default();
        apply_env_overrides(&mut config, env(&[("POLL_SIM_VOLATILITY", "1.7")])).unwrap();
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("volatility must be in [0,1]"), "{}", err);
    }

    #[test]
    fn test_toml_sections_with_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            seed = 7

            [simulation]
            trials = 5000
            undecided_percent = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.simulation.trials, 5000);
        assert_eq!(config.simulation.volatility, 0.5);
        assert!(config.aggregation.log_single_source);
        assert!(validate_config(&config).is_ok());
    }
}
