use std::fs;
use std::path::Path;

use crate::error::LLMError;

use super::settings::ResilienceSettings;

impl ResilienceSettings {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, LLMError> {
        let settings: Self = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, LLMError> {
        let settings: Self = serde_yaml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`. `.yml`/`.yaml` files are read as YAML, anything else
    /// as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LLMError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let settings = if is_yaml {
            Self::from_yaml_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };
        log::debug!("loaded resilience settings from {}", path.display());
        Ok(settings)
    }

    /// Serialises the settings as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, LLMError> {
        toml::to_string_pretty(self)
            .map_err(|err| LLMError::ConfigurationError(format!("config serialize error: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use crate::config::ResilienceSettings;

    #[test]
    fn empty_document_uses_defaults() {
        let settings = ResilienceSettings::from_toml_str("").expect("defaults");
        assert_eq!(settings, ResilienceSettings::default());
        assert_eq!(settings.failure_threshold, 5);
        assert_eq!(settings.recovery_timeout_secs, 60);
        assert_eq!(settings.success_threshold, 2);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.initial_delay_ms, 1_000);
        assert_eq!(settings.max_delay_ms, 30_000);
        assert_eq!(settings.exponential_base, 2.0);
        assert!(settings.jitter);
        assert_eq!(settings.cache_capacity, 500);
        assert_eq!(settings.cache_ttl_secs, 3_600);
    }

    #[test]
    fn toml_overrides_and_per_backend_settings() {
        let settings = ResilienceSettings::from_toml_str(
            r#"
            failure_threshold = 3
            jitter = false

            [[backends]]
            id = "openai"
            priority = 2

            [[backends]]
            id = "anthropic"
            priority = 1
            breaker = { failure_threshold = 10 }
            backoff = { max_attempts = 5, initial_delay_ms = 250 }
            "#,
        )
        .expect("settings");

        assert_eq!(settings.breaker_config().expect("breaker").failure_threshold, 3);
        let anthropic = settings.breaker_config_for("anthropic").expect("breaker");
        assert_eq!(anthropic.failure_threshold, 10);
        assert_eq!(anthropic.recovery_timeout, Duration::from_secs(60));

        let policy = settings.backoff_policy_for("anthropic").expect("policy");
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
        assert!(!policy.jitter());

        assert_eq!(
            settings.ordered(["mock", "openai", "anthropic"]),
            vec!["anthropic", "openai", "mock"]
        );
    }

    #[test]
    fn invalid_values_fail_fast() {
        assert!(ResilienceSettings::from_toml_str("failure_threshold = 0").is_err());
        assert!(ResilienceSettings::from_toml_str("initial_delay_ms = 0").is_err());
        assert!(ResilienceSettings::from_toml_str("max_delay_ms = 10").is_err());
        assert!(ResilienceSettings::from_toml_str("exponential_base = 1.0").is_err());
        assert!(ResilienceSettings::from_toml_str("cache_capacity = 0").is_err());
        assert!(ResilienceSettings::from_toml_str("cache_ttl_secs = 0").is_err());
        assert!(ResilienceSettings::from_toml_str(
            "[[backends]]\nid = \"a\"\n[[backends]]\nid = \"a\"\n"
        )
        .is_err());
        assert!(ResilienceSettings::from_toml_str(
            "[[backends]]\nid = \"a\"\nbackoff = { max_attempts = 0 }\n"
        )
        .is_err());
    }

    #[test]
    fn loads_yaml_and_toml_files() {
        let mut yaml = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(yaml, "max_attempts: 4\ncache_ttl_secs: 10").expect("write");
        let settings = ResilienceSettings::load(yaml.path()).expect("yaml");
        assert_eq!(settings.max_attempts, 4);
        assert_eq!(settings.cache_ttl_secs, 10);

        let mut toml_file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("tempfile");
        write!(toml_file, "{}", settings.to_toml_string().expect("serialize")).expect("write");
        let reloaded = ResilienceSettings::load(toml_file.path()).expect("toml");
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = ResilienceSettings::load("/definitely/not/here.toml").expect_err("missing");
        assert!(matches!(err, crate::error::LLMError::ConfigurationError(_)));
    }
}
