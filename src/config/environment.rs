//! Deployment environment detection.
//!
//! The environment is read from a strict precedence chain of variables:
//! `ENVIRONMENT`, `NODE_ENV`, `APP_ENV`, `DEPLOYMENT_ENV`. The first set,
//! non-empty variable wins. Classification tries exact matches first, then
//! substring patterns, so values like `us-east-prod-2` or `uat-blue` still
//! classify sensibly. With no signal at all, development is assumed.

use serde::{Deserialize, Serialize};

/// Variables inspected for environment detection, in precedence order.
pub const ENVIRONMENT_VARIABLES: [&str; 4] =
    ["ENVIRONMENT", "NODE_ENV", "APP_ENV", "DEPLOYMENT_ENV"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Production and staging share hardened invariants (API keys required,
    /// encryption required when a remote cache is configured).
    pub fn is_hardened(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Detect the environment from process environment variables.
    pub fn detect() -> DetectedEnvironment {
        for var in ENVIRONMENT_VARIABLES {
            if let Ok(raw) = std::env::var(var) {
                let raw = raw.trim().to_string();
                if raw.is_empty() {
                    continue;
                }
                let (environment, exact) = classify(&raw);
                return DetectedEnvironment {
                    environment,
                    source: Some(var),
                    raw: Some(raw),
                    exact,
                };
            }
        }
        DetectedEnvironment {
            environment: Environment::Development,
            source: None,
            raw: None,
            exact: false,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of environment detection, kept for operator-facing diagnostics
/// (preset recommendations report which variable decided the outcome).
#[derive(Debug, Clone, Serialize)]
pub struct DetectedEnvironment {
    pub environment: Environment,
    /// Variable that supplied the signal, if any.
    pub source: Option<&'static str>,
    /// Raw value of that variable.
    pub raw: Option<String>,
    /// True when the value matched a canonical name exactly.
    pub exact: bool,
}

/// Classify a raw environment string. Returns the environment and whether
/// the match was exact.
fn classify(raw: &str) -> (Environment, bool) {
    let value = raw.to_ascii_lowercase();

    match value.as_str() {
        "production" | "prod" | "live" | "release" => return (Environment::Production, true),
        "staging" | "stage" | "uat" | "preprod" | "pre-production" => {
            return (Environment::Staging, true);
        }
        "development" | "dev" | "local" | "test" | "testing" | "sandbox" => {
            return (Environment::Development, true);
        }
        _ => {}
    }

    // Staging patterns are checked before production: "preprod" contains
    // "prod" and must not classify as production.
    for pattern in ["stag", "uat", "preprod"] {
        if value.contains(pattern) {
            return (Environment::Staging, false);
        }
    }
    for pattern in ["prod", "live", "release"] {
        if value.contains(pattern) {
            return (Environment::Production, false);
        }
    }
    for pattern in ["dev", "local", "test", "sandbox"] {
        if value.contains(pattern) {
            return (Environment::Development, false);
        }
    }

    (Environment::Development, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run with every detection variable cleared except the overrides.
    fn with_detection_vars<F: FnOnce()>(overrides: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = ENVIRONMENT_VARIABLES
            .iter()
            .map(|var| {
                let value = overrides
                    .iter()
                    .find(|(name, _)| name == var)
                    .map(|(_, value)| *value);
                (*var, value)
            })
            .collect();
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_exact_matches() {
        assert_eq!(classify("production"), (Environment::Production, true));
        assert_eq!(classify("PROD"), (Environment::Production, true));
        assert_eq!(classify("staging"), (Environment::Staging, true));
        assert_eq!(classify("uat"), (Environment::Staging, true));
        assert_eq!(classify("dev"), (Environment::Development, true));
        assert_eq!(classify("sandbox"), (Environment::Development, true));
    }

    #[test]
    fn test_pattern_matches() {
        assert_eq!(classify("us-east-prod-2"), (Environment::Production, false));
        assert_eq!(classify("release-candidate"), (Environment::Production, false));
        assert_eq!(classify("uat-blue"), (Environment::Staging, false));
        assert_eq!(classify("my-local-box"), (Environment::Development, false));
    }

    #[test]
    fn test_preprod_is_staging_not_production() {
        assert_eq!(classify("preprod"), (Environment::Staging, true));
        assert_eq!(classify("eu-preprod-1"), (Environment::Staging, false));
    }

    #[test]
    fn test_unknown_defaults_to_development() {
        assert_eq!(classify("purple"), (Environment::Development, false));
    }

    #[test]
    fn test_detect_precedence() {
        with_detection_vars(
            &[("ENVIRONMENT", "staging"), ("NODE_ENV", "production")],
            || {
                let detected = Environment::detect();
                assert_eq!(detected.environment, Environment::Staging);
                assert_eq!(detected.source, Some("ENVIRONMENT"));
                assert!(detected.exact);
            },
        );
    }

    #[test]
    fn test_detect_falls_through_empty_values() {
        with_detection_vars(&[("ENVIRONMENT", "  "), ("NODE_ENV", "prod")], || {
            let detected = Environment::detect();
            assert_eq!(detected.environment, Environment::Production);
            assert_eq!(detected.source, Some("NODE_ENV"));
        });
    }

    #[test]
    fn test_detect_no_signal_is_development() {
        with_detection_vars(&[], || {
            let detected = Environment::detect();
            assert_eq!(detected.environment, Environment::Development);
            assert!(detected.source.is_none());
            assert!(!detected.exact);
        });
    }
}
