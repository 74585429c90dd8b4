//! Configuration validation with detailed error reporting.
//!
//! Grounded in the teacher's `config::validation::ConfigValidator`: the
//! `ValidationResult` (errors/warnings/recommendations) shape is carried
//! over unchanged, but the checks themselves are rebuilt against
//! `ServiceConfig` (route prefix + origin list + middleware names) instead
//! of the teacher's per-route backend/method/protocol fields, none of
//! which this gateway's data model has.

use std::collections::HashSet;

use log::{info, warn};

use crate::middleware::MiddlewareRegistry;
use crate::models::settings::Settings;

/// Result of configuration validation containing errors, warnings, and
/// recommendations.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    /// Runs every check and logs a summary. Startup must abort if
    /// `result.is_valid` is false (unknown middleware, empty origin list,
    /// and duplicate/overlapping route prefixes are all hard errors).
    pub fn validate_comprehensive(settings: &Settings, middleware: &MiddlewareRegistry) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_basic_structure(settings, &mut result);
        Self::validate_middleware_names(settings, middleware, &mut result);
        Self::validate_security(settings, &mut result);
        Self::validate_route_conflicts(settings, &mut result);

        Self::log_validation_results(&result);
        result
    }

    fn validate_basic_structure(settings: &Settings, result: &mut ValidationResult) {
        if settings.services.is_empty() {
            result.add_error("no services configured - gateway will not handle any requests".to_string());
        }

        for service in &settings.services {
            if service.name.is_empty() {
                result.add_error("service has an empty name".to_string());
            }
            if !service.route_prefix.starts_with('/') {
                result.add_error(format!(
                    "service '{}' route_prefix must start with '/'",
                    service.name
                ));
            }
            if service.origins.is_empty() {
                result.add_error(format!("service '{}' has no configured origins", service.name));
            }
            if service.rate_limit_rps > 0.0 && service.rate_limit_burst <= 0.0 {
                result.add_error(format!(
                    "service '{}' has a positive rate but non-positive burst",
                    service.name
                ));
            }
            if service.breaker_failure_threshold == 0 {
                result.add_error(format!(
                    "service '{}' breaker_failure_threshold must be at least 1",
                    service.name
                ));
            }
        }
    }

    fn validate_middleware_names(
        settings: &Settings,
        middleware: &MiddlewareRegistry,
        result: &mut ValidationResult,
    ) {
        for service in &settings.services {
            for name in &service.middleware {
                if !middleware.contains(name) {
                    result.add_error(format!(
                        "service '{}' references unknown middleware '{}'",
                        service.name, name
                    ));
                }
            }
        }
    }

    fn validate_security(settings: &Settings, result: &mut ValidationResult) {
        if settings.valid_keys.is_empty() {
            let has_auth = settings
                .services
                .iter()
                .any(|s| s.middleware.iter().any(|m| m == "auth"));
            if has_auth {
                result.add_warning(
                    "auth middleware is configured but valid_keys is empty - all requests will be rejected"
                        .to_string(),
                );
            }
        }

        for service in &settings.services {
            for origin in &service.origins {
                if origin.starts_with("http://") {
                    result.add_warning(format!(
                        "service '{}' has an insecure http:// origin: {} - consider https://",
                        service.name, origin
                    ));
                } else if !origin.starts_with("https://") {
                    result.add_error(format!(
                        "service '{}' origin '{}' must start with http:// or https://",
                        service.name, origin
                    ));
                }
            }

            if !service.middleware.iter().any(|m| m == "circuit_breaker") {
                result.add_recommendation(format!(
                    "service '{}' has no circuit_breaker in its middleware chain",
                    service.name
                ));
            }
        }
    }

    /// Longest-prefix dispatch tolerates overlapping prefixes by design
    /// (ties break on config order), but two services sharing the exact
    /// same prefix is almost certainly a mistake, not an intentional tie.
    fn validate_route_conflicts(settings: &Settings, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for service in &settings.services {
            if !seen.insert(service.route_prefix.clone()) {
                result.add_error(format!(
                    "duplicate route_prefix '{}' across services",
                    service.route_prefix
                ));
            }
        }
    }

    fn log_validation_results(result: &ValidationResult) {
        if result.is_valid {
            info!(
                "configuration valid ({} warnings, {} recommendations)",
                result.warnings.len(),
                result.recommendations.len()
            );
        } else {
            warn!("configuration invalid: {} errors", result.errors.len());
        }
        for error in &result.errors {
            warn!("config error: {error}");
        }
        for warning in &result.warnings {
            warn!("config warning: {warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::ServiceConfig;
    use crate::models::settings::ValidKeySet;

    fn service(name: &str, prefix: &str, origins: Vec<&str>) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            route_prefix: prefix.to_string(),
            origins: origins.into_iter().map(String::from).collect(),
            middleware: vec!["circuit_breaker".to_string()],
            rate_limit_rps: 0.0,
            rate_limit_burst: 10.0,
            breaker_failure_threshold: 5,
            breaker_reset_timeout_secs: 30,
        }
    }

    #[test]
    fn empty_services_is_an_error() {
        let settings = Settings {
            version: 1,
            listen_addr: "0.0.0.0:8080".to_string(),
            valid_keys: ValidKeySet::default(),
            services: vec![],
        };
        let result = ConfigValidator::validate_comprehensive(&settings, &MiddlewareRegistry::with_builtins());
        assert!(!result.is_valid);
    }

    #[test]
    fn unknown_middleware_is_an_error() {
        let mut svc = service("users", "/users", vec!["https://a"]);
        svc.middleware = vec!["not_a_real_middleware".to_string()];
        let settings = Settings {
            version: 1,
            listen_addr: "0.0.0.0:8080".to_string(),
            valid_keys: ValidKeySet::default(),
            services: vec![svc],
        };
        let result = ConfigValidator::validate_comprehensive(&settings, &MiddlewareRegistry::with_builtins());
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("not_a_real_middleware")));
    }

    #[test]
    fn duplicate_prefixes_are_an_error() {
        let settings = Settings {
            version: 1,
            listen_addr: "0.0.0.0:8080".to_string(),
            valid_keys: ValidKeySet::default(),
            services: vec![
                service("a", "/users", vec!["https://a"]),
                service("b", "/users", vec!["https://b"]),
            ],
        };
        let result = ConfigValidator::validate_comprehensive(&settings, &MiddlewareRegistry::with_builtins());
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("duplicate route_prefix")));
    }

    #[test]
    fn well_formed_config_is_valid_with_no_errors() {
        let settings = Settings {
            version: 1,
            listen_addr: "0.0.0.0:8080".to_string(),
            valid_keys: ValidKeySet::new(["k1".to_string()]),
            services: vec![service("users", "/users", vec!["https://a", "https://b"])],
        };
        let result = ConfigValidator::validate_comprehensive(&settings, &MiddlewareRegistry::with_builtins());
        assert!(result.is_valid);
    }
}
