//! Post-load validation for a decoded [`ConfigStore`].
//!
//! The loader already guarantees structural soundness (valid ports, typed
//! exposure levels). This pass catches configuration that would decode fine
//! but route badly, and reports everything at once rather than stopping at
//! the first problem.
use eyre::Result;

use crate::config::models::{ConfigStore, RouteRule, ServiceConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("service '{service}': missing required field {field}")]
    MissingField { service: String, field: String },

    #[error("service '{service}': invalid route '{pattern}': {message}")]
    InvalidRoute {
        service: String,
        pattern: String,
        message: String,
    },

    #[error("no services configured; every request would fail resolution")]
    EmptyStore,

    #[error("validation failed:\n{message}")]
    ValidationFailed { message: String },
}

/// Checks a decoded store and collects route-shadowing warnings.
pub struct StoreValidator;

impl StoreValidator {
    /// Validate the entire store. Shadowing problems are warnings, not
    /// errors: first-match-wins makes them legal, just suspicious.
    pub fn validate(store: &ConfigStore) -> ValidationResult<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if store.is_empty() {
            errors.push(ValidationError::EmptyStore);
        }

        for service in store.services() {
            Self::validate_service(service, &mut errors);
            Self::check_shadowed_routes(service, &mut warnings);
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    fn validate_service(service: &ServiceConfig, errors: &mut Vec<ValidationError>) {
        if service.host.is_empty() {
            errors.push(ValidationError::MissingField {
                service: service.name.clone(),
                field: "HOST".to_string(),
            });
        }

        for route in &service.routes {
            if !route.path_pattern.starts_with('/') {
                errors.push(ValidationError::InvalidRoute {
                    service: service.name.clone(),
                    pattern: route.path_pattern.clone(),
                    message: "route patterns must start with '/'".to_string(),
                });
            }
            if route.method.is_empty() {
                errors.push(ValidationError::InvalidRoute {
                    service: service.name.clone(),
                    pattern: route.path_pattern.clone(),
                    message: "route has an empty METHOD".to_string(),
                });
            }
        }
    }

    /// An earlier route whose pattern structurally covers a later one makes
    /// the later route unreachable under first-match-wins scanning.
    fn check_shadowed_routes(service: &ServiceConfig, warnings: &mut Vec<String>) {
        for (i, earlier) in service.routes.iter().enumerate() {
            for later in service.routes.iter().skip(i + 1) {
                if earlier.method == later.method && covers(earlier, later) {
                    warnings.push(format!(
                        "service '{}': route '{} {}' is unreachable, shadowed by earlier '{} {}'",
                        service.name,
                        later.method,
                        later.path_pattern,
                        earlier.method,
                        earlier.path_pattern,
                    ));
                }
            }
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// True when every request matched by `later` would already be taken by
/// `earlier`: same segment count, and each `earlier` segment is either a
/// variable or equal to the corresponding `later` literal.
fn covers(earlier: &RouteRule, later: &RouteRule) -> bool {
    let a: Vec<&str> = earlier.pattern_segments().collect();
    let b: Vec<&str> = later.pattern_segments().collect();
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(&b)
        .all(|(ea, la)| ea.starts_with(':') || (!la.starts_with(':') && ea == la))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_str;

    #[test]
    fn accepts_a_sound_store() {
        let store = parse_str(
            "[svc]\nHOST=localhost\nPORT=5000\n\n[svc.routes]\nPATH=/a/:id\nMETHOD=GET\n",
        )
        .unwrap();
        let warnings = StoreValidator::validate(&store).expect("valid store");
        assert!(warnings.is_empty());
    }

    #[test]
    fn rejects_empty_store() {
        let store = parse_str("GATEWAY_PORT=8080\n").unwrap();
        let err = StoreValidator::validate(&store).unwrap_err();
        assert!(matches!(err, ValidationError::ValidationFailed { .. }));
    }

    #[test]
    fn rejects_missing_host_and_bad_pattern() {
        let store =
            parse_str("[svc]\nPORT=5000\n\n[svc.routes]\nPATH=orders/:id\nMETHOD=GET\n").unwrap();
        let err = StoreValidator::validate(&store).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("HOST"));
        assert!(message.contains("must start with '/'"));
    }

    #[test]
    fn warns_when_variable_route_shadows_literal() {
        let store = parse_str(
            "[svc]\nHOST=localhost\nPORT=5000\n\n[svc.routes]\n\
             PATH=/orders/:id\nMETHOD=GET\nPATH=/orders/latest\nMETHOD=GET\n",
        )
        .unwrap();
        let warnings = StoreValidator::validate(&store).expect("legal, if suspicious");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("/orders/latest"));
    }

    #[test]
    fn no_warning_across_methods() {
        let store = parse_str(
            "[svc]\nHOST=localhost\nPORT=5000\n\n[svc.routes]\n\
             PATH=/orders/:id\nMETHOD=GET\nPATH=/orders/latest\nMETHOD=DELETE\n",
        )
        .unwrap();
        let warnings = StoreValidator::validate(&store).unwrap();
        assert!(warnings.is_empty());
    }
}
