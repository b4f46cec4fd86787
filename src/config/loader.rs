//! Loader for the line-oriented gateway configuration format.
//!
//! The format, by example:
//!
//! ```text
//! # gateway-level settings come before any section
//! GATEWAY_PORT=8080
//!
//! [order-service]
//! HOST=127.0.0.1
//! PORT=5002
//! DEFAULT-EXPOSURE=PUBLIC
//! DEFAULT-AUTH=false
//!
//! [order-service.routes]
//! EXPOSURE=PRIVATE
//! AUTH=true
//! PATH=/orders/:id
//! METHOD=GET
//! ```
//!
//! Rules the decoder follows:
//! * Blank lines and lines starting with `#` are ignored.
//! * `[name]` opens a service section, unless `name` contains `.routes`,
//!   in which case it opens the route section of the currently open service.
//! * A route is committed the moment both `PATH` and `METHOD` have been set,
//!   and the in-progress route resets. `EXPOSURE`/`AUTH` lines therefore only
//!   apply when they appear before whichever of `PATH`/`METHOD` arrives last;
//!   a route committed without them inherits the service defaults.
//! * Unrecognized keys and lines without `=` are silently ignored.
//! * A service whose `PORT` is missing, non-numeric or zero is excluded from
//!   the store with a warning; the rest of the load proceeds.
use std::{collections::HashMap, fs, io, path::Path};

use thiserror::Error;

use crate::config::models::{ConfigStore, Exposure, GatewaySettings, RouteRule, ServiceConfig};

/// Errors that abort a configuration load.
///
/// Per-service problems (bad `PORT`, unknown exposure token) do not abort:
/// they degrade to warnings and exclusion of the offending piece.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The source file could not be read at all.
    #[error("failed to read config file {path:?}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// `GATEWAY_PORT` was present but not a positive integer.
    #[error("invalid GATEWAY_PORT value: {value:?} (expected a positive integer)")]
    InvalidGatewayPort { value: String },

    /// `IDLE-TIMEOUT` was present but not a parseable duration.
    #[error("invalid IDLE-TIMEOUT value: {value:?}")]
    InvalidIdleTimeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and decode a configuration file from disk.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<ConfigStore> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&text)
}

/// Decode configuration text into an immutable [`ConfigStore`].
pub fn parse_str(text: &str) -> ConfigResult<ConfigStore> {
    let mut gateway = GatewaySettings::default();
    let mut services: HashMap<String, ServiceConfig> = HashMap::new();

    let mut current: Option<ServiceDraft> = None;
    let mut route = RouteDraft::default();
    let mut in_route_section = false;
    let mut seen_section = false;

    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(section) = extract_section(line) {
            seen_section = true;
            if section.contains(".routes") {
                if current.is_none() {
                    tracing::warn!(section, "route section without an open service; ignoring");
                }
                in_route_section = true;
            } else {
                if let Some(draft) = current.take() {
                    draft.commit(&mut services);
                }
                in_route_section = false;
                route = RouteDraft::default();
                current = Some(ServiceDraft::named(section));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        if !seen_section {
            apply_gateway_key(&mut gateway, key, value)?;
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if in_route_section {
            match key {
                "PATH" => route.path = Some(value.to_string()),
                "METHOD" => route.method = Some(value.to_string()),
                "EXPOSURE" => match value.parse::<Exposure>() {
                    Ok(exposure) => route.exposure = Some(exposure),
                    Err(err) => tracing::warn!(service = %draft.name, %err, "ignoring route EXPOSURE line"),
                },
                "AUTH" => route.auth_required = Some(parse_bool(value)),
                _ => {}
            }

            // Commit as soon as both identifying fields exist; later
            // EXPOSURE/AUTH lines start a new in-progress route.
            if route.path.is_some() && route.method.is_some() {
                let finished = std::mem::take(&mut route);
                draft.upsert_route(finished);
            }
        } else {
            match key {
                "HOST" => draft.host = value.to_string(),
                "PORT" => match parse_positive_port(value) {
                    Ok(port) => draft.port = Some(port),
                    Err(()) => {
                        tracing::warn!(service = %draft.name, value, "invalid PORT value");
                        draft.port = None;
                        draft.port_invalid = true;
                    }
                },
                "DEFAULT-EXPOSURE" => match value.parse::<Exposure>() {
                    Ok(exposure) => draft.default_exposure = exposure,
                    Err(err) => tracing::warn!(service = %draft.name, %err, "ignoring DEFAULT-EXPOSURE line"),
                },
                "DEFAULT-AUTH" => draft.default_auth_required = parse_bool(value),
                _ => {}
            }
        }
    }

    if let Some(draft) = current.take() {
        draft.commit(&mut services);
    }

    tracing::debug!(services = services.len(), "configuration decoded");
    Ok(ConfigStore::new(gateway, services))
}

/// `[name]` section header, or `None` for any other line shape.
fn extract_section(line: &str) -> Option<&str> {
    if line.len() < 3 {
        return None;
    }
    if line.starts_with('[') && line.ends_with(']') {
        Some(&line[1..line.len() - 1])
    } else {
        None
    }
}

/// Boolean rule shared by `DEFAULT-AUTH`, `AUTH` and `KEEP-ALIVE`:
/// `TRUE`/`true` mean true, anything else means false.
fn parse_bool(value: &str) -> bool {
    value == "TRUE" || value == "true"
}

fn parse_positive_port(value: &str) -> Result<u16, ()> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(()),
    }
}

fn apply_gateway_key(gateway: &mut GatewaySettings, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "GATEWAY_PORT" => {
            gateway.port = Some(parse_positive_port(value).map_err(|()| {
                ConfigError::InvalidGatewayPort {
                    value: value.to_string(),
                }
            })?);
        }
        "GATEWAY_HOST" => gateway.host = value.to_string(),
        "KEEP-ALIVE" => gateway.keep_alive = parse_bool(value),
        "IDLE-TIMEOUT" => {
            gateway.idle_timeout =
                Some(
                    humantime::parse_duration(value).map_err(|source| {
                        ConfigError::InvalidIdleTimeout {
                            value: value.to_string(),
                            source,
                        }
                    })?,
                );
        }
        _ => {}
    }
    Ok(())
}

/// A service being accumulated while its section is open.
struct ServiceDraft {
    name: String,
    host: String,
    port: Option<u16>,
    port_invalid: bool,
    default_exposure: Exposure,
    default_auth_required: bool,
    routes: Vec<RouteRule>,
}

impl ServiceDraft {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: String::new(),
            port: None,
            port_invalid: false,
            default_exposure: Exposure::default(),
            default_auth_required: false,
            routes: Vec::new(),
        }
    }

    fn upsert_route(&mut self, draft: RouteDraft) {
        let rule = RouteRule {
            // Both are guaranteed set by the commit condition.
            path_pattern: draft.path.unwrap_or_default(),
            method: draft.method.unwrap_or_default(),
            exposure: draft.exposure.unwrap_or(self.default_exposure),
            auth_required: draft.auth_required.unwrap_or(self.default_auth_required),
        };
        match self
            .routes
            .iter_mut()
            .find(|r| r.path_pattern == rule.path_pattern && r.method == rule.method)
        {
            Some(existing) => *existing = rule,
            None => self.routes.push(rule),
        }
    }

    /// Finish the draft: a service without a valid positive port never makes
    /// it into the store.
    fn commit(self, services: &mut HashMap<String, ServiceConfig>) {
        let Some(port) = self.port else {
            tracing::warn!(
                service = %self.name,
                invalid = self.port_invalid,
                "service has no valid PORT; excluding it from the store"
            );
            return;
        };
        let service = ServiceConfig {
            name: self.name.clone(),
            host: self.host,
            port,
            default_exposure: self.default_exposure,
            default_auth_required: self.default_auth_required,
            routes: self.routes,
        };
        if services.insert(self.name.clone(), service).is_some() {
            tracing::warn!(service = %self.name, "duplicate service section; later definition wins");
        }
    }
}

/// A route being accumulated inside a `.routes` section.
#[derive(Default)]
struct RouteDraft {
    path: Option<String>,
    method: Option<String>,
    exposure: Option<Exposure>,
    auth_required: Option<bool>,
}
