//! Minimal request-line parsing.
//!
//! The gateway interprets exactly one line of the inbound byte stream:
//! `METHOD SP PATH SP VERSION`. Headers and bodies are the business of the
//! external HTTP parser collaborator and are never touched here.
//!
//! The service a request addresses is carried as the first segment of the
//! request target: `GET /order-service/orders/42 HTTP/1.1` addresses
//! `order-service` with the service-relative path `/orders/42`.
use thiserror::Error;

/// Errors for request-line handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestLineError {
    /// The first line was not `METHOD SP PATH SP VERSION`.
    #[error("malformed request line: {0:?}")]
    Malformed(String),

    /// The request target carries no service segment (e.g. `GET / HTTP/1.1`).
    #[error("request target {0:?} carries no service name")]
    MissingService(String),

    /// No complete request line fit into the read buffer.
    #[error("request line exceeds {limit} bytes")]
    TooLong { limit: usize },
}

/// A parsed `METHOD SP PATH SP VERSION` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
    pub version: String,
}

/// Parse the first line of an exchange. The method token is kept exactly as
/// received; matching against routes is case-sensitive.
pub fn parse_request_line(line: &str) -> Result<RequestLine, RequestLineError> {
    let mut parts = line.split(' ');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None)
            if !method.is_empty() && !target.is_empty() && !version.is_empty() =>
        {
            Ok(RequestLine {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
            })
        }
        _ => Err(RequestLineError::Malformed(line.to_string())),
    }
}

/// Split a request target into `(service_name, service_relative_path)`.
///
/// The first non-empty segment names the service; the remainder is kept raw
/// (repeated slashes and all) because resolution normalizes for matching but
/// forwards the path as received. An empty remainder becomes `/`.
pub fn split_service_path(target: &str) -> Result<(String, String), RequestLineError> {
    if !target.starts_with('/') {
        return Err(RequestLineError::MissingService(target.to_string()));
    }

    let skipped = target.len() - target.trim_start_matches('/').len();
    let rest = &target[skipped..];
    if rest.is_empty() {
        return Err(RequestLineError::MissingService(target.to_string()));
    }

    let (service, remainder) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };

    let path = if remainder.is_empty() {
        "/".to_string()
    } else {
        remainder.to_string()
    };
    Ok((service.to_string(), path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_request_line() {
        let line = parse_request_line("GET /order-service/orders/42 HTTP/1.1").unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.target, "/order-service/orders/42");
        assert_eq!(line.version, "HTTP/1.1");
    }

    #[test]
    fn method_case_is_preserved() {
        let line = parse_request_line("get /svc/x HTTP/1.1").unwrap();
        assert_eq!(line.method, "get");
    }

    #[test]
    fn rejects_wrong_field_counts() {
        assert!(parse_request_line("GET /only-two").is_err());
        assert!(parse_request_line("GET /a b HTTP/1.1 extra").is_err());
        assert!(parse_request_line("").is_err());
        assert!(parse_request_line("GET  /double-space HTTP/1.1").is_err());
    }

    #[test]
    fn splits_service_from_path() {
        let (service, path) = split_service_path("/order-service/orders/42").unwrap();
        assert_eq!(service, "order-service");
        assert_eq!(path, "/orders/42");
    }

    #[test]
    fn bare_service_name_gets_root_path() {
        let (service, path) = split_service_path("/order-service").unwrap();
        assert_eq!(service, "order-service");
        assert_eq!(path, "/");
    }

    #[test]
    fn remainder_stays_raw() {
        let (service, path) = split_service_path("/order-service//orders//42").unwrap();
        assert_eq!(service, "order-service");
        assert_eq!(path, "//orders//42");
    }

    #[test]
    fn rejects_targets_without_a_service() {
        assert!(matches!(
            split_service_path("/"),
            Err(RequestLineError::MissingService(_))
        ));
        assert!(matches!(
            split_service_path("relative/path"),
            Err(RequestLineError::MissingService(_))
        ));
    }
}
