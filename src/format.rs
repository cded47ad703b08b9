//! Single-line, human-readable renderings of captured traffic.

use crate::types::{RequestSnapshot, ResponseSnapshot};

/// Render a request as `{scheme} {host}{path} {query} {body}`.
///
/// An absent query string renders as nothing, so the separating spaces remain.
///
/// ```rust
/// use bodylog::format::format_request;
/// use bodylog::types::RequestSnapshot;
///
/// let snapshot = RequestSnapshot {
///     scheme: "http".into(),
///     host: "host".into(),
///     path: "/foo".into(),
///     query: "?x=1".into(),
///     body: String::new(),
/// };
/// assert_eq!(format_request(&snapshot), "http host/foo ?x=1 ");
/// ```
pub fn format_request(snapshot: &RequestSnapshot) -> String {
    format!(
        "{} {}{} {} {}",
        snapshot.scheme, snapshot.host, snapshot.path, snapshot.query, snapshot.body
    )
}

/// Render a response as `Response {body}`.
pub fn format_response(snapshot: &ResponseSnapshot) -> String {
    format!("Response {}", snapshot.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str, body: &str) -> RequestSnapshot {
        RequestSnapshot {
            scheme: "http".into(),
            host: "localhost:3000".into(),
            path: "/echo".into(),
            query: query.into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_request_line() {
        assert_eq!(
            format_request(&request("?name=ferris", r#"{"a":1}"#)),
            r#"http localhost:3000/echo ?name=ferris {"a":1}"#
        );
    }

    #[test]
    fn test_request_line_without_query() {
        assert_eq!(
            format_request(&request("", "hello")),
            "http localhost:3000/echo  hello"
        );
    }

    #[test]
    fn test_response_line() {
        let snapshot = ResponseSnapshot {
            body: "ok".into(),
        };
        assert_eq!(format_response(&snapshot), "Response ok");

        let empty = ResponseSnapshot {
            body: String::new(),
        };
        assert_eq!(format_response(&empty), "Response ");
    }
}
