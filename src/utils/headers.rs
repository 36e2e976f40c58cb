use http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Returns a new header map containing `existing` plus `additions`, with
/// additions replacing same-named originals. The input map is not mutated;
/// an absent input is treated as empty.
///
/// A name or value that is not representable as an HTTP header is skipped
/// with a warning rather than failing the request.
pub fn append_headers(existing: Option<&HeaderMap>, additions: &[(&str, &str)]) -> HeaderMap {
    let mut merged = existing.cloned().unwrap_or_default();

    for (name, value) in additions {
        let parsed_name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                warn!("skipping invalid header name '{}'", name);
                continue;
            }
        };
        let parsed_value = match HeaderValue::from_str(value) {
            Ok(v) => v,
            Err(_) => {
                warn!("skipping unrepresentable value for header '{}'", name);
                continue;
            }
        };
        merged.insert(parsed_name, parsed_value);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::append_headers;
    use http::header::HeaderMap;

    #[test]
    fn additions_override_originals() {
        let mut existing = HeaderMap::new();
        existing.insert("accept", "text/html".parse().unwrap());

        let merged = append_headers(Some(&existing), &[("Accept", "application/json")]);

        assert_eq!(merged.get("accept").unwrap(), "application/json");
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn input_is_not_mutated() {
        let mut existing = HeaderMap::new();
        existing.insert("accept", "text/html".parse().unwrap());

        let _ = append_headers(Some(&existing), &[("accept", "application/json")]);

        assert_eq!(existing.get("accept").unwrap(), "text/html");
    }

    #[test]
    fn absent_input_is_empty() {
        let merged = append_headers(None, &[("authorization", "Bearer abc")]);

        assert_eq!(merged.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn invalid_additions_are_skipped() {
        let merged = append_headers(None, &[("bad name", "x"), ("ok", "value")]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("ok").unwrap(), "value");
    }
}
