//! Logical endpoint resolution.
//!
//! Turns `logical:<name>` references into the named endpoint's physical URI
//! with the role's options appended as query parameters.

use std::collections::BTreeMap;

use hodos_core::uri::{self, Marker};
use hodos_core::{Endpoint, PolicyGroupSnapshot};

use crate::error::{GeneratorError, Result};

/// A logical reference resolved against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// The endpoint the reference named.
    pub endpoint: &'a Endpoint,
    /// Physical URI with role options applied.
    pub uri: String,
}

/// Resolves the `uri` found on a marker element.
///
/// Returns `Ok(None)` if `uri` is not a logical reference; the caller leaves
/// such elements untouched. The marker tag name selects the option role:
/// `from` uses consumer options, `to` and `inOnly` use producer options.
///
/// Errors carry an empty policy name; the generator fills it in.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidMarker`] if `marker` is not a marker tag
/// name, or [`GeneratorError::UnknownEndpoint`] if the snapshot has no
/// endpoint with the referenced name.
///
/// # Examples
///
/// ```rust
/// use hodos_core::{Endpoint, PolicyGroup, PolicyGroupSnapshot};
/// use hodos_generator::endpoint::resolve;
///
/// let snapshot = PolicyGroupSnapshot::new(PolicyGroup::new("g").with_endpoint(
///     Endpoint::new("q", "jms:queue:q")
///         .with_consumer_option("b", "2")
///         .with_consumer_option("a", "1"),
/// ));
///
/// let resolved = resolve(&snapshot, "from", "logical:q").unwrap().unwrap();
/// assert_eq!(resolved.uri, "jms:queue:q?a=1&b=2");
/// assert!(resolve(&snapshot, "from", "direct:x").unwrap().is_none());
/// ```
pub fn resolve<'a>(
    snapshot: &'a PolicyGroupSnapshot,
    marker: &str,
    uri: &str,
) -> Result<Option<Resolution<'a>>> {
    let marker = Marker::from_tag_name(marker).ok_or_else(|| GeneratorError::InvalidMarker {
        policy: String::new(),
        element: marker.to_string(),
    })?;

    let Some(name) = uri::endpoint_name(uri) else {
        return Ok(None);
    };

    let endpoint = snapshot
        .endpoint(name)
        .ok_or_else(|| GeneratorError::UnknownEndpoint {
            policy: String::new(),
            endpoint: name.to_string(),
        })?;

    Ok(Some(Resolution {
        endpoint,
        uri: append_options(&endpoint.uri, endpoint.options(marker.role())),
    }))
}

/// Appends options to a URI as query parameters in key order.
///
/// The first parameter is introduced with `?` unless the URI already has a
/// query, in which case every parameter is joined with `&`.
#[must_use]
pub fn append_options(uri: &str, options: &BTreeMap<String, String>) -> String {
    let mut out = String::from(uri);
    let mut separator = if uri.contains('?') { '&' } else { '?' };
    for (key, value) in options {
        out.push(separator);
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        separator = '&';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hodos_core::PolicyGroup;
    use proptest::prelude::*;

    fn snapshot(uri: &str) -> PolicyGroupSnapshot {
        PolicyGroupSnapshot::new(
            PolicyGroup::new("g").with_endpoint(
                Endpoint::new("q", uri)
                    .with_consumer_option("b", "2")
                    .with_consumer_option("a", "1")
                    .with_producer_option("p", "x"),
            ),
        )
    }

    #[test]
    fn test_consumer_options_sorted() {
        let snapshot = snapshot("U");
        let resolved = resolve(&snapshot, "from", "logical:q").unwrap().unwrap();
        assert_eq!(resolved.uri, "U?a=1&b=2");
        assert_eq!(resolved.endpoint.name, "q");
    }

    #[test]
    fn test_existing_query_uses_ampersand() {
        let snapshot = snapshot("U?z=9");
        let resolved = resolve(&snapshot, "from", "logical:q").unwrap().unwrap();
        assert_eq!(resolved.uri, "U?z=9&a=1&b=2");
    }

    #[test]
    fn test_producer_markers_use_producer_options() {
        let snapshot = snapshot("direct:out");
        for marker in ["to", "inOnly"] {
            let resolved = resolve(&snapshot, marker, "logical:q?ignored=1")
                .unwrap()
                .unwrap();
            assert_eq!(resolved.uri, "direct:out?p=x");
        }
    }

    #[test]
    fn test_physical_uri_untouched() {
        let snapshot = snapshot("U");
        assert!(resolve(&snapshot, "to", "direct:other").unwrap().is_none());
    }

    #[test]
    fn test_unknown_endpoint() {
        let snapshot = snapshot("U");
        assert!(matches!(
            resolve(&snapshot, "to", "logical:missing"),
            Err(GeneratorError::UnknownEndpoint { endpoint, .. }) if endpoint == "missing"
        ));
    }

    #[test]
    fn test_invalid_marker() {
        let snapshot = snapshot("U");
        assert!(matches!(
            resolve(&snapshot, "log", "logical:q"),
            Err(GeneratorError::InvalidMarker { element, .. }) if element == "log"
        ));
    }

    #[test]
    fn test_no_options_leaves_uri() {
        assert_eq!(append_options("direct:a", &BTreeMap::new()), "direct:a");
    }

    proptest! {
        #[test]
        fn appended_keys_are_sorted(
            options in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{1,4}", 1..8),
            has_query in any::<bool>(),
        ) {
            let base = if has_query { "U?z=9" } else { "U" };
            let uri = append_options(base, &options);
            let query = &uri[2..];
            let keys: Vec<&str> = query
                .split('&')
                .filter_map(|pair| pair.split_once('=').map(|(k, _)| k))
                .skip(usize::from(has_query))
                .collect();
            let expected: Vec<&str> = options.keys().map(String::as_str).collect();
            prop_assert_eq!(keys, expected);
            prop_assert_eq!(uri.matches('?').count(), 1);
        }
    }
}
