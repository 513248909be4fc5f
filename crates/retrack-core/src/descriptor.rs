//! Request identity: the fields used to correlate a retry with its original
//! request.
//!
//! Correlation prefers the stamped id; structural equality over the
//! normalized identity tuple is the fallback for the first attempt, before
//! any stamp exists. Query parameters and headers live in sorted maps so
//! deep equality never depends on insertion order, and header names are
//! lowercased on the way in.

use http::Method;
use std::collections::BTreeMap;
use std::net::IpAddr;
use url::Url;

/// Connection-affinity state a host may bind to a single request (a proxy,
/// a local source address). A retry that still carries the binding of the
/// failed attempt can end up pinned to invalidated transport state, so the
/// tracker strips it when it merely restates the host default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportBinding {
    pub proxy: Option<Url>,
    pub local_address: Option<IpAddr>,
}

/// The identity of one logical request, plus the two tracker-owned stamps.
///
/// Hosts must carry `correlation_id` and `retry_count` across their own
/// request cloning so later attempts self-identify without structural
/// matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: Url,
    pub method: Method,
    pub body: Option<Vec<u8>>,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub transport: Option<TransportBinding>,
    /// Assigned by the tracker on first admission.
    pub correlation_id: Option<u64>,
    /// Attempts so far beyond the first; restamped on every re-admission.
    pub retry_count: u32,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            body: None,
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            transport: None,
            correlation_id: None,
            retry_count: 0,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Header names are normalized to lowercase.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_transport(mut self, binding: TransportBinding) -> Self {
        self.transport = Some(binding);
        self
    }

    /// Structural equality over {url, method, body, params, headers},
    /// ignoring the tracker stamps and the transport binding.
    pub fn same_request(&self, other: &Self) -> bool {
        self.url == other.url
            && self.method == other.method
            && self.body == other.body
            && self.params == other.params
            && self.headers == other.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn same_request_ignores_stamps() {
        let a = get("http://example.com/a");
        let mut b = a.clone();
        b.correlation_id = Some(7);
        b.retry_count = 2;
        assert!(a.same_request(&b));
    }

    #[test]
    fn same_request_is_insensitive_to_insertion_order() {
        let a = get("http://example.com/a")
            .with_param("x", "1")
            .with_param("y", "2")
            .with_header("Accept", "text/plain")
            .with_header("X-Tag", "t");
        let b = get("http://example.com/a")
            .with_header("x-tag", "t")
            .with_header("accept", "text/plain")
            .with_param("y", "2")
            .with_param("x", "1");
        assert!(a.same_request(&b));
    }

    #[test]
    fn same_request_distinguishes_identity_fields() {
        let base = get("http://example.com/a").with_param("x", "1");
        assert!(!base.same_request(&get("http://example.com/b").with_param("x", "1")));
        assert!(!base.same_request(&get("http://example.com/a")));
        assert!(!base.same_request(
            &RequestDescriptor::new(Method::PUT, Url::parse("http://example.com/a").unwrap())
                .with_param("x", "1")
        ));
        assert!(!base.same_request(&base.clone().with_body(b"payload".to_vec())));
    }

    #[test]
    fn transport_binding_does_not_affect_identity() {
        let a = get("http://example.com/a");
        let b = a.clone().with_transport(TransportBinding {
            proxy: Some(Url::parse("http://proxy.local:3128").unwrap()),
            local_address: None,
        });
        assert!(a.same_request(&b));
    }
}
