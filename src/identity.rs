//! Client identity extraction.
//!
//! Builds the `"<client-ip>:<username>"` identifiers the rate limiter keys on.
//! The client address comes from proxy headers, checked in a fixed order so
//! the same client resolves to the same address behind different proxies.

use std::collections::HashMap;

/// Address used when no proxy header names the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Proxy headers in order of preference, with whether the value is a list.
const CLIENT_IP_HEADERS: &[(&str, bool)] = &[
    ("x-forwarded-for", true),
    ("x-real-ip", false),
    ("cf-connecting-ip", false),
    ("x-vercel-forwarded-for", true),
];

/// Something headers can be looked up in.
pub trait HeaderSource {
    /// Value of the header named `name` (lowercase), if present and textual.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }
}

impl HeaderSource for tonic::metadata::MetadataMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Resolve the client address from proxy headers.
///
/// Returns [`UNKNOWN_CLIENT`] when none of the known headers carry a value.
pub fn client_ip<H: HeaderSource + ?Sized>(headers: &H) -> String {
    for (name, is_list) in CLIENT_IP_HEADERS {
        let Some(value) = headers.header(name) else {
            continue;
        };

        let first = if *is_list {
            value.split(',').next().unwrap_or_default()
        } else {
            value
        };
        let candidate = first.trim();

        if !candidate.is_empty() {
            return candidate.to_string();
        }
    }

    UNKNOWN_CLIENT.to_string()
}

/// Rate limit identifier for a login attempt.
pub fn login_identifier(client_ip: &str, username: &str) -> String {
    format!("{}:{}", client_ip, username)
}
