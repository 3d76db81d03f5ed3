//! Request metadata extraction
//!
//! Everything here is a pure function of header values. Missing or malformed
//! headers degrade to `"unknown"` / `None`; nothing in this module fails.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use http::HeaderMap;

use crate::types::{DeviceClass, RequestContext};
use crate::UNKNOWN;

/// Proxy-supplied client address list, leftmost entry is the client
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Platform-supplied client address
pub const REAL_IP: &str = "x-real-ip";
pub const USER_AGENT: &str = "user-agent";
pub const ACCEPT_LANGUAGE: &str = "accept-language";
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Geolocation headers, first match wins (Vercel, then Cloudflare)
const COUNTRY_HEADERS: &[&str] = &["x-vercel-ip-country", "cf-ipcountry"];
const ASN_HEADERS: &[&str] = &["x-vercel-ip-asn", "cf-asn"];

/// Read-only access to request headers
///
/// Lets the extractor run against a live `HeaderMap` or a plain map in tests.
pub trait HeaderSource {
    /// Header value by case-insensitive name
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.to_str().ok())
    }
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the request context from headers
pub fn extract<H: HeaderSource + ?Sized>(headers: &H, received_at: DateTime<Utc>) -> RequestContext {
    let ip = resolve_ip(headers);
    let user_agent = non_empty(headers, USER_AGENT).unwrap_or(UNKNOWN).to_string();

    RequestContext {
        device_class: classify_device(&user_agent),
        subnet: derive_subnet(&ip),
        ip,
        user_agent,
        accept_language: owned(headers, ACCEPT_LANGUAGE),
        forwarded_proto: owned(headers, FORWARDED_PROTO),
        country: first_of(headers, COUNTRY_HEADERS),
        asn: first_of(headers, ASN_HEADERS),
        received_at,
    }
}

/// Client IP: first forwarded-for entry, then real-ip, then `"unknown"`
pub fn resolve_ip<H: HeaderSource + ?Sized>(headers: &H) -> String {
    let forwarded = headers
        .header(FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| non_empty(headers, REAL_IP))
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Classify the device family from a user agent
///
/// Priority order matters: Android user agents also contain "Linux".
pub fn classify_device(user_agent: &str) -> DeviceClass {
    const RULES: &[(&str, DeviceClass)] = &[
        ("android", DeviceClass::AndroidPhone),
        ("iphone", DeviceClass::IPhone),
        ("ipad", DeviceClass::IPad),
        ("windows", DeviceClass::WindowsDesktop),
        ("linux", DeviceClass::LinuxDesktop),
    ];

    let ua = user_agent.to_lowercase();
    RULES
        .iter()
        .find(|(needle, _)| ua.contains(needle))
        .map(|(_, class)| *class)
        .unwrap_or(DeviceClass::Unknown)
}

/// `/24` network of a dotted-quad IPv4 address, else `"unknown"`
pub fn derive_subnet(ip: &str) -> String {
    let octets: Option<Vec<u8>> = ip
        .trim()
        .split('.')
        .map(|o| {
            if !o.is_empty() && o.bytes().all(|b| b.is_ascii_digit()) {
                o.parse::<u8>().ok()
            } else {
                None
            }
        })
        .collect();

    match octets.as_deref() {
        Some([a, b, c, _]) => format!("{}.{}.{}.0/24", a, b, c),
        _ => UNKNOWN.to_string(),
    }
}

fn non_empty<'a, H: HeaderSource + ?Sized>(headers: &'a H, name: &str) -> Option<&'a str> {
    headers
        .header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn owned<H: HeaderSource + ?Sized>(headers: &H, name: &str) -> Option<String> {
    non_empty(headers, name).map(str::to_string)
}

fn first_of<H: HeaderSource + ?Sized>(headers: &H, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| owned(headers, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_ip_prefers_first_forwarded_entry() {
        let h = headers(&[
            ("X-Forwarded-For", " 203.0.113.42 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(resolve_ip(&h), "203.0.113.42");
    }

    #[test]
    fn test_ip_falls_back_to_real_ip() {
        let h = headers(&[("x-real-ip", "198.51.100.7")]);
        assert_eq!(resolve_ip(&h), "198.51.100.7");

        let empty_forwarded = headers(&[("x-forwarded-for", ""), ("x-real-ip", "198.51.100.7")]);
        assert_eq!(resolve_ip(&empty_forwarded), "198.51.100.7");
    }

    #[test]
    fn test_ip_unknown_without_headers() {
        assert_eq!(resolve_ip(&headers(&[])), "unknown");
    }

    #[test]
    fn test_subnet_derivation() {
        assert_eq!(derive_subnet("203.0.113.42"), "203.0.113.0/24");
        assert_eq!(derive_subnet("not-an-ip"), "unknown");
        assert_eq!(derive_subnet("unknown"), "unknown");
        assert_eq!(derive_subnet("1.2.3"), "unknown");
        assert_eq!(derive_subnet("1.2.3.4.5"), "unknown");
        assert_eq!(derive_subnet("256.1.1.1"), "unknown");
        assert_eq!(derive_subnet("2001:db8::1"), "unknown");
        assert_eq!(derive_subnet("1..3.4"), "unknown");
        assert_eq!(derive_subnet("01.002.3.4"), "1.2.3.0/24");
    }

    #[test]
    fn test_device_android_beats_linux() {
        let ua = "Mozilla/5.0 (Linux; ANDROID 14; Pixel 8) AppleWebKit/537.36";
        assert_eq!(classify_device(ua), DeviceClass::AndroidPhone);
    }

    #[test]
    fn test_device_classes() {
        assert_eq!(
            classify_device("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            DeviceClass::IPhone
        );
        assert_eq!(
            classify_device("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)"),
            DeviceClass::IPad
        );
        assert_eq!(
            classify_device("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            DeviceClass::WindowsDesktop
        );
        assert_eq!(
            classify_device("Mozilla/5.0 (X11; Linux x86_64)"),
            DeviceClass::LinuxDesktop
        );
        assert_eq!(
            classify_device("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"),
            DeviceClass::Unknown
        );
        assert_eq!(classify_device(""), DeviceClass::Unknown);
    }

    #[test]
    fn test_extract_full_context() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.42"),
            ("user-agent", "Mozilla/5.0 (Windows NT 10.0)"),
            ("accept-language", "en-US,en;q=0.9"),
            ("x-forwarded-proto", "https"),
            ("cf-ipcountry", "DE"),
            ("x-vercel-ip-asn", "3320"),
        ]);
        let now = Utc::now();
        let ctx = extract(&h, now);

        assert_eq!(ctx.ip, "203.0.113.42");
        assert_eq!(ctx.subnet, "203.0.113.0/24");
        assert_eq!(ctx.device_class, DeviceClass::WindowsDesktop);
        assert_eq!(ctx.accept_language.as_deref(), Some("en-US,en;q=0.9"));
        assert_eq!(ctx.forwarded_proto.as_deref(), Some("https"));
        assert_eq!(ctx.country.as_deref(), Some("DE"));
        assert_eq!(ctx.asn.as_deref(), Some("3320"));
        assert_eq!(ctx.received_at, now);
    }

    #[test]
    fn test_extract_without_headers_degrades_to_unknown() {
        let ctx = extract(&headers(&[]), Utc::now());
        assert_eq!(ctx.ip, "unknown");
        assert_eq!(ctx.user_agent, "unknown");
        assert_eq!(ctx.subnet, "unknown");
        assert_eq!(ctx.device_class, DeviceClass::Unknown);
        assert!(ctx.country.is_none());
        assert!(ctx.asn.is_none());
    }

    #[test]
    fn test_header_map_source() {
        let mut map = HeaderMap::new();
        map.insert("x-real-ip", "192.0.2.1".parse().unwrap());
        assert_eq!(HeaderSource::header(&map, "X-Real-IP"), Some("192.0.2.1"));
        assert_eq!(resolve_ip(&map), "192.0.2.1");
    }

    proptest! {
        #[test]
        fn ipv4_subnet_keeps_first_three_octets(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
            let ip = format!("{}.{}.{}.{}", a, b, c, d);
            prop_assert_eq!(derive_subnet(&ip), format!("{}.{}.{}.0/24", a, b, c));
        }

        #[test]
        fn android_always_wins(prefix in "[a-zA-Z ;/()]{0,30}", suffix in "[a-zA-Z ;/()]{0,30}") {
            let ua = format!("{}Linux; aNdRoId{}", prefix, suffix);
            prop_assert_eq!(classify_device(&ua), DeviceClass::AndroidPhone);
        }

        #[test]
        fn subnet_never_panics(input in ".{0,64}") {
            let _ = derive_subnet(&input);
        }
    }
}
