//! BitTorrent tracker protocol utilities and constants

/// BitTorrent tracker protocol constants
pub mod constants {
    /// Compact IPv4 peer entry (4-byte address, 2-byte port)
    pub const COMPACT_PEER_SIZE: usize = 6;

    /// Compact IPv6 peer entry (16-byte address, 2-byte port)
    pub const COMPACT_PEER6_SIZE: usize = 18;

    /// Reason recorded when the tracker cannot be reached
    pub const CONNECTION_FAILED: &str = "Connection failed";
}

/// Whether the URL uses a scheme the HTTP tracker client can speak.
pub fn is_http_tracker(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

/// Derives the scrape URL from an announce URL.
///
/// The last path segment must start with `announce`; that prefix becomes
/// `scrape` and anything after it (`.php`, a passkey suffix, the query) is
/// kept. Returns `None` for URLs that do not follow the convention or are not
/// HTTP(S).
pub fn scrape_url_for(announce_url: &str) -> Option<String> {
    let mut parsed = url::Url::parse(announce_url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let path = parsed.path().to_string();
    let split = path.rfind('/')?;
    let (dir, last) = path.split_at(split + 1);
    let suffix = last.strip_prefix("announce")?;

    parsed.set_path(&format!("{dir}scrape{suffix}"));
    Some(parsed.into())
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_scrape_url_conversion() {
        let cases = [
            ("http://example.com/announce", Some("http://example.com/scrape")),
            ("http://example.com/x/announce", Some("http://example.com/x/scrape")),
            ("http://example.com/announce.php", Some("http://example.com/scrape.php")),
            (
                "http://example.com/announce?x2%0644",
                Some("http://example.com/scrape?x2%0644"),
            ),
            ("https://example.com:8443/announce", Some("https://example.com:8443/scrape")),
            ("http://example.com/a", None),
            ("http://example.com/announce?x=2/4", Some("http://example.com/scrape?x=2/4")),
            ("http://example.com/x%064announce", None),
            ("http://example.com/announce/x", None),
            ("udp://tracker.example.com:80/announce", None),
            ("not a url", None),
        ];

        for (announce, expected) in cases {
            assert_eq!(
                scrape_url_for(announce).as_deref(),
                expected,
                "announce url {announce}"
            );
        }
    }

    #[test]
    fn test_http_tracker_detection() {
        assert!(is_http_tracker("http://tracker.example/announce"));
        assert!(is_http_tracker("https://tracker.example/announce"));
        assert!(!is_http_tracker("udp://62.138.0.158:6969/announce"));
        assert!(!is_http_tracker("garbage"));
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(constants::COMPACT_PEER_SIZE, 6);
        assert_eq!(constants::COMPACT_PEER6_SIZE, 18);
        assert_eq!(constants::CONNECTION_FAILED, "Connection failed");
    }
}
