//! HTTP tracker client implementation with URL building and response parsing

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::protocol::{self, constants};
use super::transport::TrackerTransport;
use super::types::{AnnounceRequest, AnnounceResponse, ScrapeStats, TrackerFailure};
use crate::bencode::{self, Value};
use crate::peers::KnownPeer;
use crate::torrent::InfoHash;

/// Talks to one HTTP tracker URL.
///
/// Every request is bounded by `timeout`; an elapsed timeout counts as a
/// connection failure.
pub struct HttpTrackerClient {
    pub(super) announce_url: String,
    pub(super) scrape_url: Option<String>,
    transport: Arc<dyn TrackerTransport>,
    timeout: Duration,
}

impl HttpTrackerClient {
    /// Creates HTTP tracker client with automatic scrape URL derivation.
    pub fn new(
        announce_url: impl Into<String>,
        transport: Arc<dyn TrackerTransport>,
        timeout: Duration,
    ) -> Self {
        let announce_url = announce_url.into();
        let scrape_url = protocol::scrape_url_for(&announce_url);

        Self {
            announce_url,
            scrape_url,
            transport,
            timeout,
        }
    }

    /// Announces to this tracker.
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::ConnectionFailed` - Unreachable, timed out, or not an HTTP tracker
    /// - `TrackerFailure::Rejected` - Response carried a `failure reason`
    /// - `TrackerFailure::HttpStatus` - Non-2xx status without a failure reason
    /// - `TrackerFailure::InvalidResponse` - Body is not a valid announce response
    pub async fn announce(
        &self,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerFailure> {
        if !protocol::is_http_tracker(&self.announce_url) {
            tracing::warn!("Skipping non-HTTP tracker {}", self.announce_url);
            return Err(TrackerFailure::ConnectionFailed);
        }

        let url = self.build_announce_url(request);
        let body = self.fetch(&url).await?;
        let response = Self::parse_announce_response(&body)?;

        if let Some(warning) = &response.warning_message {
            tracing::warn!("Tracker {} warning: {}", self.announce_url, warning);
        }
        tracing::debug!(
            "Tracker {} returned {} peers, interval {}s, min interval {:?}, tracker id {:?}",
            self.announce_url,
            response.peers.len(),
            response.interval,
            response.min_interval,
            response.tracker_id
        );
        Ok(response)
    }

    /// Scrapes this tracker for one torrent.
    ///
    /// Returns `None` when the tracker answered but did not list the torrent.
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::ScrapeUnsupported` - No scrape URL derivable
    /// - Otherwise as [`HttpTrackerClient::announce`]
    pub async fn scrape(&self, info_hash: InfoHash) -> Result<Option<ScrapeStats>, TrackerFailure> {
        let url = self.build_scrape_url(info_hash)?;
        let body = self.fetch(&url).await?;
        Self::parse_scrape_response(&body, info_hash)
    }

    pub fn announce_url(&self) -> &str {
        &self.announce_url
    }

    /// Build announce URL with query parameters
    pub(super) fn build_announce_url(&self, request: &AnnounceRequest) -> String {
        let mut query = format!(
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact=1",
            urlencoding::encode_binary(request.info_hash.as_bytes()),
            urlencoding::encode_binary(request.peer_id.as_bytes()),
            request.port,
            request.uploaded,
            request.downloaded,
            request.left,
        );
        if let Some(event) = request.event.query_value() {
            query.push_str("&event=");
            query.push_str(event);
        }

        format!("{}{}{}", self.announce_url, query_separator(&self.announce_url), query)
    }

    /// Build scrape URL for a single torrent.
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::ScrapeUnsupported` - Announce URL does not follow the scrape convention
    pub(super) fn build_scrape_url(&self, info_hash: InfoHash) -> Result<String, TrackerFailure> {
        let scrape_url = self
            .scrape_url
            .as_ref()
            .ok_or(TrackerFailure::ScrapeUnsupported)?;

        Ok(format!(
            "{}{}info_hash={}",
            scrape_url,
            query_separator(scrape_url),
            urlencoding::encode_binary(info_hash.as_bytes())
        ))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, TrackerFailure> {
        tracing::debug!("GET {}", url);

        let response = match tokio::time::timeout(self.timeout, self.transport.get(url)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("Tracker {} unreachable: {}", self.announce_url, e);
                return Err(TrackerFailure::ConnectionFailed);
            }
            Err(_) => {
                tracing::warn!(
                    "Tracker {} timed out after {:?}",
                    self.announce_url,
                    self.timeout
                );
                return Err(TrackerFailure::ConnectionFailed);
            }
        };

        if !response.is_success() {
            tracing::warn!(
                "Tracker {} returned error status: {}",
                self.announce_url,
                response.status
            );
            // Trackers often send a bencoded failure reason with a 4xx status.
            return Err(failure_reason(&response.body)
                .map(TrackerFailure::Rejected)
                .unwrap_or(TrackerFailure::HttpStatus(response.status)));
        }

        Ok(response.body)
    }

    /// Parse compact IPv4 peer list
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::InvalidResponse` - Length not a multiple of 6 bytes
    pub(crate) fn parse_compact_peers(peer_bytes: &[u8]) -> Result<Vec<KnownPeer>, TrackerFailure> {
        if !peer_bytes.len().is_multiple_of(constants::COMPACT_PEER_SIZE) {
            return Err(TrackerFailure::InvalidResponse(
                "Invalid compact peer data length".to_string(),
            ));
        }

        Ok(peer_bytes
            .chunks_exact(constants::COMPACT_PEER_SIZE)
            .map(|chunk| {
                let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
                let port = u16::from_be_bytes([chunk[4], chunk[5]]);
                KnownPeer::new(IpAddr::V4(ip), port)
            })
            .collect())
    }

    /// Parse compact IPv6 peer list (`peers6`)
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::InvalidResponse` - Length not a multiple of 18 bytes
    pub(crate) fn parse_compact_peers6(
        peer_bytes: &[u8],
    ) -> Result<Vec<KnownPeer>, TrackerFailure> {
        if !peer_bytes.len().is_multiple_of(constants::COMPACT_PEER6_SIZE) {
            return Err(TrackerFailure::InvalidResponse(
                "Invalid compact IPv6 peer data length".to_string(),
            ));
        }

        Ok(peer_bytes
            .chunks_exact(constants::COMPACT_PEER6_SIZE)
            .map(|chunk| {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&chunk[..16]);
                let port = u16::from_be_bytes([chunk[16], chunk[17]]);
                KnownPeer::new(IpAddr::V6(Ipv6Addr::from(octets)), port)
            })
            .collect())
    }

    /// Parse the dictionary peer form. Entries without a literal IP address
    /// or a valid port are skipped.
    pub(crate) fn parse_peer_dicts(entries: &[Value]) -> Vec<KnownPeer> {
        entries
            .iter()
            .filter_map(|entry| {
                let ip = entry.get(b"ip")?.as_str()?.parse::<IpAddr>().ok()?;
                let port = u16::try_from(entry.get(b"port")?.as_integer()?).ok()?;
                let peer = KnownPeer::new(ip, port);
                let peer_id = entry
                    .get(b"peer id")
                    .and_then(Value::as_bytes)
                    .and_then(|id| <[u8; 20]>::try_from(id.as_ref()).ok());
                Some(match peer_id {
                    Some(id) => peer.with_peer_id(id),
                    None => peer,
                })
            })
            .collect()
    }

    /// Parse tracker response from bencode data
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::Rejected` - Response carried a `failure reason`
    /// - `TrackerFailure::InvalidResponse` - Not a dictionary, no interval, or malformed peers
    pub(crate) fn parse_announce_response(
        response_bytes: &[u8],
    ) -> Result<AnnounceResponse, TrackerFailure> {
        let dict = decode_dict(response_bytes)?;

        let interval = dict
            .get(b"interval")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                TrackerFailure::InvalidResponse("Missing interval in tracker response".to_string())
            })?;

        let mut peers = match dict.get(b"peers") {
            Some(Value::Bytes(compact)) => Self::parse_compact_peers(compact)?,
            Some(Value::List(entries)) => Self::parse_peer_dicts(entries),
            _ => Vec::new(),
        };
        if let Some(compact6) = dict.get(b"peers6").and_then(Value::as_bytes) {
            peers.extend(Self::parse_compact_peers6(compact6)?);
        }

        Ok(AnnounceResponse {
            interval,
            min_interval: dict.get(b"min interval").and_then(Value::as_u64),
            tracker_id: lossy_string(&dict, b"tracker id"),
            warning_message: lossy_string(&dict, b"warning message"),
            complete: dict.get(b"complete").and_then(Value::as_u64),
            incomplete: dict.get(b"incomplete").and_then(Value::as_u64),
            downloaded: dict.get(b"downloaded").and_then(Value::as_u64),
            peers,
        })
    }

    /// Parse tracker scrape response from bencode data
    ///
    /// # Errors
    ///
    /// - `TrackerFailure::Rejected` - Response carried a `failure reason`
    /// - `TrackerFailure::InvalidResponse` - Not a dictionary
    pub(crate) fn parse_scrape_response(
        response_bytes: &[u8],
        info_hash: InfoHash,
    ) -> Result<Option<ScrapeStats>, TrackerFailure> {
        let dict = decode_dict(response_bytes)?;

        let stats = dict
            .get(b"files")
            .and_then(|files| files.get(info_hash.as_bytes()))
            .map(|file| ScrapeStats {
                complete: file.get(b"complete").and_then(Value::as_u64),
                downloaded: file.get(b"downloaded").and_then(Value::as_u64),
                incomplete: file.get(b"incomplete").and_then(Value::as_u64),
            });
        Ok(stats)
    }
}

/// Decodes a response body into a dictionary, surfacing `failure reason`.
fn decode_dict(response_bytes: &[u8]) -> Result<Value, TrackerFailure> {
    let value = bencode::decode(response_bytes).map_err(|e| {
        TrackerFailure::InvalidResponse(format!("Failed to parse tracker response: {e}"))
    })?;

    if value.as_dict().is_none() {
        return Err(TrackerFailure::InvalidResponse(
            "Invalid tracker response format".to_string(),
        ));
    }
    if let Some(reason) = lossy_string(&value, b"failure reason") {
        return Err(TrackerFailure::Rejected(reason));
    }
    Ok(value)
}

fn failure_reason(body: &[u8]) -> Option<String> {
    bencode::decode(body)
        .ok()
        .and_then(|value| lossy_string(&value, b"failure reason"))
}

fn lossy_string(dict: &Value, key: &[u8]) -> Option<String> {
    dict.get(key)
        .and_then(Value::as_bytes)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

fn query_separator(url: &str) -> char {
    if url.contains('?') { '&' } else { '?' }
}
