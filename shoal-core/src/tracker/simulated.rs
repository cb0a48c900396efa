//! Scripted tracker transport for deterministic tests.
//!
//! Replies are queued per tracker URL and consumed in order; the last reply
//! of a queue repeats forever. URLs without a script behave like unreachable
//! hosts. Every requested URL is recorded.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::transport::{HttpResponse, TrackerTransport, TransportError};
use crate::bencode::{self, Value};
use crate::storage::record::key;
use crate::torrent::InfoHash;

/// One scripted outcome of a GET.
#[derive(Debug, Clone)]
pub enum SimulatedReply {
    /// HTTP response with status and body
    Status(u16, Bytes),
    /// Connect error before any response
    ConnectionFailure,
    /// Waits, then behaves like the inner reply
    Delayed(Duration, Box<SimulatedReply>),
}

impl SimulatedReply {
    /// `200 OK` with an arbitrary body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::Status(200, body.into())
    }

    /// Successful announce carrying only an interval.
    pub fn interval(interval: i64) -> Self {
        Self::announce(interval, &[])
    }

    /// Successful announce with a compact IPv4 peer list. IPv6 addresses go
    /// to `peers6`.
    pub fn announce(interval: i64, peers: &[SocketAddr]) -> Self {
        let mut compact = Vec::new();
        let mut compact6 = Vec::new();
        for peer in peers {
            match peer {
                SocketAddr::V4(addr) => {
                    compact.extend_from_slice(&addr.ip().octets());
                    compact.extend_from_slice(&addr.port().to_be_bytes());
                }
                SocketAddr::V6(addr) => {
                    compact6.extend_from_slice(&addr.ip().octets());
                    compact6.extend_from_slice(&addr.port().to_be_bytes());
                }
            }
        }

        let mut fields = BTreeMap::new();
        fields.insert(key("interval"), Value::Integer(interval));
        fields.insert(key("peers"), Value::Bytes(Bytes::from(compact)));
        if !compact6.is_empty() {
            fields.insert(key("peers6"), Value::Bytes(Bytes::from(compact6)));
        }
        Self::ok(bencode::encode(&Value::Dict(fields)))
    }

    /// Successful announce with swarm counters.
    pub fn announce_with_counts(interval: i64, complete: i64, incomplete: i64) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(key("interval"), Value::Integer(interval));
        fields.insert(key("complete"), Value::Integer(complete));
        fields.insert(key("incomplete"), Value::Integer(incomplete));
        fields.insert(key("peers"), Value::Bytes(Bytes::new()));
        Self::ok(bencode::encode(&Value::Dict(fields)))
    }

    /// `200 OK` whose body is a tracker `failure reason`.
    pub fn failure(reason: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(key("failure reason"), Value::string(reason));
        Self::ok(bencode::encode(&Value::Dict(fields)))
    }

    /// Scrape response listing one torrent.
    pub fn scrape(info_hash: InfoHash, complete: i64, downloaded: i64, incomplete: i64) -> Self {
        let mut file = BTreeMap::new();
        file.insert(key("complete"), Value::Integer(complete));
        file.insert(key("downloaded"), Value::Integer(downloaded));
        file.insert(key("incomplete"), Value::Integer(incomplete));

        let mut files = BTreeMap::new();
        files.insert(
            Bytes::copy_from_slice(info_hash.as_bytes()),
            Value::Dict(file),
        );

        let mut fields = BTreeMap::new();
        fields.insert(key("files"), Value::Dict(files));
        Self::ok(bencode::encode(&Value::Dict(fields)))
    }
}

/// In-memory [`TrackerTransport`] driven by per-URL reply scripts.
#[derive(Default)]
pub struct SimulatedTransport {
    scripts: Mutex<HashMap<String, VecDeque<SimulatedReply>>>,
    requests: Mutex<Vec<String>>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply to the script of `url` (announce or scrape URL,
    /// without the generated query).
    pub fn push(&self, url: &str, reply: SimulatedReply) {
        self.scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every URL requested so far, query included, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Requests whose URL starts with `base`.
    pub fn requests_to(&self, base: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|url| script_matches(base, url))
            .count()
    }

    fn next_reply(&self, url: &str) -> SimulatedReply {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .iter_mut()
            .filter(|(base, _)| script_matches(base, url))
            .max_by_key(|(base, _)| base.len())
            .map(|(_, script)| script);

        match script {
            Some(script) if script.len() > 1 => script
                .pop_front()
                .unwrap_or(SimulatedReply::ConnectionFailure),
            Some(script) => script
                .front()
                .cloned()
                .unwrap_or(SimulatedReply::ConnectionFailure),
            None => SimulatedReply::ConnectionFailure,
        }
    }
}

fn script_matches(base: &str, url: &str) -> bool {
    url.strip_prefix(base)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('?') || rest.starts_with('&'))
}

#[async_trait]
impl TrackerTransport for SimulatedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(url.to_string());

        let mut reply = self.next_reply(url);
        loop {
            match reply {
                SimulatedReply::Status(status, body) => {
                    return Ok(HttpResponse { status, body });
                }
                SimulatedReply::ConnectionFailure => {
                    return Err(TransportError::Connection {
                        url: url.to_string(),
                        reason: "simulated connection failure".to_string(),
                    });
                }
                SimulatedReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_sticky_last_reply() {
        let transport = SimulatedTransport::new();
        let url = "http://a.example/announce";
        transport.push(url, SimulatedReply::ConnectionFailure);
        transport.push(url, SimulatedReply::interval(10));

        assert!(transport.get(&format!("{url}?x=1")).await.is_err());
        assert!(transport.get(&format!("{url}?x=2")).await.is_ok());
        assert!(transport.get(&format!("{url}?x=3")).await.is_ok());
        assert_eq!(transport.requests_to(url), 3);
    }

    #[tokio::test]
    async fn test_unscripted_url_is_unreachable() {
        let transport = SimulatedTransport::new();
        transport.push("http://a.example/announce", SimulatedReply::interval(10));

        let result = transport.get("http://a.example/announce2?x=1").await;
        assert!(matches!(result, Err(TransportError::Connection { .. })));
        assert_eq!(transport.requests(), vec!["http://a.example/announce2?x=1"]);
    }

    #[tokio::test]
    async fn test_reply_bodies_decode() {
        let SimulatedReply::Status(200, body) = SimulatedReply::failure("nope") else {
            panic!("expected 200 reply");
        };
        let value = bencode::decode(&body).unwrap();
        assert_eq!(value.get(b"failure reason").and_then(Value::as_str), Some("nope"));

        let peer: SocketAddr = "127.0.0.1:6881".parse().unwrap();
        let SimulatedReply::Status(_, body) = SimulatedReply::announce(30, &[peer]) else {
            panic!("expected status reply");
        };
        let value = bencode::decode(&body).unwrap();
        assert_eq!(value.get(b"interval").and_then(Value::as_integer), Some(30));
        assert_eq!(
            value.get(b"peers").and_then(Value::as_bytes).map(|b| b.len()),
            Some(6)
        );
    }
}
