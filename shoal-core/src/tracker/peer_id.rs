//! Client peer id.
//!
//! Layout (20 bytes): 8-byte client prefix such as `-SH0001-`, the first 6
//! hex characters of SHA-1 of the install seed, then 6 random `[0-9a-zA-Z]`
//! characters chosen once per client instance.

use std::fmt;

use rand::Rng;
use rand::distr::{Alphanumeric, Distribution};
use sha1::{Digest, Sha1};

const PREFIX_LEN: usize = 8;
const SEED_LEN: usize = 6;

/// 20-byte identifier this client announces with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    /// Creates peer ID from 20-byte array.
    pub fn new(id: [u8; 20]) -> Self {
        Self(id)
    }

    /// Returns peer ID as byte array reference.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Builds a peer id with a fresh random suffix from the thread RNG.
    pub fn generate(prefix: &str, install_seed: &str) -> Self {
        Self::generate_with(prefix, install_seed, &mut rand::rng())
    }

    /// Builds a peer id drawing the random suffix from `rng`.
    ///
    /// Prefixes shorter than 8 bytes are padded with `-`, longer ones cut.
    pub fn generate_with<R: Rng + ?Sized>(prefix: &str, install_seed: &str, rng: &mut R) -> Self {
        let mut id = [b'-'; 20];

        let prefix = prefix.as_bytes();
        let prefix_len = prefix.len().min(PREFIX_LEN);
        id[..prefix_len].copy_from_slice(&prefix[..prefix_len]);

        let seed_hex = hex::encode(Sha1::digest(install_seed.as_bytes()));
        id[PREFIX_LEN..PREFIX_LEN + SEED_LEN].copy_from_slice(&seed_hex.as_bytes()[..SEED_LEN]);

        for byte in &mut id[PREFIX_LEN + SEED_LEN..] {
            *byte = Alphanumeric.sample(rng);
        }
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}
