//! Announce tier lists (BEP 12 multi-tracker extension).

use rand::Rng;
use rand::seq::SliceRandom;

use crate::bencode::Value;

/// One candidate tracker in tier-then-position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSlot {
    /// Zero-based tier index
    pub tier: usize,
    /// Zero-based position within the tier
    pub position: usize,
    /// Announce URL
    pub url: String,
}

/// Ordered tiers of announce URLs.
///
/// Tier 0 is tried first; URLs inside a tier are tried left to right.
/// Reordering never moves a URL across a tier boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierList {
    tiers: Vec<Vec<String>>,
}

impl TierList {
    /// Builds a tier list, dropping empty tiers.
    pub fn new(tiers: Vec<Vec<String>>) -> Self {
        Self {
            tiers: tiers.into_iter().filter(|tier| !tier.is_empty()).collect(),
        }
    }

    pub fn tiers(&self) -> &[Vec<String>] {
        &self.tiers
    }

    pub fn into_inner(self) -> Vec<Vec<String>> {
        self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Randomly permutes each tier in place.
    pub fn shuffle_within_tiers<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for tier in &mut self.tiers {
            tier.shuffle(rng);
        }
    }

    /// Moves the URL at `position` to the front of `tier`, keeping the
    /// relative order of the others. Out-of-range slots are ignored.
    pub fn promote(&mut self, tier: usize, position: usize) {
        if let Some(urls) = self.tiers.get_mut(tier)
            && position < urls.len()
        {
            urls[..=position].rotate_right(1);
        }
    }

    /// Every (tier, position, url) in failover order.
    pub fn slots(&self) -> impl Iterator<Item = TrackerSlot> + '_ {
        self.tiers.iter().enumerate().flat_map(|(tier, urls)| {
            urls.iter()
                .enumerate()
                .map(move |(position, url)| TrackerSlot {
                    tier,
                    position,
                    url: url.clone(),
                })
        })
    }

    /// Distinct URLs across all tiers in failover order.
    pub fn unique_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tiers
            .iter()
            .flatten()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect()
    }

    /// Encodes as a bencode list of lists for persistence.
    pub fn to_value(&self) -> Value {
        Value::List(
            self.tiers
                .iter()
                .map(|urls| Value::List(urls.iter().map(|url| Value::string(url)).collect()))
                .collect(),
        )
    }

    /// Reads a list of lists of UTF-8 strings, skipping anything else.
    pub fn from_value(value: &Value) -> Option<Self> {
        let tiers = value
            .as_list()?
            .iter()
            .map(|tier| {
                tier.as_list()
                    .map(|urls| {
                        urls.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .collect();
        Some(Self::new(tiers))
    }
}

impl From<Vec<Vec<String>>> for TierList {
    fn from(tiers: Vec<Vec<String>>) -> Self {
        Self::new(tiers)
    }
}

impl From<&TierList> for Value {
    fn from(tiers: &TierList) -> Self {
        tiers.to_value()
    }
}
