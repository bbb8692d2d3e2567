//! Candidate selection and recency ordering
//!
//! Each cycle considers only the first `max_broadcast_posts` items of a
//! report, in source order. Of those, items without an age descriptor are
//! dropped (they cannot be ranked) and the rest are ordered freshest-first
//! by parsing the descriptor:
//!
//! 1. by unit: second < minute < hour < day < week < month < year
//! 2. within a unit, by ascending magnitude ("2 hours ago" before "5 hours ago")
//!
//! Descriptors that cannot be read sort after every readable one. The sort
//! is stable, so ties keep their source order.
//!
//! Entries sharing a source link share a fingerprint; only the first one in
//! source order becomes a candidate.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::fingerprint::Fingerprint;
use crate::item::{FeedReport, Item};

/// An item eligible for broadcast this cycle, with its fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub item: Item,
    pub fingerprint: Fingerprint,
}

impl Candidate {
    pub fn new(item: Item) -> Self {
        let fingerprint = Fingerprint::of(&item);
        Self { item, fingerprint }
    }
}

/// Unit of an age descriptor, in increasing order of staleness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl AgeUnit {
    fn parse(word: &str) -> Option<Self> {
        let word = word.to_ascii_lowercase();
        let singular = word.strip_suffix('s').unwrap_or(&word);
        match singular {
            "sec" | "second" => Some(Self::Second),
            "min" | "minute" => Some(Self::Minute),
            "hour" | "hr" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

/// Sort key derived from an age descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyKey {
    /// Descriptor read as `<magnitude> <unit> ...`
    Known { unit: AgeUnit, magnitude: u64 },
    /// Descriptor present but unreadable
    Unknown,
}

impl RecencyKey {
    /// Parse a descriptor such as "10 minutes ago" or "an hour ago"
    pub fn parse(descriptor: &str) -> Self {
        let mut words = descriptor.split_whitespace();
        let magnitude = match words.next() {
            Some(w) if w.eq_ignore_ascii_case("a") || w.eq_ignore_ascii_case("an") => Some(1),
            Some(w) => w.parse::<u64>().ok(),
            None => None,
        };
        let unit = words.next().and_then(AgeUnit::parse);

        match (magnitude, unit) {
            (Some(magnitude), Some(unit)) => Self::Known { unit, magnitude },
            _ => Self::Unknown,
        }
    }
}

impl Ord for RecencyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Known { unit: a, magnitude: m },
                Self::Known { unit: b, magnitude: n },
            ) => a.cmp(b).then(m.cmp(n)),
            (Self::Known { .. }, Self::Unknown) => Ordering::Less,
            (Self::Unknown, Self::Known { .. }) => Ordering::Greater,
            (Self::Unknown, Self::Unknown) => Ordering::Equal,
        }
    }
}

impl PartialOrd for RecencyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Select and order this cycle's candidates from a report
///
/// # Parameters
///
/// - `report`: The fetched report, in source order
/// - `max_broadcast_posts`: How many leading items to consider
///
/// # Returns
///
/// Candidates ordered freshest-first, with fingerprints precomputed and
/// unique within the cycle
pub fn select_candidates(report: &FeedReport, max_broadcast_posts: usize) -> Arc<[Candidate]> {
    let mut seen: HashSet<Fingerprint> = HashSet::new();
    let mut ranked: Vec<(RecencyKey, Candidate)> = report
        .items()
        .iter()
        .take(max_broadcast_posts)
        .filter_map(|item| {
            let key = RecencyKey::parse(item.age()?);
            let candidate = Candidate::new(item.clone());
            seen.insert(candidate.fingerprint.clone()).then_some((key, candidate))
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| a.cmp(b));
    ranked.into_iter().map(|(_, candidate)| candidate).collect()
}
