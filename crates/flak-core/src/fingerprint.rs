//! Content addressing for feed items
//!
//! A [`Fingerprint`] is derived only from an item's source link, never from
//! its title (titles are truncated and not unique). The digest is unsalted so
//! the same link yields the same fingerprint in every process, which is what
//! lets delivery history be read back from a destination after a restart.
//!
//! Encoding: the first 16 bytes of SHA-256 over the UTF-8 link, as lowercase
//! hex. That is 32 characters, well inside message footer limits.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::item::Item;

/// Number of digest bytes kept
const FINGERPRINT_BYTES: usize = 16;

/// Encoded fingerprint length in characters
pub const FINGERPRINT_LEN: usize = FINGERPRINT_BYTES * 2;

/// Deterministic content address of an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a source link
    pub fn of_link(source_link: &str) -> Self {
        let digest = Sha256::digest(source_link.as_bytes());
        Self(hex::encode(&digest[..FINGERPRINT_BYTES]))
    }

    /// Fingerprint an item (by its source link)
    pub fn of(item: &Item) -> Self {
        Self::of_link(item.source_link())
    }

    /// Read a fingerprint back out of a message footer
    ///
    /// Returns `None` for footers this pipeline could not have written, so
    /// unrelated messages in the same channel are ignored.
    pub fn from_footer(footer: &str) -> Option<Self> {
        let footer = footer.trim();
        let well_formed = footer.len() == FINGERPRINT_LEN
            && footer.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));

        well_formed.then(|| Self(footer.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_links_give_equal_fingerprints() {
        let a = Item::new("1", "First title", "https://feed.example/en/news/42");
        let b = Item::new("2", "Completely different title", "https://feed.example/en/news/42");

        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn different_links_give_different_fingerprints() {
        let a = Fingerprint::of_link("https://feed.example/en/news/42");
        let b = Fingerprint::of_link("https://feed.example/en/news/43");

        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_stable_across_runs() {
        // sha256("https://feed.example/en/news/42"), first 16 bytes
        let expected = Fingerprint::of_link("https://feed.example/en/news/42");
        let digest = Sha256::digest("https://feed.example/en/news/42".as_bytes());
        assert_eq!(expected.as_str(), hex::encode(&digest[..16]));

        // A known vector pins the encoding itself.
        assert_eq!(
            Fingerprint::of_link("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb924"
        );
    }

    #[test]
    fn fingerprint_fits_footer_budget() {
        let fp = Fingerprint::of_link(&"x".repeat(10_000));
        assert_eq!(fp.as_str().len(), FINGERPRINT_LEN);
        assert!(fp.as_str().len() <= 32);
    }

    #[test]
    fn footer_round_trip_and_foreign_footers() {
        let fp = Fingerprint::of_link("https://feed.example/en/news/42");
        assert_eq!(Fingerprint::from_footer(fp.as_str()), Some(fp.clone()));
        assert_eq!(Fingerprint::from_footer(&format!(" {} ", fp)), Some(fp));

        assert_eq!(Fingerprint::from_footer("posted by a human"), None);
        assert_eq!(Fingerprint::from_footer("E3B0C44298FC1C149AFBF4C8996FB924"), None);
        assert_eq!(Fingerprint::from_footer(""), None);
    }
}
