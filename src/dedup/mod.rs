//! Per-task near-duplicate page detection
//!
//! Each crawl task opens its own [`DuplicateStore`]. A check first looks for
//! an exact SHA-256 match of the text, then compares a SuperMinHash sketch
//! of the whitespace tokens against every sketch seen so far in the task.

mod superminhash;

pub use superminhash::{Signature, SuperMinHash, DEFAULT_SEED, SIGNATURE_SIZE};

use crate::{CrawlError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Outcome of a duplicate check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub similarity: f64,
}

/// One task's signature store
pub trait DuplicateStore: Send + Sync {
    /// Checks `text` against everything seen so far and remembers it
    fn check(&self, text: &str) -> Result<DuplicateCheck>;

    /// Drops what an earlier `check` remembered for `text`
    ///
    /// Used when a page that checked as new could not be persisted, so a
    /// retry of the same page is not mistaken for its own duplicate.
    fn forget(&self, text: &str) -> Result<()>;

    /// Number of pages remembered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens per-task duplicate stores
pub trait PageDeduplicator: Send + Sync {
    fn open(&self, task_id: &str, similarity_threshold: f64) -> Result<Arc<dyn DuplicateStore>>;
}

/// In-memory SuperMinHash deduplicator
#[derive(Debug, Clone, Copy, Default)]
pub struct SuperMinHashDeduplicator {
    hasher: SuperMinHash,
}

impl SuperMinHashDeduplicator {
    pub fn new(hasher: SuperMinHash) -> Self {
        Self { hasher }
    }
}

impl PageDeduplicator for SuperMinHashDeduplicator {
    fn open(&self, task_id: &str, similarity_threshold: f64) -> Result<Arc<dyn DuplicateStore>> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(CrawlError::DeduplicationFailure(format!(
                "similarity threshold must be between 0 and 1, got {}",
                similarity_threshold
            )));
        }

        debug!(task_id, similarity_threshold, "Opening duplicate store");
        Ok(Arc::new(MemoryDuplicateStore::new(
            self.hasher,
            similarity_threshold,
        )))
    }
}

#[derive(Default)]
struct StoreState {
    /// Sketches in insertion order, tagged with the digest of their text
    signatures: Vec<(String, Signature)>,
    digests: HashSet<String>,
}

/// Signatures and exact digests held in memory for the life of a task
pub struct MemoryDuplicateStore {
    hasher: SuperMinHash,
    threshold: f64,
    state: Mutex<StoreState>,
}

impl MemoryDuplicateStore {
    pub fn new(hasher: SuperMinHash, threshold: f64) -> Self {
        Self {
            hasher,
            threshold,
            state: Mutex::new(StoreState::default()),
        }
    }
}

impl MemoryDuplicateStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|e| CrawlError::DeduplicationFailure(format!("store lock poisoned: {}", e)))
    }
}

fn text_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl DuplicateStore for MemoryDuplicateStore {
    fn check(&self, text: &str) -> Result<DuplicateCheck> {
        let digest = text_digest(text);
        let mut state = self.lock()?;

        if state.digests.contains(&digest) {
            trace!(digest = %digest, "Exact duplicate");
            return Ok(DuplicateCheck {
                is_duplicate: true,
                similarity: 1.0,
            });
        }

        let signature = self.hasher.sketch(text.split_whitespace());

        let mut is_duplicate = false;
        let mut similarity = 0.0;
        for (_, stored) in &state.signatures {
            similarity = signature.similarity(stored);
            if similarity >= self.threshold {
                is_duplicate = true;
                break;
            }
        }

        state.digests.insert(digest.clone());
        state.signatures.push((digest, signature));

        Ok(DuplicateCheck {
            is_duplicate,
            similarity,
        })
    }

    fn forget(&self, text: &str) -> Result<()> {
        let digest = text_digest(text);
        let mut state = self.lock()?;

        if state.digests.remove(&digest) {
            state.signatures.retain(|(stored, _)| stored != &digest);
            trace!(digest = %digest, "Forgot page");
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.signatures.len())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(threshold: f64) -> Arc<dyn DuplicateStore> {
        SuperMinHashDeduplicator::default()
            .open("task", threshold)
            .unwrap()
    }

    #[test]
    fn test_open_rejects_out_of_range_threshold() {
        let dedup = SuperMinHashDeduplicator::default();
        assert!(matches!(
            dedup.open("t", -0.1),
            Err(CrawlError::DeduplicationFailure(_))
        ));
        assert!(matches!(
            dedup.open("t", 1.5),
            Err(CrawlError::DeduplicationFailure(_))
        ));
        assert!(dedup.open("t", f64::NAN).is_err());
        assert!(dedup.open("t", 0.0).is_ok());
        assert!(dedup.open("t", 1.0).is_ok());
    }

    #[test]
    fn test_first_page_is_unique() {
        let store = open(0.9);
        let check = store.check("hello world").unwrap();
        assert_eq!(
            check,
            DuplicateCheck {
                is_duplicate: false,
                similarity: 0.0
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_text_is_exact_duplicate() {
        let store = open(0.9);
        store.check("same page text").unwrap();
        let check = store.check("same page text").unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.similarity, 1.0);
    }

    #[test]
    fn test_whitespace_variant_is_near_duplicate() {
        let store = open(0.9);
        store.check("a page with some words").unwrap();
        let check = store.check("a  page\nwith some\twords").unwrap();
        assert!(check.is_duplicate);
        assert_eq!(check.similarity, 1.0);
        // Not an exact match, so the sketch is kept too
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_disjoint_text_is_not_duplicate() {
        let store = open(0.9);
        store.check("alpha beta gamma delta epsilon").unwrap();
        let check = store.check("zeta eta theta iota kappa").unwrap();
        assert!(!check.is_duplicate);
        assert!(check.similarity < 0.9);
    }

    #[test]
    fn test_exact_duplicate_is_not_stored_again() {
        let store = open(0.5);
        store.check("x y z").unwrap();
        store.check("x y z").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_threshold_zero_marks_everything_after_first() {
        let store = open(0.0);
        assert!(!store.check("one").unwrap().is_duplicate);
        assert!(store.check("two").unwrap().is_duplicate);
    }

    #[test]
    fn test_forget_lets_page_be_checked_again() {
        let store = open(0.9);
        store.check("kept page text").unwrap();
        store.check("retried page text").unwrap();

        store.forget("retried page text").unwrap();
        assert_eq!(store.len(), 1);

        let check = store.check("retried page text").unwrap();
        assert!(!check.is_duplicate);
        assert!(store.check("kept page text").unwrap().is_duplicate);
    }

    #[test]
    fn test_forget_unknown_text_is_noop() {
        let store = open(0.9);
        store.check("only page").unwrap();
        store.forget("never seen").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stores_are_independent() {
        let dedup = SuperMinHashDeduplicator::default();
        let a = dedup.open("a", 0.9).unwrap();
        let b = dedup.open("b", 0.9).unwrap();
        a.check("shared text").unwrap();
        assert!(!b.check("shared text").unwrap().is_duplicate);
    }
}
