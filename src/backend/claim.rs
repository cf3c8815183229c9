//! Line-pair ownership registry
//!
//! A physical loopback pair has no meaningful concurrency: two sessions
//! asserting and reading the same lines would silently interleave and
//! corrupt both measurements. The registry makes ownership explicit — a
//! backend claims its `(chip, out, in)` triple before touching the device
//! and holds the claim for its whole lifetime.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use super::BackendOpenError;

type PairKey = (String, u8, u8);

fn registry() -> &'static Mutex<HashSet<PairKey>> {
    static REGISTRY: OnceLock<Mutex<HashSet<PairKey>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive ownership of one line pair. Dropping the guard releases it.
#[derive(Debug)]
pub struct ClaimGuard {
    key: PairKey,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        let mut claimed = registry()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        claimed.remove(&self.key);
        tracing::debug!(
            chip = %self.key.0,
            out_line = self.key.1,
            in_line = self.key.2,
            "line pair released"
        );
    }
}

/// Claim a line pair for exclusive use.
///
/// Fails with [`BackendOpenError::ResourceBusy`] if any active session
/// already owns the same triple.
pub fn claim_pair(chip: &str, out_line: u8, in_line: u8) -> Result<ClaimGuard, BackendOpenError> {
    let key: PairKey = (chip.to_owned(), out_line, in_line);
    let mut claimed = registry()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if !claimed.insert(key.clone()) {
        return Err(BackendOpenError::ResourceBusy {
            chip: chip.to_owned(),
            out_line,
            in_line,
        });
    }
    tracing::debug!(chip, out_line, in_line, "line pair claimed");
    Ok(ClaimGuard { key })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_release() {
        let guard = claim_pair("claim-test-a", 1, 2).expect("first claim should succeed");
        drop(guard);
        let again = claim_pair("claim-test-a", 1, 2);
        assert!(again.is_ok(), "released pair should be claimable again");
    }

    #[test]
    fn test_double_claim_is_busy() {
        let _guard = claim_pair("claim-test-b", 1, 2).unwrap();
        match claim_pair("claim-test-b", 1, 2) {
            Err(BackendOpenError::ResourceBusy {
                chip,
                out_line,
                in_line,
            }) => {
                assert_eq!(chip, "claim-test-b");
                assert_eq!((out_line, in_line), (1, 2));
            }
            _ => panic!("second claim must report ResourceBusy"),
        }
    }

    #[test]
    fn test_distinct_pairs_do_not_conflict() {
        let _a = claim_pair("claim-test-c", 1, 2).unwrap();
        assert!(claim_pair("claim-test-c", 3, 4).is_ok());
        assert!(claim_pair("claim-test-d", 1, 2).is_ok());
    }
}
