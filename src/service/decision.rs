//! Decision makers
//!
//! The last check between ranking a release and trying to download it.

use crate::matcher::RankedResult;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip,
}

/// Reviews a ranked result before any download starts
pub trait DecisionMaker: Send + Sync {
    fn review(&self, ranked: &RankedResult) -> Decision;
}

/// Decides without user interaction
///
/// Skips a release that was already accepted earlier in the run and, in
/// strict mode, any release whose best uploader is not a perfect match.
pub struct UnattendedDecisionMaker {
    strict: bool,
    accepted: Mutex<HashSet<String>>,
}

impl UnattendedDecisionMaker {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            accepted: Mutex::new(HashSet::new()),
        }
    }
}

impl DecisionMaker for UnattendedDecisionMaker {
    fn review(&self, ranked: &RankedResult) -> Decision {
        let key = ranked.release.search_string();
        if self.strict {
            let best = ranked.best().map_or(0.0, |u| u.score);
            if best < 1.0 {
                info!("Skipping '{}': best score {:.2} is not a perfect match", key, best);
                return Decision::Skip;
            }
        }

        let mut accepted = match self.accepted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !accepted.insert(key.clone()) {
            info!("Skipping '{}': already accepted in this run", key);
            return Decision::Skip;
        }
        Decision::Proceed
    }
}
