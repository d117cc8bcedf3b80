//! Novelty classification of activity and comment IDs.

use crate::logbook::Logbook;
use crate::types::ActivityId;

/// Whether an ID has been notified before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Novelty {
    New,
    Seen,
}

impl Novelty {
    pub const fn is_new(self) -> bool {
        matches!(self, Self::New)
    }
}

impl Logbook {
    /// Classifies `id` against every entry of the logbook.
    pub fn classify(&self, id: ActivityId) -> Novelty {
        if self.contains(id) {
            Novelty::Seen
        } else {
            Novelty::New
        }
    }
}
