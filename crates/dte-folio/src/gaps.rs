//! # Gap Detection
//!
//! Missing folios between the lowest and highest issued folio, reported as
//! inclusive intervals. Voided folios count as issued: they are accounted
//! for, just not valid.

use serde::{Deserialize, Serialize};

/// An inclusive run of folios that were never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolioGap {
    /// First missing folio.
    pub first: u64,
    /// Last missing folio.
    pub last: u64,
}

impl FolioGap {
    /// Number of missing folios.
    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Always false; a gap holds at least one folio.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Sort, deduplicate, and report every interval where `next > prev + 1`.
pub fn find_gaps(folios: impl IntoIterator<Item = u64>) -> Vec<FolioGap> {
    let mut sorted: Vec<u64> = folios.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .windows(2)
        .filter(|w| w[1] > w[0] + 1)
        .map(|w| FolioGap {
            first: w[0] + 1,
            last: w[1] - 1,
        })
        .collect()
}
