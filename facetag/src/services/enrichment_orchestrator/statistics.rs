//! Run statistics
//!
//! Running counters for one tagging run, plus the per-item failure list so
//! every skipped image stays attributable to its path.

use serde::{Deserialize, Serialize};

/// One skipped image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Listing pages fully processed
    pub pages: usize,
    /// File entries listed before filtering
    pub listed: usize,
    /// Images that passed the extension and watermark filters
    pub eligible: usize,
    /// Images whose per-item sequence finished, successfully or not
    pub processed: usize,
    /// Images with tags written back
    pub tagged: usize,
    /// Images with no detected face
    pub no_faces: usize,
    /// Images with faces but no resolvable name
    pub unresolved: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl RunStats {
    pub fn record_failure(&mut self, path: &str, error: String) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            path: path.to_string(),
            error,
        });
    }

    /// Running progress line
    pub fn display_string(&self) -> String {
        format!(
            "{} processed, {} tagged, {} failed ({} pages, {} of {} entries eligible)",
            self.processed, self.tagged, self.failed, self.pages, self.eligible, self.listed
        )
    }

    /// Final summary, one line per failure after the counters
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}; {} without faces, {} without known names",
            self.display_string(),
            self.no_faces,
            self.unresolved
        );
        for failure in &self.failures {
            out.push_str(&format!("\n  failed: {} ({})", failure.path, failure.error));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_string() {
        let stats = RunStats {
            pages: 2,
            listed: 30,
            eligible: 12,
            processed: 12,
            tagged: 5,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(
            stats.display_string(),
            "12 processed, 5 tagged, 1 failed (2 pages, 12 of 30 entries eligible)"
        );
    }

    #[test]
    fn test_failures_are_attributed() {
        let mut stats = RunStats::default();
        stats.record_failure("/photos/crowd.jpg", "Too many faces detected: 11".to_string());

        assert_eq!(stats.failed, 1);
        assert!(stats.summary().contains("failed: /photos/crowd.jpg (Too many faces detected: 11)"));
    }
}
