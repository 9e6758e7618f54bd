//! Scan result aggregation
//!
//! Partitions the verdicts of one run into full and partial breakouts.

use tracing::info;

use crate::breakout::BreakoutVerdict;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    /// Number of symbols submitted to the scan
    pub scanned: usize,
    pub full: Vec<BreakoutVerdict>,
    pub partial: Vec<BreakoutVerdict>,
    /// Retained non-breakout verdicts (only present when the scan kept them)
    pub other: Vec<BreakoutVerdict>,
}

impl ScanSummary {
    pub fn from_verdicts(scanned: usize, verdicts: &[BreakoutVerdict]) -> Self {
        let mut summary = ScanSummary {
            scanned,
            ..Default::default()
        };

        for verdict in verdicts {
            if verdict.category.is_full() {
                summary.full.push(verdict.clone());
            } else if verdict.category.is_partial() {
                summary.partial.push(verdict.clone());
            } else {
                summary.other.push(verdict.clone());
            }
        }

        summary
    }

    pub fn full_count(&self) -> usize {
        self.full.len()
    }

    pub fn partial_count(&self) -> usize {
        self.partial.len()
    }

    pub fn log(&self) {
        info!("Total stocks scanned: {}", self.scanned);
        info!("Full breakouts detected: {}", self.full_count());
        info!("Partial breakouts detected: {}", self.partial_count());
    }

    /// `SYMBOL - Category` lines, full breakouts first
    pub fn listing(&self) -> Vec<String> {
        self.full
            .iter()
            .chain(self.partial.iter())
            .map(|v| format!("{} - {}", v.symbol, v.category))
            .collect()
    }

    pub fn print_listing(&self) {
        let lines = self.listing();
        let (full, partial) = lines.split_at(self.full_count());

        if !full.is_empty() {
            info!("Full breakout stocks detected:");
            for line in full {
                println!("{}", line);
            }
        }

        if !partial.is_empty() {
            info!("Partial breakout stocks detected:");
            for line in partial {
                println!("{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakout::{BreakoutCategory, BreakoutMetrics};
    use crate::Symbol;

    fn verdict(symbol: &str, category: BreakoutCategory) -> BreakoutVerdict {
        if !category.is_breakout() {
            return BreakoutVerdict::no_breakout(Symbol::new(symbol));
        }
        BreakoutVerdict::breakout(
            Symbol::new(symbol),
            category,
            BreakoutMetrics {
                current_close: 110.0,
                previous_high: 105.0,
                breakout_size: 5.0,
                atr: 2.0,
                current_volume: 5000,
                avg_volume: 1000.0,
            },
        )
    }

    #[test]
    fn test_partition_counts() {
        let verdicts = vec![
            verdict("A-EQ", BreakoutCategory::FullBreakout),
            verdict("B-EQ", BreakoutCategory::PartialBreakoutLowVolume),
            verdict("C-EQ", BreakoutCategory::PartialBreakoutSmallSize),
            verdict("D-EQ", BreakoutCategory::FullBreakout),
            verdict("E-EQ", BreakoutCategory::NoBreakout),
        ];
        let summary = ScanSummary::from_verdicts(12, &verdicts);

        assert_eq!(summary.scanned, 12);
        assert_eq!(summary.full_count(), 2);
        assert_eq!(summary.partial_count(), 2);
        assert_eq!(summary.other.len(), 1);
    }

    #[test]
    fn test_listing_orders_full_before_partial() {
        let verdicts = vec![
            verdict("B-EQ", BreakoutCategory::PartialBreakoutSmallSize),
            verdict("A-EQ", BreakoutCategory::FullBreakout),
        ];
        let summary = ScanSummary::from_verdicts(2, &verdicts);

        assert_eq!(
            summary.listing(),
            vec![
                "A-EQ - Full Breakout".to_string(),
                "B-EQ - Partial Breakout - Small Size".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        let summary = ScanSummary::from_verdicts(0, &[]);
        assert_eq!(summary, ScanSummary::default());
    }
}
