//! Accumulated simulation metrics

use std::fmt;

use serde::Serialize;

/// Counters and samples gathered across ticks
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeshMetrics {
    /// Hop count of every data packet that reached its destination
    pub hops: Vec<usize>,
    /// Average buffer occupancy sampled at each tick boundary
    pub congestion: Vec<f64>,
    /// Failed transmissions
    pub errors: u64,
    /// Packets dropped because no route could be found
    pub unreached: u64,
    /// Acknowledgements that made it back to the original source
    pub round_trips: u64,
    /// Routes whose next hop was not a direct link
    pub invariant_violations: u64,
}

impl MeshMetrics {
    pub fn record_hops(&mut self, hops: usize) {
        self.hops.push(hops);
    }

    pub fn record_congestion(&mut self, sample: f64) {
        self.congestion.push(sample);
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn record_unreached(&mut self) {
        self.unreached += 1;
    }

    pub fn record_round_trip(&mut self) {
        self.round_trips += 1;
    }

    pub fn record_invariant_violation(&mut self) {
        self.invariant_violations += 1;
    }

    pub fn delivered(&self) -> usize {
        self.hops.len()
    }

    /// Mean hop count, 1.0 before any delivery
    pub fn average_hops(&self) -> f64 {
        mean_or_one(self.hops.iter().map(|&h| h as f64), self.hops.len())
    }

    /// Mean congestion sample, 1.0 before any tick has been charged
    pub fn average_congestion(&self) -> f64 {
        mean_or_one(self.congestion.iter().copied(), self.congestion.len())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn mean_or_one(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 1.0;
    }
    values.sum::<f64>() / count as f64
}

/// Snapshot of the metrics block shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub ticks: u64,
    pub node_fail_chance: u8,
    pub link_fail_chance: u8,
    pub delivered: usize,
    pub average_hops: f64,
    pub average_congestion: f64,
    pub errors: u64,
    pub unreached: u64,
    pub round_trips: u64,
    pub invariant_violations: u64,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Metrics")?;
        writeln!(f, "-------")?;
        writeln!(f, "Total ticks: {}", self.ticks)?;
        writeln!(f, "Node failure chance: {}", self.node_fail_chance)?;
        writeln!(f, "Link failure chance: {}", self.link_fail_chance)?;
        writeln!(f, "Hops: {}", self.delivered)?;
        writeln!(f, "Average hops: {}", self.average_hops)?;
        writeln!(f, "Average congestion: {}", self.average_congestion)?;
        writeln!(f, "Total errors: {}", self.errors)?;
        writeln!(
            f,
            "Total packets unable to reach destination: {}",
            self.unreached
        )?;
        writeln!(f, "Total received acknowledgements: {}", self.round_trips)?;
        if self.invariant_violations > 0 {
            writeln!(f, "Routing invariant violations: {}", self.invariant_violations)?;
        }
        write!(f, "-------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_averages_default_to_one() {
        let metrics = MeshMetrics::default();
        assert_eq!(metrics.average_hops(), 1.0);
        assert_eq!(metrics.average_congestion(), 1.0);
        assert_eq!(metrics.delivered(), 0);
    }

    #[test]
    fn test_averages() {
        let mut metrics = MeshMetrics::default();
        metrics.record_hops(1);
        metrics.record_hops(3);
        metrics.record_congestion(1.0);
        metrics.record_congestion(2.0);
        metrics.record_congestion(-1.0);
        assert_eq!(metrics.average_hops(), 2.0);
        assert!((metrics.average_congestion() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear() {
        let mut metrics = MeshMetrics::default();
        metrics.record_error();
        metrics.record_unreached();
        metrics.record_round_trip();
        metrics.clear();
        assert_eq!(metrics, MeshMetrics::default());
    }

    #[test]
    fn test_report_display() {
        let report = MetricsReport {
            ticks: 4,
            node_fail_chance: 0,
            link_fail_chance: 10,
            delivered: 2,
            average_hops: 1.5,
            average_congestion: 1.0,
            errors: 3,
            unreached: 0,
            round_trips: 2,
            invariant_violations: 0,
        };
        let text = report.to_string();
        assert!(text.starts_with("Metrics\n-------\nTotal ticks: 4\n"));
        assert!(text.contains("Link failure chance: 10\n"));
        assert!(text.contains("Average hops: 1.5\n"));
        assert!(text.contains("Total received acknowledgements: 2\n"));
        assert!(!text.contains("invariant"));
    }
}
