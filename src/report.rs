//! Scaling summary over a metrics log.

use std::fmt;

use crate::metrics::MetricRecord;

/// Label of the baseline that speedups are measured against.
pub const BASELINE_LABEL: &str = "Sequential";

/// Aggregate of every log row sharing one label.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub label: String,
    pub runs: usize,
    pub mean_elapsed_ms: f64,
    pub mean_gflops: f64,
    pub thread_count: usize,
    pub rank_count: usize,
    /// Baseline time over this label's time; `None` without a baseline.
    pub speedup: Option<f64>,
    /// Speedup per execution unit (`threads × ranks`).
    pub efficiency: Option<f64>,
}

/// Per-label means in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn from_records(records: &[MetricRecord]) -> Self {
        let mut groups: Vec<(&str, Vec<&MetricRecord>)> = Vec::new();
        for record in records {
            match groups.iter_mut().find(|(label, _)| *label == record.label()) {
                Some((_, members)) => members.push(record),
                None => groups.push((record.label(), vec![record])),
            }
        }

        let baseline_ms = groups
            .iter()
            .find(|(label, _)| *label == BASELINE_LABEL)
            .map(|(_, members)| mean(members.as_slice(), MetricRecord::elapsed_ms));

        let rows = groups
            .into_iter()
            .map(|(label, members)| {
                let mean_elapsed_ms = mean(&members, MetricRecord::elapsed_ms);
                let thread_count = members[0].thread_count();
                let rank_count = members[0].rank_count();
                let speedup = baseline_ms.map(|base| base / mean_elapsed_ms);
                let units = (thread_count * rank_count).max(1) as f64;
                SummaryRow {
                    label: label.to_owned(),
                    runs: members.len(),
                    mean_elapsed_ms,
                    mean_gflops: mean(&members, MetricRecord::gflops),
                    thread_count,
                    rank_count,
                    speedup,
                    efficiency: speedup.map(|s| s / units),
                }
            })
            .collect();

        Self { rows }
    }
}

fn mean(members: &[&MetricRecord], field: fn(&MetricRecord) -> f64) -> f64 {
    members.iter().map(|r| field(r)).sum::<f64>() / members.len() as f64
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(86))?;
        writeln!(
            f,
            "{:<20} {:>5} {:>14} {:>12} {:>8} {:>6} {:>9} {:>8}",
            "Label", "Runs", "Time (ms)", "GFLOPS", "Threads", "Ranks", "Speedup", "Eff."
        )?;
        writeln!(f, "{}", "-".repeat(86))?;
        for row in &self.rows {
            let speedup = row.speedup.map_or("-".to_owned(), |s| format!("{s:.2}x"));
            let efficiency = row
                .efficiency
                .map_or("-".to_owned(), |e| format!("{:.0}%", e * 100.0));
            writeln!(
                f,
                "{:<20} {:>5} {:>14.2} {:>12.3} {:>8} {:>6} {:>9} {:>8}",
                row.label,
                row.runs,
                row.mean_elapsed_ms,
                row.mean_gflops,
                row.thread_count,
                row.rank_count,
                speedup,
                efficiency
            )?;
        }
        write!(f, "{}", "=".repeat(86))
    }
}
