//! Remote-work and mode-share series, and what the office returners did.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Share of office returners who went hybrid (2-3 office days a week).
const RETURNER_HYBRID_SHARE: f64 = 0.34;
/// Share who switched to driving full-time.
const RETURNER_DRIVE_SHARE: f64 = 0.51;
/// Share who came back to transit full-time.
const RETURNER_TRANSIT_SHARE: f64 = 0.10;
/// Moved away, unemployed, off-peak shifts.
const RETURNER_OTHER_SHARE: f64 = 0.05;

/// Where the riders with changed travel patterns went, as shares of the
/// hybrid pool.
const CHANGED_PATTERN_SHARES: &[(&str, f64)] = &[
    ("Hybrid Work Schedules", 0.40),
    ("Job Changes (non-commute)", 0.20),
    ("Unemployment/Retirement", 0.15),
    ("Shift to Off-Peak Hours", 0.15),
    ("Reduced Trip Frequency", 0.10),
];

/// Workers working from home in one year.
#[derive(Debug, Clone, Deserialize)]
pub struct WfhRecord {
    pub year: i32,
    pub workers: f64,
    pub share_pct: f64,
}

/// Commute mode shares for one year (ACS table B08301).
#[derive(Debug, Clone, Deserialize)]
pub struct ModeShareRecord {
    pub year: i32,
    pub transit_pct: f64,
    pub drive_pct: f64,
    pub wfh_pct: f64,
}

/// The remote-work flow derived from the WFH series.
#[derive(Debug, Clone, Serialize)]
pub struct WfhFlow {
    pub baseline_year: i32,
    pub baseline_workers: f64,
    pub peak_year: i32,
    pub peak_workers: f64,
    pub latest_year: i32,
    /// Still working from home in the latest year.
    pub stayed_home: f64,
    /// Back in the office relative to the peak.
    pub returned_to_office: f64,
}

/// Per-year derived columns of the WFH series.
#[derive(Debug, Clone, Serialize)]
pub struct WfhDerivedRow {
    pub year: i32,
    pub workers: f64,
    pub share_pct: f64,
    pub new_vs_baseline: f64,
    pub returned_vs_peak: f64,
}

/// Office returners who were transit riders, split by destination mode.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnerBreakdown {
    pub returners: f64,
    pub former_transit_riders: f64,
    pub hybrid: f64,
    pub switched_to_driving: f64,
    pub returned_to_transit: f64,
    pub other: f64,
}

/// One slice of the changed-patterns panel.
#[derive(Debug, Clone, Serialize)]
pub struct ChangedPattern {
    pub category: &'static str,
    pub riders: f64,
    pub share_pct: f64,
}

pub fn load_wfh(path: &Path) -> Result<Vec<WfhRecord>> {
    read_rows(path).context("loading WFH series")
}

pub fn load_mode_share(path: &Path) -> Result<Vec<ModeShareRecord>> {
    read_rows(path).context("loading mode share series")
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    debug!(path = %path.display(), rows = rows.len(), "Mode shift rows loaded");
    Ok(rows)
}

/// Derives the remote-work flow: baseline, pandemic peak, and how the peak
/// split into stayed-home vs returned-to-office by the latest year.
pub fn wfh_flow(rows: &[WfhRecord], baseline_year: i32) -> Result<WfhFlow> {
    let baseline = rows
        .iter()
        .find(|r| r.year == baseline_year)
        .with_context(|| format!("WFH series has no baseline year {baseline_year}"))?;
    let peak = rows
        .iter()
        .max_by(|a, b| a.workers.total_cmp(&b.workers))
        .context("WFH series is empty")?;
    let latest = rows
        .iter()
        .max_by_key(|r| r.year)
        .context("WFH series is empty")?;

    if latest.year <= baseline_year {
        bail!("WFH series ends at {}, nothing after the baseline", latest.year);
    }

    Ok(WfhFlow {
        baseline_year,
        baseline_workers: baseline.workers,
        peak_year: peak.year,
        peak_workers: peak.workers,
        latest_year: latest.year,
        stayed_home: latest.workers,
        returned_to_office: peak.workers - latest.workers,
    })
}

/// Adds the two derived columns the flow chart plots.
pub fn wfh_derived_rows(rows: &[WfhRecord], flow: &WfhFlow) -> Vec<WfhDerivedRow> {
    rows.iter()
        .map(|r| WfhDerivedRow {
            year: r.year,
            workers: r.workers,
            share_pct: r.share_pct,
            new_vs_baseline: r.workers - flow.baseline_workers,
            returned_vs_peak: flow.peak_workers - r.workers,
        })
        .collect()
}

/// Splits the office returners into destination modes. The share constants
/// come from the survey breakdown of the source analysis; the returner count
/// itself is derived from the WFH series.
pub fn returner_breakdown(flow: &WfhFlow, baseline_transit_share: f64) -> ReturnerBreakdown {
    let returners = flow.returned_to_office.max(0.0);
    let former_transit_riders = returners * baseline_transit_share;

    ReturnerBreakdown {
        returners,
        former_transit_riders,
        hybrid: former_transit_riders * RETURNER_HYBRID_SHARE,
        switched_to_driving: former_transit_riders * RETURNER_DRIVE_SHARE,
        returned_to_transit: former_transit_riders * RETURNER_TRANSIT_SHARE,
        other: former_transit_riders * RETURNER_OTHER_SHARE,
    }
}

/// The changed-patterns panel: fixed category shares over the hybrid pool.
pub fn changed_patterns(total_riders: f64) -> Vec<ChangedPattern> {
    CHANGED_PATTERN_SHARES
        .iter()
        .map(|&(category, share)| ChangedPattern {
            category,
            riders: total_riders * share,
            share_pct: share * 100.0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wfh_series() -> Vec<WfhRecord> {
        vec![
            WfhRecord { year: 2019, workers: 260_000.0, share_pct: 7.0 },
            WfhRecord { year: 2020, workers: 800_000.0, share_pct: 22.0 },
            WfhRecord { year: 2021, workers: 1_200_000.0, share_pct: 33.0 },
            WfhRecord { year: 2022, workers: 938_000.0, share_pct: 25.0 },
            WfhRecord { year: 2023, workers: 750_000.0, share_pct: 19.0 },
        ]
    }

    #[test]
    fn test_wfh_flow() {
        let flow = wfh_flow(&wfh_series(), 2019).unwrap();
        assert_eq!(flow.peak_year, 2021);
        assert_relative_eq!(flow.peak_workers, 1_200_000.0);
        assert_relative_eq!(flow.stayed_home, 750_000.0);
        assert_relative_eq!(flow.returned_to_office, 450_000.0);
    }

    #[test]
    fn test_wfh_flow_requires_baseline() {
        assert!(wfh_flow(&wfh_series(), 2015).is_err());
    }

    #[test]
    fn test_derived_rows() {
        let rows = wfh_series();
        let flow = wfh_flow(&rows, 2019).unwrap();
        let derived = wfh_derived_rows(&rows, &flow);

        assert_relative_eq!(derived[2].new_vs_baseline, 940_000.0);
        assert_relative_eq!(derived[4].returned_vs_peak, 450_000.0);
    }

    #[test]
    fn test_returner_breakdown_sums() {
        let flow = wfh_flow(&wfh_series(), 2019).unwrap();
        let breakdown = returner_breakdown(&flow, 0.13);

        assert_relative_eq!(breakdown.returners, 450_000.0);
        assert_relative_eq!(breakdown.former_transit_riders, 58_500.0);
        let split = breakdown.hybrid
            + breakdown.switched_to_driving
            + breakdown.returned_to_transit
            + breakdown.other;
        assert_relative_eq!(split, breakdown.former_transit_riders);
    }

    #[test]
    fn test_changed_patterns_shares() {
        let patterns = changed_patterns(20_000.0);
        assert_eq!(patterns.len(), 5);
        assert_relative_eq!(patterns[0].riders, 8_000.0);
        let total: f64 = patterns.iter().map(|p| p.riders).sum();
        assert_relative_eq!(total, 20_000.0);
    }
}
