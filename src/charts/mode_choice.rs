//! Returner mode choice chart: where the office returners went, the mode
//! share timeline, and the service degradation that drove the switch.

use super::figure::{Figure, base_layout, panel_title};
use super::{NEUTRAL_GRAY, SLATE_GRAY};
use crate::modeshift::{ModeShareRecord, ReturnerBreakdown};
use crate::performance::{PerformanceRecord, ServiceLevelRecord};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

pub fn figure(
    breakdown: &ReturnerBreakdown,
    mode_share: &[ModeShareRecord],
    performance: &[PerformanceRecord],
    service_levels: &[ServiceLevelRecord],
) -> Figure {
    let mut layout = base_layout(
        "Why Office Returners Did Not Restore Transit Ridership",
        "Estimated counts from mode share data | Absolute counts, no normalization",
        1200,
    );
    layout["margin"] = json!({"t": 130, "b": 80, "l": 80, "r": 80});

    // Three stacked panels sharing the canvas
    layout["xaxis"] = json!({"title": {"text": "<b>Category</b>"}, "anchor": "y"});
    layout["yaxis"] = json!({
        "title": {"text": "<b>Riders</b>"},
        "domain": [0.72, 1.0],
        "showgrid": true
    });
    layout["xaxis2"] = json!({"title": {"text": "<b>Year</b>"}, "anchor": "y2", "showgrid": true});
    layout["yaxis2"] = json!({
        "title": {"text": "<b>Mode Share (%)</b>"},
        "domain": [0.36, 0.64],
        "range": [0, 80],
        "anchor": "x2",
        "showgrid": true
    });
    layout["xaxis3"] = json!({"title": {"text": "<b>Year</b>"}, "anchor": "y3", "showgrid": true});
    layout["yaxis3"] = json!({
        "title": {"text": "<b>Service Level (%)</b>"},
        "domain": [0.0, 0.28],
        "range": [0, 110],
        "anchor": "x3",
        "showgrid": true
    });
    layout["annotations"] = json!([
        panel_title(
            &format!(
                "Panel A: Of {:.0}k Office Returners, {:.0}k Were Transit Riders",
                breakdown.returners / 1000.0,
                breakdown.former_transit_riders / 1000.0
            ),
            1.01
        ),
        panel_title("Panel B: Mode Share Timeline", 0.65),
        panel_title("Panel C: Service Degradation Timeline", 0.29),
    ]);
    layout["legend"]["y"] = json!(0.5);

    let mut fig = Figure::new(layout);

    // Panel A: destination of former transit riders among returners
    let categories = [
        "Hybrid Schedules<br>(2-3 days/week)",
        "Switched to Driving<br>(full-time)",
        "Returned to Transit",
        "Other Changes",
    ];
    let riders = [
        breakdown.hybrid,
        breakdown.switched_to_driving,
        breakdown.returned_to_transit,
        breakdown.other,
    ];
    fig.add_trace(json!({
        "type": "bar",
        "x": categories,
        "y": riders,
        "text": riders.iter().map(|v| format!("{v:.0}")).collect::<Vec<_>>(),
        "textposition": "outside",
        "marker": {"color": NEUTRAL_GRAY},
        "showlegend": false,
        "hovertemplate": "%{x}<br>%{y:.0f} riders<extra></extra>"
    }));

    // Panel B: mode share timeline
    let mut rows: Vec<&ModeShareRecord> = mode_share.iter().collect();
    rows.sort_by_key(|r| r.year);
    let years: Vec<i32> = rows.iter().map(|r| r.year).collect();
    for (name, values, color) in [
        (
            "Transit",
            rows.iter().map(|r| r.transit_pct).collect::<Vec<_>>(),
            NEUTRAL_GRAY,
        ),
        (
            "Drive",
            rows.iter().map(|r| r.drive_pct).collect::<Vec<_>>(),
            SLATE_GRAY,
        ),
        (
            "Work From Home",
            rows.iter().map(|r| r.wfh_pct).collect::<Vec<_>>(),
            SLATE_GRAY,
        ),
    ] {
        fig.add_trace(json!({
            "type": "scatter",
            "x": years,
            "y": values,
            "xaxis": "x2",
            "yaxis": "y2",
            "mode": "lines+markers+text",
            "name": name,
            "line": {"width": 4, "color": color},
            "marker": {"size": 12},
            "text": values.iter().map(|v| format!("{v:.0}%")).collect::<Vec<_>>(),
            "textposition": "top center",
            "hovertemplate": "%{x}: %{y}%<extra></extra>"
        }));
    }

    // Panel C: rail OTP next to bus service levels
    let mut perf: Vec<&PerformanceRecord> = performance.iter().collect();
    perf.sort_by_key(|r| r.fiscal_year);
    fig.add_trace(json!({
        "type": "bar",
        "x": perf.iter().map(|r| r.fiscal_year).collect::<Vec<_>>(),
        "y": perf.iter().map(|r| r.on_time_performance_pct).collect::<Vec<_>>(),
        "xaxis": "x3",
        "yaxis": "y3",
        "name": "Rail OTP",
        "marker": {"color": NEUTRAL_GRAY, "opacity": 0.7},
        "hovertemplate": "%{x}: %{y:.0f}% OTP<extra></extra>"
    }));

    let mut by_system: BTreeMap<&str, Vec<&ServiceLevelRecord>> = BTreeMap::new();
    for row in service_levels {
        by_system.entry(row.system.as_str()).or_default().push(row);
    }
    for (system, mut rows) in by_system {
        rows.sort_by_key(|r| r.year);
        fig.add_trace(json!({
            "type": "bar",
            "x": rows.iter().map(|r| r.year).collect::<Vec<_>>(),
            "y": rows.iter().map(|r| r.service_pct).collect::<Vec<_>>(),
            "xaxis": "x3",
            "yaxis": "y3",
            "name": format!("{system} Service"),
            "marker": {"color": SLATE_GRAY, "opacity": 0.7},
            "hovertemplate": "%{x}: %{y:.0f}% service<extra></extra>"
        }));
    }

    fig
}

pub fn render(
    breakdown: &ReturnerBreakdown,
    mode_share: &[ModeShareRecord],
    performance: &[PerformanceRecord],
    service_levels: &[ServiceLevelRecord],
) -> Result<String> {
    let fig = figure(breakdown, mode_share, performance, service_levels);
    let caption = caption(breakdown, mode_share);
    super::template::render_page("Returner Mode Choice", &caption, &fig)
}

fn caption(breakdown: &ReturnerBreakdown, mode_share: &[ModeShareRecord]) -> String {
    let share_shift = {
        let mut rows: Vec<&ModeShareRecord> = mode_share.iter().collect();
        rows.sort_by_key(|r| r.year);
        match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => format!(
                "Transit mode share moved from {:.0}% to {:.0}% while driving moved from {:.0}% \
                 to {:.0}% between {} and {}.",
                first.transit_pct,
                last.transit_pct,
                first.drive_pct,
                last.drive_pct,
                first.year,
                last.year
            ),
            _ => String::new(),
        }
    };

    format!(
        "About {:.0} thousand workers returned to offices from the remote-work peak; {:.0} \
         thousand of them were former transit riders. An estimated {:.0} thousand switched to \
         driving full time, {:.0} thousand went hybrid and ride far less often, and only {:.0} \
         thousand returned to transit full time. {} Service degradation drove the switch: rail \
         on-time performance collapsed while bus service was cut, so returners with a choice \
         picked driving.",
        breakdown.returners / 1000.0,
        breakdown.former_transit_riders / 1000.0,
        breakdown.switched_to_driving / 1000.0,
        breakdown.hybrid / 1000.0,
        breakdown.returned_to_transit / 1000.0,
        share_shift,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown() -> ReturnerBreakdown {
        ReturnerBreakdown {
            returners: 450_000.0,
            former_transit_riders: 58_500.0,
            hybrid: 19_890.0,
            switched_to_driving: 29_835.0,
            returned_to_transit: 5_850.0,
            other: 2_925.0,
        }
    }

    fn mode_share() -> Vec<ModeShareRecord> {
        vec![
            ModeShareRecord { year: 2019, transit_pct: 13.0, drive_pct: 73.0, wfh_pct: 7.0 },
            ModeShareRecord { year: 2023, transit_pct: 7.0, drive_pct: 68.0, wfh_pct: 19.0 },
        ]
    }

    #[test]
    fn test_three_panels() {
        let performance = vec![PerformanceRecord {
            fiscal_year: 2023,
            on_time_performance_pct: 71.0,
        }];
        let service = vec![ServiceLevelRecord {
            system: "AC Transit".into(),
            year: 2021,
            service_pct: 70.0,
        }];
        let fig = figure(&breakdown(), &mode_share(), &performance, &service);

        // 1 bar + 3 mode lines + OTP bars + 1 service-level system
        assert_eq!(fig.data.len(), 6);
        assert_eq!(fig.data[1]["yaxis"], "y2");
        assert_eq!(fig.data[4]["yaxis"], "y3");
        assert_eq!(fig.data[5]["name"], "AC Transit Service");
    }

    #[test]
    fn test_caption_math() {
        let text = caption(&breakdown(), &mode_share());
        assert!(text.contains("450 thousand"));
        assert!(text.contains("30 thousand switched to driving"), "{text}");
        assert!(text.contains("from 13% to 7%"));
    }
}
