//! Temporal service quality chart: on-time performance and excess wait time
//! by income category, stacked panels over the same year axis.

use super::figure::{Figure, base_layout, callout, dashed_line_shape, labeled_line, panel_title};
use super::{NEUTRAL_GRAY, SLATE_GRAY};
use crate::catchment::IncomeCategory;
use crate::performance::{EwtByIncome, OTP_GOAL_PERCENT, PerformanceRecord};
use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

pub fn figure(performance: &[PerformanceRecord], ewt: &[EwtByIncome]) -> Figure {
    let mut rows: Vec<&PerformanceRecord> = performance.iter().collect();
    rows.sort_by_key(|r| r.fiscal_year);

    let years: Vec<i32> = rows.iter().map(|r| r.fiscal_year).collect();
    let otp: Vec<f64> = rows.iter().map(|r| r.on_time_performance_pct).collect();
    let (x_min, x_max) = match (years.first(), years.last()) {
        (Some(&first), Some(&last)) => (f64::from(first) - 0.5, f64::from(last) + 0.5),
        _ => (2017.5, 2024.5),
    };

    let mut layout = base_layout(
        "Rail Service Quality Degradation and Recovery",
        "System Level | Annual Data",
        900,
    );
    layout["margin"] = json!({"t": 120, "b": 80, "l": 80, "r": 80});
    layout["xaxis"] = grid_axis("Year", x_min, x_max);
    layout["yaxis"] = json!({
        "title": {"text": "<b>On-Time Performance (%)</b>"},
        "domain": [0.58, 1.0],
        "range": [65, 100],
        "showgrid": true, "gridwidth": 1, "gridcolor": "lightgray"
    });
    layout["xaxis2"] = {
        let mut axis = grid_axis("Year", x_min, x_max);
        axis["anchor"] = json!("y2");
        axis
    };
    layout["yaxis2"] = json!({
        "title": {"text": "<b>Excess Wait Time (minutes)</b>"},
        "domain": [0.0, 0.42],
        "range": [0, 8],
        "anchor": "x2",
        "showgrid": true, "gridwidth": 1, "gridcolor": "lightgray"
    });
    layout["legend"]["title"] = json!({"text": "<b>Income Categories</b>", "font": {"size": 12}});

    let mut annotations = vec![
        panel_title("On-Time Performance Degradation", 1.01),
        panel_title("Excess Wait Time by Income Category", 0.43),
    ];
    let mut shapes = Vec::new();

    // Goal line across the OTP panel
    shapes.push(dashed_line_shape("x", "y", x_min, x_max, OTP_GOAL_PERCENT, "green", 3));
    annotations.push(json!({
        "x": x_max - 0.2, "y": OTP_GOAL_PERCENT,
        "xref": "x", "yref": "y",
        "text": format!("{OTP_GOAL_PERCENT:.0}% Goal"),
        "showarrow": false,
        "xanchor": "left",
        "font": {"size": 10, "color": "green"}
    }));

    // Crisis low and recovery callouts, derived from the series
    if let Some(crisis) = rows
        .iter()
        .min_by(|a, b| a.on_time_performance_pct.total_cmp(&b.on_time_performance_pct))
    {
        annotations.push(callout(
            "x",
            "y",
            f64::from(crisis.fiscal_year),
            crisis.on_time_performance_pct,
            &format!(
                "CRISIS LOW<br>{:.0}% OTP",
                crisis.on_time_performance_pct
            ),
            "red",
            40,
            -40,
        ));
        if let Some(latest) = rows.last() {
            if latest.on_time_performance_pct >= OTP_GOAL_PERCENT
                && latest.fiscal_year > crisis.fiscal_year
            {
                annotations.push(callout(
                    "x",
                    "y",
                    f64::from(latest.fiscal_year),
                    latest.on_time_performance_pct,
                    &format!("RECOVERY<br>{:.0}% OTP", latest.on_time_performance_pct),
                    "green",
                    -40,
                    -40,
                ));
            }
        }
    }

    // Peak EWT callout on the lower panel
    if let Some(peak) = ewt.iter().max_by(|a, b| a.mean_ewt_min.total_cmp(&b.mean_ewt_min)) {
        annotations.push(callout(
            "x2",
            "y2",
            f64::from(peak.fiscal_year),
            peak.mean_ewt_min,
            &format!("PEAK EWT<br>{:.1} minutes", peak.mean_ewt_min),
            "red",
            40,
            -40,
        ));
    }

    layout["shapes"] = json!(shapes);
    layout["annotations"] = json!(annotations);

    let mut fig = Figure::new(layout);

    let mut otp_trace = labeled_line(&years, &otp, "On-Time Performance", SLATE_GRAY, "top center");
    otp_trace["showlegend"] = json!(false);
    fig.add_trace(otp_trace);

    // One EWT line per income category on the second panel
    let mut by_category: BTreeMap<IncomeCategory, (Vec<i32>, Vec<f64>)> = BTreeMap::new();
    for cell in ewt {
        let entry = by_category.entry(cell.income_category).or_default();
        entry.0.push(cell.fiscal_year);
        entry.1.push(cell.mean_ewt_min);
    }
    for (category, (cat_years, values)) in by_category {
        let color = match category {
            IncomeCategory::LowIncome => SLATE_GRAY,
            IncomeCategory::NonLowIncome => NEUTRAL_GRAY,
        };
        fig.add_trace(json!({
            "type": "scatter",
            "x": cat_years,
            "y": values,
            "xaxis": "x2",
            "yaxis": "y2",
            "mode": "lines+markers",
            "line": {"color": color, "width": 4},
            "marker": {"size": 11},
            "name": category.to_string(),
            "hovertemplate": "%{x}: %{y:.1f} min EWT<extra></extra>"
        }));
    }

    fig
}

fn grid_axis(title: &str, min: f64, max: f64) -> serde_json::Value {
    json!({
        "title": {"text": format!("<b>{title}</b>")},
        "range": [min, max],
        "showgrid": true, "gridwidth": 1, "gridcolor": "lightgray"
    })
}

pub fn render(performance: &[PerformanceRecord], ewt: &[EwtByIncome]) -> Result<String> {
    let fig = figure(performance, ewt);
    let caption = caption(performance, ewt);
    super::template::render_page("Temporal Service Quality", &caption, &fig)
}

fn caption(performance: &[PerformanceRecord], ewt: &[EwtByIncome]) -> String {
    let mut rows: Vec<&PerformanceRecord> = performance.iter().collect();
    rows.sort_by_key(|r| r.fiscal_year);
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return String::from("No performance data available.");
    };
    let crisis = rows
        .iter()
        .min_by(|a, b| a.on_time_performance_pct.total_cmp(&b.on_time_performance_pct))
        .unwrap_or(first);
    let peak_ewt = ewt
        .iter()
        .map(|c| c.mean_ewt_min)
        .fold(0.0_f64, f64::max);

    format!(
        "On-time performance dropped from {:.0}% in {} to {:.0}% in {}, then reached {:.0}% by {}. \
         Riders experienced up to {:.1} minutes of excess wait time at the worst of the decline. \
         Service degradation affected both income groups equally; the difference lies in who \
         could leave versus who stayed. Data from quarterly performance reports, {}-{}.",
        first.on_time_performance_pct,
        first.fiscal_year,
        crisis.on_time_performance_pct,
        crisis.fiscal_year,
        last.on_time_performance_pct,
        last.fiscal_year,
        peak_ewt,
        first.fiscal_year,
        last.fiscal_year,
    )
}
