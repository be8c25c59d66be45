//! Remote-work retention chart: who stayed home, who returned, and where
//! the changed-pattern riders went.

use super::figure::{Figure, base_layout, panel_title};
use super::{NEUTRAL_GRAY, SLATE_GRAY};
use crate::modeshift::{ChangedPattern, WfhFlow};
use anyhow::Result;
use serde_json::json;

pub fn figure(flow: &WfhFlow, patterns: &[ChangedPattern]) -> Figure {
    let mut layout = base_layout(
        "Remote Work Retention and Changed Travel Patterns",
        "Estimated from survey data",
        900,
    );
    layout["margin"] = json!({"t": 130, "b": 80, "l": 180, "r": 80});
    layout["xaxis"] = json!({"anchor": "y"});
    layout["yaxis"] = json!({
        "title": {"text": "<b>Workers (thousands)</b>"},
        "domain": [0.58, 1.0],
        "showgrid": true
    });
    layout["xaxis2"] = json!({
        "title": {"text": "<b>Estimated Riders</b>"},
        "anchor": "y2",
        "showgrid": true
    });
    layout["yaxis2"] = json!({"domain": [0.0, 0.42], "anchor": "x2", "automargin": true});
    layout["annotations"] = json!([
        panel_title(
            &format!(
                "Remote Work Flow: Who Stayed Home, Who Returned ({}-{})",
                flow.baseline_year, flow.latest_year
            ),
            1.01
        ),
        panel_title("Changed Patterns: Where the Riders Went", 0.43),
    ]);
    layout["showlegend"] = json!(false);

    let mut fig = Figure::new(layout);

    // Panel 1: the remote-work flow as labeled bars, thousands of workers
    let flow_labels = [
        format!("{} Baseline", flow.baseline_year),
        format!("{} Peak", flow.peak_year),
        format!("{} Stayed<br>Home", flow.latest_year),
        format!("{} Returned<br>to Office", flow.latest_year),
    ];
    let flow_values = [
        flow.baseline_workers / 1000.0,
        flow.peak_workers / 1000.0,
        flow.stayed_home / 1000.0,
        flow.returned_to_office / 1000.0,
    ];
    fig.add_trace(json!({
        "type": "bar",
        "x": flow_labels,
        "y": flow_values,
        "marker": {"color": SLATE_GRAY},
        "text": flow_values.iter().map(|v| format!("{v:.0}k")).collect::<Vec<_>>(),
        "textposition": "outside",
        "hovertemplate": "%{x}<br>%{y:.0f}k workers<extra></extra>"
    }));

    // Panel 2: changed patterns, horizontal bars
    let total: f64 = patterns.iter().map(|p| p.riders).sum();
    fig.add_trace(json!({
        "type": "bar",
        "orientation": "h",
        "y": patterns.iter().map(|p| p.category).collect::<Vec<_>>(),
        "x": patterns.iter().map(|p| p.riders).collect::<Vec<_>>(),
        "xaxis": "x2",
        "yaxis": "y2",
        "marker": {"color": NEUTRAL_GRAY},
        "text": patterns
            .iter()
            .map(|p| format!("{:.0} ({:.0}%)", p.riders, p.share_pct))
            .collect::<Vec<_>>(),
        "textposition": "outside",
        "hovertemplate": format!(
            "%{{y}}<br>%{{x:,.0f}} riders of {total:.0}<extra></extra>"
        )
    }));

    fig
}

pub fn render(flow: &WfhFlow, patterns: &[ChangedPattern]) -> Result<String> {
    let fig = figure(flow, patterns);
    let caption = caption(flow, patterns);
    super::template::render_page("Remote Work Retention", &caption, &fig)
}

fn caption(flow: &WfhFlow, patterns: &[ChangedPattern]) -> String {
    let stayed_share = if flow.peak_workers > 0.0 {
        flow.stayed_home / flow.peak_workers * 100.0
    } else {
        0.0
    };
    let pattern_total: f64 = patterns.iter().map(|p| p.riders).sum();

    format!(
        "{:.0} thousand workers were remote at the {} peak, up from {:.0} thousand in {}. \
         {:.0}% were still home by {}; the rest returned to offices, mostly on hybrid \
         schedules that cut their transit use roughly in half. Changed travel patterns account \
         for about {:.0} thousand lost riders, dominated by hybrid schedules.",
        flow.peak_workers / 1000.0,
        flow.peak_year,
        flow.baseline_workers / 1000.0,
        flow.baseline_year,
        stayed_share,
        flow.latest_year,
        pattern_total / 1000.0,
    )
}
