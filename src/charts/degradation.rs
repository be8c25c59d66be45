//! Dual-system degradation chart: rail and bus ridership as percent of the
//! baseline year, with a year-by-year animation slider.

use super::figure::{Figure, base_layout, dashed_line_shape};
use super::{NEUTRAL_GRAY, SLATE_GRAY};
use crate::ridership::SystemSeries;
use anyhow::Result;
use serde_json::{Value, json};
use std::collections::BTreeSet;

const SERIES_COLORS: [&str; 2] = [NEUTRAL_GRAY, SLATE_GRAY];
const TEXT_POSITIONS: [&str; 2] = ["top center", "bottom center"];

fn series_trace(series: &SystemSeries, idx: usize, up_to: Option<i32>) -> Value {
    let points: Vec<_> = series
        .points
        .iter()
        .filter(|p| up_to.is_none_or(|limit| p.year <= limit))
        .collect();
    let x: Vec<i32> = points.iter().map(|p| p.year).collect();
    let y: Vec<f64> = points.iter().map(|p| p.pct_of_baseline).collect();
    let color = SERIES_COLORS[idx % SERIES_COLORS.len()];

    json!({
        "type": "scatter",
        "x": x,
        "y": y,
        "mode": "lines+markers+text",
        "line": {"color": color, "width": 4},
        "marker": {"size": 12},
        "text": y.iter().map(|v| format!("{v:.1}%")).collect::<Vec<_>>(),
        "textposition": TEXT_POSITIONS[idx % TEXT_POSITIONS.len()],
        "textfont": {"size": 10, "color": color},
        "name": series.system,
        "hovertemplate": "Year %{x}<br>%{y:.1f}% of baseline ridership<extra></extra>"
    })
}

pub fn figure(series: &[SystemSeries], baseline_year: i32) -> Figure {
    let years: BTreeSet<i32> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.year))
        .collect();
    let (x_min, x_max) = match (years.first(), years.last()) {
        (Some(&first), Some(&last)) => (f64::from(first) - 0.5, f64::from(last) + 0.5),
        _ => (2018.5, 2024.5),
    };

    let mut layout = base_layout(
        "Dual System Degradation: Rail and Bus Ridership",
        format!("Annual Data | Normalized to {baseline_year} Baseline | Interactive Time Slider")
            .as_str(),
        600,
    );
    layout["margin"] = json!({"t": 150, "b": 120, "l": 80, "r": 80});
    layout["xaxis"] = json!({
        "title": {"text": "<b>Year</b>"},
        "range": [x_min, x_max],
        "showgrid": true, "gridcolor": "lightgray"
    });
    layout["yaxis"] = json!({
        "title": {"text": format!("<b>Ridership (% of {baseline_year} Baseline)</b>")},
        "range": [0, 120],
        "showgrid": true, "gridcolor": "lightgray"
    });
    layout["shapes"] = json!([dashed_line_shape("x", "y", x_min, x_max, 100.0, "gray", 2)]);
    layout["updatemenus"] = json!([{
        "type": "buttons",
        "showactive": false,
        "x": 0.1, "y": 1.15,
        "xanchor": "left", "yanchor": "top",
        "buttons": [
            {
                "label": "▶ Play",
                "method": "animate",
                "args": [null, {
                    "frame": {"duration": 800, "redraw": true},
                    "fromcurrent": true,
                    "mode": "immediate"
                }]
            },
            {
                "label": "⏸ Pause",
                "method": "animate",
                "args": [[null], {
                    "frame": {"duration": 0, "redraw": false},
                    "mode": "immediate"
                }]
            }
        ]
    }]);
    layout["sliders"] = json!([{
        "active": years.len().saturating_sub(1),
        "x": 0.05, "len": 0.9,
        "xanchor": "left", "y": -0.2, "yanchor": "top",
        "pad": {"b": 10, "t": 10},
        "currentvalue": {
            "prefix": "Year: ",
            "visible": true,
            "xanchor": "center",
            "font": {"size": 16}
        },
        "steps": years.iter().map(|year| json!({
            "label": year.to_string(),
            "method": "animate",
            "args": [[year.to_string()], {
                "frame": {"duration": 0, "redraw": true},
                "mode": "immediate"
            }]
        })).collect::<Vec<_>>()
    }]);

    let mut fig = Figure::new(layout);
    for (idx, s) in series.iter().enumerate() {
        fig.add_trace(series_trace(s, idx, None));
    }

    // One frame per year, each showing the series up to that year
    for &year in &years {
        let data: Vec<Value> = series
            .iter()
            .enumerate()
            .map(|(idx, s)| series_trace(s, idx, Some(year)))
            .collect();
        fig.add_frame(json!({"name": year.to_string(), "data": data}));
    }

    fig
}

pub fn render(series: &[SystemSeries], baseline_year: i32) -> Result<String> {
    let fig = figure(series, baseline_year);
    let caption = caption(series, baseline_year);
    super::template::render_page("Dual System Degradation", &caption, &fig)
}

fn caption(series: &[SystemSeries], baseline_year: i32) -> String {
    let mut lows = Vec::new();
    for s in series {
        if let Some(low) = s
            .points
            .iter()
            .min_by(|a, b| a.pct_of_baseline.total_cmp(&b.pct_of_baseline))
        {
            lows.push(format!(
                "{} bottomed out at {:.1}% of {} levels in {}",
                s.system, low.pct_of_baseline, baseline_year, low.year
            ));
        }
    }

    format!(
        "{}. The parallel collapse explains why more bus routes did not protect any station: \
         when both systems degrade at the same time, multimodal connections provide no backup. \
         Use the slider to watch the collapse and partial recovery year by year. All figures \
         are normalized to {} baseline levels for direct comparison.",
        lows.join("; "),
        baseline_year
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ridership::NormalizedPoint;

    fn series() -> Vec<SystemSeries> {
        vec![
            SystemSeries {
                system: "BART Berkeley Stations".into(),
                points: vec![
                    NormalizedPoint { year: 2019, pct_of_baseline: 100.0 },
                    NormalizedPoint { year: 2021, pct_of_baseline: 12.4 },
                    NormalizedPoint { year: 2024, pct_of_baseline: 35.0 },
                ],
            },
            SystemSeries {
                system: "AC Transit System".into(),
                points: vec![
                    NormalizedPoint { year: 2019, pct_of_baseline: 100.0 },
                    NormalizedPoint { year: 2021, pct_of_baseline: 28.0 },
                    NormalizedPoint { year: 2024, pct_of_baseline: 75.2 },
                ],
            },
        ]
    }

    #[test]
    fn test_figure_has_frames_per_year() {
        let fig = figure(&series(), 2019);
        assert_eq!(fig.data.len(), 2);
        assert_eq!(fig.frames.len(), 3);
        assert_eq!(fig.frames[0]["name"], "2019");
        // The 2021 frame holds only the first two points of each series
        assert_eq!(fig.frames[1]["data"][0]["x"], json!([2019, 2021]));
    }

    #[test]
    fn test_slider_steps_match_years() {
        let fig = figure(&series(), 2019);
        let steps = fig.layout["sliders"][0]["steps"].as_array().unwrap().len();
        assert_eq!(steps, 3);
    }

    #[test]
    fn test_caption_names_the_lows() {
        let text = caption(&series(), 2019);
        assert!(text.contains("12.4%"));
        assert!(text.contains("28.0%"));
    }
}
