//! A minimal Plotly figure model.
//!
//! Charts are emitted as figure JSON (traces, layout, optional animation
//! frames) and embedded into a static HTML shell; the browser does the
//! rendering. The model stays schemaless (`serde_json::Value`) because
//! Plotly's trace vocabulary is large and the charts only touch a corner of
//! it.

use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<Value>,
    pub config: Value,
}

impl Figure {
    pub fn new(layout: Value) -> Self {
        Self {
            data: Vec::new(),
            layout,
            frames: Vec::new(),
            config: json!({"responsive": true, "displaylogo": false}),
        }
    }

    pub fn add_trace(&mut self, trace: Value) -> &mut Self {
        self.data.push(trace);
        self
    }

    pub fn add_frame(&mut self, frame: Value) -> &mut Self {
        self.frames.push(frame);
        self
    }
}

/// Shared layout scaffold: centered bold title with a `<sub>` second line.
pub fn base_layout(title: &str, subtitle: &str, height: u32) -> Value {
    json!({
        "title": {
            "text": format!("<b>{title}</b><br><sub>{subtitle}</sub>"),
            "x": 0.5,
            "xanchor": "center",
            "font": {"size": 16}
        },
        "height": height,
        "margin": {"t": 110, "b": 60, "l": 80, "r": 80},
        "showlegend": true,
        "legend": {
            "bgcolor": "rgba(255,255,255,0.95)",
            "bordercolor": "black",
            "borderwidth": 1,
            "font": {"size": 11}
        }
    })
}

/// A line+marker scatter trace with per-point text labels.
pub fn labeled_line(
    x: &[i32],
    y: &[f64],
    name: &str,
    color: &str,
    text_position: &str,
) -> Value {
    json!({
        "type": "scatter",
        "x": x,
        "y": y,
        "mode": "lines+markers+text",
        "line": {"color": color, "width": 4},
        "marker": {"size": 12, "color": color},
        "text": y.iter().map(|v| format!("{v:.1}%")).collect::<Vec<_>>(),
        "textposition": text_position,
        "textfont": {"size": 10, "color": color},
        "name": name
    })
}

/// A horizontal dashed reference line in data coordinates.
pub fn dashed_line_shape(
    xref: &str,
    yref: &str,
    x0: f64,
    x1: f64,
    y: f64,
    color: &str,
    width: u32,
) -> Value {
    json!({
        "type": "line",
        "xref": xref, "yref": yref,
        "x0": x0, "x1": x1, "y0": y, "y1": y,
        "line": {"color": color, "width": width, "dash": "dash"}
    })
}

/// A panel heading rendered as a paper-coordinate annotation, the subplot
/// title convention.
pub fn panel_title(text: &str, y: f64) -> Value {
    json!({
        "text": format!("<b>{text}</b>"),
        "xref": "paper", "yref": "paper",
        "x": 0.5, "y": y,
        "xanchor": "center", "yanchor": "bottom",
        "showarrow": false,
        "font": {"size": 13}
    })
}

/// An arrowed callout anchored to a data point.
pub fn callout(
    xref: &str,
    yref: &str,
    x: f64,
    y: f64,
    text: &str,
    color: &str,
    ax: i32,
    ay: i32,
) -> Value {
    json!({
        "x": x, "y": y,
        "xref": xref, "yref": yref,
        "text": format!("<b>{text}</b>"),
        "showarrow": true,
        "arrowhead": 2,
        "arrowcolor": color,
        "font": {"size": 10, "color": color},
        "ax": ax, "ay": ay
    })
}
