//! The HTML shell around a figure.
//!
//! The template stays free of literal braces so nothing needs escaping; the
//! figure JSON and caption are injected unescaped.

use super::figure::Figure;
use anyhow::{Context, Result};
use serde::Serialize;
use tinytemplate::{TinyTemplate, format_unescaped};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="https://cdn.plot.ly/plotly-2.32.0.min.js" charset="utf-8"></script>
</head>
<body style="margin: 16px auto; max-width: 1200px; font-family: Arial, sans-serif;">
<div id="chart"></div>
<p style="font-size: 12px; color: #222222; background: rgba(255,255,255,0.95); border: 1px solid #999999; padding: 12px;">{caption}</p>
<script>
var figure = {figure};
Plotly.newPlot("chart", figure.data, figure.layout, figure.config);
if (figure.frames && figure.frames.length > 0) Plotly.addFrames("chart", figure.frames);
</script>
</body>
</html>
"#;

#[derive(Serialize)]
struct PageContext<'a> {
    title: &'a str,
    caption: &'a str,
    figure: String,
}

/// Renders a figure into a self-contained HTML page.
pub fn render_page(title: &str, caption: &str, figure: &Figure) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template("page", PAGE_TEMPLATE)
        .context("registering page template")?;

    let context = PageContext {
        title,
        caption,
        figure: serde_json::to_string(figure)?,
    };
    tt.render("page", &context).context("rendering HTML page")
}
