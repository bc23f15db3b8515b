//! `generate_chart`: render labelled data points as an SVG chart
//!
//! Charts are drawn on a 400x400 canvas with a title and a fixed palette.
//! Cartesian kinds (bar, line, scatter, bubble) share a value axis that
//! always includes zero; radial kinds (pie, doughnut, polarArea, radar)
//! require non-negative values. The result is stored on the thread's output
//! record as a `data:image/svg+xml;base64,…` URL, or written to `chart.svg`
//! when no thread is active.

use super::{parse_input, Tool};
use crate::error::{CohortError, Result};
use crate::store::OutputStore;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cohort_core::RunContext;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

const NAME: &str = "generate_chart";

/// Fallback file for runs without a thread id
pub const FALLBACK_CHART: &str = "chart.svg";

pub const PALETTE: [&str; 14] = [
    "#b91d47", "#00aba9", "#2b5797", "#e8c3b9", "#1e7145", "#ff5733", "#900c3f", "#581845",
    "#ffd700", "#4caf50", "#ff9800", "#2196f3", "#673ab7", "#ffeb3b",
];

const WIDTH: f64 = 400.0;
const HEIGHT: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Scatter,
    Bubble,
    Doughnut,
    PolarArea,
    Radar,
}

impl ChartKind {
    pub const ALL: [&'static str; 8] = [
        "bar", "line", "pie", "scatter", "bubble", "doughnut", "polarArea", "radar",
    ];

    fn is_radial(self) -> bool {
        matches!(
            self,
            ChartKind::Pie | ChartKind::Doughnut | ChartKind::PolarArea | ChartKind::Radar
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: Vec<DataPoint>,
}

impl ChartSpec {
    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(CohortError::invalid_input(NAME, "at least one data point is required"));
        }
        if let Some(bad) = self.data.iter().find(|d| !d.value.is_finite()) {
            return Err(CohortError::invalid_input(
                NAME,
                format!("value for '{}' is not a finite number", bad.label),
            ));
        }
        if self.kind.is_radial() {
            if let Some(neg) = self.data.iter().find(|d| d.value < 0.0) {
                return Err(CohortError::invalid_input(
                    NAME,
                    format!("{:?} charts need non-negative values; '{}' is {}", self.kind, neg.label, neg.value),
                ));
            }
            if self.data.iter().all(|d| d.value == 0.0) {
                return Err(CohortError::invalid_input(NAME, "all values are zero"));
            }
        }
        Ok(())
    }

    /// Validated SVG document
    pub fn render_svg(&self) -> Result<String> {
        self.validate()?;

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="Helvetica, Arial, sans-serif">"#,
            w = WIDTH,
            h = HEIGHT
        );
        let _ = write!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##);
        let _ = write!(
            svg,
            r##"<text x="{}" y="26" font-size="16" font-weight="bold" text-anchor="middle" fill="#333333">{}</text>"##,
            WIDTH / 2.0,
            escape(&self.title)
        );

        match self.kind {
            ChartKind::Bar | ChartKind::Line | ChartKind::Scatter | ChartKind::Bubble => {
                self.draw_cartesian(&mut svg)
            }
            ChartKind::Pie | ChartKind::Doughnut => self.draw_pie(&mut svg),
            ChartKind::PolarArea => self.draw_polar_area(&mut svg),
            ChartKind::Radar => self.draw_radar(&mut svg),
        }

        svg.push_str("</svg>");
        Ok(svg)
    }

    /// Rendered chart as a base64 `data:` URL
    pub fn render_data_url(&self) -> Result<String> {
        Ok(to_data_url(&self.render_svg()?))
    }

    fn draw_cartesian(&self, svg: &mut String) {
        let (left, top, width, height) = (50.0, 50.0, 320.0, 290.0);
        let values: Vec<f64> = self.data.iter().map(|d| d.value).collect();
        let max = values.iter().copied().fold(0.0_f64, f64::max);
        let min = values.iter().copied().fold(0.0_f64, f64::min);
        let range = if max - min == 0.0 { 1.0 } else { max - min };
        let y = |v: f64| top + (max - v) / range * height;
        let slot = width / self.data.len() as f64;
        let center = |i: usize| left + slot * (i as f64 + 0.5);

        let _ = write!(
            svg,
            r##"<line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="#999999"/><line x1="{l}" y1="{z:.1}" x2="{r}" y2="{z:.1}" stroke="#999999"/>"##,
            l = left,
            t = top,
            b = top + height,
            r = left + width,
            z = y(0.0)
        );
        for v in [max, min] {
            let _ = write!(
                svg,
                r##"<text x="{}" y="{:.1}" font-size="10" text-anchor="end" fill="#666666">{}</text>"##,
                left - 6.0,
                y(v) + 3.0,
                format_value(v)
            );
        }

        match self.kind {
            ChartKind::Bar => {
                for (i, point) in self.data.iter().enumerate() {
                    let (y0, y1) = (y(0.0), y(point.value));
                    let _ = write!(
                        svg,
                        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
                        left + slot * i as f64 + slot * 0.15,
                        y0.min(y1),
                        slot * 0.7,
                        (y0 - y1).abs(),
                        color(i)
                    );
                }
            }
            ChartKind::Line => {
                let points: Vec<String> = self
                    .data
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("{:.1},{:.1}", center(i), y(p.value)))
                    .collect();
                let _ = write!(
                    svg,
                    r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                    points.join(" "),
                    color(0)
                );
                for (i, p) in self.data.iter().enumerate() {
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{}"/>"#,
                        center(i),
                        y(p.value),
                        color(i)
                    );
                }
            }
            _ => {
                let max_abs = values.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
                for (i, p) in self.data.iter().enumerate() {
                    let r = if self.kind == ChartKind::Bubble && max_abs > 0.0 {
                        4.0 + 16.0 * p.value.abs() / max_abs
                    } else {
                        4.0
                    };
                    let _ = write!(
                        svg,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}" fill-opacity="0.8"/>"#,
                        center(i),
                        y(p.value),
                        r,
                        color(i)
                    );
                }
            }
        }

        for (i, p) in self.data.iter().enumerate() {
            let _ = write!(
                svg,
                r##"<text x="{:.1}" y="{}" font-size="10" text-anchor="middle" fill="#333333">{}</text>"##,
                center(i),
                top + height + 16.0,
                escape(&p.label)
            );
        }
    }

    fn draw_legend(&self, svg: &mut String) {
        for (i, p) in self.data.iter().enumerate() {
            let row = 48.0 + 14.0 * i as f64;
            let _ = write!(
                svg,
                r##"<rect x="8" y="{:.1}" width="10" height="10" fill="{}"/><text x="22" y="{:.1}" font-size="10" fill="#333333">{}</text>"##,
                row,
                color(i),
                row + 9.0,
                escape(&p.label)
            );
        }
    }

    fn draw_pie(&self, svg: &mut String) {
        let (cx, cy, r) = (240.0, 225.0, 140.0);
        let total: f64 = self.data.iter().map(|d| d.value).sum();
        let mut angle = -PI / 2.0;

        for (i, p) in self.data.iter().enumerate() {
            let sweep = p.value / total * 2.0 * PI;
            if sweep >= 2.0 * PI - 1e-9 {
                let _ = write!(
                    svg,
                    r#"<circle cx="{cx}" cy="{cy}" r="{r}" fill="{}"/>"#,
                    color(i)
                );
            } else if sweep > 0.0 {
                let _ = write!(svg, r#"<path d="{}" fill="{}"/>"#, sector(cx, cy, r, angle, sweep), color(i));
            }
            angle += sweep;
        }

        if self.kind == ChartKind::Doughnut {
            let _ = write!(
                svg,
                r##"<circle cx="{cx}" cy="{cy}" r="{:.1}" fill="#ffffff"/>"##,
                r * 0.5
            );
        }
        self.draw_legend(svg);
    }

    fn draw_polar_area(&self, svg: &mut String) {
        let (cx, cy, r) = (240.0, 225.0, 140.0);
        let max = self.data.iter().map(|d| d.value).fold(0.0_f64, f64::max);
        let sweep = 2.0 * PI / self.data.len() as f64;

        for (i, p) in self.data.iter().enumerate() {
            let radius = r * p.value / max;
            if radius <= 0.0 {
                continue;
            }
            let start = -PI / 2.0 + sweep * i as f64;
            if self.data.len() == 1 {
                let _ = write!(svg, r#"<circle cx="{cx}" cy="{cy}" r="{radius:.1}" fill="{}"/>"#, color(i));
            } else {
                let _ = write!(
                    svg,
                    r#"<path d="{}" fill="{}" fill-opacity="0.75"/>"#,
                    sector(cx, cy, radius, start, sweep),
                    color(i)
                );
            }
        }
        self.draw_legend(svg);
    }

    fn draw_radar(&self, svg: &mut String) {
        let (cx, cy, r) = (200.0, 220.0, 130.0);
        let n = self.data.len();
        let max = self.data.iter().map(|d| d.value).fold(0.0_f64, f64::max);
        let spoke = |i: usize| -PI / 2.0 + 2.0 * PI * i as f64 / n as f64;

        let mut outline = Vec::with_capacity(n);
        let mut shape = Vec::with_capacity(n);
        for (i, p) in self.data.iter().enumerate() {
            let a = spoke(i);
            let (ex, ey) = (cx + r * a.cos(), cy + r * a.sin());
            let _ = write!(
                svg,
                r##"<line x1="{cx}" y1="{cy}" x2="{ex:.1}" y2="{ey:.1}" stroke="#cccccc"/><text x="{:.1}" y="{:.1}" font-size="10" text-anchor="middle" fill="#333333">{}</text>"##,
                cx + (r + 14.0) * a.cos(),
                cy + (r + 14.0) * a.sin() + 3.0,
                escape(&p.label)
            );
            outline.push(format!("{ex:.1},{ey:.1}"));
            let radius = r * p.value / max;
            shape.push(format!("{:.1},{:.1}", cx + radius * a.cos(), cy + radius * a.sin()));
        }

        let _ = write!(
            svg,
            r##"<polygon points="{}" fill="none" stroke="#cccccc"/><polygon points="{}" fill="{}" fill-opacity="0.4" stroke="{}" stroke-width="2"/>"##,
            outline.join(" "),
            shape.join(" "),
            color(0),
            color(0)
        );
    }
}

fn color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}

/// SVG path of a circular sector starting at `start` radians
fn sector(cx: f64, cy: f64, r: f64, start: f64, sweep: f64) -> String {
    let end = start + sweep;
    let large = if sweep > PI { 1 } else { 0 };
    format!(
        "M {cx:.1} {cy:.1} L {:.1} {:.1} A {r:.1} {r:.1} 0 {large} 1 {:.1} {:.1} Z",
        cx + r * start.cos(),
        cy + r * start.sin(),
        cx + r * end.cos(),
        cy + r * end.sin()
    )
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn to_data_url(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// Base64 payload of a `data:` URL
pub fn data_url_payload(url: &str) -> Option<&str> {
    url.split_once("base64,").map(|(_, payload)| payload)
}

pub struct ChartTool {
    store: Arc<dyn OutputStore>,
    workdir: PathBuf,
}

impl ChartTool {
    pub fn new(store: Arc<dyn OutputStore>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Tool for ChartTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Generates a chart (bar, line, pie, scatter, bubble, doughnut, polarArea or radar) \
         from an array of data points. Each data point has a label (e.g. 'January', 'Sales') \
         and a numeric value (e.g. 100, 250)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title displayed at the top of the chart, e.g. 'Monthly Revenue'."
                },
                "type": {
                    "type": "string",
                    "enum": ChartKind::ALL,
                    "description": "The type of chart to generate."
                },
                "data": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "label": {"type": "string", "description": "Label of the data point."},
                            "value": {"type": "number", "description": "Numeric value of the data point."}
                        },
                        "required": ["label", "value"]
                    }
                }
            },
            "required": ["title", "type", "data"]
        })
    }

    async fn execute(&self, input: Value, ctx: &RunContext) -> Result<String> {
        let spec: ChartSpec = parse_input(NAME, input)?;
        let svg = spec.render_svg()?;

        match ctx.thread_id() {
            Some(thread_id) => {
                self.store.update_chart(thread_id, &to_data_url(&svg)).await?;
                tracing::info!(thread_id, kind = ?spec.kind, points = spec.data.len(), "Chart stored");
                Ok(format!(
                    "Chart '{}' ({:?}, {} data points) was generated and saved for thread {}.",
                    spec.title,
                    spec.kind,
                    spec.data.len(),
                    thread_id
                ))
            }
            None => {
                let path = self.workdir.join(FALLBACK_CHART);
                tokio::fs::write(&path, &svg).await?;
                tracing::warn!(path = %path.display(), "No thread id; chart kept locally");
                Ok(format!(
                    "Chart '{}' was generated and written to {}.",
                    spec.title,
                    path.display()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryOutputStore;

    fn spec(kind: ChartKind, values: &[f64]) -> ChartSpec {
        ChartSpec {
            title: "Sales <2024>".into(),
            kind,
            data: values
                .iter()
                .enumerate()
                .map(|(i, v)| DataPoint {
                    label: format!("Q{}", i + 1),
                    value: *v,
                })
                .collect(),
        }
    }

    #[test]
    fn test_input_parsing() {
        let raw = json!({
            "title": "Support",
            "type": "polarArea",
            "data": [{"label": "For", "value": 52}, {"label": "Against", "value": 41.5}]
        });
        let parsed: ChartSpec = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.kind, ChartKind::PolarArea);
        assert_eq!(parsed.data[1].value, 41.5);

        let unknown = serde_json::from_value::<ChartSpec>(json!({"title": "t", "type": "gantt", "data": []}));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_bar_chart_svg() {
        let svg = spec(ChartKind::Bar, &[10.0, 25.0, 5.0]).render_svg().unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<rect x=").count(), 3);
        assert!(svg.contains("Sales &lt;2024&gt;"));
        assert!(svg.contains(PALETTE[0]) && svg.contains(PALETTE[2]));
    }

    #[test]
    fn test_every_kind_renders() {
        for kind in ChartKind::ALL {
            let kind: ChartKind = serde_json::from_value(json!(kind)).unwrap();
            let svg = spec(kind, &[3.0, 1.0, 2.0]).render_svg().unwrap();
            assert!(svg.contains("</svg>"), "{kind:?}");
        }
    }

    #[test]
    fn test_single_slice_pie() {
        let svg = spec(ChartKind::Pie, &[7.0]).render_svg().unwrap();
        assert!(svg.contains("<circle cx=\"240\" cy=\"225\" r=\"140\""));
    }

    #[test]
    fn test_validation() {
        assert!(spec(ChartKind::Bar, &[]).validate().is_err());
        assert!(spec(ChartKind::Line, &[1.0, f64::NAN]).validate().is_err());
        assert!(spec(ChartKind::Pie, &[3.0, -1.0]).validate().is_err());
        assert!(spec(ChartKind::Doughnut, &[0.0, 0.0]).validate().is_err());
        assert!(spec(ChartKind::Bar, &[3.0, -1.0]).validate().is_ok());
    }

    #[test]
    fn test_data_url() {
        let url = to_data_url("<svg/>");
        assert!(url.starts_with("data:image/svg+xml;base64,"));
        let payload = data_url_payload(&url).unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), b"<svg/>");
        assert!(data_url_payload("not a data url").is_none());
    }

    #[tokio::test]
    async fn test_tool_stores_chart_on_thread() {
        let store = Arc::new(InMemoryOutputStore::new());
        store.ensure("4242").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let tool = ChartTool::new(store.clone(), dir.path());

        let reply = tool
            .execute(
                json!({"title": "Votes", "type": "pie", "data": [{"label": "A", "value": 3}, {"label": "B", "value": 1}]}),
                &RunContext::for_thread("4242"),
            )
            .await
            .unwrap();
        assert!(reply.contains("thread 4242"));

        let chart = store.read("4242").await.unwrap().unwrap().chart.unwrap();
        assert!(chart.starts_with("data:image/svg+xml;base64,"));
    }

    #[tokio::test]
    async fn test_tool_without_thread_writes_file() {
        let store = Arc::new(InMemoryOutputStore::new());
        let dir = tempfile::tempdir().unwrap();
        let tool = ChartTool::new(store.clone(), dir.path());

        tool.execute(
            json!({"title": "Votes", "type": "bar", "data": [{"label": "A", "value": 3}]}),
            &RunContext::standalone(),
        )
        .await
        .unwrap();

        let svg = std::fs::read_to_string(dir.path().join(FALLBACK_CHART)).unwrap();
        assert!(svg.contains("Votes"));
        assert!(store.is_empty());
    }
}
