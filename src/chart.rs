//! Renderer-agnostic chart configuration.
//!
//! `resolve` is the only place that decides labels, colors, legend, axis ticks
//! and data-point text for a chart. The terminal view and the HTML export both
//! render from its output.

use crate::format::format_compact;
use crate::report::{ChartKind, ChartSpec, SeriesData};
use serde::Serialize;

/// Series color for bar and line charts.
pub const ACCENT_COLOR: &str = "#2563eb";

/// Cyclic per-category palette for pie and doughnut charts.
pub const CATEGORY_PALETTE: [&str; 8] = [
    "#2563eb", "#0ea5e9", "#06b6d4", "#14b8a6", "#10b981", "#84cc16", "#eab308", "#f97316",
];

pub const BORDER_WIDTH: u32 = 1;

/// Roughly how many intervals the value axis is split into.
const TARGET_TICK_INTERVALS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColorPolicy {
    /// One color for the whole series.
    Single(&'static str),
    /// One color per category, in label order.
    PerCategory(Vec<&'static str>),
}

impl ColorPolicy {
    /// Color of the category at `index`.
    pub fn color_at(&self, index: usize) -> &'static str {
        match self {
            ColorPolicy::Single(c) => *c,
            ColorPolicy::PerCategory(colors) => colors
                .get(index)
                .copied()
                .unwrap_or(CATEGORY_PALETTE[index % CATEGORY_PALETTE.len()]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendPolicy {
    Hidden,
    /// Visible, positioned to the right of the plot.
    Side,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub value: f64,
    pub label: String,
}

/// Value axis of a cartesian chart. Always begins at (or includes) zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAxis {
    /// Distance between neighbouring ticks.
    pub step: f64,
    pub ticks: Vec<Tick>,
}

impl ValueAxis {
    pub fn min(&self) -> f64 {
        self.ticks.first().map(|t| t.value).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.ticks.last().map(|t| t.value).unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRenderSpec {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Data-point text, one per value.
    pub value_labels: Vec<String>,
    pub colors: ColorPolicy,
    pub border_color: &'static str,
    pub border_width: u32,
    pub legend: LegendPolicy,
    /// `None` for charts without axes.
    pub value_axis: Option<ValueAxis>,
}

impl ChartRenderSpec {
    pub fn has_axes(&self) -> bool {
        self.value_axis.is_some()
    }

    /// Sum of the series, used for share percentages in radial charts.
    pub fn total(&self) -> f64 {
        self.values.iter().filter(|v| v.is_finite()).sum()
    }
}

/// Resolve a chart spec and its ordered data into a render configuration.
pub fn resolve(spec: &ChartSpec, data: &SeriesData) -> ChartRenderSpec {
    let labels: Vec<String> = data.keys().cloned().collect();
    let values: Vec<f64> = data.values().copied().collect();
    let value_labels = values.iter().map(|v| format_compact(Some(*v))).collect();

    let (colors, legend, value_axis) = match spec.kind {
        ChartKind::Bar | ChartKind::Line => cartesian(&values),
        ChartKind::Pie | ChartKind::Doughnut => radial(labels.len()),
    };

    ChartRenderSpec {
        id: spec.id.clone(),
        title: spec.title.clone(),
        kind: spec.kind,
        labels,
        values,
        value_labels,
        colors,
        border_color: ACCENT_COLOR,
        border_width: BORDER_WIDTH,
        legend,
        value_axis,
    }
}

fn cartesian(values: &[f64]) -> (ColorPolicy, LegendPolicy, Option<ValueAxis>) {
    (
        ColorPolicy::Single(ACCENT_COLOR),
        LegendPolicy::Hidden,
        Some(axis(values)),
    )
}

fn radial(categories: usize) -> (ColorPolicy, LegendPolicy, Option<ValueAxis>) {
    let colors = (0..categories)
        .map(|i| CATEGORY_PALETTE[i % CATEGORY_PALETTE.len()])
        .collect();
    (ColorPolicy::PerCategory(colors), LegendPolicy::Side, None)
}

/// Evenly spaced ticks covering zero and every finite value.
fn axis(values: &[f64]) -> ValueAxis {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((0.0f64, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    if span <= 0.0 {
        return ValueAxis {
            step: 1.0,
            ticks: [0.0, 1.0].into_iter().map(tick).collect(),
        };
    }
    let step = nice_step(span / TARGET_TICK_INTERVALS);
    let start = (lo / step).floor() * step;
    let end = (hi / step).ceil() * step;
    let intervals = ((end - start) / step).round() as usize;
    // Ticks are snapped to the step's decimal places, the same rounding
    // Chart.js applies to the ticks it generates.
    let scale = 10f64.powi(step_decimals(step));
    let ticks = (0..=intervals)
        .map(|i| tick(((start + i as f64 * step) * scale).round() / scale))
        .collect();
    ValueAxis { step, ticks }
}

/// Decimal places needed to write `step` exactly; zero for whole steps.
fn step_decimals(step: f64) -> i32 {
    (-step.log10().floor() as i32).max(0)
}

fn tick(value: f64) -> Tick {
    Tick {
        value,
        label: format_compact(Some(value)),
    }
}

/// Round a raw step up to 1, 2 or 5 times a power of ten.
fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let normalized = raw / magnitude;
    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn spec(kind: ChartKind) -> ChartSpec {
        ChartSpec {
            id: "g1".into(),
            title: "Sales".into(),
            kind,
            extra: Map::new(),
        }
    }

    fn data(pairs: &[(&str, f64)]) -> SeriesData {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn labels_keep_mapping_order() {
        let d = data(&[("zeta", 1.0), ("alpha", 30_000.0), ("mid", 2.0)]);
        let r = resolve(&spec(ChartKind::Bar), &d);
        assert_eq!(r.labels, ["zeta", "alpha", "mid"]);
        assert_eq!(r.values, [1.0, 30_000.0, 2.0]);
        assert_eq!(r.value_labels, ["1", "3万", "2"]);
    }

    #[test]
    fn cartesian_charts_use_accent_and_zero_based_axis() {
        let d = data(&[("a", 120.0), ("b", 480.0)]);
        for kind in [ChartKind::Bar, ChartKind::Line] {
            let r = resolve(&spec(kind), &d);
            assert_eq!(r.colors, ColorPolicy::Single(ACCENT_COLOR));
            assert_eq!(r.legend, LegendPolicy::Hidden);
            let axis = r.value_axis.as_ref().unwrap();
            assert_eq!(axis.min(), 0.0);
            assert!(axis.max() >= 480.0);
            let labels: Vec<&str> = axis.ticks.iter().map(|t| t.label.as_str()).collect();
            assert_eq!(labels, ["0", "100", "200", "300", "400", "500"]);
        }
    }

    #[test]
    fn radial_charts_cycle_palette_and_show_side_legend() {
        let pairs: Vec<(String, f64)> = (0..10).map(|i| (format!("c{i}"), 1.0)).collect();
        let d: SeriesData = pairs.into_iter().collect();
        for kind in [ChartKind::Pie, ChartKind::Doughnut] {
            let r = resolve(&spec(kind), &d);
            assert!(!r.has_axes());
            assert_eq!(r.legend, LegendPolicy::Side);
            assert_eq!(r.colors.color_at(0), CATEGORY_PALETTE[0]);
            assert_eq!(r.colors.color_at(8), CATEGORY_PALETTE[0]);
            assert_eq!(r.colors.color_at(9), CATEGORY_PALETTE[1]);
        }
    }

    #[test]
    fn ticks_cover_negative_values() {
        let d = data(&[("a", -30.0), ("b", 70.0)]);
        let r = resolve(&spec(ChartKind::Bar), &d);
        let axis = r.value_axis.unwrap();
        assert!(axis.min() <= -30.0);
        assert!(axis.max() >= 70.0);
        assert!(axis.ticks.iter().any(|t| t.value == 0.0));
    }

    #[test]
    fn fractional_ticks_are_exact_decimals() {
        let r = resolve(&spec(ChartKind::Bar), &data(&[("a", 0.9)]));
        let axis = r.value_axis.unwrap();
        assert_eq!(axis.step, 0.2);
        let values: Vec<f64> = axis.ticks.iter().map(|t| t.value).collect();
        assert_eq!(values, [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        let labels: Vec<&str> = axis.ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, ["0", "0.2", "0.4", "0.6", "0.8", "1"]);

        let r = resolve(&spec(ChartKind::Line), &data(&[("a", 0.07), ("b", 0.031)]));
        let values: Vec<f64> = r.value_axis.unwrap().ticks.iter().map(|t| t.value).collect();
        assert_eq!(values, [0.0, 0.02, 0.04, 0.06, 0.08]);
    }

    #[test]
    fn flat_series_gets_unit_axis() {
        let r = resolve(&spec(ChartKind::Line), &data(&[("a", 0.0)]));
        let ticks: Vec<f64> = r.value_axis.unwrap().ticks.iter().map(|t| t.value).collect();
        assert_eq!(ticks, [0.0, 1.0]);
    }

    #[test]
    fn large_ticks_are_compact() {
        let r = resolve(&spec(ChartKind::Bar), &data(&[("a", 480_000_000.0)]));
        let axis = r.value_axis.unwrap();
        assert_eq!(axis.ticks.last().unwrap().label, "5.0億");
    }
}
