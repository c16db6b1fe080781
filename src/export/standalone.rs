//! Self-contained HTML document rebuilt from the report model.
//!
//! Charts are redrawn in the browser by Chart.js from configurations produced
//! by [`chart::resolve`], so labels, colors, ticks and data labels match the
//! terminal view exactly.

use crate::chart::{self, ChartRenderSpec, LegendPolicy};
use crate::format::{format_compact, format_grouped, report_date};
use crate::markdown::{escape_html, to_html};
use crate::report::{ChartKind, ReportModel};
use serde_json::{json, Value};
use std::fmt::Write as _;

const CHART_JS: &str = "https://cdn.jsdelivr.net/npm/chart.js@4";
const DATALABELS_JS: &str = "https://cdn.jsdelivr.net/npm/chartjs-plugin-datalabels@2";
const TAILWIND_JS: &str = "https://cdn.tailwindcss.com";

const STYLE: &str = r#"
    body { font-family: 'Inter', 'Noto Sans JP', sans-serif; background-color: #f8fafc; }
    .prose-ai { font-size: 1rem; line-height: 1.8; color: #334155; }
    .prose-ai h1 { font-size: 1.75rem; font-weight: 900; margin: 2rem 0 1.25rem; color: #1e3a8a; border-left: 6px solid #2563eb; padding-left: 1rem; }
    .prose-ai h2 { font-size: 1.4rem; font-weight: 800; margin: 1.5rem 0 1rem; color: #1e40af; border-bottom: 2px solid #e2e8f0; padding-bottom: 0.5rem; }
    .prose-ai h3 { font-size: 1.2rem; font-weight: 800; margin: 1.25rem 0 0.75rem; color: #2563eb; }
    .prose-ai strong { color: #1e3a8a; font-weight: 800; }
    .prose-ai ul { list-style-type: disc; margin-left: 1.5rem; margin-bottom: 1.5rem; }
    .prose-ai ol { list-style-type: decimal; margin-left: 1.5rem; margin-bottom: 1.5rem; }
    .prose-ai li { margin-bottom: 0.5rem; }
    .prose-ai table { border-collapse: collapse; margin-bottom: 1.5rem; }
    .prose-ai th, .prose-ai td { border: 1px solid #e2e8f0; padding: 0.25rem 0.75rem; }
    .insight p { margin: 0; }
"#;

// Attaches the precomputed tick and data labels; Chart.js cannot take them
// as plain data.
const BOOT_SCRIPT: &str = r#"
    Chart.register(ChartDataLabels);
    for (const c of CHARTS) {
      const cfg = c.config;
      cfg.options.plugins.datalabels.formatter = (_v, ctx) => c.valueLabels[ctx.dataIndex];
      if (c.ticks) {
        const eps = cfg.options.scales.y.ticks.stepSize * 1e-6;
        cfg.options.scales.y.ticks.callback = v => {
          const t = c.ticks.find(t => Math.abs(t.value - v) <= eps);
          return t ? t.label : '';
        };
      }
      new Chart(document.getElementById('chart-' + c.id), cfg);
    }
"#;

/// Render the full HTML document for `report`.
pub fn render_html(report: &ReportModel) -> String {
    let job_id = report.job_id().unwrap_or("-");
    let specs: Vec<ChartRenderSpec> = report
        .charts()
        .map(|entry| chart::resolve(entry.spec, entry.data))
        .collect();

    let mut html = String::with_capacity(16 * 1024);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
  <meta charset="UTF-8">
  <title>Majin Analysis Report - {id}</title>
  <script src="{TAILWIND_JS}"></script>
  <script src="{CHART_JS}"></script>
  <script src="{DATALABELS_JS}"></script>
  <style>{STYLE}  </style>
</head>
<body class="p-10">
  <div class="max-w-6xl mx-auto space-y-8">
    <div class="bg-white p-12 rounded-[2.5rem] shadow-2xl border border-slate-100">
      <div class="flex items-center justify-between mb-12 border-b-4 border-blue-600 pb-6">
        <h1 class="text-4xl font-black text-slate-800 tracking-tighter">MAJIN <span class="text-blue-600">STRATEGIC REPORT</span></h1>
        <div class="text-right text-sm text-slate-400 font-bold">ID: {id}<br>DATE: {date}</div>
      </div>
"#,
        id = escape_html(job_id),
        date = escape_html(&report_date(report.processed_at())),
    );

    html.push_str("      <div class=\"grid grid-cols-2 md:grid-cols-5 gap-4 mb-8\">\n");
    push_card(&mut html, "ROWS", &format_grouped(report.total_rows() as f64));
    for (key, value) in report.metrics() {
        let shown = format!("¥{}", format_compact(Some(value)));
        push_card(&mut html, report.metric_label(key), &shown);
    }
    html.push_str("      </div>\n");

    html.push_str("      <div class=\"grid grid-cols-1 md:grid-cols-2 gap-6 mb-12\">\n");
    for spec in &specs {
        push_chart_card(&mut html, spec, report.insight(&spec.id));
    }
    html.push_str("      </div>\n");

    let _ = write!(
        html,
        r#"      <div class="bg-blue-600 px-8 py-4 rounded-t-3xl">
        <h2 class="text-white font-black tracking-tight m-0">AI STRATEGIC INSIGHT REPORT</h2>
      </div>
      <div class="p-10 prose-ai border border-blue-100 rounded-b-3xl bg-white">
{report_html}      </div>
      <div class="mt-16 pt-8 border-t border-slate-100 text-center">
        <p class="text-xs font-black text-slate-300 tracking-[0.2em] uppercase">Generated by Majin Analytics Platform</p>
      </div>
    </div>
  </div>
  <script>
    const CHARTS = {charts};
{BOOT_SCRIPT}  </script>
</body>
</html>
"#,
        report_html = to_html(report.ai_report()),
        charts = script_json(&Value::Array(specs.iter().map(chart_entry).collect())),
    );
    html
}

fn push_card(html: &mut String, label: &str, value: &str) {
    let _ = write!(
        html,
        r#"        <div class="bg-white p-5 rounded-2xl border border-slate-200 shadow-sm">
          <p class="text-slate-400 text-[10px] font-black uppercase tracking-widest mb-1">{}</p>
          <p class="text-2xl font-black text-slate-800">{}</p>
        </div>
"#,
        escape_html(label),
        escape_html(value),
    );
}

fn push_chart_card(html: &mut String, spec: &ChartRenderSpec, insight: Option<&str>) {
    let _ = write!(
        html,
        r#"        <div class="bg-white p-5 rounded-2xl border border-slate-200 shadow-sm flex flex-col">
          <h3 class="text-sm font-bold text-slate-700 mb-4">{title}</h3>
          <div class="relative w-full h-[300px] mb-4"><canvas id="chart-{id}"></canvas></div>
"#,
        title = escape_html(&spec.title),
        id = escape_html(&spec.id),
    );
    if let Some(text) = insight {
        let _ = write!(
            html,
            "          <div class=\"insight mt-auto bg-slate-50 p-3 rounded-xl border border-slate-100 text-xs text-slate-600 leading-relaxed\">\n{}          </div>\n",
            to_html(text)
        );
    }
    html.push_str("        </div>\n");
}

/// One entry of the `CHARTS` array: the Chart.js configuration plus the
/// labels the boot script wires into formatter callbacks.
fn chart_entry(spec: &ChartRenderSpec) -> Value {
    json!({
        "id": spec.id,
        "config": chart_config(spec),
        "valueLabels": spec.value_labels,
        "ticks": spec.value_axis.as_ref().map(|axis| &axis.ticks),
    })
}

pub(crate) fn chart_config(spec: &ChartRenderSpec) -> Value {
    let background: Value = match spec.kind {
        ChartKind::Bar | ChartKind::Line => json!(spec.colors.color_at(0)),
        ChartKind::Pie | ChartKind::Doughnut => json!((0..spec.labels.len())
            .map(|i| spec.colors.color_at(i))
            .collect::<Vec<_>>()),
    };
    // Non-finite values have no JSON form; Chart.js skips nulls.
    let values: Vec<Value> = spec
        .values
        .iter()
        .map(|v| if v.is_finite() { json!(v) } else { Value::Null })
        .collect();

    let mut options = json!({
        "responsive": true,
        "maintainAspectRatio": false,
        "plugins": {
            "legend": {
                "display": spec.legend == LegendPolicy::Side,
                "position": "right",
            },
            "datalabels": {
                "color": "#334155",
                "anchor": "end",
                "align": if spec.has_axes() { "top" } else { "center" },
                "font": { "weight": "bold", "size": 10 },
            },
        },
    });
    if let Some(axis) = &spec.value_axis {
        let step = axis.step;
        options["scales"] = json!({
            "y": {
                "min": axis.min(),
                "max": axis.max(),
                "ticks": { "stepSize": step },
            },
        });
    }

    json!({
        "type": spec.kind.as_str(),
        "data": {
            "labels": spec.labels,
            "datasets": [{
                "label": spec.title,
                "data": values,
                "backgroundColor": background,
                "borderColor": spec.border_color,
                "borderWidth": spec.border_width,
            }],
        },
        "options": options,
    })
}

/// Serialize JSON for inline `<script>` use. `<` is escaped so no string
/// content can close the script element.
fn script_json(value: &Value) -> String {
    value.to_string().replace('<', "\\u003c")
}
