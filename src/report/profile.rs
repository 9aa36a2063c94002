use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotters::prelude::*;

use super::charts::draw_histogram;
use crate::color::diverging;
use crate::data::model::{Cell, ColumnType, RecordTable};
use crate::stats::{self, CorrelationMatrix, NumericSummary};

const MISSING_ALERT_PCT: f64 = 5.0;
const ZEROS_ALERT_PCT: f64 = 10.0;
const CORRELATION_ALERT: f64 = 0.9;
const TOP_VALUES: usize = 10;
const SAMPLE_ROWS: usize = 10;
const HISTOGRAM_BINS: usize = 20;

// ---------------------------------------------------------------------------
// Column profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ColumnDetail {
    Numeric {
        summary: NumericSummary,
        zeros: usize,
        negatives: usize,
        /// Inline SVG histogram.
        histogram: String,
    },
    Categorical {
        top: Vec<(String, usize)>,
    },
}

#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: ColumnType,
    pub distinct: usize,
    pub missing: usize,
    pub missing_pct: f64,
    pub detail: ColumnDetail,
}

impl ColumnProfile {
    fn build(table: &RecordTable, idx: usize) -> Result<Self> {
        let column = &table.columns[idx];
        let missing = table.null_count(idx);
        let detail = if column.dtype.is_numeric() {
            let values: Vec<f64> = table.column_cells(idx).filter_map(Cell::as_f64).collect();
            ColumnDetail::Numeric {
                summary: NumericSummary::from_values(&values),
                zeros: values.iter().filter(|v| **v == 0.0).count(),
                negatives: values.iter().filter(|v| **v < 0.0).count(),
                histogram: histogram_svg(&values)
                    .with_context(|| format!("histogram of {}", column.name))?,
            }
        } else {
            ColumnDetail::Categorical {
                top: stats::value_counts(table.column_cells(idx))
                    .into_iter()
                    .take(TOP_VALUES)
                    .map(|(value, n)| (value.to_string(), n))
                    .collect(),
            }
        };

        Ok(ColumnProfile {
            name: column.name.clone(),
            dtype: column.dtype,
            distinct: stats::distinct_count(table.column_cells(idx)),
            missing,
            missing_pct: super::console::missing_percent(table, idx),
            detail,
        })
    }
}

fn histogram_svg(values: &[f64]) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (420, 220)).into_drawing_area();
        root.fill(&WHITE)?;
        draw_histogram(&root, values, HISTOGRAM_BINS, "", "")?;
        root.present()?;
    }
    Ok(svg)
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Missing { column: String, pct: f64 },
    Constant { column: String },
    Unique { column: String },
    Zeros { column: String, pct: f64 },
    HighCorrelation { left: String, right: String, r: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Missing { column, pct } => {
                write!(f, "{column} has {pct:.1}% missing values")
            }
            Alert::Constant { column } => write!(f, "{column} has a constant value"),
            Alert::Unique { column } => write!(f, "{column} has all distinct values"),
            Alert::Zeros { column, pct } => write!(f, "{column} has {pct:.1}% zeros"),
            Alert::HighCorrelation { left, right, r } => {
                write!(f, "{left} is highly correlated with {right} (r = {r:.2})")
            }
        }
    }
}

fn collect_alerts(
    rows: usize,
    columns: &[ColumnProfile],
    corr: &CorrelationMatrix,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for col in columns {
        if col.missing_pct > MISSING_ALERT_PCT {
            alerts.push(Alert::Missing {
                column: col.name.clone(),
                pct: col.missing_pct,
            });
        }
        if rows > 0 && col.distinct == 1 {
            alerts.push(Alert::Constant {
                column: col.name.clone(),
            });
        }
        if rows > 1 && col.distinct == rows {
            alerts.push(Alert::Unique {
                column: col.name.clone(),
            });
        }
        if let ColumnDetail::Numeric { zeros, .. } = &col.detail {
            let pct = if rows == 0 {
                0.0
            } else {
                *zeros as f64 / rows as f64 * 100.0
            };
            if pct > ZEROS_ALERT_PCT {
                alerts.push(Alert::Zeros {
                    column: col.name.clone(),
                    pct,
                });
            }
        }
    }
    for (left, right, r) in corr.strong_pairs(CORRELATION_ALERT) {
        alerts.push(Alert::HighCorrelation {
            left: left.to_string(),
            right: right.to_string(),
            r,
        });
    }
    alerts
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Everything the report shows, computed once from the cleaned table.
pub struct Profile {
    pub rows: usize,
    pub missing_cells: usize,
    pub duplicate_rows: usize,
    pub columns: Vec<ColumnProfile>,
    pub correlations: CorrelationMatrix,
    pub alerts: Vec<Alert>,
}

impl Profile {
    pub fn build(table: &RecordTable) -> Result<Self> {
        let columns = (0..table.columns.len())
            .map(|idx| ColumnProfile::build(table, idx))
            .collect::<Result<Vec<_>>>()?;
        let correlations = CorrelationMatrix::compute(table);
        let alerts = collect_alerts(table.len(), &columns, &correlations);
        let distinct_rows = table.rows.iter().collect::<HashSet<_>>().len();

        Ok(Profile {
            rows: table.len(),
            missing_cells: columns.iter().map(|c| c.missing).sum(),
            duplicate_rows: table.len() - distinct_rows,
            columns,
            correlations,
            alerts,
        })
    }

    fn missing_cells_pct(&self) -> f64 {
        let cells = self.rows * self.columns.len();
        if cells == 0 {
            0.0
        } else {
            self.missing_cells as f64 / cells as f64 * 100.0
        }
    }

    fn type_counts(&self) -> Vec<(ColumnType, usize)> {
        [
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Bool,
            ColumnType::Text,
        ]
        .into_iter()
        .map(|t| (t, self.columns.iter().filter(|c| c.dtype == t).count()))
        .filter(|(_, n)| *n > 0)
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Report sections
// ---------------------------------------------------------------------------

struct ReportSection {
    id: &'static str,
    title: &'static str,
    content: Markup,
}

impl ReportSection {
    fn render(&self) -> Markup {
        html! {
            section id=(self.id) {
                h2 { (self.title) }
                (self.content)
            }
        }
    }
}

fn overview_section(profile: &Profile) -> ReportSection {
    ReportSection {
        id: "overview",
        title: "Overview",
        content: html! {
            table class="kv" {
                tr { th { "Rows" } td { (profile.rows) } }
                tr { th { "Columns" } td { (profile.columns.len()) } }
                tr {
                    th { "Missing cells" }
                    td { (profile.missing_cells) " (" (format!("{:.1}", profile.missing_cells_pct())) "%)" }
                }
                tr { th { "Duplicate rows" } td { (profile.duplicate_rows) } }
                @for (dtype, n) in profile.type_counts() {
                    tr { th { "Type " (dtype) } td { (n) } }
                }
            }
        },
    }
}

fn alerts_section(profile: &Profile) -> ReportSection {
    ReportSection {
        id: "alerts",
        title: "Alerts",
        content: html! {
            @if profile.alerts.is_empty() {
                p { "No alerts." }
            } @else {
                ul class="alerts" {
                    @for alert in &profile.alerts {
                        li { (alert) }
                    }
                }
            }
        },
    }
}

fn variables_section(profile: &Profile) -> ReportSection {
    ReportSection {
        id: "variables",
        title: "Variables",
        content: html! {
            @for col in &profile.columns {
                div class="variable" {
                    h3 { (col.name) " " span class="dtype" { (col.dtype) } }
                    div class="variable-body" {
                        table class="kv" {
                            tr { th { "Distinct" } td { (col.distinct) } }
                            tr {
                                th { "Missing" }
                                td { (col.missing) " (" (format!("{:.1}", col.missing_pct)) "%)" }
                            }
                            @if let (ColumnDetail::Numeric { summary, zeros, negatives, .. }) = &col.detail {
                                @for (label, value) in summary.rows() {
                                    tr { th { (label) } td { (fmt_stat(value)) } }
                                }
                                tr { th { "Zeros" } td { (zeros) } }
                                tr { th { "Negative" } td { (negatives) } }
                            }
                        }
                        @match &col.detail {
                            ColumnDetail::Numeric { histogram, .. } => {
                                div class="histogram" { (PreEscaped(histogram)) }
                            }
                            ColumnDetail::Categorical { top } => {
                                table class="freq" {
                                    tr { th { "Value" } th { "Count" } }
                                    @for (value, n) in top {
                                        tr { td { (value) } td { (n) } }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        },
    }
}

fn correlations_section(profile: &Profile) -> ReportSection {
    let corr = &profile.correlations;
    ReportSection {
        id: "correlations",
        title: "Correlations",
        content: html! {
            @if corr.is_empty() {
                p { "No numeric columns." }
            } @else {
                table class="matrix" {
                    tr {
                        th {}
                        @for name in &corr.names { th { (name) } }
                    }
                    @for (name, row) in corr.names.iter().zip(&corr.values) {
                        tr {
                            th { (name) }
                            @for value in row {
                                td style=(cell_style(*value)) { (fmt_stat(*value)) }
                            }
                        }
                    }
                }
            }
        },
    }
}

fn missing_section(profile: &Profile) -> ReportSection {
    ReportSection {
        id: "missing",
        title: "Missing values",
        content: html! {
            table class="freq" {
                tr { th { "Column" } th { "Missing" } th { "%" } }
                @for col in &profile.columns {
                    tr {
                        td { (col.name) }
                        td { (col.missing) }
                        td { (format!("{:.2}", col.missing_pct)) }
                    }
                }
            }
        },
    }
}

fn sample_section(table: &RecordTable) -> ReportSection {
    let head = &table.rows[..SAMPLE_ROWS.min(table.len())];
    let tail = &table.rows[table.len().saturating_sub(SAMPLE_ROWS)..];
    ReportSection {
        id: "sample",
        title: "Sample",
        content: html! {
            h3 { "First rows" }
            (rows_table(table, head))
            h3 { "Last rows" }
            (rows_table(table, tail))
        },
    }
}

fn rows_table(table: &RecordTable, rows: &[Vec<Cell>]) -> Markup {
    html! {
        table class="sample" {
            tr { @for col in &table.columns { th { (col.name) } } }
            @for row in rows {
                tr {
                    @for cell in row {
                        @if cell.is_null() {
                            td class="null" { "NaN" }
                        } @else {
                            td { (cell) }
                        }
                    }
                }
            }
        }
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.0}"),
        Some(v) => format!("{v:.4}"),
        None => "nan".to_string(),
    }
}

fn cell_style(value: Option<f64>) -> String {
    match value {
        Some(r) => {
            let c = diverging(r);
            format!("background-color: #{:02x}{:02x}{:02x}", c.0, c.1, c.2)
        }
        None => "background-color: #c8c8c8".to_string(),
    }
}

const STYLE: &str = "
    body { font-family: Arial, sans-serif; margin: 0; color: #222; }
    header { padding: 20px; background: linear-gradient(135deg, #4a90e2, #145da0); color: white; }
    header h1 { margin: 0; }
    nav { display: flex; gap: 16px; padding: 10px 20px; border-bottom: 2px solid #ddd; }
    nav a { color: #145da0; font-weight: bold; text-decoration: none; }
    section { padding: 10px 20px; }
    table { border-collapse: collapse; margin: 8px 0; }
    th, td { border: 1px solid #ddd; padding: 4px 8px; text-align: left; }
    .variable { border-bottom: 1px solid #eee; padding-bottom: 12px; }
    .variable-body { display: flex; gap: 24px; align-items: flex-start; }
    .dtype { font-size: 0.7em; color: #666; }
    .alerts li { color: #a94442; }
    .null { color: #999; }
    .matrix td { text-align: center; }
";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the full report document.
pub fn render_report(table: &RecordTable, title: &str) -> Result<Markup> {
    let profile = Profile::build(table)?;
    let sections = [
        overview_section(&profile),
        alerts_section(&profile),
        variables_section(&profile),
        correlations_section(&profile),
        missing_section(&profile),
        sample_section(table),
    ];

    Ok(html! {
        (DOCTYPE)
        html lang="fr" {
            head {
                meta charset="utf-8";
                title { (title) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                header { h1 { (title) } }
                nav {
                    @for section in &sections {
                        a href=(format!("#{}", section.id)) { (section.title) }
                    }
                }
                @for section in &sections {
                    (section.render())
                }
            }
        }
    })
}

/// Write the self-contained HTML report to `path`, creating its directory.
pub fn write_report(table: &RecordTable, title: &str, path: &Path) -> Result<()> {
    let markup = render_report(table, title)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, markup.into_string())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn fixture() -> RecordTable {
        RecordTable::from_rows(
            ["make", "year", "sellingprice", "mmr", "condition"]
                .map(String::from)
                .to_vec(),
            vec![
                vec![text("kia"), Cell::Integer(2014), Cell::Float(18000.0), Cell::Integer(18500), Cell::Null],
                vec![text("kia"), Cell::Integer(2015), Cell::Float(21500.0), Cell::Integer(21000), Cell::Integer(4)],
                vec![text("ford"), Cell::Integer(2012), Cell::Float(9800.0), Cell::Integer(10100), Cell::Integer(4)],
                vec![text("bmw"), Cell::Integer(2013), Cell::Float(30000.0), Cell::Integer(29400), Cell::Integer(4)],
            ],
        )
    }

    #[test]
    fn profile_counts_and_alerts() {
        let profile = Profile::build(&fixture()).unwrap();
        assert_eq!(profile.rows, 4);
        assert_eq!(profile.missing_cells, 1);
        assert_eq!(profile.duplicate_rows, 0);

        assert!(profile.alerts.contains(&Alert::Missing {
            column: "condition".into(),
            pct: 25.0
        }));
        assert!(profile.alerts.contains(&Alert::Constant {
            column: "condition".into()
        }));
        assert!(profile
            .alerts
            .contains(&Alert::Unique { column: "year".into() }));
        assert!(profile.alerts.iter().any(|a| matches!(
            a,
            Alert::HighCorrelation { left, right, .. } if left == "sellingprice" && right == "mmr"
        )));
    }

    #[test]
    fn categorical_columns_list_top_values() {
        let profile = Profile::build(&fixture()).unwrap();
        match &profile.columns[0].detail {
            ColumnDetail::Categorical { top } => {
                assert_eq!(top[0], ("kia".to_string(), 2));
            }
            other => panic!("unexpected detail {other:?}"),
        }
        assert!(matches!(profile.columns[1].detail, ColumnDetail::Numeric { .. }));
    }

    #[test]
    fn writes_self_contained_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rapport.html");
        write_report(&fixture(), "Rapport de test", &path).unwrap();

        let html = std::fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Rapport de test</title>"));
        assert!(html.contains("<svg"));
        for name in ["make", "year", "sellingprice", "mmr", "condition"] {
            assert!(html.contains(&format!("<h3>{name} ")));
        }
        assert!(!html.contains("<script"));
    }

    #[test]
    fn empty_table_renders() {
        let empty = RecordTable::from_rows(vec!["make".into()], Vec::new());
        let markup = render_report(&empty, "vide").unwrap().into_string();
        assert!(markup.contains("No alerts."));
    }

    #[test]
    fn stat_formatting() {
        assert_eq!(fmt_stat(Some(4.0)), "4");
        assert_eq!(fmt_stat(Some(0.12345)), "0.1235");
        assert_eq!(fmt_stat(None), "nan");
    }
}
