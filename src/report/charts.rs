use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::color::{diverging, ColorMap};
use crate::data::model::{Cell, RecordTable};
use crate::stats::{self, CorrelationMatrix};

/// File stems of the charts, in rendering order.
pub const CHART_NAMES: [&str; 6] = [
    "top_marques",
    "ventes_par_annee",
    "prix_moyen_par_annee",
    "distribution_prix",
    "ventes_par_carrosserie",
    "correlation_heatmap",
];

const PRICE_BINS: usize = 30;
const TOP_MAKES: usize = 5;
const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const NAN_GREY: RGBColor = RGBColor(200, 200, 200);

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Created when missing; existing charts are overwritten.
    pub output_dir: PathBuf,
    /// When false every chart is also opened in the system image viewer.
    pub headless: bool,
    /// Pixel size of the line/bar charts.
    pub size: (u32, u32),
    /// Pixel size of the correlation heatmap.
    pub heatmap_size: (u32, u32),
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            headless: true,
            size: (1000, 600),
            heatmap_size: (800, 600),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Render the six charts as `<output_dir>/<name>.png`.  Returns their paths.
pub fn render_all(table: &RecordTable, config: &ChartConfig) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;

    let size = config.size;
    Ok(vec![
        render(config, CHART_NAMES[0], size, |root| draw_top_makes(root, table))?,
        render(config, CHART_NAMES[1], size, |root| draw_sales_per_year(root, table))?,
        render(config, CHART_NAMES[2], size, |root| draw_mean_price_per_year(root, table))?,
        render(config, CHART_NAMES[3], size, |root| {
            let prices = table.numeric_values("sellingprice");
            draw_histogram(root, &prices, PRICE_BINS, "Distribution des prix de vente", "Prix")
        })?,
        render(config, CHART_NAMES[4], size, |root| draw_sales_per_body(root, table))?,
        render(config, CHART_NAMES[5], config.heatmap_size, |root| {
            draw_heatmap(root, &CorrelationMatrix::compute(table))
        })?,
    ])
}

fn render<F>(config: &ChartConfig, name: &str, size: (u32, u32), draw: F) -> Result<PathBuf>
where
    F: FnOnce(&Area<'_>) -> Result<()>,
{
    let path = config.output_dir.join(format!("{name}.png"));
    {
        let root = BitMapBackend::new(&path, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root).with_context(|| format!("drawing {name}"))?;
        root.present()
            .with_context(|| format!("writing {}", path.display()))?;
    }
    log::info!("chart saved to {}", path.display());

    if !config.headless {
        show(&path);
    }
    Ok(path)
}

fn show(path: &Path) {
    if let Err(e) = open::that(path) {
        log::warn!("could not open {}: {e}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// Row count per `year`, ascending.
pub fn sales_per_year(table: &RecordTable) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    if let Some(idx) = table.column_index("year") {
        for year in table.column_cells(idx).filter_map(Cell::as_i64) {
            *counts.entry(year).or_default() += 1;
        }
    }
    counts
}

/// Mean `sellingprice` per `year`, ascending.  Years without a price are
/// left out.
pub fn mean_price_per_year(table: &RecordTable) -> BTreeMap<i64, f64> {
    let (Some(year_idx), Some(price_idx)) =
        (table.column_index("year"), table.column_index("sellingprice"))
    else {
        return BTreeMap::new();
    };
    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for row in &table.rows {
        if let (Some(year), Some(price)) = (row[year_idx].as_i64(), row[price_idx].as_f64()) {
            let entry = sums.entry(year).or_default();
            entry.0 += price;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(year, (sum, n))| (year, sum / n as f64))
        .collect()
}

/// Row count per (`body`, `year`), one inner map per body style.
pub fn sales_per_body(table: &RecordTable) -> BTreeMap<&Cell, BTreeMap<i64, usize>> {
    let mut series: BTreeMap<&Cell, BTreeMap<i64, usize>> = BTreeMap::new();
    let (Some(year_idx), Some(body_idx)) = (table.column_index("year"), table.column_index("body"))
    else {
        return series;
    };
    for row in &table.rows {
        let body = &row[body_idx];
        if let (Some(year), false) = (row[year_idx].as_i64(), body.is_null()) {
            *series.entry(body).or_default().entry(year).or_default() += 1;
        }
    }
    series
}

/// Equal-width bins over `[min, max]` as `(start, end, count)`; the last
/// bin includes `max`.  A single distinct value is centred in a unit-wide
/// range.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| (lo + i as f64 * width, lo + (i + 1) as f64 * width, n))
        .collect()
}

/// Year axis padded by one on each side; `0..1` when there is no data.
fn year_span<'a>(years: impl Iterator<Item = &'a i64> + Clone) -> std::ops::Range<i64> {
    match (years.clone().min(), years.max()) {
        (Some(lo), Some(hi)) => (lo - 1)..(hi + 1),
        _ => 0..1,
    }
}

fn value_ceiling(max: f64) -> f64 {
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

fn draw_top_makes(root: &Area<'_>, table: &RecordTable) -> Result<()> {
    let counts: Vec<(String, u32)> = table
        .column_index("make")
        .map(|idx| {
            stats::value_counts(table.column_cells(idx))
                .into_iter()
                .take(TOP_MAKES)
                .map(|(make, n)| (make.to_string(), n as u32))
                .collect()
        })
        .unwrap_or_default();

    let slots = counts.len().max(1) as u32;
    let top = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let y_max = (top + top / 10).max(1) + 1;

    let mut chart = ChartBuilder::on(root)
        .caption("Top 5 des marques les plus vendues", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..slots).into_segmented(), 0u32..y_max)?;

    let label = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) => counts
            .get(*i as usize)
            .map(|(make, _)| make.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(slots as usize)
        .x_label_formatter(&label)
        .x_desc("Marque")
        .y_desc("Nombre de ventes")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(20)
            .data(counts.iter().enumerate().map(|(i, (_, n))| (i as u32, *n))),
    )?;
    Ok(())
}

fn draw_sales_per_year(root: &Area<'_>, table: &RecordTable) -> Result<()> {
    let counts = sales_per_year(table);
    let points: Vec<(i64, f64)> = counts.iter().map(|(y, n)| (*y, *n as f64)).collect();
    let top = points.iter().map(|p| p.1).fold(0.0, f64::max);

    draw_year_line(
        root,
        "Évolution des ventes par année",
        "Nombre de ventes",
        &points,
        value_ceiling(top),
    )
}

fn draw_mean_price_per_year(root: &Area<'_>, table: &RecordTable) -> Result<()> {
    let means = mean_price_per_year(table);
    let points: Vec<(i64, f64)> = means.into_iter().collect();
    let top = points.iter().map(|p| p.1).fold(0.0, f64::max);

    draw_year_line(
        root,
        "Prix moyen des véhicules par année",
        "Prix moyen",
        &points,
        value_ceiling(top),
    )
}

/// Single line with point markers over a year axis.
fn draw_year_line(
    root: &Area<'_>,
    caption: &str,
    y_desc: &str,
    points: &[(i64, f64)],
    y_max: f64,
) -> Result<()> {
    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(year_span(points.iter().map(|p| &p.0)), 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Année")
        .y_desc(y_desc)
        .x_label_formatter(&|y| y.to_string())
        .draw()?;

    chart.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)).point_size(4))?;
    Ok(())
}

/// Equal-width histogram with black bar outlines.  Generic over the backend
/// so the HTML report can reuse it for inline SVG.
pub fn draw_histogram<DB>(
    root: &DrawingArea<DB, Shift>,
    values: &[f64],
    bins: usize,
    caption: &str,
    x_desc: &str,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let bars = histogram_bins(values, bins);
    let (lo, hi) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first.0, last.1),
        _ => (0.0, 1.0),
    };
    let top = bars.iter().map(|b| b.2).max().unwrap_or(0) as f64;

    let mut builder = ChartBuilder::on(root);
    builder.margin(10).x_label_area_size(35).y_label_area_size(55);
    if !caption.is_empty() {
        builder.caption(caption, ("sans-serif", 28));
    }
    let mut chart = builder.build_cartesian_2d(lo..hi, 0f64..value_ceiling(top))?;

    let mut mesh = chart.configure_mesh();
    mesh.x_labels(6).y_labels(5);
    if !x_desc.is_empty() {
        mesh.x_desc(x_desc).y_desc("Fréquence");
    }
    mesh.draw()?;

    chart.draw_series(
        bars.iter()
            .map(|&(x0, x1, n)| Rectangle::new([(x0, 0.0), (x1, n as f64)], SKY_BLUE.filled())),
    )?;
    chart.draw_series(
        bars.iter()
            .map(|&(x0, x1, n)| Rectangle::new([(x0, 0.0), (x1, n as f64)], BLACK.stroke_width(1))),
    )?;
    Ok(())
}

fn draw_sales_per_body(root: &Area<'_>, table: &RecordTable) -> Result<()> {
    let series = sales_per_body(table);
    let colors = ColorMap::new(series.keys().copied());

    let years = year_span(series.values().flat_map(|per_year| per_year.keys()));
    let top = series
        .values()
        .flat_map(|per_year| per_year.values())
        .copied()
        .max()
        .unwrap_or(0) as f64;

    let mut chart = ChartBuilder::on(root)
        .caption("Évolution des ventes par type de carrosserie", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(years, 0f64..value_ceiling(top))?;

    chart
        .configure_mesh()
        .x_desc("Année")
        .y_desc("Nombre de ventes")
        .x_label_formatter(&|y| y.to_string())
        .draw()?;

    for (body, per_year) in &series {
        let color = colors.color_for(body);
        let points = per_year.iter().map(|(y, n)| (*y, *n as f64));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(body.to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if !series.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Annotated correlation grid.  Axis coordinates are doubled so each cell
/// spans two units and its centre falls on an odd tick that carries the
/// column name.
fn draw_heatmap(root: &Area<'_>, corr: &CorrelationMatrix) -> Result<()> {
    let n = corr.names.len() as i32;
    let extent = (2 * n).max(1);

    let mut chart = ChartBuilder::on(root)
        .caption("Matrice de corrélation", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(110)
        .build_cartesian_2d(0..extent, 0..extent)?;

    let x_label = |v: &i32| {
        if v % 2 == 1 {
            corr.names.get((v / 2) as usize).cloned().unwrap_or_default()
        } else {
            String::new()
        }
    };
    let y_label = |v: &i32| {
        if v % 2 == 1 {
            corr.names
                .get((n - 1 - v / 2) as usize)
                .cloned()
                .unwrap_or_default()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(extent as usize + 1)
        .y_labels(extent as usize + 1)
        .x_label_formatter(&x_label)
        .y_label_formatter(&y_label)
        .draw()?;

    let cells: Vec<(i32, i32, Option<f64>)> = corr
        .values
        .iter()
        .enumerate()
        .flat_map(|(row, values)| {
            values
                .iter()
                .enumerate()
                .map(move |(col, r)| (col as i32, n - 1 - row as i32, *r))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, r)| {
        let fill = r.map(diverging).unwrap_or(NAN_GREY);
        Rectangle::new([(2 * x, 2 * y), (2 * x + 2, 2 * y + 2)], fill.filled())
    }))?;

    let annotation = ("sans-serif", 18)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(x, y, r)| {
        let text = r.map_or("nan".to_string(), |r| format!("{r:.2}"));
        Text::new(text, (2 * x + 1, 2 * y + 1), annotation.clone())
    }))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn fixture() -> RecordTable {
        let rows = [
            ("kia", "suv", 2014, 18000.0, 32000),
            ("kia", "sedan", 2015, 21500.0, 16000),
            ("ford", "sedan", 2012, 9800.0, 61000),
            ("ford", "suv", 2012, 12400.0, 58000),
            ("bmw", "sedan", 2014, 30000.0, 9000),
            ("nissan", "sedan", 2015, 10900.0, 5500),
            ("honda", "coupe", 2010, 6500.0, 99000),
            ("toyota", "sedan", 2011, 8800.0, 87000),
        ];
        RecordTable::from_rows(
            ["make", "body", "year", "sellingprice", "odometer"]
                .map(String::from)
                .to_vec(),
            rows.iter()
                .map(|(make, body, year, price, odo)| {
                    vec![
                        text(make),
                        text(body),
                        Cell::Integer(*year),
                        Cell::Float(*price),
                        Cell::Integer(*odo),
                    ]
                })
                .collect(),
        )
    }

    #[test]
    fn yearly_aggregates_are_sorted() {
        let table = fixture();
        let counts: Vec<(i64, usize)> = sales_per_year(&table).into_iter().collect();
        assert_eq!(
            counts,
            vec![(2010, 1), (2011, 1), (2012, 2), (2014, 2), (2015, 2)]
        );
        let means = mean_price_per_year(&table);
        assert_eq!(means[&2012], 11100.0);
        assert_eq!(means[&2014], 24000.0);
    }

    #[test]
    fn body_series_count_per_year() {
        let table = fixture();
        let series = sales_per_body(&table);
        assert_eq!(series.len(), 3);
        assert_eq!(series[&text("sedan")][&2015], 2);
        assert_eq!(series[&text("suv")].len(), 2);
    }

    #[test]
    fn histogram_bins_cover_range() {
        let bins = histogram_bins(&[0.0, 1.0, 2.0, 3.0, 10.0], 5);
        assert_eq!(bins.len(), 5);
        assert_eq!(bins[0], (0.0, 2.0, 2));
        assert_eq!(bins[4].2, 1);
        assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), 5);

        let single = histogram_bins(&[4.0, 4.0], 30);
        assert_eq!(single.len(), 30);
        assert_eq!(single[0].0, 3.5);
        assert_eq!(single.iter().map(|b| b.2).sum::<usize>(), 2);

        assert!(histogram_bins(&[], 30).is_empty());
    }

    #[test]
    fn renders_six_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChartConfig {
            output_dir: dir.path().join("charts"),
            ..ChartConfig::default()
        };

        let written = render_all(&fixture(), &config).unwrap();
        assert_eq!(written.len(), 6);

        let files: Vec<_> = std::fs::read_dir(&config.output_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 6);
        for name in CHART_NAMES {
            let path = config.output_dir.join(format!("{name}.png"));
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
            let img = image::open(&path).unwrap();
            assert!(img.width() > 0);
        }
    }

    #[test]
    fn empty_table_still_renders() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChartConfig {
            output_dir: dir.path().to_path_buf(),
            ..ChartConfig::default()
        };
        let empty = RecordTable::from_rows(
            ["make", "body", "year", "sellingprice"].map(String::from).to_vec(),
            Vec::new(),
        );
        let written = render_all(&empty, &config).unwrap();
        assert!(written.iter().all(|p| p.exists()));
    }
}
