use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

use crate::data::model::{Cell, RecordTable};
use crate::stats::{self, NumericSummary};

// ---------------------------------------------------------------------------
// Analysis report (preview, describe, schema, missing values)
// ---------------------------------------------------------------------------

/// Print the four analysis sections for the cleaned table to stdout.
pub fn print_analysis(table: &RecordTable, preview_rows: usize) -> Result<()> {
    let stdout = std::io::stdout();
    write_analysis(&mut stdout.lock(), table, preview_rows)
}

pub fn write_analysis(out: &mut impl Write, table: &RecordTable, preview_rows: usize) -> Result<()> {
    writeln!(out, "\nData preview:")?;
    let head = table.to_record_batch(0, preview_rows)?;
    writeln!(out, "{}", pretty_format_batches(&[head])?)?;

    writeln!(out, "\nNumeric statistics:")?;
    match describe_batch(table)? {
        Some(batch) => writeln!(out, "{}", pretty_format_batches(&[batch])?)?,
        None => writeln!(out, "(no numeric columns)")?,
    }

    writeln!(out, "\nGeneral information:")?;
    writeln!(out, "{} entries, {} columns", table.len(), table.columns.len())?;
    writeln!(out, "{}", pretty_format_batches(&[info_batch(table)?])?)?;

    writeln!(out, "\nMissing values (%):")?;
    writeln!(out, "{}", pretty_format_batches(&[missing_batch(table)?])?)?;
    Ok(())
}

/// One row per statistic, one column per numeric field.
fn describe_batch(table: &RecordTable) -> Result<Option<RecordBatch>> {
    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        return Ok(None);
    }

    let summaries: Vec<NumericSummary> = numeric
        .iter()
        .map(|&idx| {
            let values: Vec<f64> = table.column_cells(idx).filter_map(Cell::as_f64).collect();
            NumericSummary::from_values(&values)
        })
        .collect();

    let labels: Vec<&str> = summaries[0].rows().iter().map(|(label, _)| *label).collect();
    let mut fields = vec![Field::new("", DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(StringArray::from(labels))];

    for (&idx, summary) in numeric.iter().zip(&summaries) {
        let values: Float64Array = summary.rows().iter().map(|(_, v)| *v).collect();
        fields.push(Field::new(&table.columns[idx].name, DataType::Float64, true));
        arrays.push(Arc::new(values));
    }

    Ok(Some(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?))
}

fn info_batch(table: &RecordTable) -> Result<RecordBatch> {
    let positions: UInt64Array = (0..table.columns.len() as u64).map(Some).collect();
    let names: StringArray = table.columns.iter().map(|c| Some(c.name.as_str())).collect();
    let non_null: UInt64Array = (0..table.columns.len())
        .map(|idx| Some((table.len() - table.null_count(idx)) as u64))
        .collect();
    let dtypes: StringArray = table
        .columns
        .iter()
        .map(|c| Some(c.dtype.to_string()))
        .collect();

    let schema = Schema::new(vec![
        Field::new("#", DataType::UInt64, false),
        Field::new("column", DataType::Utf8, false),
        Field::new("non-null", DataType::UInt64, false),
        Field::new("dtype", DataType::Utf8, false),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(positions),
            Arc::new(names),
            Arc::new(non_null),
            Arc::new(dtypes),
        ],
    )?)
}

fn missing_batch(table: &RecordTable) -> Result<RecordBatch> {
    let names: StringArray = table.columns.iter().map(|c| Some(c.name.as_str())).collect();
    let shares: Float64Array = (0..table.columns.len())
        .map(|idx| Some(missing_percent(table, idx)))
        .collect();
    let schema = Schema::new(vec![
        Field::new("column", DataType::Utf8, false),
        Field::new("missing %", DataType::Float64, false),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![Arc::new(names), Arc::new(shares)],
    )?)
}

/// `null_count / row_count * 100`; an empty table has nothing missing.
pub fn missing_percent(table: &RecordTable, idx: usize) -> f64 {
    if table.is_empty() {
        0.0
    } else {
        table.null_count(idx) as f64 / table.len() as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Final summary
// ---------------------------------------------------------------------------

/// Print the closing scalar aggregates to stdout.
pub fn print_summary(table: &RecordTable) -> Result<()> {
    let stdout = std::io::stdout();
    write_summary(&mut stdout.lock(), table)
}

pub fn write_summary(out: &mut impl Write, table: &RecordTable) -> Result<()> {
    let years = table
        .column_index("year")
        .map(|idx| table.column_cells(idx).filter_map(Cell::as_i64).collect::<Vec<_>>())
        .unwrap_or_default();
    let first = years.iter().min().map_or("n/a".to_string(), i64::to_string);
    let last = years.iter().max().map_or("n/a".to_string(), i64::to_string);

    let makes = table
        .column_index("make")
        .map_or(0, |idx| stats::distinct_count(table.column_cells(idx)));

    let mean_price = stats::mean(&table.numeric_values("sellingprice"))
        .map_or("n/a".to_string(), format_thousands);

    writeln!(out, "\n--- Analysis summary ---")?;
    writeln!(out, "Total records: {}", table.len())?;
    writeln!(out, "Years covered: {first} to {last}")?;
    writeln!(out, "Distinct makes: {makes}")?;
    writeln!(out, "Mean price: {mean_price}")?;
    Ok(())
}

/// Two decimals with `,` between thousands: `1234567.891` → `1,234,567.89`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordTable {
        RecordTable::from_rows(
            vec!["make".into(), "year".into(), "sellingprice".into()],
            vec![
                vec![Cell::Text("kia".into()), Cell::Integer(2012), Cell::Float(1000.0)],
                vec![Cell::Text("bmw".into()), Cell::Integer(2015), Cell::Float(2500.5)],
                vec![Cell::Text("kia".into()), Cell::Integer(2001), Cell::Null],
            ],
        )
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn thousands_separator_and_two_decimals() {
        assert_eq!(format_thousands(1_234_567.891), "1,234,567.89");
        assert_eq!(format_thousands(999.999), "1,000.00");
        assert_eq!(format_thousands(12.5), "12.50");
        assert_eq!(format_thousands(-45_000.0), "-45,000.00");
        assert_eq!(format_thousands(0.0), "0.00");
        assert_eq!(format_thousands(-0.001), "0.00");
    }

    #[test]
    fn summary_reports_aggregates() {
        let text = render(|out| write_summary(out, &sample()));
        assert!(text.contains("Total records: 3"));
        assert!(text.contains("Years covered: 2001 to 2015"));
        assert!(text.contains("Distinct makes: 2"));
        assert!(text.contains("Mean price: 1,750.25"));
    }

    #[test]
    fn summary_of_empty_table() {
        let empty = RecordTable::from_rows(vec!["year".into()], Vec::new());
        let text = render(|out| write_summary(out, &empty));
        assert!(text.contains("Years covered: n/a to n/a"));
        assert!(text.contains("Mean price: n/a"));
    }

    #[test]
    fn analysis_prints_every_section() {
        let text = render(|out| write_analysis(out, &sample(), 2));
        let preview = text.find("Data preview:").unwrap();
        let describe = text.find("Numeric statistics:").unwrap();
        let info = text.find("General information:").unwrap();
        let missing = text.find("Missing values (%):").unwrap();
        assert!(preview < describe && describe < info && info < missing);
        assert!(text.contains("3 entries, 3 columns"));
        assert!(text.contains("sellingprice"));
        assert!(text.contains("33.33"));
    }

    #[test]
    fn missing_percent_of_empty_table_is_zero() {
        let empty = RecordTable::from_rows(vec!["make".into()], Vec::new());
        assert_eq!(missing_percent(&empty, 0), 0.0);
        assert!((missing_percent(&sample(), 2) - 100.0 / 3.0).abs() < 1e-9);
    }
}
