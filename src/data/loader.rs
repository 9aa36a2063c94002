use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::error::ArrowError;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{Cell, ColumnType, RecordTable};

/// Tokens read as a missing value in delimited text, on top of the empty field.
const NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading a record file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// The file has no header row or no columns at all.
    #[error("No columns found")]
    NoColumns,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type LoadResult<T> = Result<T, LoadError>;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a record table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – comma-separated, header row first (also the fallback)
/// * `.tsv`          – tab-separated
/// * `.json`         – `[{ "make": "Kia", "year": 2015, ... }, ...]`
/// * `.parquet`      – flat Arrow schema, one column per field
pub fn load_file(path: &Path) -> LoadResult<RecordTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        "tsv" => load_delimited(path, b'\t')?,
        _ => load_delimited(path, b',')?,
    };
    log::debug!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// Header row with column names, then one record per line.  Every record
/// must have as many fields as the header.  Column types are inferred from
/// the raw text before any cell is converted, so a column holding `"300"`
/// next to `"altima"` stays text throughout.
fn load_delimited(path: &Path, delimiter: u8) -> LoadResult<RecordTable> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::NoColumns);
    }

    let mut raw: Vec<csv::StringRecord> = Vec::new();
    for result in reader.records() {
        raw.push(result?);
    }

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|idx| infer_text_column(raw.iter().map(|rec| rec.get(idx).unwrap_or(""))))
        .collect();

    let rows = raw
        .iter()
        .map(|rec| {
            rec.iter()
                .zip(&types)
                .map(|(field, dtype)| parse_field(field, *dtype))
                .collect()
        })
        .collect();

    Ok(RecordTable::from_rows(headers, rows))
}

fn is_null_token(s: &str) -> bool {
    s.is_empty() || NULL_TOKENS.contains(&s)
}

fn infer_text_column<'a>(fields: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    for field in fields.filter(|f| !is_null_token(f)) {
        let trimmed = field.trim();
        all_int &= trimmed.parse::<i64>().is_ok();
        all_float &= trimmed.parse::<f64>().is_ok();
        all_bool &= parse_bool(trimmed).is_some();
        if !all_int && !all_float && !all_bool {
            return ColumnType::Text;
        }
    }
    if all_int {
        ColumnType::Integer
    } else if all_float {
        ColumnType::Float
    } else if all_bool {
        ColumnType::Bool
    } else {
        ColumnType::Text
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Convert one raw field into a cell of the column's inferred type.
fn parse_field(field: &str, dtype: ColumnType) -> Cell {
    if is_null_token(field) {
        return Cell::Null;
    }
    let trimmed = field.trim();
    let parsed = match dtype {
        ColumnType::Integer => trimmed.parse().ok().map(Cell::Integer),
        ColumnType::Float => trimmed.parse().ok().map(Cell::Float),
        ColumnType::Bool => parse_bool(trimmed).map(Cell::Bool),
        ColumnType::Text => None,
    };
    parsed.unwrap_or_else(|| Cell::Text(field.to_string()))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "year": 2015, "make": "Kia", "model": "Sorento", "sellingprice": 21500 },
///   ...
/// ]
/// ```
///
/// Columns are the union of all keys, in order of first appearance; a key
/// missing from a record is a null cell.
fn load_json(path: &Path) -> LoadResult<RecordTable> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue = serde_json::from_str(&text)?;

    let records = root
        .as_array()
        .ok_or_else(|| LoadError::InvalidData("expected a top-level JSON array".into()))?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::InvalidData(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            headers
                .iter()
                .map(|key| obj.get(key).map(json_to_cell).unwrap_or(Cell::Null))
                .collect()
        })
        .collect();

    Ok(RecordTable::from_rows(headers, rows))
}

fn json_to_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Null,
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with a flat schema, as written by both **Pandas**
/// (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).  Integer,
/// float, boolean and string columns map to the matching cell type; any
/// other Arrow type (dates, timestamps, decimals) is kept as its display
/// text.
fn load_parquet(path: &Path) -> LoadResult<RecordTable> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            let cells = batch
                .columns()
                .iter()
                .map(|col| extract_cell(col, row))
                .collect::<LoadResult<Vec<Cell>>>()?;
            rows.push(cells);
        }
    }

    Ok(RecordTable::from_rows(headers, rows))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &ArrayRef, row: usize) -> LoadResult<Cell> {
    if col.is_null(row) {
        return Ok(Cell::Null);
    }
    let cell = match col.data_type() {
        DataType::Utf8 => Cell::Text(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Cell::Text(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => Cell::Integer(col.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Cell::Integer(col.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Cell::Integer(col.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Cell::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Cell::Integer(col.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Cell::Integer(col.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Cell::Integer(col.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = col.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(Cell::Integer)
                .unwrap_or(Cell::Float(v as f64))
        }
        DataType::Float32 => Cell::Float(col.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Cell::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Cell::Bool(col.as_boolean().value(row)),
        _ => Cell::Text(array_value_to_string(col, row)?),
    };
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_csv_with_inferred_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "cars.csv",
            "year,make,model,sellingprice,trim\n\
             2015,Kia,Sorento,21500,LX\n\
             2014,BMW,3 Series,30000.5,328i\n\
             ,Nissan,300,NA,\n",
        );

        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        let types: Vec<ColumnType> = table.columns.iter().map(|c| c.dtype).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Text,
                ColumnType::Float,
                ColumnType::Text
            ]
        );
        assert_eq!(table.rows[0][0], Cell::Integer(2015));
        assert_eq!(table.rows[2][0], Cell::Null);
        assert_eq!(table.rows[2][2], Cell::Text("300".into()));
        assert_eq!(table.rows[2][3], Cell::Null);
        assert_eq!(table.rows[2][4], Cell::Null);
    }

    #[test]
    fn keeps_surrounding_whitespace_in_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "cars.csv", "make,year\n Honda ,2012\n");
        let table = load_file(&path).unwrap();
        assert_eq!(table.rows[0][0], Cell::Text(" Honda ".into()));
    }

    #[test]
    fn mixed_numeric_column_becomes_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "cars.csv", "year\n2012\nunknown\n");
        let table = load_file(&path).unwrap();
        assert_eq!(table.columns[0].dtype, ColumnType::Text);
        assert_eq!(table.rows[0][0], Cell::Text("2012".into()));
    }

    #[test]
    fn loads_tsv_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "cars.tsv", "make\tyear\nkia\t2015\n");
        let table = load_file(&path).unwrap();
        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.rows[0][1], Cell::Integer(2015));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn ragged_row_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.csv", "make,year\nkia,2015,extra\n");
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)));
    }

    #[test]
    fn empty_file_has_no_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        assert!(matches!(load_file(&path), Err(LoadError::NoColumns)));
    }

    #[test]
    fn loads_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "cars.json",
            r#"[{"make": "Kia", "year": 2015, "sellingprice": 21500.0},
                {"make": null, "year": 2014}]"#,
        );
        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        let price = table.column_index("sellingprice").unwrap();
        assert_eq!(table.rows[1][price], Cell::Null);
        let make = table.column_index("make").unwrap();
        assert_eq!(table.rows[1][make], Cell::Null);
    }

    #[test]
    fn json_columns_keep_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "cars.json",
            r#"[{"year": 2015, "make": "Kia"}, {"sellingprice": 9800, "body": "suv", "year": 2012}]"#,
        );
        let table = load_file(&path).unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["year", "make", "sellingprice", "body"]);
    }

    #[test]
    fn json_must_be_an_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "cars.json", r#"{"make": "Kia"}"#);
        assert!(matches!(load_file(&path), Err(LoadError::InvalidData(_))));
    }

    #[test]
    fn loads_parquet_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cars.parquet");

        let schema = Arc::new(Schema::new(vec![
            Field::new("year", DataType::Int32, true),
            Field::new("make", DataType::Utf8, true),
            Field::new("sellingprice", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![Some(2015), None])),
                Arc::new(StringArray::from(vec![Some("kia"), Some("bmw")])),
                Arc::new(Float64Array::from(vec![21500.0, 30000.0])),
            ],
        )
        .unwrap();
        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0], Cell::Integer(2015));
        assert_eq!(table.rows[1][0], Cell::Null);
        assert_eq!(table.rows[1][1], Cell::Text("bmw".into()));
        assert_eq!(table.columns[2].dtype, ColumnType::Float);
    }
}
