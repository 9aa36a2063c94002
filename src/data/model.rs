use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

// ---------------------------------------------------------------------------
// Cell – a single value of the record table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a CSV reader infers.
/// Rows are deduplicated through hashing and categories are counted in
/// `BTreeMap`s, so `Cell` must be `Eq + Ord + Hash`.
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so floats can live in sets and maps --

/// All NaNs are one value and `-0.0` is `0.0`, so equality, ordering and
/// hashing agree.
fn canonical(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Cell::*;
        fn discriminant(v: &Cell) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                Text(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Cell {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Text(s) => s.hash(state),
            Cell::Integer(i) => i.hash(state),
            Cell::Float(f) => canonical(*f).to_bits().hash(state),
            Cell::Bool(b) => b.hash(state),
            Cell::Null => {}
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Null => write!(f, "<null>"),
        }
    }
}

impl Cell {
    /// Interpret the value as an `f64` for statistics and charts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

// ---------------------------------------------------------------------------
// ColumnType – the inferred dtype of a column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Infer the narrowest type holding every non-null cell.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let mut seen = BTreeSet::new();
        for cell in cells {
            match cell {
                Cell::Null => {}
                Cell::Bool(_) => {
                    seen.insert(0u8);
                }
                Cell::Integer(_) => {
                    seen.insert(1);
                }
                Cell::Float(_) => {
                    seen.insert(2);
                }
                Cell::Text(_) => {
                    seen.insert(3);
                }
            }
        }
        match (seen.contains(&0), seen.contains(&1), seen.contains(&2), seen.contains(&3)) {
            (_, _, _, true) => ColumnType::Text,
            (true, false, false, false) => ColumnType::Bool,
            (true, _, _, _) => ColumnType::Text,
            (false, _, true, false) => ColumnType::Float,
            // An all-null column reads as numeric like a CSV reader would.
            (false, _, false, false) => ColumnType::Integer,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Bool => "bool",
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
            ColumnType::Text => "text",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Column – name and inferred type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
}

// ---------------------------------------------------------------------------
// RecordTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The record table: an ordered column list and row-major cells.
/// Every row holds exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
}

impl RecordTable {
    /// Build a table from raw rows, inferring each column's type.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name,
                dtype: ColumnType::infer(rows.iter().map(|row| &row[idx])),
            })
            .collect();
        RecordTable { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate the cells of one column, top to bottom.
    pub fn column_cells(&self, idx: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Non-null numeric values of a column, by name.
    pub fn numeric_values(&self, name: &str) -> Vec<f64> {
        match self.column_index(name) {
            Some(idx) => self.column_cells(idx).filter_map(Cell::as_f64).collect(),
            None => Vec::new(),
        }
    }

    /// Indices of the Integer and Float columns, in table order.
    pub fn numeric_columns(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.dtype.is_numeric())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn null_count(&self, idx: usize) -> usize {
        self.column_cells(idx).filter(|c| c.is_null()).count()
    }

    /// Copy `rows[start..start + len]` into an Arrow record batch so it can be
    /// pretty-printed or handed to Arrow consumers.
    pub fn to_record_batch(&self, start: usize, len: usize) -> Result<RecordBatch> {
        let end = (start + len).min(self.rows.len());
        let start = start.min(end);
        let slice = &self.rows[start..end];

        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len());

        for (idx, column) in self.columns.iter().enumerate() {
            let cells = slice.iter().map(|row| &row[idx]);
            let (data_type, array): (DataType, ArrayRef) = match column.dtype {
                ColumnType::Integer => (
                    DataType::Int64,
                    Arc::new(cells.map(Cell::as_i64).collect::<Int64Array>()),
                ),
                ColumnType::Float => (
                    DataType::Float64,
                    Arc::new(cells.map(Cell::as_f64).collect::<Float64Array>()),
                ),
                ColumnType::Bool => (
                    DataType::Boolean,
                    Arc::new(
                        cells
                            .map(|c| match c {
                                Cell::Bool(b) => Some(*b),
                                _ => None,
                            })
                            .collect::<BooleanArray>(),
                    ),
                ),
                ColumnType::Text => (
                    DataType::Utf8,
                    Arc::new(
                        cells
                            .map(|c| (!c.is_null()).then(|| c.to_string()))
                            .collect::<StringArray>(),
                    ),
                ),
            };
            fields.push(Field::new(&column.name, data_type, true));
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn infers_narrowest_type() {
        assert_eq!(
            ColumnType::infer(&[Cell::Integer(1), Cell::Null, Cell::Integer(3)]),
            ColumnType::Integer
        );
        assert_eq!(
            ColumnType::infer(&[Cell::Integer(1), Cell::Float(2.5)]),
            ColumnType::Float
        );
        assert_eq!(ColumnType::infer(&[Cell::Integer(1), text("a")]), ColumnType::Text);
        assert_eq!(ColumnType::infer(&[Cell::Bool(true), Cell::Null]), ColumnType::Bool);
        assert_eq!(ColumnType::infer(&[Cell::Bool(true), Cell::Integer(1)]), ColumnType::Text);
        assert_eq!(ColumnType::infer(&[Cell::Null]), ColumnType::Integer);
    }

    #[test]
    fn nan_and_signed_zero_are_single_values() {
        use std::collections::HashSet;

        assert_eq!(Cell::Float(f64::NAN), Cell::Float(f64::NAN));
        assert_eq!(Cell::Float(0.0), Cell::Float(-0.0));
        assert_ne!(Cell::Float(0.0), Cell::Integer(0));

        let rows: HashSet<Vec<Cell>> = [
            vec![text("kia"), Cell::Float(f64::NAN)],
            vec![text("kia"), Cell::Float(-f64::NAN)],
            vec![text("bmw"), Cell::Float(0.0)],
            vec![text("bmw"), Cell::Float(-0.0)],
        ]
        .into_iter()
        .collect();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn floats_are_totally_ordered() {
        let mut set = BTreeSet::new();
        set.insert(Cell::Float(f64::NAN));
        set.insert(Cell::Float(1.0));
        set.insert(Cell::Float(f64::NAN));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn record_batch_keeps_types_and_nulls() {
        let table = RecordTable::from_rows(
            vec!["make".into(), "year".into(), "sellingprice".into()],
            vec![
                vec![text("kia"), Cell::Integer(2015), Cell::Float(12000.0)],
                vec![Cell::Null, Cell::Integer(2014), Cell::Null],
                vec![text("bmw"), Cell::Integer(2012), Cell::Float(9000.0)],
            ],
        );

        let batch = table.to_record_batch(1, 5).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Int64);
        assert_eq!(batch.column(0).null_count(), 1);
        assert_eq!(batch.column(2).null_count(), 1);
    }

    #[test]
    fn numeric_columns_follow_table_order() {
        let table = RecordTable::from_rows(
            vec!["make".into(), "year".into(), "odometer".into()],
            vec![vec![text("kia"), Cell::Integer(2015), Cell::Float(16639.0)]],
        );
        assert_eq!(table.numeric_columns(), vec![1, 2]);
        assert_eq!(table.numeric_values("odometer"), vec![16639.0]);
        assert!(table.numeric_values("missing").is_empty());
    }
}
