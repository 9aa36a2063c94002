use std::collections::{BTreeMap, HashMap, HashSet};

use super::model::{Cell, ColumnType, RecordTable};

/// Categorical columns that get trimmed and lowercased.
pub const STRING_COLUMNS: [&str; 4] = ["make", "model", "transmission", "body"];

/// Manufacturer assigned when no model-level mode is available.
pub const UNKNOWN_MAKE: &str = "unknown";

/// Exclusive bounds on a plausible model year.
pub const YEAR_LOWER: i64 = 1980;
pub const YEAR_UPPER: i64 = 2025;

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Clean a raw record table.
///
/// Steps run in this order:
/// 1. drop exact-duplicate rows (first occurrence wins)
/// 2. trim + lowercase `make`, `model`, `transmission`, `body` when present
/// 3. coerce `year` to an integer, anything unparseable becomes null
/// 4. coerce `sellingprice` to a float, same rule
/// 5. keep rows with `sellingprice > 0` and `1980 < year < 2025`; a null on
///    either side fails the comparison and drops the row
/// 6. fill null `make` with the most frequent `make` of the same `model`
/// 7. fill whatever is still null with `"unknown"`
///
/// Normalisation and imputation can make two rows identical, so duplicates
/// are dropped once more at the end. Cleaning a clean table is a no-op.
pub fn clean(mut table: RecordTable) -> RecordTable {
    let before = table.len();

    let removed = drop_duplicates(&mut table);
    log::info!("removed {removed} duplicate rows");

    for name in STRING_COLUMNS {
        normalize_text(&mut table, name);
    }

    let nulled = coerce_column(&mut table, "year", ColumnType::Integer);
    log::debug!("year: {nulled} values could not be read as an integer");
    let nulled = coerce_column(&mut table, "sellingprice", ColumnType::Float);
    log::debug!("sellingprice: {nulled} values could not be read as a number");

    let removed = filter_implausible(&mut table);
    log::info!("removed {removed} rows with an implausible year or price");

    let imputed = impute_make_by_model(&mut table);
    let defaulted = fill_missing_make(&mut table);
    log::info!("make: {imputed} values imputed from model, {defaulted} set to \"{UNKNOWN_MAKE}\"");

    let removed = drop_duplicates(&mut table);
    if removed > 0 {
        log::debug!("removed {removed} rows made identical by normalisation");
    }

    log::info!("cleaning kept {} of {before} rows", table.len());
    table
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Remove rows equal to an earlier row.  Returns how many were removed.
pub fn drop_duplicates(table: &mut RecordTable) -> usize {
    let before = table.rows.len();
    let mut seen: HashSet<Vec<Cell>> = HashSet::with_capacity(before);
    table.rows.retain(|row| seen.insert(row.clone()));
    before - table.rows.len()
}

/// Trim and lowercase every non-null value of a column.  Values of a
/// numeric column are rendered as text first, turning the column into text.
/// An absent column is skipped.
pub fn normalize_text(table: &mut RecordTable, name: &str) {
    let Some(idx) = table.column_index(name) else {
        return;
    };
    for row in &mut table.rows {
        let cell = &mut row[idx];
        if !cell.is_null() {
            *cell = Cell::Text(cell.to_string().trim().to_lowercase());
        }
    }
    table.columns[idx].dtype = ColumnType::Text;
}

/// Convert a column to `Integer` or `Float`, nulling what does not parse.
/// Returns the number of non-null values that were lost.  An absent column
/// is left absent and every later comparison on it fails.
pub fn coerce_column(table: &mut RecordTable, name: &str, target: ColumnType) -> usize {
    let Some(idx) = table.column_index(name) else {
        log::warn!("column '{name}' not found, every row will be filtered out");
        return 0;
    };
    let mut nulled = 0;
    for row in &mut table.rows {
        let cell = &mut row[idx];
        if cell.is_null() {
            continue;
        }
        let coerced = match target {
            ColumnType::Integer => to_integer(cell),
            _ => to_float(cell),
        };
        if coerced.is_null() {
            nulled += 1;
        }
        *cell = coerced;
    }
    table.columns[idx].dtype = target;
    nulled
}

fn to_float(cell: &Cell) -> Cell {
    match cell {
        Cell::Integer(i) => Cell::Float(*i as f64),
        Cell::Float(f) => Cell::Float(*f),
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| !f.is_nan())
            .map(Cell::Float)
            .unwrap_or(Cell::Null),
        Cell::Bool(_) | Cell::Null => Cell::Null,
    }
}

/// A float converts only when it has no fractional part.
fn to_integer(cell: &Cell) -> Cell {
    if let Cell::Integer(i) = cell {
        return Cell::Integer(*i);
    }
    if let Some(i) = cell.as_str().and_then(|s| s.trim().parse::<i64>().ok()) {
        return Cell::Integer(i);
    }
    match to_float(cell) {
        Cell::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Cell::Integer(f as i64),
        _ => Cell::Null,
    }
}

/// Keep rows whose price is positive and whose year lies strictly between
/// 1980 and 2025.  Returns how many rows were removed.
pub fn filter_implausible(table: &mut RecordTable) -> usize {
    let year_idx = table.column_index("year");
    let price_idx = table.column_index("sellingprice");
    let before = table.rows.len();

    table.rows.retain(|row| {
        let year = year_idx.and_then(|i| row[i].as_i64());
        let price = price_idx.and_then(|i| row[i].as_f64());
        match (year, price) {
            (Some(year), Some(price)) => price > 0.0 && year > YEAR_LOWER && year < YEAR_UPPER,
            _ => false,
        }
    });
    before - table.rows.len()
}

/// Fill null `make` values with the most frequent `make` among rows of the
/// same `model`.  Ties go to the smallest value.  Rows with a null `model`
/// belong to no group.  Returns the number of cells filled.
pub fn impute_make_by_model(table: &mut RecordTable) -> usize {
    let (Some(make_idx), Some(model_idx)) =
        (table.column_index("make"), table.column_index("model"))
    else {
        return 0;
    };

    let mut counts: HashMap<&Cell, BTreeMap<&Cell, usize>> = HashMap::new();
    for row in &table.rows {
        let (model, make) = (&row[model_idx], &row[make_idx]);
        if model.is_null() || make.is_null() {
            continue;
        }
        *counts.entry(model).or_default().entry(make).or_default() += 1;
    }

    let modes: HashMap<Cell, Cell> = counts
        .into_iter()
        .filter_map(|(model, makes)| {
            mode(makes).map(|make| (model.clone(), make.clone()))
        })
        .collect();

    let mut filled = 0;
    for row in &mut table.rows {
        if !row[make_idx].is_null() {
            continue;
        }
        if let Some(make) = modes.get(&row[model_idx]) {
            row[make_idx] = make.clone();
            filled += 1;
        }
    }
    filled
}

/// Most frequent key; the map's ordering makes the smallest key win ties.
fn mode<K>(counts: BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Replace every remaining null `make` with `"unknown"`.
pub fn fill_missing_make(table: &mut RecordTable) -> usize {
    let Some(idx) = table.column_index("make") else {
        return 0;
    };
    let mut filled = 0;
    for row in &mut table.rows {
        if row[idx].is_null() {
            row[idx] = Cell::Text(UNKNOWN_MAKE.to_string());
            filled += 1;
        }
    }
    table.columns[idx].dtype = ColumnType::Text;
    filled
}
