use std::collections::BTreeMap;

use crate::data::model::{Cell, RecordTable};

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        None
    } else {
        Some(v.iter().sum::<f64>() / v.len() as f64)
    }
}

/// Sample standard deviation (n - 1 in the denominator).
pub fn std_dev(v: &[f64]) -> Option<f64> {
    if v.len() < 2 {
        return None;
    }
    let m = mean(v)?;
    let var = v.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (v.len() as f64 - 1.0);
    Some(var.sqrt())
}

/// Quantile of already-sorted values, interpolating linearly between the
/// two nearest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Pearson correlation over the pairs where both sides are present.
/// `None` when fewer than two pairs remain or either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Column summaries
// ---------------------------------------------------------------------------

/// Descriptive statistics of one numeric column, nulls excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        NumericSummary {
            count: sorted.len(),
            mean: mean(&sorted),
            std: std_dev(&sorted),
            min: sorted.first().copied(),
            q25: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q75: quantile_sorted(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }

    /// `(label, value)` pairs in the order the console and report print them.
    pub fn rows(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("count", Some(self.count as f64)),
            ("mean", self.mean),
            ("std", self.std),
            ("min", self.min),
            ("25%", self.q25),
            ("50%", self.median),
            ("75%", self.q75),
            ("max", self.max),
        ]
    }
}

/// Non-null values of a column with their counts, most frequent first and
/// ties in ascending value order.
pub fn value_counts<'a>(cells: impl Iterator<Item = &'a Cell>) -> Vec<(&'a Cell, usize)> {
    let mut counts: BTreeMap<&Cell, usize> = BTreeMap::new();
    for cell in cells.filter(|c| !c.is_null()) {
        *counts.entry(cell).or_default() += 1;
    }
    let mut sorted: Vec<(&Cell, usize)> = counts.into_iter().collect();
    // Stable sort keeps the BTreeMap order among equal counts.
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

/// Number of distinct non-null values.
pub fn distinct_count<'a>(cells: impl Iterator<Item = &'a Cell>) -> usize {
    cells
        .filter(|c| !c.is_null())
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}

/// Pairwise Pearson correlation between the numeric columns of a table.
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    /// Row-major `names.len() x names.len()`, `None` where undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn compute(table: &RecordTable) -> Self {
        let indices = table.numeric_columns();
        let columns: Vec<Vec<Option<f64>>> = indices
            .iter()
            .map(|&idx| table.column_cells(idx).map(Cell::as_f64).collect())
            .collect();

        let values = columns
            .iter()
            .map(|xs| columns.iter().map(|ys| pearson(xs, ys)).collect())
            .collect();

        CorrelationMatrix {
            names: indices
                .iter()
                .map(|&idx| table.columns[idx].name.clone())
                .collect(),
            values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Distinct column pairs whose absolute correlation exceeds `threshold`.
    pub fn strong_pairs(&self, threshold: f64) -> Vec<(&str, &str, f64)> {
        let mut pairs = Vec::new();
        for (i, row) in self.values.iter().enumerate() {
            for (j, value) in row.iter().enumerate().skip(i + 1) {
                if let Some(r) = value.filter(|r| r.abs() > threshold) {
                    pairs.push((self.names[i].as_str(), self.names[j].as_str(), r));
                }
            }
        }
        pairs
    }
}
