//! # Client Dataset Loading and Validation
//!
//! This module is the exclusive entry point for the precomputed predictions file.
//! It reads the delimited table, validates it against the few rules the rest of the
//! dashboard relies on, and stores every column as an `ndarray` vector.
//!
//! - Fixed target: the predicted repayment probability must live in a column named
//!   `target`. Every other column is a numeric feature, kept in file order.
//! - Implicit identifiers: a client's identifier is its zero-based row position.
//!   No business key is read from the file.
//! - Fatal failures: any problem here leaves the dashboard with nothing to show,
//!   so the `DataError` messages are written for the person who produced the file.
//! - Load once: `DatasetLoader` memoizes the parsed table behind an `Arc` so every
//!   later interaction shares the same immutable copy.

use ahash::AHashMap;
use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Name of the column holding the model-predicted repayment probability.
pub const TARGET_COLUMN: &str = "target";

/// A comprehensive error type for all dataset loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the column '{0}'. The dashboard requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. The dashboard requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error(
        "The 'target' value {value} at row {row} is not a probability between 0 and 1."
    )]
    TargetOutOfRange { row: usize, value: f64 },
    #[error("The column '{column_name}' has {found} values, but the table has {expected} rows.")]
    ColumnLengthMismatch {
        column_name: String,
        found: usize,
        expected: usize,
    },
    #[error("The column '{0}' appears more than once in the input file.")]
    DuplicateColumn(String),
    #[error("The input file contains no client rows.")]
    EmptyDataset,
    #[error("The input file has no feature columns besides 'target'.")]
    NoFeatureColumns,
}

/// Inclusive value range of a column over the whole table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ColumnRange {
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    fn of(values: ArrayView1<f64>) -> Self {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self { min, max }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// A column whose values are all equal.
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }
}

/// One named numeric feature.
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    name: String,
    values: Array1<f64>,
    range: ColumnRange,
}

impl FeatureColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn range(&self) -> ColumnRange {
        self.range
    }
}

/// The full, validated client dataset.
///
/// Rows are clients; columns are the features plus `target`. The table is never
/// mutated after construction, so filtered groups are always copies.
#[derive(Debug, Clone)]
pub struct ClientTable {
    column_order: Vec<String>,
    features: Vec<FeatureColumn>,
    feature_index: AHashMap<String, usize>,
    target: Array1<f64>,
}

impl ClientTable {
    /// Builds a table from named columns in file order.
    ///
    /// The same validation rules as the file loader apply: a `target` column in
    /// [0, 1], at least one row and one feature, finite values, equal lengths.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self, DataError> {
        let expected = columns
            .iter()
            .find(|(name, _)| name == TARGET_COLUMN)
            .map(|(_, values)| values.len())
            .ok_or_else(|| DataError::ColumnNotFound(TARGET_COLUMN.to_string()))?;
        if expected == 0 {
            return Err(DataError::EmptyDataset);
        }

        let mut column_order = Vec::with_capacity(columns.len());
        let mut features = Vec::with_capacity(columns.len().saturating_sub(1));
        let mut feature_index = AHashMap::with_capacity(columns.len());
        let mut target = None;

        for (name, values) in columns {
            if column_order.contains(&name) {
                return Err(DataError::DuplicateColumn(name));
            }
            if values.len() != expected {
                return Err(DataError::ColumnLengthMismatch {
                    column_name: name,
                    found: values.len(),
                    expected,
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(DataError::NonFiniteValuesFound(name));
            }
            column_order.push(name.clone());

            let values = Array1::from_vec(values);
            if name == TARGET_COLUMN {
                if let Some((row, &value)) = values
                    .iter()
                    .enumerate()
                    .find(|(_, p)| !(0.0..=1.0).contains(*p))
                {
                    return Err(DataError::TargetOutOfRange { row, value });
                }
                target = Some(values);
            } else {
                let range = ColumnRange::of(values.view());
                feature_index.insert(name.clone(), features.len());
                features.push(FeatureColumn {
                    name,
                    values,
                    range,
                });
            }
        }

        if features.is_empty() {
            return Err(DataError::NoFeatureColumns);
        }
        let target = target.ok_or_else(|| DataError::ColumnNotFound(TARGET_COLUMN.to_string()))?;

        Ok(Self {
            column_order,
            features,
            feature_index,
            target,
        })
    }

    pub fn row_count(&self) -> usize {
        self.target.len()
    }

    /// Every column name, `target` included, in file order.
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    /// Feature names in file order, `target` excluded.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(FeatureColumn::name)
    }

    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.feature_index.get(name).map(|&i| &self.features[i])
    }

    pub fn target(&self) -> ArrayView1<'_, f64> {
        self.target.view()
    }
}

/// Stages reported while loading the dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Reading,
    Validating,
}

impl LoadStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Reading => "Loading data...",
            Self::Validating => "Checking columns...",
        }
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer notified as the loader moves through its stages.
pub trait LoadProgressObserver {
    fn on_stage_start(&mut self, stage: LoadStage) {
        let _ = stage;
    }
    fn on_loaded(&mut self, rows: usize, columns: usize) {
        let _ = (rows, columns);
    }
}

#[derive(Default)]
pub struct NoopLoadProgress;

impl LoadProgressObserver for NoopLoadProgress {}

/// Reads and validates the predictions file at `path`.
pub fn read_client_table(
    path: &Path,
    separator: u8,
    progress: &mut dyn LoadProgressObserver,
) -> Result<ClientTable, DataError> {
    progress.on_stage_start(LoadStage::Reading);
    log::info!("Loading client data from '{}'", path.display());

    // Every field is read as text and converted to f64 per column below. Type
    // inference would otherwise fix a column to i64 from its leading rows and fail on
    // a later decimal value.
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(CsvParseOptions::default().with_separator(separator)),
        )
        .finish()?;

    log::info!(
        "Read {} rows and {} columns from '{}'",
        df.height(),
        df.width(),
        path.display()
    );

    progress.on_stage_start(LoadStage::Validating);
    if df.height() == 0 {
        return Err(DataError::EmptyDataset);
    }

    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    if !names.iter().any(|n| n == TARGET_COLUMN) {
        return Err(DataError::ColumnNotFound(TARGET_COLUMN.to_string()));
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values = extract_numeric_column(&df, &name)?;
        columns.push((name, values));
    }

    let table = ClientTable::from_columns(columns)?;
    log::debug!(
        "Validated {} feature columns plus '{TARGET_COLUMN}'",
        table.features().len()
    );
    progress.on_loaded(table.row_count(), table.column_names().len());
    Ok(table)
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    // A non-strict cast turns unparsable strings into nulls.
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

/// Process-wide handle on the predictions file.
///
/// The first successful `load` parses the file; every later call hands back the
/// same shared table without touching storage again.
pub struct DatasetLoader {
    path: PathBuf,
    separator: u8,
    cache: OnceLock<Arc<ClientTable>>,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>, separator: u8) -> Self {
        Self {
            path: path.into(),
            separator,
            cache: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn load(&self) -> Result<Arc<ClientTable>, DataError> {
        self.load_with_progress(&mut NoopLoadProgress)
    }

    pub fn load_with_progress(
        &self,
        progress: &mut dyn LoadProgressObserver,
    ) -> Result<Arc<ClientTable>, DataError> {
        if let Some(table) = self.cache.get() {
            log::debug!("Reusing the client table already loaded from '{}'", self.path.display());
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(read_client_table(&self.path, self.separator, progress)?);
        Ok(Arc::clone(self.cache.get_or_init(|| table)))
    }
}
