use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{error, info};

use crate::models::{polars_err, ReportConfig};

/// Read a CSV with a header row. DESeq2 exports use "NA" for missing values,
/// so that token is registered as null.
pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|mut o| {
            o.null_values = Some(NullValues::AllColumns(vec!["NA".into(), "NaN".into()]));
            o
        })
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

/// Check that every required column is present, naming the first one missing.
pub fn require_columns(df: &DataFrame, required: &[&str], table: &str) -> PolarsResult<()> {
    for &name in required {
        if !df.get_column_names().iter().any(|c| c.as_str() == name) {
            error!("Table '{}' is missing required column '{}'", table, name);
            return Err(PolarsError::ColumnNotFound(
                format!("{table}: required column '{name}' not found").into(),
            ));
        }
    }
    Ok(())
}

/// Extract a column as `Vec<Option<f64>>`, casting to Float64 first when the
/// CSV reader inferred an integer dtype.
pub fn extract_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = df.column(name)?;
    let casted = match series.f64() {
        Ok(ca) => ca.clone(),
        Err(_) => {
            info!("Casting column '{}' to f64", name);
            series.cast(&DataType::Float64)?.f64()?.clone()
        }
    };
    Ok(casted.into_iter().collect())
}

/// Same as [`extract_f64`] but nulls are an error - used for columns the
/// renderers cannot tolerate holes in (counts, baseMean).
pub fn extract_f64_dense(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    extract_f64(df, name)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PolarsError::ComputeError(format!("column '{name}' contains null values").into())
            })
        })
        .collect()
}

pub fn extract_str(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect())
}

/// Pad a value range so points are not drawn on the plot border.
pub fn pad_range(min_val: f64, max_val: f64, pct: f64) -> (f64, f64) {
    if (max_val - min_val).abs() < 1e-9 {
        return (min_val - 1.0, max_val + 1.0);
    }
    let pad = (max_val - min_val) * pct;
    (min_val - pad, max_val + pad)
}

const CONFIG_FILE: &str = "./visualizer_config.json";

/// Resolve the run configuration: `visualizer_config.json` next to the
/// working directory wins, otherwise the built-in sample sheet.
pub fn resolve_config() -> PolarsResult<ReportConfig> {
    let path = Path::new(CONFIG_FILE);
    let config = if path.exists() {
        info!("Loading configuration from {}", CONFIG_FILE);
        let file = File::open(path).map_err(|e| polars_err(Box::new(e)))?;
        serde_json::from_reader(file).map_err(|e| polars_err(Box::new(e)))?
    } else {
        info!("No {} found, using built-in sample sheet", CONFIG_FILE);
        ReportConfig::default()
    };
    config.validate()?;
    Ok(config)
}
