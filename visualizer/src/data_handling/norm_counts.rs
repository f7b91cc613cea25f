use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;
use polars::prelude::*;
use tracing::{error, info};

use crate::helper_functions::{extract_f64_dense, extract_str, read_csv, require_columns};
use crate::models::ReportConfig;

pub const GENE_ID: &str = "gene_id";

/// Load the normalized-counts table. Requires `gene_id` plus one column per
/// configured sample; sample columns are cast to Float64 up front so the
/// renderers never have to.
pub fn load(path: &Path, config: &ReportConfig) -> PolarsResult<DataFrame> {
    info!("Reading normalized counts from {}", path.display());
    let mut df = match read_csv(path) {
        Ok(df) => df,
        Err(e) => {
            error!("Failed to read normalized counts CSV: {}", e);
            return Err(e);
        }
    };

    let mut required: Vec<&str> = vec![GENE_ID];
    required.extend(config.samples.iter().map(|s| s.as_str()));
    require_columns(&df, &required, "normalized_counts")?;

    for sample in &config.samples {
        let s = df.column(sample)?.cast(&DataType::Float64)?;
        df = df.with_column(s)?.clone();
    }

    info!(
        "Loaded counts for {} genes across {} samples",
        df.height(),
        config.samples.len()
    );
    Ok(df)
}

/// Map gene_id -> row index, used for set-membership filtering of the
/// top-gene selections. Genes absent from this map are silently excluded.
pub fn gene_index(df: &DataFrame) -> PolarsResult<HashMap<String, usize>> {
    Ok(extract_str(df, GENE_ID)?
        .into_iter()
        .enumerate()
        .map(|(idx, gene)| (gene, idx))
        .collect())
}

/// Per-sample expression values for one gene row, in sample-sheet order.
pub fn row_counts(df: &DataFrame, row: usize, samples: &[String]) -> PolarsResult<Vec<f64>> {
    samples
        .iter()
        .map(|sample| {
            df.column(sample)?.f64()?.get(row).ok_or_else(|| {
                PolarsError::ComputeError(
                    format!("null count for sample '{sample}' at row {row}").into(),
                )
            })
        })
        .collect()
}

/// The full counts matrix as samples x genes, in sample-sheet order.
pub fn sample_matrix(df: &DataFrame, samples: &[String]) -> PolarsResult<Array2<f64>> {
    let n_genes = df.height();
    let mut columns = Vec::with_capacity(samples.len());
    for sample in samples {
        columns.push(extract_f64_dense(df, sample)?);
    }
    Ok(Array2::from_shape_fn((samples.len(), n_genes), |(i, j)| {
        columns[i][j]
    }))
}

//───────────────────────────────── tests ───────────────────────────────────//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    fn small_config(dir: &Path) -> ReportConfig {
        ReportConfig {
            tables_dir: dir.to_path_buf(),
            figures_dir: dir.join("figures"),
            samples: vec!["s1".into(), "s2".into(), "s3".into(), "s4".into()],
            conditions: vec![
                Condition::Normal,
                Condition::Normal,
                Condition::Tumor,
                Condition::Tumor,
            ],
        }
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        let path = dir.join("normalized_counts.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "gene_id,s1,s2,s3,s4").unwrap();
        writeln!(f, "geneA,10,12,200,210").unwrap();
        writeln!(f, "geneB,5.5,6.5,7.5,8.5").unwrap();
        path
    }

    #[test]
    fn loads_and_casts_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let cfg = small_config(dir.path());

        let df = load(&path, &cfg).unwrap();
        assert_eq!(df.height(), 2);
        // integer CSV column must come back as f64
        assert_eq!(row_counts(&df, 0, &cfg.samples).unwrap(), vec![10.0, 12.0, 200.0, 210.0]);
    }

    #[test]
    fn missing_sample_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let mut cfg = small_config(dir.path());
        cfg.samples.push("s5".into());
        cfg.conditions.push(Condition::Tumor);

        let err = load(&path, &cfg).unwrap_err();
        assert!(err.to_string().contains("s5"), "{err}");
    }

    #[test]
    fn gene_index_covers_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let cfg = small_config(dir.path());
        let df = load(&path, &cfg).unwrap();

        let idx = gene_index(&df).unwrap();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx["geneA"], 0);
        assert_eq!(idx["geneB"], 1);
        assert!(!idx.contains_key("geneC"));
    }

    #[test]
    fn sample_matrix_is_samples_by_genes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let cfg = small_config(dir.path());
        let df = load(&path, &cfg).unwrap();

        let m = sample_matrix(&df, &cfg.samples).unwrap();
        assert_eq!(m.shape(), &[4, 2]);
        assert_eq!(m[[2, 0]], 200.0);
        assert_eq!(m[[3, 1]], 8.5);
    }
}
