use std::path::Path;

use polars::prelude::*;
use tracing::{error, info};

use crate::analysis::significance;
use crate::helper_functions::{read_csv, require_columns};

pub const GENE_ID: &str = "gene_id";
pub const BASE_MEAN: &str = "baseMean";
pub const LOG2_FOLD_CHANGE: &str = "log2FoldChange";
pub const PADJ: &str = "padj";

/// Load the DESeq2 results table and append the derived `neg_log10_padj`
/// and `significant` columns. Columns beyond the required four are carried
/// through untouched.
pub fn load(path: &Path) -> PolarsResult<DataFrame> {
    info!("Reading DE results from {}", path.display());
    let mut df = match read_csv(path) {
        Ok(df) => df,
        Err(e) => {
            error!("Failed to read DE results CSV: {}", e);
            return Err(e);
        }
    };

    require_columns(
        &df,
        &[GENE_ID, BASE_MEAN, LOG2_FOLD_CHANGE, PADJ],
        "deseq2_all_results",
    )?;

    significance::annotate(&mut df)?;

    info!("Loaded {} genes from DE results", df.height());
    Ok(df)
}

//───────────────────────────────── tests ───────────────────────────────────//
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_fixture(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("deseq2_all_results.csv");
        let mut f = File::create(&path).unwrap();
        write!(f, "{body}").unwrap();
        path
    }

    #[test]
    fn loads_and_annotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(
            dir.path(),
            "gene_id,baseMean,log2FoldChange,padj\n\
             geneA,120.5,2.5,0.001\n\
             geneB,80.0,-3.0,0.2\n\
             geneC,10.0,0.1,NA\n",
        );

        let df = load(&path).unwrap();
        assert_eq!(df.height(), 3);

        let sig: Vec<bool> = df
            .column("significant")
            .unwrap()
            .bool()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(sig, vec![true, false, false]);

        // NA padj is treated as 1.0, so -log10 must be exactly 0
        let neg = df.column("neg_log10_padj").unwrap().f64().unwrap();
        assert_eq!(neg.get(2), Some(0.0));
        assert!(neg.into_no_null_iter().all(|v| v.is_finite() && v >= 0.0));
    }

    #[test]
    fn missing_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "gene_id,baseMean,padj\ngeneA,1.0,0.5\n");
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains(LOG2_FOLD_CHANGE), "{err}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Path::new("./nope/deseq2_all_results.csv")).is_err());
    }
}
