use std::error::Error;
use std::path::PathBuf;

use plotters::style::RGBColor;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Wrap a foreign error (I/O, plotters backend, serde) into a PolarsError so
/// the whole pipeline can stay on `PolarsResult`.
pub fn polars_err(e: Box<dyn Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{e}").into())
}

/// Experimental condition of a sequencing sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Normal,
    Tumor,
}

impl Condition {
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Normal => "Normal",
            Condition::Tumor => "Tumor",
        }
    }

    /// Fixed two-colour mapping used by the PCA plot and the bar charts.
    pub fn color(&self) -> RGBColor {
        match self {
            Condition::Normal => RGBColor(0x34, 0x98, 0xdb), // #3498db
            Condition::Tumor => RGBColor(0xe7, 0x4c, 0x3c),  // #e74c3c
        }
    }
}

/// Run configuration: where the input tables live, where figures go, and the
/// sample sheet (ordered sample ids with their condition labels).
///
/// The sample sheet is configuration, not something derived from the input
/// files - the counts table is only required to carry a column per sample
/// listed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub tables_dir: PathBuf,
    pub figures_dir: PathBuf,
    pub samples: Vec<String>,
    pub conditions: Vec<Condition>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            tables_dir: PathBuf::from("./results/tables"),
            figures_dir: PathBuf::from("./results/figures"),
            samples: [
                "SRR975551", "SRR975552", "SRR975553", "SRR975554", "SRR975555", "SRR975556",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            conditions: vec![
                Condition::Normal,
                Condition::Normal,
                Condition::Normal,
                Condition::Tumor,
                Condition::Tumor,
                Condition::Tumor,
            ],
        }
    }
}

impl ReportConfig {
    pub fn de_results_path(&self) -> PathBuf {
        self.tables_dir.join("deseq2_all_results.csv")
    }

    pub fn norm_counts_path(&self) -> PathBuf {
        self.tables_dir.join("normalized_counts.csv")
    }

    /// Every sample id must have exactly one condition label.
    pub fn validate(&self) -> PolarsResult<()> {
        if self.samples.len() != self.conditions.len() {
            return Err(PolarsError::ComputeError(
                format!(
                    "sample sheet mismatch: {} samples but {} condition labels",
                    self.samples.len(),
                    self.conditions.len()
                )
                .into(),
            ));
        }
        if self.samples.is_empty() {
            return Err(PolarsError::ComputeError(
                "sample sheet is empty".into(),
            ));
        }
        Ok(())
    }
}

//───────────────────────────────── tests ───────────────────────────────────//
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_sheet_is_paired() {
        let cfg = ReportConfig::default();
        assert_eq!(cfg.samples.len(), 6);
        assert_eq!(cfg.conditions.len(), 6);
        cfg.validate().unwrap();
    }

    #[test]
    fn condition_colors() {
        assert_eq!(Condition::Normal.color(), RGBColor(0x34, 0x98, 0xdb));
        assert_eq!(Condition::Tumor.color(), RGBColor(0xe7, 0x4c, 0x3c));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = ReportConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ReportConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.samples, cfg.samples);
        assert_eq!(back.conditions, cfg.conditions);
    }

    #[test]
    fn unpaired_sheet_rejected() {
        let mut cfg = ReportConfig::default();
        cfg.conditions.pop();
        assert!(cfg.validate().is_err());
    }
}
