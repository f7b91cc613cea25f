use std::cmp::Ordering;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use plotters::style::RGBColor;
use polars::prelude::*;
use tracing::info;

use crate::helper_functions::{extract_f64, extract_str};
use crate::models::polars_err;

pub const PADJ_THRESHOLD: f64 = 0.05;
pub const LFC_THRESHOLD: f64 = 1.0;

/// Cap for -log10(padj) when padj underflows to 0, keeps axis ranges finite.
const NEG_LOG10_CAP: f64 = 300.0;

pub const NEG_LOG10_PADJ: &str = "neg_log10_padj";
pub const SIGNIFICANT: &str = "significant";

/// Three-way colour class shared by the volcano and MA plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationClass {
    Neutral,
    Up,
    Down,
}

impl RegulationClass {
    pub fn color(&self) -> RGBColor {
        match self {
            RegulationClass::Neutral => RGBColor(128, 128, 128),
            RegulationClass::Up => RGBColor(255, 0, 0),
            RegulationClass::Down => RGBColor(0, 0, 255),
        }
    }
}

/// -log10(padj) with a missing padj treated as 1.0, i.e. maximally
/// non-significant, and padj == 0 clamped so the result stays finite.
pub fn neg_log10_padj(padj: Option<f64>) -> f64 {
    let padj = padj.unwrap_or(1.0);
    if padj > 0.0 {
        (-padj.log10()).min(NEG_LOG10_CAP)
    } else {
        NEG_LOG10_CAP
    }
}

/// A gene is significant iff padj < 0.05 and |log2FC| > 1. A missing padj is
/// never significant.
pub fn is_significant(padj: Option<f64>, log2_fold_change: f64) -> bool {
    match padj {
        Some(p) => p < PADJ_THRESHOLD && log2_fold_change.abs() > LFC_THRESHOLD,
        None => false,
    }
}

/// Colour classification: non-significant genes are neutral, significant
/// genes split on the sign of the fold change.
pub fn classify(significant: bool, log2_fold_change: f64) -> RegulationClass {
    if !significant {
        RegulationClass::Neutral
    } else if log2_fold_change > 0.0 {
        RegulationClass::Up
    } else {
        RegulationClass::Down
    }
}

/// Append the derived `neg_log10_padj` and `significant` columns.
pub fn annotate(df: &mut DataFrame) -> PolarsResult<()> {
    let padj = extract_f64(df, "padj")?;
    let lfc = extract_f64(df, "log2FoldChange")?;

    let mut neg_log10 = Vec::with_capacity(df.height());
    let mut significant = Vec::with_capacity(df.height());
    for (p, fc) in padj.iter().zip(lfc.iter()) {
        neg_log10.push(neg_log10_padj(*p));
        significant.push(is_significant(*p, fc.unwrap_or(0.0)));
    }

    df.with_column(Series::new(PlSmallStr::from(NEG_LOG10_PADJ), neg_log10))?;
    df.with_column(Series::new(PlSmallStr::from(SIGNIFICANT), significant))?;
    Ok(())
}

/// One row of a top-gene selection.
#[derive(Debug, Clone)]
pub struct TopGene {
    pub gene_id: String,
    pub log2_fold_change: f64,
    pub padj: f64,
}

/// The `n` significant genes with the smallest padj. Ties on padj are broken
/// by gene id so the selection is deterministic regardless of input order.
pub fn top_significant(df: &DataFrame, n: usize) -> PolarsResult<Vec<TopGene>> {
    let gene_ids = extract_str(df, "gene_id")?;
    let padj = extract_f64(df, "padj")?;
    let lfc = extract_f64(df, "log2FoldChange")?;
    let significant = df.column(SIGNIFICANT)?.bool()?;

    let mut genes = Vec::new();
    for i in 0..df.height() {
        if significant.get(i) != Some(true) {
            continue;
        }
        // significant rows always carry a padj and a fold change
        if let (Some(p), Some(fc)) = (padj[i], lfc[i]) {
            genes.push(TopGene {
                gene_id: gene_ids[i].clone(),
                log2_fold_change: fc,
                padj: p,
            });
        }
    }

    genes.sort_by(|a, b| {
        a.padj
            .partial_cmp(&b.padj)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.gene_id.cmp(&b.gene_id))
    });
    genes.truncate(n);
    Ok(genes)
}

/// Save a top-gene selection next to the figures, one row per gene.
pub fn save_top_genes(path: &Path, genes: &[TopGene]) -> PolarsResult<()> {
    let mut file = File::create(path).map_err(|e| polars_err(Box::new(e)))?;

    writeln!(file, "gene_id,log2FoldChange,padj").map_err(|e| polars_err(Box::new(e)))?;
    for gene in genes {
        writeln!(
            file,
            "{},{:.4},{:.4e}",
            gene.gene_id, gene.log2_fold_change, gene.padj
        )
        .map_err(|e| polars_err(Box::new(e)))?;
    }

    info!("Top gene table saved to: {}", path.display());
    Ok(())
}
