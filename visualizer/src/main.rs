use std::fs::create_dir_all;

use polars::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::{barcharts, heatmap, ma_plot, pca, significance, volcano};
use crate::data_handling::{de_results, norm_counts};
use crate::helper_functions::resolve_config;
use crate::models::{polars_err, ReportConfig};

mod analysis;
mod data_handling;
mod helper_functions;
mod models;

fn main() -> PolarsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Step 10: Visualization");

    let config = resolve_config()?;
    run(&config)?;

    info!(
        "Visualization complete! Figures in: {}",
        config.figures_dir.display()
    );
    Ok(())
}

/// Render the full report: load both tables, then draw each figure family in
/// a fixed order, strictly sequential. Each drawing surface is flushed and
/// dropped before the next stage begins.
fn run(config: &ReportConfig) -> PolarsResult<()> {
    create_dir_all(&config.figures_dir).map_err(|e| polars_err(Box::new(e)))?;

    info!("Loading data...");
    let de = de_results::load(&config.de_results_path())?;
    let counts = norm_counts::load(&config.norm_counts_path(), config)?;

    volcano::render_volcano(&de, config)?;
    ma_plot::render_ma(&de, config)?;

    let top_genes = significance::top_significant(&de, 50)?;
    if !top_genes.is_empty() {
        significance::save_top_genes(&config.figures_dir.join("top_genes.csv"), &top_genes)?;
    }
    heatmap::render_heatmap(&top_genes, &counts, config)?;

    pca::render_pca(&counts, config)?;

    let top10 = &top_genes[..top_genes.len().min(10)];
    barcharts::render_barcharts(top10, &counts, config)?;

    Ok(())
}
