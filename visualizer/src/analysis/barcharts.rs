use plotters::prelude::*;
use plotters_backend::FontTransform;
use polars::prelude::*;
use tracing::{info, warn};

use crate::analysis::significance::TopGene;
use crate::data_handling::norm_counts;
use crate::models::{polars_err, Condition, ReportConfig};

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 900;

/// One bar chart per top gene: normalized count per sample, bars coloured by
/// condition. Emits nothing when the selection is empty.
pub fn render_barcharts(
    top_genes: &[TopGene],
    counts: &DataFrame,
    config: &ReportConfig,
) -> PolarsResult<()> {
    if top_genes.is_empty() {
        info!("No significant genes found to create bar charts for");
        return Ok(());
    }
    info!("Creating bar charts for top {} DE genes...", top_genes.len());

    let index = norm_counts::gene_index(counts)?;
    for gene in top_genes {
        let Some(&row) = index.get(&gene.gene_id) else {
            warn!("Gene {} not present in counts table, skipping bar chart", gene.gene_id);
            continue;
        };
        let gene_counts = norm_counts::row_counts(counts, row, &config.samples)?;
        draw_barchart(gene, &gene_counts, config)?;
        info!("Saved barchart_{}.png", gene.gene_id);
    }
    Ok(())
}

fn draw_barchart(gene: &TopGene, gene_counts: &[f64], config: &ReportConfig) -> PolarsResult<()> {
    let n_samples = config.samples.len();
    let y_max = gene_counts.iter().cloned().fold(0.0f64, f64::max);
    let y_hi = if y_max > 0.0 { y_max * 1.15 } else { 1.0 };

    let output_path = config
        .figures_dir
        .join(format!("barchart_{}.png", gene.gene_id));
    let root = BitMapBackend::new(&output_path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let caption = format!(
        "Gene: {} - log2FC: {:.2}, adj. p-value: {:.2e}",
        gene.gene_id, gene.log2_fold_change, gene.padj
    );

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(110)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5..n_samples as f64 - 0.5, 0.0..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    let sample_labels = config.samples.clone();
    let x_label_style = TextStyle::from(("sans-serif", 14)).transform(FontTransform::Rotate270);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_samples)
        .x_label_style(x_label_style)
        .x_label_formatter(&|val: &f64| {
            if (val - val.round()).abs() > 0.3 {
                return String::new();
            }
            let idx = val.round() as usize;
            sample_labels.get(idx).cloned().unwrap_or_default()
        })
        .x_desc("Sample")
        .y_desc("Normalized Count")
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    // One series per condition so each gets its own legend entry
    for condition in [Condition::Normal, Condition::Tumor] {
        let color = condition.color();
        let bars: Vec<(usize, f64)> = config
            .conditions
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == condition)
            .map(|(i, _)| (i, gene_counts[i]))
            .collect();
        if bars.is_empty() {
            continue;
        }
        chart
            .draw_series(bars.iter().map(|&(i, count)| {
                Rectangle::new(
                    [(i as f64 - 0.35, 0.0), (i as f64 + 0.35, count)],
                    color.filled(),
                )
            }))
            .map_err(|e| polars_err(Box::new(e)))?
            .label(condition.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", 16))
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    Ok(())
}
