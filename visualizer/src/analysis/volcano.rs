use plotters::prelude::*;
use polars::prelude::*;
use tracing::{info, warn};

use crate::analysis::significance::{self, RegulationClass, PADJ_THRESHOLD};
use crate::helper_functions::{extract_f64, extract_f64_dense, pad_range};
use crate::models::{polars_err, ReportConfig};

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 1200;

/// Scatter log2 fold change against -log10(padj) with dashed threshold
/// lines, one point per gene.
pub fn render_volcano(df: &DataFrame, config: &ReportConfig) -> PolarsResult<()> {
    info!("Creating volcano plot...");

    let lfc = extract_f64(df, "log2FoldChange")?;
    let neg_log10 = extract_f64_dense(df, significance::NEG_LOG10_PADJ)?;
    let significant = df.column(significance::SIGNIFICANT)?.bool()?;

    let mut points: Vec<(f64, f64, RegulationClass)> = Vec::with_capacity(df.height());
    let mut skipped_rows = 0;
    for i in 0..df.height() {
        match lfc[i] {
            Some(fc) => {
                let class = significance::classify(significant.get(i).unwrap_or(false), fc);
                points.push((fc, neg_log10[i], class));
            }
            None => skipped_rows += 1,
        }
    }
    if skipped_rows > 0 {
        warn!("Skipped {} rows with null log2FoldChange", skipped_rows);
    }
    if points.is_empty() {
        return Err(PolarsError::ComputeError(
            "volcano plot: no rows with a log2 fold change".into(),
        ));
    }

    let x_min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let sig_line = -PADJ_THRESHOLD.log10();

    // Axis ranges must contain the threshold lines even when no point does
    let (x_lo, x_hi) = pad_range(x_min.min(-1.5), x_max.max(1.5), 0.05);
    let (_, y_hi) = pad_range(0.0, y_max.max(sig_line * 1.2), 0.05);

    let output_path = config.figures_dir.join("volcano_plot.png");
    let root = BitMapBackend::new(&output_path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Volcano Plot", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .x_desc("log2 Fold Change (Tumor vs Normal)")
        .y_desc("-log10(adjusted p-value)")
        .axis_desc_style(("sans-serif", 20))
        .label_style(("sans-serif", 16))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y, class)| Circle::new((x, y), 3, class.color().mix(0.5).filled())),
        )
        .map_err(|e| polars_err(Box::new(e)))?;

    // Significance threshold and the two fold-change thresholds
    chart
        .draw_series(DashedLineSeries::new(
            vec![(x_lo, sig_line), (x_hi, sig_line)],
            8,
            6,
            BLACK.stroke_width(1),
        ))
        .map_err(|e| polars_err(Box::new(e)))?;
    for x in [-1.0, 1.0] {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(x, 0.0), (x, y_hi)],
                8,
                6,
                BLACK.stroke_width(1),
            ))
            .map_err(|e| polars_err(Box::new(e)))?;
    }

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    info!("Saved volcano_plot.png");
    Ok(())
}
