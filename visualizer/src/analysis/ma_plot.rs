use plotters::prelude::*;
use polars::prelude::*;
use tracing::{info, warn};

use crate::analysis::significance::{self, RegulationClass};
use crate::helper_functions::{extract_f64, pad_range};
use crate::models::{polars_err, ReportConfig};

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 1200;

/// Scatter log10(mean expression + 1) against log2 fold change with the same
/// colour classes as the volcano plot.
pub fn render_ma(df: &DataFrame, config: &ReportConfig) -> PolarsResult<()> {
    info!("Creating MA plot...");

    let base_mean = extract_f64(df, "baseMean")?;
    let lfc = extract_f64(df, "log2FoldChange")?;
    let significant = df.column(significance::SIGNIFICANT)?.bool()?;

    let mut points: Vec<(f64, f64, RegulationClass)> = Vec::with_capacity(df.height());
    let mut skipped_rows = 0;
    for i in 0..df.height() {
        match (base_mean[i], lfc[i]) {
            (Some(mean), Some(fc)) => {
                let class = significance::classify(significant.get(i).unwrap_or(false), fc);
                points.push(((mean + 1.0).log10(), fc, class));
            }
            _ => skipped_rows += 1,
        }
    }
    if skipped_rows > 0 {
        warn!("Skipped {} rows with null baseMean or log2FoldChange", skipped_rows);
    }
    if points.is_empty() {
        return Err(PolarsError::ComputeError(
            "MA plot: no rows with baseMean and log2 fold change".into(),
        ));
    }

    let x_max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let (x_lo, x_hi) = pad_range(0.0, x_max, 0.05);
    // Reference lines at 0 and +/-1 must stay inside the frame
    let (y_lo, y_hi) = pad_range(y_min.min(-1.5), y_max.max(1.5), 0.05);

    let output_path = config.figures_dir.join("ma_plot.png");
    let root = BitMapBackend::new(&output_path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("MA Plot", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .x_desc("log10(Mean Expression)")
        .y_desc("log2 Fold Change")
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

    chart
        .draw_series(LineSeries::new(
            vec![(x_lo, 0.0), (x_hi, 0.0)],
            BLACK.stroke_width(1),
        ))
        .map_err(|e| polars_err(Box::new(e)))?;
    for y in [-1.0, 1.0] {
        chart
            .draw_series(DashedLineSeries::new(
                vec![(x_lo, y), (x_hi, y)],
                8,
                6,
                BLACK.stroke_width(1),
            ))
            .map_err(|e| polars_err(Box::new(e)))?;
    }

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    info!("Saved ma_plot.png");
    Ok(())
}
