use ndarray::{Array2, Axis};
use ndarray_stats::QuantileExt;
use plotters::prelude::*;
use polars::prelude::*;
use tracing::{debug, info};

use crate::analysis::significance::TopGene;
use crate::data_handling::norm_counts;
use crate::models::{polars_err, ReportConfig};

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 1800;

/// Std floor guarding zero-variance rows; such rows render as all-zero
/// z-scores instead of dividing by zero.
const STD_FLOOR: f64 = 1e-9;

/// Z-score each row: subtract the row mean, divide by the row standard
/// deviation (ddof = 1), in that order.
pub fn zscore_rows(data: &Array2<f64>) -> PolarsResult<Array2<f64>> {
    let means = data.mean_axis(Axis(1)).ok_or_else(|| {
        PolarsError::ComputeError("z-score: matrix has no sample columns".into())
    })?;
    let stds = data.std_axis(Axis(1), 1.0).mapv(|s| s.max(STD_FLOOR));

    let centered = data - &means.insert_axis(Axis(1));
    Ok(centered / &stds.insert_axis(Axis(1)))
}

/// Two-colour diverging map centered at 0: blue for low, white at 0, red for
/// high, saturating at +/- vmax.
pub fn diverging_color(z: f64, vmax: f64) -> RGBColor {
    let t = (z / vmax).clamp(-1.0, 1.0);
    let lerp = |a: u8, b: u8, w: f64| (a as f64 + (b as f64 - a as f64) * w).round() as u8;
    if t < 0.0 {
        let w = -t;
        RGBColor(lerp(255, 33, w), lerp(255, 102, w), lerp(255, 172, w))
    } else {
        RGBColor(lerp(255, 178, t), lerp(255, 24, t), lerp(255, 43, t))
    }
}

/// Render the z-scored expression heatmap for the top selected genes.
/// Emits nothing when the selection is empty.
pub fn render_heatmap(
    top_genes: &[TopGene],
    counts: &DataFrame,
    config: &ReportConfig,
) -> PolarsResult<()> {
    if top_genes.is_empty() {
        info!("No significant genes found, skipping heatmap");
        return Ok(());
    }
    info!("Creating heatmap...");

    // Set-membership filter: selected genes absent from the counts table are
    // excluded, keeping selection order.
    let index = norm_counts::gene_index(counts)?;
    let mut kept: Vec<&TopGene> = Vec::with_capacity(top_genes.len());
    for gene in top_genes {
        if index.contains_key(&gene.gene_id) {
            kept.push(gene);
        } else {
            debug!("Gene {} not present in counts table", gene.gene_id);
        }
    }
    if kept.is_empty() {
        info!("None of the selected genes are present in the counts table, skipping heatmap");
        return Ok(());
    }

    let n_genes = kept.len();
    let n_samples = config.samples.len();

    let mut data = Array2::<f64>::zeros((n_genes, n_samples));
    for (i, gene) in kept.iter().enumerate() {
        let row = norm_counts::row_counts(counts, index[&gene.gene_id], &config.samples)?;
        for (j, count) in row.iter().enumerate() {
            data[[i, j]] = (count + 1.0).log2();
        }
    }

    let z = zscore_rows(&data)?;

    // Symmetric colour limits from the data, like a 0-centered heatmap scale
    let abs = z.mapv(f64::abs);
    let mut vmax = *abs.max().map_err(|e| polars_err(Box::new(e)))?;
    if vmax <= 0.0 {
        vmax = 1.0;
    }

    let output_path = config.figures_dir.join("heatmap.png");
    let root = BitMapBackend::new(&output_path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let gene_labels: Vec<String> = kept.iter().map(|g| g.gene_id.clone()).collect();
    let sample_labels = config.samples.clone();

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Top {} Differentially Expressed Genes", n_genes),
            ("sans-serif", 30),
        )
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(140)
        .build_cartesian_2d(
            -0.5..n_samples as f64 - 0.5,
            -0.5..n_genes as f64 - 0.5,
        )
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_samples)
        .y_labels(n_genes.min(50))
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 11))
        .x_label_formatter(&|val: &f64| {
            if (val - val.round()).abs() > 0.3 {
                return String::new();
            }
            let idx = val.round() as usize;
            sample_labels.get(idx).cloned().unwrap_or_default()
        })
        .y_label_formatter(&|val: &f64| {
            if (val - val.round()).abs() > 0.3 {
                return String::new();
            }
            // first selected gene on the top row
            let idx = n_genes as i64 - 1 - val.round() as i64;
            if idx >= 0 {
                gene_labels.get(idx as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    let mut cells = Vec::with_capacity(n_genes * n_samples);
    for i in 0..n_genes {
        // first selected gene on the top row
        let y = (n_genes - 1 - i) as f64;
        for j in 0..n_samples {
            cells.push(Rectangle::new(
                [(j as f64 - 0.5, y - 0.5), (j as f64 + 0.5, y + 0.5)],
                diverging_color(z[[i, j]], vmax).filled(),
            ));
        }
    }
    chart
        .draw_series(cells)
        .map_err(|e| polars_err(Box::new(e)))?;

    root.present().map_err(|e| polars_err(Box::new(e)))?;
    info!("Saved heatmap.png");
    Ok(())
}

//───────────────────────────────── tests ───────────────────────────────────//
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn zscore_rows_unit_moments() {
        let data = array![[1.0, 2.0, 3.0, 4.0], [10.0, 20.0, 30.0, 40.0]];
        let z = zscore_rows(&data).unwrap();
        for i in 0..2 {
            let row = z.row(i);
            let mean = row.mean().unwrap();
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12, "row {i} mean {mean}");
            assert!((var.sqrt() - 1.0).abs() < 1e-12, "row {i} std {}", var.sqrt());
        }
    }

    #[test]
    fn zscore_zero_variance_row_is_flat() {
        let data = array![[5.0, 5.0, 5.0]];
        let z = zscore_rows(&data).unwrap();
        assert!(z.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn diverging_color_endpoints() {
        assert_eq!(diverging_color(0.0, 2.0), RGBColor(255, 255, 255));
        assert_eq!(diverging_color(2.0, 2.0), RGBColor(178, 24, 43));
        assert_eq!(diverging_color(-2.0, 2.0), RGBColor(33, 102, 172));
        // values past the limit saturate
        assert_eq!(diverging_color(10.0, 2.0), diverging_color(2.0, 2.0));
    }
}
