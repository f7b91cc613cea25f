use ndarray::{Array2, Axis};
use ndarray_linalg::SVD;
use plotters::prelude::*;
use polars::prelude::*;
use tracing::info;

use crate::data_handling::norm_counts;
use crate::helper_functions::pad_range;
use crate::models::{polars_err, Condition, ReportConfig};

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 1200;

/// Two-component projection of the sample expression profiles.
#[derive(Debug, Clone)]
pub struct PcaProjection {
    /// (PC1, PC2) per sample, in sample-sheet order.
    pub scores: Vec<(f64, f64)>,
    /// Fraction of total variance carried by each retained component.
    pub explained_ratio: (f64, f64),
}

/// Fit a 2-component PCA on a samples x features matrix: center the feature
/// columns, decompose with SVD, project onto the first two right singular
/// directions (scores = U * Sigma).
pub fn fit_pca(matrix: &Array2<f64>) -> PolarsResult<PcaProjection> {
    let (n_samples, n_features) = matrix.dim();
    if n_samples < 2 || n_features < 2 {
        return Err(PolarsError::ComputeError(
            format!("PCA needs at least 2 samples and 2 genes, got {n_samples}x{n_features}")
                .into(),
        ));
    }

    let means = matrix
        .mean_axis(Axis(0))
        .ok_or_else(|| PolarsError::ComputeError("PCA: empty matrix".into()))?;
    let centered = matrix - &means;

    let (u, s, _) = centered
        .svd(true, false)
        .map_err(|e| polars_err(Box::new(e)))?;
    let u = u.ok_or_else(|| PolarsError::ComputeError("SVD returned no U matrix".into()))?;

    let total: f64 = s.iter().map(|v| v * v).sum();
    let explained_ratio = if total > 0.0 {
        (s[0] * s[0] / total, s[1] * s[1] / total)
    } else {
        (0.0, 0.0)
    };

    let scores = (0..n_samples)
        .map(|i| (u[[i, 0]] * s[0], u[[i, 1]] * s[1]))
        .collect();

    Ok(PcaProjection {
        scores,
        explained_ratio,
    })
}

/// Render the sample PCA scatter: log2(count+1) over all genes, one point
/// per sample coloured by condition and annotated with the sample id.
pub fn render_pca(counts: &DataFrame, config: &ReportConfig) -> PolarsResult<()> {
    info!("Creating PCA plot...");

    let matrix = norm_counts::sample_matrix(counts, &config.samples)?
        .mapv(|count| (count + 1.0).log2());
    let pca = fit_pca(&matrix)?;

    let x_min = pca.scores.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x_max = pca.scores.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y_min = pca.scores.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y_max = pca.scores.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let (x_lo, x_hi) = pad_range(x_min, x_max, 0.1);
    let (y_lo, y_hi) = pad_range(y_min, y_max, 0.1);

    let output_path = config.figures_dir.join("pca_plot.png");
    let root = BitMapBackend::new(&output_path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| polars_err(Box::new(e)))?;

    let (r1, r2) = pca.explained_ratio;
    let mut chart = ChartBuilder::on(&root)
        .caption("PCA of Gene Expression", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(|e| polars_err(Box::new(e)))?;

    chart
        .configure_mesh()
        .x_desc(format!("PC1 ({:.1}%)", r1 * 100.0))
        .y_desc(format!("PC2 ({:.1}%)", r2 * 100.0))
        .axis_desc_style(("sans-serif", 20))
        .label_style(("sans-serif", 16))
        .draw()
        .map_err(|e| polars_err(Box::new(e)))?;

    // One series per condition so each gets a legend entry
    for condition in [Condition::Normal, Condition::Tumor] {
        let color = condition.color();
        let group: Vec<(f64, f64)> = config
            .conditions
            .iter()
            .zip(pca.scores.iter())
            .filter(|(c, _)| **c == condition)
            .map(|(_, &xy)| xy)
            .collect();
        if group.is_empty() {
            continue;
        }
        chart
            .draw_series(
                group
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 8, color.filled())),
            )
            .map_err(|e| polars_err(Box::new(e)))?
            .label(condition.label())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 14, y + 6)], color.filled())
            });
    }

    // Sample id next to each point, offset a few pixels up-right
    for (sample, &(x, y)) in config.samples.iter().zip(pca.scores.iter()) {
        chart
            .draw_series(std::iter::once(
                EmptyElement::at((x, y))
                    + Text::new(sample.clone(), (10, -18), ("sans-serif", 16).into_font()),
            ))
            .map_err(|e| polars_err(Box::new(e)))?;
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
    info!("Saved pca_plot.png");
    Ok(())
}

//───────────────────────────────── tests ───────────────────────────────────//
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// 3 "normal" and 3 "tumor" profiles over 4 genes, clearly separated.
    fn clustered_matrix() -> Array2<f64> {
        array![
            [1.0, 1.2, 8.0, 8.1],
            [1.1, 1.0, 8.2, 7.9],
            [0.9, 1.1, 7.9, 8.0],
            [8.0, 8.2, 1.0, 1.1],
            [8.1, 7.9, 1.2, 0.9],
            [7.9, 8.0, 0.9, 1.0],
        ]
    }

    #[test]
    fn projects_one_point_per_sample() {
        let pca = fit_pca(&clustered_matrix()).unwrap();
        assert_eq!(pca.scores.len(), 6);
    }

    #[test]
    fn explained_ratios_are_proper_fractions() {
        let pca = fit_pca(&clustered_matrix()).unwrap();
        let (r1, r2) = pca.explained_ratio;
        assert!((0.0..=1.0).contains(&r1));
        assert!((0.0..=1.0).contains(&r2));
        assert!(r1 + r2 <= 1.0 + 1e-9);
        assert!(r1 >= r2);
    }

    #[test]
    fn first_component_separates_clusters() {
        let pca = fit_pca(&clustered_matrix()).unwrap();
        let group_a: Vec<f64> = pca.scores[..3].iter().map(|p| p.0).collect();
        let group_b: Vec<f64> = pca.scores[3..].iter().map(|p| p.0).collect();
        let mean_a = group_a.iter().sum::<f64>() / 3.0;
        let mean_b = group_b.iter().sum::<f64>() / 3.0;
        assert!((mean_a - mean_b).abs() > 1.0, "PC1 means {mean_a} vs {mean_b}");
        // every member sits on its own group's side
        assert!(group_a.iter().all(|v| v.signum() == mean_a.signum()));
        assert!(group_b.iter().all(|v| v.signum() == mean_b.signum()));
    }

    #[test]
    fn constant_matrix_has_zero_explained_variance() {
        let matrix = Array2::from_elem((4, 3), 2.5);
        let pca = fit_pca(&matrix).unwrap();
        assert_eq!(pca.explained_ratio, (0.0, 0.0));
        for (x, y) in pca.scores {
            assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_degenerate_shapes() {
        assert!(fit_pca(&Array2::zeros((1, 5))).is_err());
        assert!(fit_pca(&Array2::zeros((5, 1))).is_err());
    }
}
