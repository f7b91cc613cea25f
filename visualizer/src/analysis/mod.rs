pub mod barcharts;
pub mod heatmap;
pub mod ma_plot;
pub mod pca;
pub mod significance;
pub mod volcano;
