pub mod de_results;
pub mod norm_counts;
