pub mod expression_propagation;
pub mod range_analysis;

pub use expression_propagation::{Expression, ExpressionMap};
pub use range_analysis::{constant_range, RangeAnalysis, RangeAnalysisResult};
