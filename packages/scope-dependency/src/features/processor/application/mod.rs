mod analyzer;

pub use analyzer::{ProcessorAnalysis, ProcessorAnalyzer};
