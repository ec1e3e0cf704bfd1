pub mod analysis;
pub mod transfer;

pub use analysis::{PointsToAnalysis, PointsToResult};
pub use transfer::PointsToTransfer;
