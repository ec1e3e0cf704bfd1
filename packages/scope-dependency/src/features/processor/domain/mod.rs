pub mod error;
pub mod processor_info;
pub mod report;

pub use error::{ProcessorError, ProcessorResult};
pub use processor_info::{ProcessorInfo, CURRENT_FIELD};
pub use report::{ColumnDependency, DependencyReport, ReportSummary, ReportedColumn};
