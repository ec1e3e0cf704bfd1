pub mod range_value;
pub mod variable_ranges;

pub use range_value::{RangeValue, STRING_TOP};
pub use variable_ranges::VariableRangeDomain;
