pub mod call_info;
pub mod call_stack;

pub use call_info::{CallInfo, CallSiteKey, CalleeTarget, InterProcResult, PotentialCallees};
pub use call_stack::CallStack;
