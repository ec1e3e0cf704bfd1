mod binding;
mod callees;
mod manager;
mod pta;

pub use binding::{bind_callee_to_caller, bind_caller_to_callee};
pub use manager::InterproceduralManager;
