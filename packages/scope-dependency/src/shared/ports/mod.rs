//! Ports (interfaces) to the program being analyzed
//!
//! The analyses never load binaries themselves. A [`ProgramRepository`]
//! supplies method bodies (with their CFGs) and answers dispatch questions.

mod in_memory;

pub use in_memory::InMemoryProgram;

use std::sync::Arc;

use crate::shared::models::{MethodBody, MethodRef, TypeRef};

/// Supplier of method bodies and type hierarchy facts
pub trait ProgramRepository {
    /// Analyzable body of a method, if the method is defined in a loaded unit
    fn method_body(&self, method: &MethodRef) -> Option<Arc<MethodBody>>;

    /// Direct base class of a type
    fn base_type(&self, ty: &TypeRef) -> Option<TypeRef>;

    /// Walk `receiver` and its base classes looking for a definition with
    /// the same signature. Falls back to the reference itself.
    fn find_method_implementation(&self, receiver: &TypeRef, method: &MethodRef) -> MethodRef {
        let mut current = Some(receiver.clone());
        let mut steps = 0usize;
        while let Some(ty) = current {
            let candidate = method.declared_on(ty.clone());
            if self.method_body(&candidate).is_some() {
                return candidate;
            }
            // guard against cyclic hierarchies in malformed input
            steps += 1;
            if steps > 64 {
                break;
            }
            current = self.base_type(&ty);
        }
        method.clone()
    }
}
