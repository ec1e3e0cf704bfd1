//! In-memory program repository
//!
//! Used by tests and by front ends that already hold decoded bodies.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::ProgramRepository;
use crate::shared::models::{MethodBody, MethodRef, TypeRef};

#[derive(Debug, Default, Clone)]
pub struct InMemoryProgram {
    /// Keyed by method signature
    bodies: FxHashMap<String, Arc<MethodBody>>,
    /// Keyed by type full name
    base_types: FxHashMap<String, TypeRef>,
}

impl InMemoryProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a method body
    pub fn with_method(mut self, body: MethodBody) -> Self {
        self.add_method(body);
        self
    }

    /// Builder: record `derived : base`
    pub fn with_base_type(mut self, derived: &TypeRef, base: TypeRef) -> Self {
        self.base_types.insert(derived.full_name(), base);
        self
    }

    pub fn add_method(&mut self, body: MethodBody) {
        self.bodies.insert(body.method.signature(), Arc::new(body));
    }

    pub fn method_count(&self) -> usize {
        self.bodies.len()
    }
}

impl ProgramRepository for InMemoryProgram {
    fn method_body(&self, method: &MethodRef) -> Option<Arc<MethodBody>> {
        self.bodies.get(&method.signature()).cloned()
    }

    fn base_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        self.base_types.get(&ty.full_name()).cloned()
    }
}
