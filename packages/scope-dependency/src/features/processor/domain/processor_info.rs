//! What the driver needs to know about one processor

use serde::{Deserialize, Serialize};

use crate::features::dependency::domain::Schema;
use crate::shared::models::{MethodRef, TypeRef};

/// Field of the iterator class holding the row handed out by `yield return`
pub const CURRENT_FIELD: &str = "<>2__current";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorInfo {
    /// User class deriving from the runtime's processor / reducer base
    pub processor: TypeRef,
    /// `Process(input, output)`: creates and returns the iterator
    pub entry_method: MethodRef,
    /// Enumerator factory of the compiler generated iterator class
    pub get_enumerator: MethodRef,
    pub move_next: MethodRef,
    #[serde(default)]
    pub input_schema: Schema,
    #[serde(default)]
    pub output_schema: Schema,
}

impl ProcessorInfo {
    pub fn new(processor: TypeRef, entry_method: MethodRef, get_enumerator: MethodRef, move_next: MethodRef) -> Self {
        Self {
            processor,
            entry_method,
            get_enumerator,
            move_next,
            input_schema: Schema::default(),
            output_schema: Schema::default(),
        }
    }

    /// Builder: set the input and output schemas
    pub fn with_schemas(mut self, input: Schema, output: Schema) -> Self {
        self.input_schema = input;
        self.output_schema = output;
        self
    }

    /// Class `MoveNext` is declared on
    pub fn iterator_class(&self) -> &TypeRef {
        &self.move_next.containing_type
    }

    pub fn name(&self) -> String {
        self.processor.full_name()
    }
}
