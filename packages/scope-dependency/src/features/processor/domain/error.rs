//! Structural failures of a processor
//!
//! Unlike [`crate::errors::AnalysisFailure`], these are not folded into a
//! conservative state: the processor cannot be analyzed at all and the
//! failure is surfaced to the caller.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// One of the methods the driver needs has no body
    #[error("Processor {processor}: no body for {role} method {method}")]
    MissingMethod {
        processor: String,
        role: &'static str,
        method: String,
    },

    /// The entry method must receive exactly one input and one output table
    #[error("Processor {processor}: expected one input and one output table, found {inputs} and {outputs}")]
    ProtectedNodes {
        processor: String,
        inputs: usize,
        outputs: usize,
    },

    #[error("Processor {processor}: {reason}")]
    Unsupported { processor: String, reason: String },
}

pub type ProcessorResult<T> = std::result::Result<T, ProcessorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_nodes_message() {
        let err = ProcessorError::ProtectedNodes {
            processor: "Demo.Proc".into(),
            inputs: 0,
            outputs: 1,
        };
        assert_eq!(
            err.to_string(),
            "Processor Demo.Proc: expected one input and one output table, found 0 and 1"
        );
    }
}
