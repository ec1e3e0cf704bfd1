//! Error types for scope-dependency
//!
//! [`AnalysisFailure`] is returned at every interprocedural boundary. The
//! caller never propagates it further: it folds the failure into the
//! conservative state (arguments escape, domain goes top).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisFailure {
    /// The callee resolved but has no analyzable body
    #[error("Method {0} has no body")]
    MissingBody(String),

    /// Arguments and parameters of a call do not line up
    #[error("Call to {method} passes {arguments} arguments for {parameters} parameters")]
    ArgumentMismatch {
        method: String,
        arguments: usize,
        parameters: usize,
    },

    #[error("Call depth {depth} exceeded analyzing {method}")]
    DepthExceeded { method: String, depth: usize },
}

pub type Result<T> = std::result::Result<T, AnalysisFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            AnalysisFailure::MissingBody("Demo.Sink.Send(String)".into()).to_string(),
            "Method Demo.Sink.Send(String) has no body"
        );
        let mismatch = AnalysisFailure::ArgumentMismatch {
            method: "Run".into(),
            arguments: 1,
            parameters: 2,
        };
        assert!(mismatch.to_string().contains("1 arguments for 2 parameters"));
    }
}
