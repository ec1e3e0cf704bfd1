//! Common test utilities for scope-dependency
//!
//! This module provides shared fixtures, assertions, and builders
//! for the integration and end-to-end tests.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
