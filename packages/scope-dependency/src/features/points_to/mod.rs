//! # Points-to Analysis
//!
//! Creation-site heap abstraction used to follow row and table objects
//! through fields, collections, delegates and call frames.

pub mod application;
pub mod domain;

pub use application::{PointsToAnalysis, PointsToResult, PointsToTransfer};
pub use domain::{DelegateTarget, NodeKind, NodeSet, PointsToGraph, PtgId, PtgNode};
