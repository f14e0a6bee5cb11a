//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! tasks, steps, the registry that holds them, and the results of a run.

pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod step;
pub mod task;

pub use error::*;
pub use registry::*;
pub use state::*;
pub use step::*;
pub use task::*;
