//! # Engine Module
//!
//! The policy layer between the stateless [`crate::core`] helpers and the stage functions in
//! [`crate::workflows`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Per-stage settings, their defaults, and the rules for
//!   taking over the results of a previous stage
//! - **Context** ([`context`]) - Tool runner, template store, progress reporter and project
//!   root shared by every stage
//! - **Working directories** ([`workdir`]) - Directory-scoped execution of a stage
//! - **Derived parameters** ([`derive`]) - Ion counts, coupling groups, step counts; pure
//!   functions of earlier tool output
//! - **Index groups** ([`index`]) - The `__main__`/`__environment__` index builder
//! - **State** ([`state`]) - Stage outputs and warnings, persisted next to the stage files
//! - **Progress Monitoring** ([`progress`]) - Stage and tool events for front ends
//! - **Error Handling** ([`error`]) - The error type of every stage

pub mod config;
pub mod context;
pub mod derive;
pub mod error;
pub mod index;
pub mod progress;
pub mod state;
pub mod workdir;
