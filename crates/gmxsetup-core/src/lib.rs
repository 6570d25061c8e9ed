//! # gmxsetup Core Library
//!
//! Automates the boring parts of setting up a GROMACS molecular-dynamics simulation:
//! topology generation, solvation and neutralization, energy minimization, and the
//! preparation of run input for position-restrained and equilibrium MD.
//!
//! The physics is delegated entirely to the GROMACS command-line tools. This library
//! sequences them, keeps every stage in its own working directory, edits parameter-file
//! templates, and derives the few secondary parameters (ion counts, temperature-coupling
//! groups) that depend on the output of earlier tool calls.
//!
//! ## Architectural Philosophy
//!
//! - **[`core`]: The Foundation.** Stateless helpers: the [`core::tools::ToolRunner`]
//!   seam through which every external program is invoked, the mdp editor, the
//!   `make_ndx` listing parser, and the template provider.
//!
//! - **[`engine`]: The Policy Layer.** Stage configuration and defaults, the error type,
//!   progress reporting, the stage-directory executor, the index-group builder, and the
//!   pure functions that derive simulation parameters.
//!
//! - **[`workflows`]: The Public API.** One function per setup stage, each returning a
//!   [`engine::state::StageOutput`] that can be fed into the next stage, plus a driver
//!   that runs the whole chain.

pub mod core;
pub mod engine;
pub mod workflows;
