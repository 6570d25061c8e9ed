//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows.
//!
//! - **Tools** ([`tools`]) - The external-program seam: [`tools::Invocation`] describes a
//!   GROMACS call, [`tools::ToolRunner`] executes it.
//! - **Parameter files** ([`mdp`]) - Keyword substitution into mdp templates.
//! - **Index listings** ([`ndx`]) - Parsing of the group table printed by `make_ndx`.
//! - **Text templates** ([`text`]) - Line-oriented regex substitution for job scripts.
//! - **Templates** ([`templates`]) - Built-in and user-provided template lookup.

pub mod mdp;
pub mod ndx;
pub mod templates;
pub mod text;
pub mod tools;
