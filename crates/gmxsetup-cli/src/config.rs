//! Layered configuration: stage defaults, then the outputs of a previous stage, then the
//! TOML configuration file with its `--set` overrides, then command-line flags.

pub mod builder;
pub mod file;

pub use builder::{
    build_md, build_minimize, build_pipeline, build_runner, build_solvate, build_templates,
    build_topology, load_previous,
};
pub use file::FileConfig;
