use super::{md, minimize, solvate, topology};
use crate::engine::config::{MdConfig, MinimizeConfig, SolvateConfig, TopologyConfig};
use crate::engine::context::SetupContext;
use crate::engine::error::SetupError;
use crate::engine::state::StageOutput;
use tracing::{info, instrument};

/// Configuration of every stage of a full setup.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// `None` skips the topology stage; `top/` is then expected to exist already.
    pub topology: Option<TopologyConfig>,
    pub solvate: SolvateConfig,
    pub minimize: MinimizeConfig,
    pub restrained: MdConfig,
    /// Equilibrium MD needs the final frame of the restrained run, so it is opt-in.
    pub equilibrium: Option<MdConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: None,
            solvate: SolvateConfig::default(),
            minimize: MinimizeConfig::default(),
            restrained: MdConfig::restrained(),
            equilibrium: None,
        }
    }
}

/// Runs topology (optional), solvation, minimization and the restrained MD setup, each
/// stage starting from the output of the one before.
///
/// Returns the outputs of all stages that ran, in order.
#[instrument(skip_all, name = "setup_pipeline", fields(root = ?ctx.root()))]
pub fn run(ctx: &SetupContext, config: &PipelineConfig) -> Result<Vec<StageOutput>, SetupError> {
    let mut outputs = Vec::new();

    let mut solvate_config = config.solvate.clone();
    if let Some(topology_config) = &config.topology {
        let out = topology::run(ctx, topology_config)?;
        solvate_config.chain(&out);
        outputs.push(out);
    }

    let solvated = solvate::run(ctx, &solvate_config)?;
    let mut minimize_config = config.minimize.clone();
    minimize_config.chain(&solvated);
    outputs.push(solvated);

    let minimized = minimize::run(ctx, &minimize_config)?;
    let mut restrained_config = config.restrained.clone();
    restrained_config.chain(&minimized);
    outputs.push(minimized);

    let restrained = md::restrained(ctx, &restrained_config)?;
    let next = config.equilibrium.clone().map(|mut c| {
        c.chain(&restrained);
        c
    });
    outputs.push(restrained);

    if let Some(equilibrium_config) = next {
        outputs.push(md::equilibrium(ctx, &equilibrium_config)?);
    }

    let warnings: usize = outputs.iter().map(|o| o.warnings.len()).sum();
    info!(stages = outputs.len(), warnings, "Setup complete.");
    Ok(outputs)
}
