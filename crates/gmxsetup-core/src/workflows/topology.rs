use super::finish;
use crate::core::tools::Tool;
use crate::engine::config::TopologyConfig;
use crate::engine::context::SetupContext;
use crate::engine::error::SetupError;
use crate::engine::progress::Progress;
use crate::engine::state::{StageOutput, WarningKind};
use tracing::{info, instrument};

const STAGE: &str = "topology";
const TMP_TOP: &str = "tmp.top";

/// Options that the stage sets itself; user-supplied values for them are dropped.
const RESERVED_ARGS: [&str; 4] = ["f", "o", "p", "i"];

/// Builds the topology with `pdb2gmx`.
///
/// Produces `<protein>.pdb`, `<protein>_posres.itp` and the topology `top` in the stage
/// directory. The topology written by `pdb2gmx` is used as is.
#[instrument(skip_all, name = "topology_stage", fields(dirname = %config.dirname))]
pub fn run(ctx: &SetupContext, config: &TopologyConfig) -> Result<StageOutput, SetupError> {
    ctx.reporter.report(Progress::StageStart { name: STAGE });
    config.validate()?;

    let structure = ctx.resolve_existing("structure", &config.structure)?;
    let new_struct = format!("{}.pdb", config.protein);
    let posres = format!("{}_posres.itp", config.protein);

    let mut warnings = Vec::new();
    let (user_args, dropped): (Vec<_>, Vec<_>) = config
        .pdb2gmx_args
        .iter()
        .cloned()
        .partition(|(key, _)| !RESERVED_ARGS.contains(&key.trim_start_matches('-')));
    if !dropped.is_empty() {
        let keys: Vec<_> = dropped.into_iter().map(|(k, _)| k).collect();
        warnings.push(ctx.warn(
            WarningKind::Usage,
            format!("pdb2gmx options {:?} are set by the topology stage and were ignored", keys),
        ));
    }

    let output = ctx.in_dir(&config.dirname, |dir| {
        ctx.run(
            dir.invocation(Tool::Pdb2gmx)
                .args(user_args)
                .arg("f", &structure)
                .arg("o", &new_struct)
                .arg("p", TMP_TOP)
                .arg("i", &posres),
        )?;
        dir.require(STAGE, TMP_TOP)?;
        let new_struct = dir.require(STAGE, &new_struct)?;
        let topology = dir.copy(TMP_TOP, &config.top)?;
        info!(topology = ?topology, structure = ?new_struct, "Topology written.");

        let mut output = StageOutput::new(STAGE, new_struct);
        output.topology = Some(topology);
        finish(dir, output, warnings)
    })?;

    ctx.reporter.report(Progress::StageFinish);
    Ok(output)
}
