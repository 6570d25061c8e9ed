use super::{check_mdp_args, finish};
use crate::core::mdp::edit_mdp_file;
use crate::core::tools::{Invocation, Tool};
use crate::engine::config::MinimizeConfig;
use crate::engine::context::SetupContext;
use crate::engine::derive::include_path;
use crate::engine::error::SetupError;
use crate::engine::progress::Progress;
use crate::engine::state::{StageOutput, WarningKind};
use crate::engine::workdir::StageDir;
use tracing::{info, instrument};

const STAGE: &str = "energy_minimize";
const EM_MDP: &str = "em.mdp";
const EM_TPR: &str = "em.tpr";
const EM_PDB: &str = "em.pdb";

/// Energy minimizes the system.
///
/// Writes the run input and runs `mdrun` right away, preferring the double precision
/// build. The minimized structure is written as `em.pdb`.
#[instrument(skip_all, name = "minimize_stage", fields(dirname = %config.dirname))]
pub fn run(ctx: &SetupContext, config: &MinimizeConfig) -> Result<StageOutput, SetupError> {
    ctx.reporter.report(Progress::StageStart { name: STAGE });
    config.validate()?;

    let structure = ctx.resolve_existing("structure", &config.structure)?;
    let topology = ctx.resolve_existing("topology", &config.topology)?;
    let template = ctx.template(&config.mdp)?;

    let mut params = config.overrides.clone();
    params.set_default("include", include_path(&topology));

    let mut warnings = Vec::new();
    if config.qtot != 0.0 {
        warnings.push(ctx.warn(
            WarningKind::BadParameter,
            format!(
                "Total charge was reported as qtot = {} <> 0; probably a problem.",
                config.qtot
            ),
        ));
    }

    let output = ctx.in_dir(&config.dirname, |dir| {
        let mdp = dir.join(EM_MDP);
        let unprocessed =
            edit_mdp_file(&template.content, &mdp, &params).map_err(SetupError::io(&mdp))?;
        warnings.extend(check_mdp_args(ctx, &unprocessed));

        ctx.run(
            dir.invocation(Tool::Grompp)
                .arg("f", EM_MDP)
                .arg("o", EM_TPR)
                .arg("c", &structure)
                .arg("p", &topology)
                .args(unprocessed.to_tool_args()),
        )?;
        dir.require(STAGE, EM_TPR)?;

        match ctx.run(mdrun(dir, Tool::MdrunDouble)) {
            Ok(_) => {}
            Err(SetupError::ToolNotFound { program, .. }) => {
                warnings.push(ctx.warn(
                    WarningKind::AutoCorrection,
                    format!(
                        "No double precision mdrun found ({}), using mdrun instead. \
                         Energy minimization runs better in double precision.",
                        program
                    ),
                ));
                ctx.run(mdrun(dir, Tool::Mdrun))?;
            }
            Err(err) => return Err(err),
        }

        let minimized = dir.require(STAGE, EM_PDB)?;
        info!(structure = ?minimized, "Energy minimization finished.");

        let mut output = StageOutput::new(STAGE, minimized);
        output.topology = Some(topology.clone());
        output.main_selection = Some(config.main_selection.clone());
        finish(dir, output, warnings)
    })?;

    ctx.reporter.report(Progress::StageFinish);
    Ok(output)
}

fn mdrun(dir: &StageDir, tool: Tool) -> Invocation {
    dir.invocation(tool)
        .flag("v", true)
        .arg("stepout", 10u32)
        .arg("deffnm", "em")
        .arg("c", EM_PDB)
}
