use super::finish;
use crate::core::tools::Tool;
use crate::engine::config::SolvateConfig;
use crate::engine::context::SetupContext;
use crate::engine::derive::{
    include_path, ion_counts, ions_for_concentration, parse_qtot, water_box,
};
use crate::engine::error::SetupError;
use crate::engine::index::{count_water_oxygens, make_main_index};
use crate::engine::progress::Progress;
use crate::engine::state::{StageOutput, WarningKind};
use crate::engine::workdir::StageDir;
use std::path::Path;
use tracing::{debug, info, instrument};

const STAGE: &str = "solvate";

/// Net charges below this are rounding noise from the topology.
const QTOT_TOLERANCE: f64 = 1e-4;

/// Puts the solute into a box, fills it with water and adds ions.
///
/// Counter ions neutralize the system; `concentration` adds free ion pairs on top of
/// them. Also writes the main index and a compact, centered `compact.pdb` for viewing;
/// failures of either only produce warnings.
#[instrument(skip_all, name = "solvate_stage", fields(dirname = %config.dirname))]
pub fn run(ctx: &SetupContext, config: &SolvateConfig) -> Result<StageOutput, SetupError> {
    ctx.reporter.report(Progress::StageStart { name: STAGE });
    config.validate()?;

    let structure = ctx.resolve_existing("structure", &config.structure)?;
    let topology = ctx.resolve_existing("topology", &config.topology)?;
    let include = include_path(&topology);
    let water = water_box(&config.water);
    let mut warnings = Vec::new();

    let output = ctx.in_dir(&config.dirname, |dir| {
        ctx.run(
            dir.invocation(Tool::Editconf)
                .arg("f", &structure)
                .arg("o", "boxed.gro")
                .arg("bt", &config.boxtype)
                .arg("d", config.distance),
        )?;
        dir.require(STAGE, "boxed.gro")?;

        ctx.run(
            dir.invocation(Tool::Solvate)
                .arg("p", &topology)
                .arg("cp", "boxed.gro")
                .arg("cs", &water)
                .arg("o", "solvated.gro"),
        )?;
        dir.require(STAGE, "solvated.gro")?;

        dir.write("none.mdp", &format!("; empty mdp file\ninclude = {}\n", include))?;
        let qtot = grompp_qtot(ctx, dir, "solvated.gro", "topol.tpr", &topology, config.maxwarn)?;
        info!(qtot, "After solvation");

        let free_ions = if config.concentration != 0.0 {
            let n_water = count_water_oxygens(ctx, dir, Path::new("topol.tpr"))?;
            let n = ions_for_concentration(n_water, config.concentration);
            debug!("{} waters give {} free ion pairs", n_water, n);
            n
        } else {
            0
        };

        let ions = ion_counts(qtot, free_ions);
        if ions.is_empty() {
            dir.remove_if_exists("ionized.gro")?;
            dir.copy("solvated.gro", "ionized.gro")?;
        } else {
            info!(cations = ions.cations, anions = ions.anions, "Adding ions");
            ctx.run(
                dir.invocation(Tool::Genion)
                    .arg("s", "topol.tpr")
                    .arg("o", "ionized.gro")
                    .arg("p", &topology)
                    .arg("pname", &config.cation)
                    .arg("nname", &config.anion)
                    .arg("np", ions.cations)
                    .arg("nn", ions.anions)
                    .input(["SOL"]),
            )?;
        }
        let ionized = dir.require(STAGE, "ionized.gro")?;

        let qtot = grompp_qtot(ctx, dir, "ionized.gro", "ionized.tpr", &topology, config.maxwarn)?;
        if qtot.abs() > QTOT_TOLERANCE {
            warnings.push(ctx.warn(
                WarningKind::BadParameter,
                format!("System has non-zero total charge qtot = {} e.", qtot),
            ));
        }

        match make_main_index(
            ctx,
            dir,
            Path::new("ionized.tpr"),
            &config.main_selection,
            &config.ndx,
            None,
        ) {
            Ok(groups) => debug!("Main index has {} groups", groups.len()),
            Err(err) if err.is_tool_error() => warnings.push(ctx.warn(
                WarningKind::ToolFailure,
                format!(
                    "Failed to make main index file {} (check the main selection): {}",
                    config.ndx, err
                ),
            )),
            Err(err) => return Err(err),
        }

        if let Err(err) = ctx.run(
            dir.invocation(Tool::Trjconv)
                .arg("ur", "compact")
                .flag("center", true)
                .arg("boxcenter", "tric")
                .arg("pbc", "mol")
                .arg("f", "ionized.gro")
                .arg("s", "ionized.tpr")
                .arg("o", "compact.pdb")
                .arg("n", &config.ndx)
                .input(["__main__", "system"]),
        ) {
            if !err.is_tool_error() {
                return Err(err);
            }
            warnings.push(ctx.warn(
                WarningKind::ToolFailure,
                format!("Failed to make compact pdb for visualization, continuing: {}", err),
            ));
        }

        let mut output = StageOutput::new(STAGE, ionized);
        output.topology = Some(topology.clone());
        output.ndx = Some(dir.join(&config.ndx));
        output.qtot = Some(qtot);
        output.main_selection = Some(config.main_selection.clone());
        finish(dir, output, warnings)
    })?;

    ctx.reporter.report(Progress::StageFinish);
    Ok(output)
}

/// Net charge of `coordinates` with `topology`, as reported by `grompp`.
fn grompp_qtot(
    ctx: &SetupContext,
    dir: &StageDir,
    coordinates: &str,
    tpr: &str,
    topology: &Path,
    maxwarn: u32,
) -> Result<f64, SetupError> {
    let output = ctx.run(
        dir.invocation(Tool::Grompp)
            .arg("f", "none.mdp")
            .arg("o", tpr)
            .arg("c", coordinates)
            .arg("p", topology)
            .arg("maxwarn", maxwarn),
    )?;
    Ok(parse_qtot(&output.combined()))
}
