use super::{check_mdp_args, finish};
use crate::core::mdp::{MdpFile, MdpParams, MdpValue, edit_mdp_file};
use crate::core::text::{Substitution, edit_text};
use crate::core::tools::Tool;
use crate::engine::config::{ConfigError, MdConfig};
use crate::engine::context::SetupContext;
use crate::engine::derive::{
    TC_GROUP_THRESHOLD, TcGroups, choose_tc_groups, include_path, nsteps, sanitize_job_name,
};
use crate::engine::error::SetupError;
use crate::engine::index::make_main_index;
use crate::engine::progress::Progress;
use crate::engine::state::{SetupWarning, StageOutput, WarningKind};
use tracing::{debug, info, instrument};

const DEFAULT_JOB_NAME: &str = "GMX_MD";

/// Sets up position-restrained MD (see [`MdConfig::restrained`]).
pub fn restrained(ctx: &SetupContext, config: &MdConfig) -> Result<StageOutput, SetupError> {
    setup(ctx, config, "md_restrained")
}

/// Sets up equilibrium MD (see [`MdConfig::equilibrium`]).
pub fn equilibrium(ctx: &SetupContext, config: &MdConfig) -> Result<StageOutput, SetupError> {
    setup(ctx, config, "md")
}

/// Writes `<deffnm>.mdp`, `<deffnm>.tpr` and a job script for an MD run.
///
/// Temperature coupling is set up for the `__main__` and `__environment__` groups, which
/// are created in `<deffnm>.ndx` from the main selection. A `__main__` group below 10% of
/// the environment is not coupled on its own; everything is coupled as `System` instead.
/// Nothing is run: the job script starts `mdrun`.
#[instrument(skip_all, name = "md_stage", fields(stage = stage, dirname = %config.dirname))]
pub fn setup(
    ctx: &SetupContext,
    config: &MdConfig,
    stage: &'static str,
) -> Result<StageOutput, SetupError> {
    ctx.reporter.report(Progress::StageStart { name: stage });
    config.validate()?;

    let structure = config
        .structure
        .as_deref()
        .ok_or(ConfigError::MissingParameter("structure"))?;
    let structure = ctx.resolve_existing("structure", structure)?;
    let topology = ctx.resolve_existing("topology", &config.topology)?;
    let base_index = config.ndx.as_deref().map(|p| ctx.resolve(p));
    let mdp_template = ctx.template(&config.mdp)?;
    let job_template = ctx.template(&config.job_template)?;

    let nsteps = nsteps(config.runtime, config.dt)?;
    let mdp = format!("{}.mdp", config.deffnm);
    let tpr = format!("{}.tpr", config.deffnm);
    let main_index = format!("{}.ndx", config.deffnm);
    let final_structure = format!("{}.gro", config.deffnm);

    let mut warnings = Vec::new();
    let job_name = match &config.job_name {
        None => DEFAULT_JOB_NAME.to_string(),
        Some(name) => {
            let (fixed, corrected) = sanitize_job_name(name);
            if corrected {
                warnings.push(ctx.warn(
                    WarningKind::AutoCorrection,
                    format!("Illegal job name fixed: new={:?}", fixed),
                ));
            }
            fixed
        }
    };

    let mut params: MdpParams = [
        ("nsteps", MdpValue::from(nsteps)),
        ("dt", MdpValue::from(config.dt)),
    ]
    .into_iter()
    .collect();
    params.extend(config.overrides.clone());
    params.set_default("include", include_path(&topology));

    let template_values = MdpFile::parse(&mdp_template.content);
    let tcoupl = coupling_mode(&params, &template_values, "Tcoupl");
    let pcoupl = coupling_mode(&params, &template_values, "Pcoupl");

    let output = ctx.in_dir(&config.dirname, |dir| {
        let mut index = base_index;
        if tcoupl != "no" {
            if let Some(selection) = &config.main_selection {
                let groups =
                    make_main_index(ctx, dir, &structure, selection, &main_index, index.as_deref())?;
                match choose_tc_groups(&groups, TC_GROUP_THRESHOLD) {
                    TcGroups::MainEnvironment { ratio } => {
                        debug!("Coupling __main__ and __environment__ (ratio {:.3})", ratio)
                    }
                    TcGroups::System { ratio } => {
                        warnings.push(couple_system(ctx, &mut params, ratio));
                    }
                    TcGroups::MissingGroups => {
                        warnings.push(ctx.warn(
                            WarningKind::AutoCorrection,
                            "Missing __main__ and/or __environment__ index group. This probably \
                             means that the system is atypical; disable the main selection and \
                             provide your own mdp and index files to set up temperature coupling, \
                             or set Tcoupl = no. For now everything is coupled to System.",
                        ));
                        warnings.push(couple_system(ctx, &mut params, 0.0));
                    }
                }
                index = Some(dir.join(&main_index));
            }
        }
        if tcoupl == "no" {
            for key in ["tc-grps", "tau_t", "ref_t"] {
                params.set(key, "");
            }
        }
        if pcoupl == "no" {
            for key in ["tau_p", "ref_p", "compressibility"] {
                params.set(key, "");
            }
        }

        let mdp_path = dir.join(&mdp);
        let unprocessed = edit_mdp_file(&mdp_template.content, &mdp_path, &params)
            .map_err(SetupError::io(&mdp_path))?;
        warnings.extend(check_mdp_args(ctx, &unprocessed));

        ctx.run(
            dir.invocation(Tool::Grompp)
                .arg("f", &mdp)
                .arg("p", &topology)
                .arg("c", &structure)
                .opt_arg("n", index.as_deref())
                .arg("o", &tpr)
                .args(unprocessed.to_tool_args()),
        )?;
        let tpr = dir.require(stage, &tpr)?;

        let script = edit_text(
            &job_template.content,
            &[
                Substitution::line_prefix("DEFFNM=", "md", config.deffnm.as_str())?,
                Substitution::line_prefix("#$ -N", DEFAULT_JOB_NAME, job_name.as_str())?,
            ],
        );
        let job_script = dir.write(&job_template.name, &script)?;

        let summary = format!(
            "All files set up for a run time of {} ps (dt={}, nsteps={})",
            config.runtime, config.dt, nsteps
        );
        info!("{}", summary);
        ctx.reporter.report(Progress::Message(summary));

        let mut carried = config.overrides.clone();
        carried.take("define");

        let mut output = StageOutput::new(stage, dir.join(&final_structure));
        output.topology = Some(topology.clone());
        output.ndx = index;
        output.main_selection = config.main_selection.clone();
        output.tpr = Some(tpr);
        output.job_script = Some(job_script);
        output.mdp_overrides = carried;
        finish(dir, output, warnings)
    })?;

    ctx.reporter.report(Progress::StageFinish);
    Ok(output)
}

/// Effective coupling setting, lowercased: the override if given, else the template's.
fn coupling_mode(params: &MdpParams, template: &MdpFile, key: &str) -> String {
    params
        .get(key)
        .map(|v| v.to_string())
        .or_else(|| template.get(key).map(str::to_string))
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Puts the whole system into one temperature coupling group; `tau_t` and `ref_t`
/// overrides are kept.
fn couple_system(ctx: &SetupContext, params: &mut MdpParams, ratio: f64) -> SetupWarning {
    let tau_t = params.take("tau_t").unwrap_or(MdpValue::Float(0.1));
    let ref_t = params.take("ref_t").unwrap_or(MdpValue::Int(300));
    params.set("tc-grps", "System");
    params.set("tau_t", tau_t.clone());
    params.set("ref_t", ref_t.clone());

    let reason = if ratio.is_finite() {
        format!("Size of __main__ is only {:.1}% of __environment__", ratio * 100.0)
    } else {
        "__environment__ is empty".to_string()
    };
    ctx.warn(
        WarningKind::AutoCorrection,
        format!(
            "{} so we use 'System' for T-coupling and ref_t = {} and tau_t = {} \
             (can be changed with the mdp overrides).",
            reason, ref_t, tau_t
        ),
    )
}
