use crate::core::ndx::{IndexGroup, find_group, parse_ndx_listing};
use crate::core::tools::Tool;
use crate::engine::context::SetupContext;
use crate::engine::derive::{ENVIRONMENT_GROUP, MAIN_GROUP};
use crate::engine::error::SetupError;
use crate::engine::workdir::StageDir;
use std::path::Path;
use tracing::{debug, instrument};

/// Creates `ndx` with the groups `__main__` and `__environment__` appended.
///
/// `__main__` is whatever `selection` (a `make_ndx` command such as `"Protein"` or
/// `r DRG`) selects; `__environment__` is everything else. Symbolic names let templates
/// refer to the solute and its surroundings without knowing the system.
///
/// The groups of `old_ndx` are used as the starting point if given, otherwise the default
/// `make_ndx` groups. Returns the final group table.
#[instrument(skip(ctx, dir), fields(dir = ?dir.path()))]
pub fn make_main_index(
    ctx: &SetupContext,
    dir: &StageDir,
    structure: &Path,
    selection: &str,
    ndx: &str,
    old_ndx: Option<&Path>,
) -> Result<Vec<IndexGroup>, SetupError> {
    // The empty command makes make_ndx print the complete table once more.
    let output = ctx.run(
        dir.invocation(Tool::MakeNdx)
            .arg("f", structure)
            .opt_arg("n", old_ndx)
            .arg("o", ndx)
            .input([selection, "", "q"]),
    )?;
    let groups = parse_ndx_listing(&output.combined());
    let last = check_listing(&groups)?;
    debug!(
        "Selection {} became group {} ({} atoms)",
        selection, last.nr, last.natoms
    );
    let last = last.nr;

    let output = ctx.run(
        dir.invocation(Tool::MakeNdx)
            .arg("f", structure)
            .arg("n", ndx)
            .arg("o", ndx)
            .input([
                format!("name {} {}", last, MAIN_GROUP),
                format!("! \"{}\"", MAIN_GROUP),
                format!("name {} {}", last + 1, ENVIRONMENT_GROUP),
                String::new(),
                "q".to_string(),
            ]),
    )?;
    let groups = parse_ndx_listing(&output.combined());
    check_listing(&groups)?;
    Ok(groups)
}

fn check_listing(groups: &[IndexGroup]) -> Result<&IndexGroup, SetupError> {
    let last = groups
        .last()
        .ok_or_else(|| SetupError::IndexListing("no groups were listed".to_string()))?;
    if last.nr != groups.len() - 1 {
        return Err(SetupError::IndexListing(format!(
            "last group is number {} but {} groups were listed",
            last.nr,
            groups.len()
        )));
    }
    Ok(last)
}

/// Counts the water oxygens (atoms named `OW*`) in `tpr`, i.e. the number of waters for
/// the SPC and TIP families.
pub fn count_water_oxygens(
    ctx: &SetupContext,
    dir: &StageDir,
    tpr: &Path,
) -> Result<usize, SetupError> {
    let output = ctx.run(
        dir.invocation(Tool::MakeNdx)
            .arg("f", tpr)
            .arg("o", "ow.ndx")
            .input(["keep 0", "del 0", "a OW*", "name 0 OW", "", "q"]),
    )?;
    let groups = parse_ndx_listing(&output.combined());
    find_group(&groups, "OW")
        .map(|g| g.natoms)
        .ok_or_else(|| SetupError::MissingIndexGroup("OW".to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::templates::TemplateStore;
    use crate::core::tools::mock::{MockRunner, ok, touch};
    use crate::core::tools::{Invocation, ToolError, ToolOutput};
    use crate::engine::progress::ProgressReporter;
    use tempfile::tempdir;

    pub(crate) const DEFAULT_GROUPS: &str = "\
  0 System              : 22500 atoms
  1 Protein             :  1960 atoms
  2 SOL                 : 20523 atoms
  3 NA+                 :    17 atoms
";

    /// make_ndx stand-in: default groups, then the main selection, then the synthetic pair.
    pub(crate) fn fake_make_ndx(
        main_atoms: usize,
        env_atoms: usize,
    ) -> impl Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static {
        move |inv: &Invocation| {
            touch(inv, "o");
            let input = inv.input.clone().unwrap_or_default();
            let first = input.first().cloned().unwrap_or_default();
            if first == "keep 0" {
                return ok("  0 System : 22500 atoms\n\n  0 OW :  6841 atoms\n");
            }
            let mut text = DEFAULT_GROUPS.to_string();
            text.push_str(&format!("\n  4 Protein : {} atoms\n\n", main_atoms));
            text.push_str(DEFAULT_GROUPS);
            text.push_str(&format!("  4 Protein : {} atoms\n", main_atoms));
            if first.starts_with("name ") {
                text.push('\n');
                text.push_str(DEFAULT_GROUPS);
                text.push_str(&format!(
                    "  4 {} : {} atoms\n  5 {} : {} atoms\n",
                    MAIN_GROUP, main_atoms, ENVIRONMENT_GROUP, env_atoms
                ));
            }
            ok(&text)
        }
    }

    #[test]
    fn builds_main_and_environment_in_two_passes() {
        let root = tempdir().unwrap();
        let runner = MockRunner::new().on(Tool::MakeNdx, fake_make_ndx(1960, 20540));
        let templates = TemplateStore::new();
        let reporter = ProgressReporter::new();
        let ctx = SetupContext::new(&runner, &templates, &reporter, root.path());
        let dir = StageDir::create(root.path().join("solvate")).unwrap();

        let groups = make_main_index(
            &ctx,
            &dir,
            Path::new("/p/solvate/ionized.tpr"),
            "\"Protein\"",
            "main.ndx",
            None,
        )
        .unwrap();

        assert_eq!(find_group(&groups, MAIN_GROUP).unwrap().natoms, 1960);
        assert_eq!(find_group(&groups, ENVIRONMENT_GROUP).unwrap().natoms, 20540);

        let calls = runner.calls_to(Tool::MakeNdx);
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].input.as_deref(),
            Some(&["\"Protein\"".to_string(), String::new(), "q".to_string()][..])
        );
        assert!(calls[0].get("n").is_none());
        assert_eq!(
            calls[1].input.as_ref().unwrap()[..3],
            [
                "name 4 __main__".to_string(),
                "! \"__main__\"".to_string(),
                "name 5 __environment__".to_string()
            ]
        );
        assert_eq!(calls[1].get("n").and_then(|a| a.as_value()), Some("main.ndx"));
        assert_eq!(calls[1].workdir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn old_index_is_used_as_basis() {
        let root = tempdir().unwrap();
        let runner = MockRunner::new().on(Tool::MakeNdx, fake_make_ndx(1960, 20540));
        let templates = TemplateStore::new();
        let reporter = ProgressReporter::new();
        let ctx = SetupContext::new(&runner, &templates, &reporter, root.path());
        let dir = StageDir::create(root.path().join("MD")).unwrap();

        make_main_index(
            &ctx,
            &dir,
            Path::new("/p/em/em.pdb"),
            "\"Protein\"",
            "md.ndx",
            Some(Path::new("/p/solvate/main.ndx")),
        )
        .unwrap();

        let first = &runner.calls_to(Tool::MakeNdx)[0];
        assert_eq!(
            first.get("n").and_then(|a| a.as_value()),
            Some("/p/solvate/main.ndx")
        );
    }

    #[test]
    fn empty_listing_is_an_error() {
        let root = tempdir().unwrap();
        let runner = MockRunner::new().on(Tool::MakeNdx, |_| ok("nothing useful\n"));
        let templates = TemplateStore::new();
        let reporter = ProgressReporter::new();
        let ctx = SetupContext::new(&runner, &templates, &reporter, root.path());
        let dir = StageDir::create(root.path()).unwrap();

        let result = make_main_index(&ctx, &dir, Path::new("x.tpr"), "\"Protein\"", "main.ndx", None);
        assert!(matches!(result, Err(SetupError::IndexListing(_))));
    }

    #[test]
    fn water_oxygens_are_counted_from_the_ow_group() {
        let root = tempdir().unwrap();
        let runner = MockRunner::new().on(Tool::MakeNdx, fake_make_ndx(0, 0));
        let templates = TemplateStore::new();
        let reporter = ProgressReporter::new();
        let ctx = SetupContext::new(&runner, &templates, &reporter, root.path());
        let dir = StageDir::create(root.path()).unwrap();

        assert_eq!(
            count_water_oxygens(&ctx, &dir, Path::new("topol.tpr")).unwrap(),
            6841
        );
    }

    #[test]
    fn missing_ow_group_is_reported() {
        let root = tempdir().unwrap();
        let runner = MockRunner::new().on(Tool::MakeNdx, |_| ok("  0 System : 10 atoms\n"));
        let templates = TemplateStore::new();
        let reporter = ProgressReporter::new();
        let ctx = SetupContext::new(&runner, &templates, &reporter, root.path());
        let dir = StageDir::create(root.path()).unwrap();

        assert!(matches!(
            count_water_oxygens(&ctx, &dir, Path::new("topol.tpr")),
            Err(SetupError::MissingIndexGroup(name)) if name == "OW"
        ));
    }
}
