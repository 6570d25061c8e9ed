//! Simulation parameters derived from the output of earlier tool calls.
//!
//! Everything here is a pure function so that the policies can be tested without GROMACS.

use crate::core::ndx::{IndexGroup, find_group};
use crate::engine::error::SetupError;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Concentration of water at 25 °C and 1 atm in mol/L (997.0480 g/L / 18.015 g/mol).
pub const CONC_WATER: f64 = 55.345;

pub const MAIN_GROUP: &str = "__main__";
pub const ENVIRONMENT_GROUP: &str = "__environment__";

/// Below this `__main__`/`__environment__` size ratio the whole system is coupled as one group.
pub const TC_GROUP_THRESHOLD: f64 = 0.1;

static QTOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"System has non-zero total charge:\s*(?P<qtot>[-+]?\d+(?:\.\d*)?(?:[eE][-+]?\d+)?)")
        .expect("qtot pattern is valid")
});

/// Number of monovalent ion pairs giving `concentration` (mol/L) in `n_water` waters.
pub fn ions_for_concentration(n_water: usize, concentration: f64) -> usize {
    if concentration <= 0.0 {
        return 0;
    }
    (n_water as f64 * concentration / CONC_WATER).floor() as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IonCounts {
    pub cations: usize,
    pub anions: usize,
}

impl IonCounts {
    pub fn is_empty(&self) -> bool {
        self.cations == 0 && self.anions == 0
    }
}

/// Counter ions neutralizing `qtot`, plus `free_ions` of each kind on top.
pub fn ion_counts(qtot: f64, free_ions: usize) -> IonCounts {
    let counter = qtot.abs().round() as usize;
    let (cations, anions) = if qtot > 0.0 {
        (0, counter)
    } else if qtot < 0.0 {
        (counter, 0)
    } else {
        (0, 0)
    };
    IonCounts {
        cations: cations + free_ions,
        anions: anions + free_ions,
    }
}

/// How temperature coupling groups are assigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TcGroups {
    /// Couple `__main__` and `__environment__` separately.
    MainEnvironment { ratio: f64 },
    /// `__main__` is too small (or the environment is empty): couple everything as `System`.
    System { ratio: f64 },
    /// The index lacks `__main__` or `__environment__`; couple everything as `System`.
    MissingGroups,
}

pub fn choose_tc_groups(groups: &[IndexGroup], threshold: f64) -> TcGroups {
    let (Some(main), Some(env)) = (
        find_group(groups, MAIN_GROUP),
        find_group(groups, ENVIRONMENT_GROUP),
    ) else {
        return TcGroups::MissingGroups;
    };
    if env.natoms == 0 {
        return TcGroups::System {
            ratio: f64::INFINITY,
        };
    }
    let ratio = main.natoms as f64 / env.natoms as f64;
    if ratio < threshold {
        TcGroups::System { ratio }
    } else {
        TcGroups::MainEnvironment { ratio }
    }
}

/// Number of integration steps covering `runtime` ps with time step `dt` ps.
pub fn nsteps(runtime: f64, dt: f64) -> Result<u64, SetupError> {
    if dt.is_nan() || dt <= 0.0 {
        return Err(SetupError::InvalidParameter {
            name: "dt",
            reason: format!("time step must be positive, got {}", dt),
        });
    }
    if !runtime.is_finite() || runtime < 0.0 {
        return Err(SetupError::InvalidParameter {
            name: "runtime",
            reason: format!("run time must be a non-negative number, got {}", runtime),
        });
    }
    // 1000 / 0.002 must give 500000, not 499999.
    Ok((runtime / dt + 1e-6).floor() as u64)
}

/// Job names for queuing systems must start with a letter; others get an `md_` prefix.
/// Returns the name to use and whether it was changed.
pub fn sanitize_job_name(name: &str) -> (String, bool) {
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => (name.to_string(), false),
        _ => (format!("md_{}", name), true),
    }
}

/// mdp `include` value for a stage directory: the directory itself, its parent, and the
/// directory holding the topology (where extra itp files are expected).
pub fn include_path(topology: &Path) -> String {
    let topology_dir = topology
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    format!("-I. -I.. -I{}", topology_dir.display())
}

/// Solvent coordinate file for a water model; the SPC family shares `spc216`.
pub fn water_box(water: &str) -> String {
    match water.to_ascii_lowercase().as_str() {
        "spc" | "spce" => "spc216".to_string(),
        _ => water.to_string(),
    }
}

/// Total charge reported by `grompp`; zero when it does not complain about one.
pub fn parse_qtot(output: &str) -> f64 {
    QTOT.captures_iter(output)
        .last()
        .and_then(|caps| caps["qtot"].parse().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn group(nr: usize, name: &str, natoms: usize) -> IndexGroup {
        IndexGroup {
            nr,
            name: name.to_string(),
            natoms,
        }
    }

    #[test]
    fn concentration_ions_scale_with_water_count() {
        // 0.15 M in 10000 waters: 10000 * 0.15 / 55.345 = 27.1
        assert_eq!(ions_for_concentration(10_000, 0.15), 27);
        assert_eq!(ions_for_concentration(10_000, 0.0), 0);
        assert_eq!(ions_for_concentration(0, 1.0), 0);
    }

    #[test]
    fn negative_charge_is_neutralized_with_cations() {
        assert_eq!(
            ion_counts(-3.0, 0),
            IonCounts {
                cations: 3,
                anions: 0
            }
        );
    }

    #[test]
    fn positive_charge_is_neutralized_with_anions_and_free_ions_are_added_to_both() {
        assert_eq!(
            ion_counts(2.0, 27),
            IonCounts {
                cations: 27,
                anions: 29
            }
        );
    }

    #[test]
    fn fractional_grompp_charges_are_rounded() {
        assert_eq!(ion_counts(-2.999998, 0).cations, 3);
        assert_eq!(ion_counts(1.000004, 0).anions, 1);
        assert!(ion_counts(0.0, 0).is_empty());
    }

    #[test]
    fn large_main_group_gets_its_own_coupling() {
        let groups = vec![
            group(0, "System", 22500),
            group(1, MAIN_GROUP, 1960),
            group(2, ENVIRONMENT_GROUP, 20540),
        ];
        match choose_tc_groups(&groups, TC_GROUP_THRESHOLD) {
            TcGroups::MainEnvironment { ratio } => assert!((ratio - 1960.0 / 20540.0).abs() < 1e-12),
            other => panic!("unexpected choice {:?}", other),
        }
    }

    #[test]
    fn small_main_group_couples_the_system() {
        let groups = vec![group(0, MAIN_GROUP, 50), group(1, ENVIRONMENT_GROUP, 20000)];
        assert!(matches!(
            choose_tc_groups(&groups, TC_GROUP_THRESHOLD),
            TcGroups::System { ratio } if (ratio - 0.0025).abs() < 1e-12
        ));
    }

    #[test]
    fn missing_or_empty_groups_fall_back_to_system() {
        let groups = vec![group(0, "System", 10), group(1, MAIN_GROUP, 10)];
        assert_eq!(
            choose_tc_groups(&groups, TC_GROUP_THRESHOLD),
            TcGroups::MissingGroups
        );

        let vacuum = vec![group(0, MAIN_GROUP, 10), group(1, ENVIRONMENT_GROUP, 0)];
        assert!(matches!(
            choose_tc_groups(&vacuum, TC_GROUP_THRESHOLD),
            TcGroups::System { .. }
        ));
    }

    #[test]
    fn nsteps_truncates_and_validates() {
        assert_eq!(nsteps(1000.0, 0.002).unwrap(), 500_000);
        assert_eq!(nsteps(100_000.0, 0.002).unwrap(), 50_000_000);
        assert_eq!(nsteps(1.0, 0.003).unwrap(), 333);
        assert!(matches!(
            nsteps(1000.0, 0.0),
            Err(SetupError::InvalidParameter { name: "dt", .. })
        ));
        assert!(matches!(
            nsteps(-1.0, 0.002),
            Err(SetupError::InvalidParameter {
                name: "runtime",
                ..
            })
        ));
    }

    #[test]
    fn job_names_must_start_with_a_letter() {
        assert_eq!(sanitize_job_name("PR_GMX"), ("PR_GMX".to_string(), false));
        assert_eq!(sanitize_job_name("1abc"), ("md_1abc".to_string(), true));
        assert_eq!(sanitize_job_name("_x"), ("md__x".to_string(), true));
    }

    #[test]
    fn include_path_adds_the_topology_directory() {
        assert_eq!(
            include_path(&PathBuf::from("/project/top/system.top")),
            "-I. -I.. -I/project/top"
        );
        assert_eq!(include_path(&PathBuf::from("system.top")), "-I. -I.. -I.");
    }

    #[test]
    fn spc_family_uses_spc216_box() {
        assert_eq!(water_box("SPC"), "spc216");
        assert_eq!(water_box("spce"), "spc216");
        assert_eq!(water_box("tip4p"), "tip4p");
    }

    #[test]
    fn qtot_is_read_from_grompp_notes() {
        let output = "NOTE 1 [file topol.top, line 30]:\n  System has non-zero total charge: -2.000002\n  Total charge should normally be an integer.\n";
        assert!((parse_qtot(output) + 2.000002).abs() < 1e-9);
        assert_eq!(parse_qtot("System has non-zero total charge: 3.000000e+00\n"), 3.0);
        assert_eq!(parse_qtot("writing run input file...\n"), 0.0);
    }
}
