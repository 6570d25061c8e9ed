use phf::phf_map;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const EM_MDP: &str = "\
; Energy minimization template
; Values marked with ; * are substituted by gmxsetup.
include                  = -I. -I.. -I../top          ; *
define                   =                             ; *
integrator               = steep
emtol                    = 500
emstep                   = 0.01
nsteps                   = 1000
nstcgsteep               = 1000
nstlist                  = 10
ns_type                  = grid
pbc                      = xyz
rlist                    = 1.0
coulombtype              = PME
rcoulomb                 = 1.0
vdwtype                  = cut-off
rvdw                     = 1.0
constraints              = none
nstxout                  = 0
nstvout                  = 0
nstenergy                = 10
";

const MD_MDP: &str = "\
; NPT equilibrium MD template (OPLS-AA style cut-offs)
; Temperature coupling uses the __main__ and __environment__ groups created by gmxsetup.
include                  = -I. -I.. -I../top          ; *
define                   =                             ; *
integrator               = md
dt                       = 0.002                       ; *
nsteps                   = 500000                      ; *
nstcomm                  = 10
comm_mode                = linear
nstxout                  = 5000
nstvout                  = 5000
nstfout                  = 0
nstlog                   = 1000
nstenergy                = 1000
nstxtcout                = 1000
xtc_precision            = 1000
nstlist                  = 10
ns_type                  = grid
pbc                      = xyz
rlist                    = 1.0
coulombtype              = PME
rcoulomb                 = 1.0
fourierspacing           = 0.12
pme_order                = 4
ewald_rtol               = 1e-5
vdwtype                  = cut-off
rvdw                     = 1.0
DispCorr                 = EnerPres
Tcoupl                   = Berendsen
tc-grps                  = __main__ __environment__
tau_t                    = 0.1 0.1
ref_t                    = 300 300
Pcoupl                   = Berendsen
pcoupltype               = isotropic
tau_p                    = 1.0
compressibility          = 4.5e-5
ref_p                    = 1.0
gen_vel                  = no
constraints              = all-bonds
constraint_algorithm     = lincs
";

const SGE_SH: &str = "\
#!/bin/bash
#$ -N GMX_MD
#$ -S /bin/bash
#$ -cwd
#$ -j y
#$ -pe mpi 8
#
# Submit with: qsub sge.sh

DEFFNM=md

MDRUN_OPTS=\"-v -stepout 1000\"

if [ -e ${DEFFNM}.cpt ]; then
    MDRUN_OPTS=\"${MDRUN_OPTS} -cpi ${DEFFNM}.cpt -append\"
fi

mpirun gmx_mpi mdrun -deffnm ${DEFFNM} ${MDRUN_OPTS}
";

const LOCAL_SH: &str = "\
#!/bin/bash
#$ -N GMX_MD
# Run on the local machine: bash local.sh

DEFFNM=md

gmx mdrun -v -stepout 1000 -deffnm ${DEFFNM} -cpi ${DEFFNM}.cpt
";

static BUILTIN_TEMPLATES: phf::Map<&'static str, &'static str> = phf_map! {
    "em.mdp" => EM_MDP,
    "md.mdp" => MD_MDP,
    "sge.sh" => SGE_SH,
    "local.sh" => LOCAL_SH,
};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' is neither a file nor a known template name")]
    NotFound(String),

    #[error("Failed to read template {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOrigin {
    File(PathBuf),
    BuiltIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// File name the template is written under when instantiated.
    pub name: String,
    pub origin: TemplateOrigin,
    pub content: String,
}

/// Resolves template references (mdp files and job scripts).
///
/// A reference is looked up, in order, as a file path (relative paths against the base
/// directory), as a file in each search directory, and as the name of a built-in template.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    base_dir: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn resolve(&self, reference: &str) -> Result<Template, TemplateError> {
        let as_path = Path::new(reference);
        let direct = match (&self.base_dir, as_path.is_absolute()) {
            (Some(base), false) => base.join(as_path),
            _ => as_path.to_path_buf(),
        };

        let candidates = std::iter::once(direct)
            .chain(self.search_dirs.iter().map(|dir| dir.join(reference)));
        for candidate in candidates {
            if candidate.is_file() {
                debug!("Using template file {:?}", candidate);
                return read_template(candidate);
            }
        }

        let content = BUILTIN_TEMPLATES
            .get(reference)
            .ok_or_else(|| TemplateError::NotFound(reference.to_string()))?;
        debug!("Using built-in template '{}'", reference);
        Ok(Template {
            name: reference.to_string(),
            origin: TemplateOrigin::BuiltIn,
            content: content.to_string(),
        })
    }

    /// Names of the built-in templates, sorted.
    pub fn builtin_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = BUILTIN_TEMPLATES.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn builtin(name: &str) -> Option<&'static str> {
        BUILTIN_TEMPLATES.get(name).copied()
    }
}

fn read_template(path: PathBuf) -> Result<Template, TemplateError> {
    let content = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
        path: path.clone(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Template {
        name,
        origin: TemplateOrigin::File(path),
        content,
    })
}
