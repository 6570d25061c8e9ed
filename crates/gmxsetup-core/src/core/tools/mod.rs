use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod gromacs;
#[cfg(test)]
pub(crate) mod mock;

pub use gromacs::{Flavor, GromacsRunner};

/// The GROMACS programs used during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Pdb2gmx,
    Editconf,
    /// Fills a box with solvent (`genbox` in GROMACS 4, `solvate` since 5.0).
    Solvate,
    Grompp,
    Genion,
    MakeNdx,
    Trjconv,
    Mdrun,
    /// Double-precision `mdrun`, preferred for energy minimization.
    MdrunDouble,
}

impl Tool {
    /// Binary name in a GROMACS 4 style installation.
    pub fn legacy_name(self) -> &'static str {
        match self {
            Tool::Pdb2gmx => "pdb2gmx",
            Tool::Editconf => "editconf",
            Tool::Solvate => "genbox",
            Tool::Grompp => "grompp",
            Tool::Genion => "genion",
            Tool::MakeNdx => "make_ndx",
            Tool::Trjconv => "trjconv",
            Tool::Mdrun => "mdrun",
            Tool::MdrunDouble => "mdrun_d",
        }
    }

    /// Subcommand of the `gmx` driver.
    pub fn subcommand(self) -> &'static str {
        match self {
            Tool::Solvate => "solvate",
            Tool::Mdrun | Tool::MdrunDouble => "mdrun",
            other => other.legacy_name(),
        }
    }

    pub fn is_double_precision(self) -> bool {
        matches!(self, Tool::MdrunDouble)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.legacy_name())
    }
}

/// A single command-line option value.
///
/// GROMACS options take either a value (`-bt dodecahedron`) or are booleans that are
/// switched on with `-name` and off with `-noname`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArg {
    Value(String),
    Flag(bool),
}

impl ToolArg {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            ToolArg::Value(v) => Some(v),
            ToolArg::Flag(_) => None,
        }
    }
}

impl From<&str> for ToolArg {
    fn from(value: &str) -> Self {
        ToolArg::Value(value.to_string())
    }
}

impl From<String> for ToolArg {
    fn from(value: String) -> Self {
        ToolArg::Value(value)
    }
}

impl From<&String> for ToolArg {
    fn from(value: &String) -> Self {
        ToolArg::Value(value.clone())
    }
}

impl From<&Path> for ToolArg {
    fn from(value: &Path) -> Self {
        ToolArg::Value(value.display().to_string())
    }
}

impl From<&PathBuf> for ToolArg {
    fn from(value: &PathBuf) -> Self {
        ToolArg::from(value.as_path())
    }
}

impl From<PathBuf> for ToolArg {
    fn from(value: PathBuf) -> Self {
        ToolArg::from(value.as_path())
    }
}

impl From<f64> for ToolArg {
    fn from(value: f64) -> Self {
        ToolArg::Value(value.to_string())
    }
}

impl From<u32> for ToolArg {
    fn from(value: u32) -> Self {
        ToolArg::Value(value.to_string())
    }
}

impl From<usize> for ToolArg {
    fn from(value: usize) -> Self {
        ToolArg::Value(value.to_string())
    }
}

impl From<bool> for ToolArg {
    fn from(value: bool) -> Self {
        ToolArg::Flag(value)
    }
}

/// Extra options passed verbatim to a tool, in order.
pub type ToolArgs = Vec<(String, ToolArg)>;

/// A fully described call of one external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub tool: Tool,
    pub args: ToolArgs,
    /// Answers for interactive prompts, one per line.
    pub input: Option<Vec<String>>,
    pub workdir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
            input: None,
            workdir: None,
        }
    }

    pub fn arg(mut self, key: &str, value: impl Into<ToolArg>) -> Self {
        self.args.push((key.to_string(), value.into()));
        self
    }

    pub fn opt_arg<V: Into<ToolArg>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(key, v),
            None => self,
        }
    }

    pub fn flag(self, key: &str, on: bool) -> Self {
        self.arg(key, ToolArg::Flag(on))
    }

    pub fn args<I, K>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = (K, ToolArg)>,
        K: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn input<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input = Some(lines.into_iter().map(Into::into).collect());
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Looks up the last value given for option `key`.
    pub fn get(&self, key: &str) -> Option<&ToolArg> {
        let key = key.trim_start_matches('-');
        self.args
            .iter()
            .rev()
            .find(|(k, _)| k.trim_start_matches('-') == key)
            .map(|(_, v)| v)
    }

    /// Renders the options as GROMACS command-line arguments.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() * 2);
        for (key, value) in &self.args {
            let key = key.trim_start_matches('-');
            match value {
                ToolArg::Value(v) => {
                    argv.push(format!("-{}", key));
                    argv.push(v.clone());
                }
                ToolArg::Flag(true) => argv.push(format!("-{}", key)),
                ToolArg::Flag(false) => argv.push(format!("-no{}", key)),
            }
        }
        argv
    }

    pub fn stdin_text(&self) -> Option<String> {
        self.input.as_ref().map(|lines| {
            let mut text = lines.join("\n");
            text.push('\n');
            text
        })
    }

    pub fn command_line(&self) -> String {
        let mut parts = vec![self.tool.to_string()];
        parts.extend(self.argv());
        parts.join(" ")
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{tool}' could not be started (tried `{program}`)")]
    NotFound { tool: Tool, program: String },

    #[error("tool '{tool}' failed (exit code {code:?}): {message}")]
    Failed {
        tool: Tool,
        code: Option<i32>,
        message: String,
    },

    #[error("I/O error while running '{tool}': {source}")]
    Io {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },
}

/// Executes external tools.
///
/// The workflows never spawn processes themselves; everything goes through this trait so
/// that tests can substitute canned tool output.
pub trait ToolRunner: Send + Sync {
    /// Runs `invocation` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if the program cannot be started and
    /// [`ToolError::Failed`] if it exits unsuccessfully or reports a fatal error.
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError>;
}

const FATAL_BANNER: &str = "Fatal error:";

/// Turns a finished process into an error if GROMACS reported a failure.
///
/// Some tools print a `Fatal error:` banner yet exit with status 0, so both are checked.
pub fn check_failure(tool: Tool, output: &ToolOutput) -> Result<(), ToolError> {
    let text = output.combined();
    if output.status == 0 && !text.contains(FATAL_BANNER) {
        return Ok(());
    }
    Err(ToolError::Failed {
        tool,
        code: Some(output.status),
        message: failure_message(&text),
    })
}

fn failure_message(text: &str) -> String {
    if let Some(pos) = text.find(FATAL_BANNER) {
        let message: Vec<&str> = text[pos + FATAL_BANNER.len()..]
            .lines()
            .map(str::trim)
            .skip_while(|l| l.is_empty())
            .take_while(|l| !l.is_empty() && !l.starts_with("---"))
            .collect();
        if !message.is_empty() {
            return message.join(" ");
        }
    }
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines.len().saturating_sub(5);
    lines[tail..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_renders_values_and_gromacs_style_flags() {
        let inv = Invocation::new(Tool::Pdb2gmx)
            .arg("f", "protein.pdb")
            .arg("-ff", "oplsaa")
            .flag("ignh", true)
            .flag("missing", false);

        assert_eq!(
            inv.argv(),
            vec!["-f", "protein.pdb", "-ff", "oplsaa", "-ignh", "-nomissing"]
        );
        assert_eq!(
            inv.command_line(),
            "pdb2gmx -f protein.pdb -ff oplsaa -ignh -nomissing"
        );
    }

    #[test]
    fn get_returns_last_value_regardless_of_dash_prefix() {
        let inv = Invocation::new(Tool::Grompp)
            .arg("maxwarn", 1usize)
            .arg("-maxwarn", 10usize);
        assert_eq!(inv.get("maxwarn"), Some(&ToolArg::Value("10".into())));
        assert_eq!(inv.get("-maxwarn"), Some(&ToolArg::Value("10".into())));
        assert!(inv.get("f").is_none());
    }

    #[test]
    fn stdin_text_ends_every_answer_with_newline() {
        let inv = Invocation::new(Tool::MakeNdx).input(["\"Protein\"", "", "q"]);
        assert_eq!(inv.stdin_text().as_deref(), Some("\"Protein\"\n\nq\n"));
        assert!(Invocation::new(Tool::Grompp).stdin_text().is_none());
    }

    #[test]
    fn tool_names_follow_both_gromacs_generations() {
        assert_eq!(Tool::Solvate.legacy_name(), "genbox");
        assert_eq!(Tool::Solvate.subcommand(), "solvate");
        assert_eq!(Tool::MdrunDouble.legacy_name(), "mdrun_d");
        assert_eq!(Tool::MdrunDouble.subcommand(), "mdrun");
        assert!(Tool::MdrunDouble.is_double_precision());
    }

    #[test]
    fn check_failure_accepts_clean_exit() {
        let out = ToolOutput {
            status: 0,
            stdout: "Back Off! I just backed up topol.tpr".into(),
            stderr: String::new(),
        };
        assert!(check_failure(Tool::Grompp, &out).is_ok());
    }

    #[test]
    fn check_failure_extracts_fatal_error_message() {
        let out = ToolOutput {
            status: 0,
            stdout: String::new(),
            stderr: "-------------------------------------------------------\n\
                     Program grompp, VERSION 4.0.7\n\
                     Fatal error:\n\
                     No such moleculetype SOL\n\
                     -------------------------------------------------------\n"
                .into(),
        };
        match check_failure(Tool::Grompp, &out) {
            Err(ToolError::Failed { tool, message, .. }) => {
                assert_eq!(tool, Tool::Grompp);
                assert_eq!(message, "No such moleculetype SOL");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn check_failure_uses_output_tail_for_nonzero_exit() {
        let out = ToolOutput {
            status: 1,
            stdout: "line 1\nline 2\n".into(),
            stderr: "segmentation fault\n".into(),
        };
        match check_failure(Tool::Mdrun, &out) {
            Err(ToolError::Failed { code, message, .. }) => {
                assert_eq!(code, Some(1));
                assert_eq!(message, "line 1 | line 2 | segmentation fault");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
