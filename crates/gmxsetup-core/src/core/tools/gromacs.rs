use super::{Invocation, Tool, ToolError, ToolOutput, ToolRunner, check_failure};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, trace};

/// How the GROMACS programs are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flavor {
    /// GROMACS 5 and later: a single driver (`gmx`, `gmx_mpi`, ...) with subcommands.
    /// The double-precision driver is the same name with a `_d` suffix.
    Unified { driver: String },
    /// GROMACS 4: one binary per tool, optionally with a common suffix such as `_mpi`.
    Legacy { suffix: String },
}

impl Default for Flavor {
    fn default() -> Self {
        Flavor::Unified {
            driver: "gmx".to_string(),
        }
    }
}

impl Flavor {
    /// Program name and leading arguments needed to start `tool`.
    pub fn program(&self, tool: Tool) -> (String, Vec<String>) {
        match self {
            Flavor::Unified { driver } => {
                let program = if tool.is_double_precision() {
                    format!("{}_d", driver)
                } else {
                    driver.clone()
                };
                (program, vec![tool.subcommand().to_string()])
            }
            Flavor::Legacy { suffix } => (format!("{}{}", tool.legacy_name(), suffix), Vec::new()),
        }
    }
}

/// Runs GROMACS tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct GromacsRunner {
    flavor: Flavor,
    env: Vec<(String, String)>,
}

impl GromacsRunner {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            env: Vec::new(),
        }
    }

    /// Sets an environment variable for every spawned tool (e.g. `GMX_MAXBACKUP=-1`).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }
}

impl ToolRunner for GromacsRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        let tool = invocation.tool;
        let (program, mut argv) = self.flavor.program(tool);
        argv.extend(invocation.argv());

        debug!(
            workdir = ?invocation.workdir,
            "Running `{} {}`",
            program,
            argv.join(" ")
        );

        let stdin_text = invocation.stdin_text();
        let mut command = Command::new(&program);
        command
            .args(&argv)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &invocation.workdir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::NotFound {
                tool,
                program: program.clone(),
            },
            _ => ToolError::Io { tool, source: e },
        })?;

        // The tool may fill its stdout pipe before it reads any input.
        let writer = match (stdin_text, child.stdin.take()) {
            (Some(text), Some(mut stdin)) => {
                trace!("Feeding interactive input: {:?}", text);
                Some(thread::spawn(move || stdin.write_all(text.as_bytes())))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| ToolError::Io { tool, source: e })?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("{} closed its input before all answers were read", tool);
                }
                Ok(Err(e)) => return Err(ToolError::Io { tool, source: e }),
                Err(_) => {
                    return Err(ToolError::Io {
                        tool,
                        source: std::io::Error::other("stdin writer thread panicked"),
                    });
                }
            }
        }

        let result = ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        check_failure(tool, &result)?;
        Ok(result)
    }
}
