use super::{Invocation, Tool, ToolArg, ToolError, ToolOutput, ToolRunner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

type Handler = Box<dyn Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync>;

/// Test double for [`ToolRunner`] that records every call and answers from per-tool
/// handlers. Tools without a handler behave as if they were not installed.
#[derive(Default)]
pub(crate) struct MockRunner {
    handlers: HashMap<Tool, Handler>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(
        mut self,
        tool: Tool,
        handler: impl Fn(&Invocation) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(tool, Box::new(handler));
        self
    }

    /// Handler that creates the file named by each of `outputs` and succeeds silently.
    pub(crate) fn producing(self, tool: Tool, outputs: &'static [&'static str]) -> Self {
        self.on(tool, move |inv| {
            for key in outputs {
                touch(inv, key);
            }
            ok("")
        })
    }

    pub(crate) fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, tool: Tool) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| inv.tool == tool)
            .collect()
    }
}

impl ToolRunner for MockRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(invocation.clone());
        match self.handlers.get(&invocation.tool) {
            Some(handler) => handler(invocation),
            None => Err(ToolError::NotFound {
                tool: invocation.tool,
                program: invocation.tool.to_string(),
            }),
        }
    }
}

pub(crate) fn ok(stdout: &str) -> Result<ToolOutput, ToolError> {
    Ok(ToolOutput {
        status: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub(crate) fn fail(tool: Tool, message: &str) -> Result<ToolOutput, ToolError> {
    Err(ToolError::Failed {
        tool,
        code: Some(1),
        message: message.to_string(),
    })
}

/// Resolves the file given for option `key` against the invocation's working directory.
pub(crate) fn arg_path(inv: &Invocation, key: &str) -> Option<PathBuf> {
    let value = inv.get(key).and_then(ToolArg::as_value)?;
    Some(match &inv.workdir {
        Some(dir) => dir.join(value),
        None => PathBuf::from(value),
    })
}

/// Creates an empty file for option `key`, as the real tool would.
pub(crate) fn touch(inv: &Invocation, key: &str) {
    if let Some(path) = arg_path(inv, key) {
        std::fs::write(path, "").unwrap();
    }
}
