//! Recording tool runner

use devflow_core::{CommandRunner, CoreError, ToolInvocation};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

type Effect = Box<dyn Fn(&ToolInvocation) + Send>;

#[derive(Default)]
struct State {
    calls: Vec<ToolInvocation>,
    failing: HashSet<String>,
    effects: HashMap<String, Effect>,
    produce_outputs: bool,
}

/// [`CommandRunner`] that records invocations instead of spawning them
///
/// Programs are matched by file name (`zig`, `texconv.exe`). With
/// [`RecordingRunner::producing_outputs`] every expected artifact is created
/// so output verification passes.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("calls", &self.state.lock().calls.len())
            .finish()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create expected artifacts on every successful run
    pub fn producing_outputs(self) -> Self {
        self.state.lock().produce_outputs = true;
        self
    }

    /// Make `program` exit with status 1
    pub fn fail(&self, program: &str) {
        self.state.lock().failing.insert(program.to_string());
    }

    /// Run `effect` whenever `program` is invoked
    pub fn on(&self, program: &str, effect: impl Fn(&ToolInvocation) + Send + 'static) {
        self.state
            .lock()
            .effects
            .insert(program.to_string(), Box::new(effect));
    }

    /// Invocations so far
    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.state.lock().calls.clone()
    }

    /// Command lines so far
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToolInvocation::command_line).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), CoreError> {
        let produce = {
            let mut state = self.state.lock();
            state.calls.push(invocation.clone());
            let name = invocation.program_name();
            if state.failing.contains(&name) {
                return Err(CoreError::ToolFailed {
                    command: invocation.command_line(),
                    status: Some(1),
                });
            }
            if let Some(effect) = state.effects.get(&name) {
                effect(invocation);
            }
            state.produce_outputs
        };

        if produce {
            if let Some(out) = &invocation.expected_output {
                if out.extension().is_some() {
                    std::fs::create_dir_all(out.parent().unwrap()).unwrap();
                    std::fs::write(out, b"").unwrap();
                } else {
                    std::fs::create_dir_all(out).unwrap();
                }
            }
        }
        invocation.verify_output()
    }
}
