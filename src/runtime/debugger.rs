use std::collections::BTreeMap;

use super::context::ContextId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Run,
    /// Pause before the next statement the context starts, at any depth.
    StepInto { context: ContextId },
    /// Pause before the next statement the context starts at `depth`
    /// frames or fewer.
    StepOver { context: ContextId, depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    Breakpoint(usize),
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub line: usize,
    pub enabled: bool,
}

/// Breakpoints and stepping state.
///
/// The interpreter calls `check` before each statement starts. The check
/// reads only the line, context and frame depth it is handed, so it cannot
/// disturb evaluation.
#[derive(Debug)]
pub struct Debugger {
    enabled: bool,
    breakpoints: BTreeMap<usize, bool>,
    mode: StepMode,
    /// Set on resume so the statement that paused is not paused again.
    skip_next: bool,
}

impl Debugger {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            breakpoints: BTreeMap::new(),
            mode: StepMode::Run,
            skip_next: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.mode = StepMode::Run;
        }
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StepMode) {
        if mode != StepMode::Run {
            self.enabled = true;
        }
        self.mode = mode;
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line, true);
    }

    pub fn clear_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.remove(&line).is_some()
    }

    pub fn clear_all(&mut self) {
        self.breakpoints.clear();
    }

    /// Returns false when no breakpoint exists on `line`.
    pub fn toggle_breakpoint(&mut self, line: usize, enabled: bool) -> bool {
        match self.breakpoints.get_mut(&line) {
            Some(flag) => {
                *flag = enabled;
                true
            }
            None => false,
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints
            .iter()
            .map(|(&line, &enabled)| Breakpoint { line, enabled })
            .collect()
    }

    /// Host resumed after a pause: skip the check for the pending statement.
    pub fn resume(&mut self, mode: StepMode) {
        self.mode = mode;
        self.skip_next = true;
    }

    pub fn check(&mut self, context: ContextId, line: usize, depth: usize) -> Option<PauseReason> {
        if std::mem::take(&mut self.skip_next) || !self.enabled {
            return None;
        }
        if self.breakpoints.get(&line) == Some(&true) {
            return Some(PauseReason::Breakpoint(line));
        }
        match self.mode {
            StepMode::StepInto { context: target } if target == context => Some(PauseReason::Step),
            StepMode::StepOver {
                context: target,
                depth: limit,
            } if target == context && depth <= limit => Some(PauseReason::Step),
            _ => None,
        }
    }
}
