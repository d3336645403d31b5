//! Run phases.

use std::fmt;

use super::RunError;

/// Phases of a run, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
  Init,
  ModeSelected,
  PipelineRunning,
  TerminalActionRunning,
  DependenciesFlushed,
  EnvironmentChecked,
  Done,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::Init => "init",
      Phase::ModeSelected => "mode-selected",
      Phase::PipelineRunning => "pipeline-running",
      Phase::TerminalActionRunning => "terminal-action-running",
      Phase::DependenciesFlushed => "dependencies-flushed",
      Phase::EnvironmentChecked => "environment-checked",
      Phase::Done => "done",
    };
    f.write_str(name)
  }
}

/// Forward-only phase tracker. Phases may be skipped but never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunState {
  phase: Phase,
}

impl Default for RunState {
  fn default() -> Self {
    Self { phase: Phase::Init }
  }
}

impl RunState {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn phase(&self) -> Phase {
    self.phase
  }

  pub fn advance(&mut self, next: Phase) -> Result<(), RunError> {
    if next <= self.phase {
      return Err(RunError::InvalidTransition {
        from: self.phase,
        to: next,
      });
    }
    self.phase = next;
    Ok(())
  }
}
