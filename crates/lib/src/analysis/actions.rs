//! Build actions and their ninja rendering.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::PipelineError;
use super::graph::ModuleGraph;
use crate::consts::APP_NAME;

/// One command producing files, derived from a module with a `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildAction {
  pub module: String,
  pub command: String,
  pub inputs: Vec<PathBuf>,
  pub outputs: Vec<PathBuf>,
}

/// Turn every module with a `cmd` into an action. Inputs are the module's
/// sources followed by the outputs of its direct dependencies.
pub fn prepare(graph: &ModuleGraph, out_dir: &Path) -> Vec<BuildAction> {
  let mut actions: Vec<BuildAction> = Vec::new();

  for module in graph.modules() {
    let Some(cmd) = &module.cmd else {
      continue;
    };

    let mut inputs = module.srcs.clone();
    for dep in &module.deps {
      if let Some(produced) = actions.iter().find(|a| &a.module == dep) {
        inputs.extend(produced.outputs.iter().cloned());
      }
    }

    let gen_dir = out_dir.join("gen").join(&module.dir);
    let outputs = module.outs.iter().map(|o| gen_dir.join(o)).collect();

    actions.push(BuildAction {
      module: module.name.clone(),
      command: cmd.clone(),
      inputs,
      outputs,
    });
  }

  actions
}

/// Render actions as a ninja file: one rule and one build statement each.
pub fn render_ninja(actions: &[BuildAction]) -> String {
  let mut out = format!("# Generated by {}. Do not edit.\n", APP_NAME);
  for action in actions {
    let rule = format!("m_{}", rule_name(&action.module));
    out.push('\n');
    out.push_str(&format!("rule {}\n", rule));
    out.push_str(&format!("  command = {}\n", action.command));
    out.push_str(&format!("  description = {} $out\n", action.module));

    let outputs: Vec<String> = action.outputs.iter().map(|p| escape_path(p)).collect();
    let inputs: Vec<String> = action.inputs.iter().map(|p| escape_path(p)).collect();
    out.push_str(&format!("build {}: {}", outputs.join(" "), rule));
    if !inputs.is_empty() {
      out.push(' ');
      out.push_str(&inputs.join(" "));
    }
    out.push('\n');
  }
  out
}

/// Emit actions as a JSON array of `{module, command, inputs, outputs}`.
pub fn write_json(actions: &[BuildAction], w: &mut dyn Write) -> Result<(), PipelineError> {
  serde_json::to_writer_pretty(&mut *w, actions)?;
  w.write_all(b"\n")?;
  Ok(())
}

/// Ninja-safe rule name for `module`. Letters, digits and `-` pass through,
/// `_` doubles and every other byte becomes `_` plus two hex digits, so
/// distinct modules never share a rule.
fn rule_name(module: &str) -> String {
  let mut name = String::with_capacity(module.len());
  for b in module.bytes() {
    match b {
      b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' => name.push(b as char),
      b'_' => name.push_str("__"),
      _ => name.push_str(&format!("_{:02x}", b)),
    }
  }
  name
}

fn escape_path(path: &Path) -> String {
  let mut escaped = String::new();
  for c in path.to_string_lossy().chars() {
    match c {
      '$' => escaped.push_str("$$"),
      ' ' => escaped.push_str("$ "),
      ':' => escaped.push_str("$:"),
      _ => escaped.push(c),
    }
  }
  escaped
}
