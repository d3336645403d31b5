//! Module dependency graph.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use super::PipelineError;

/// A declared module after glob expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
  pub name: String,
  pub kind: String,
  /// Directory of the declaring file, relative to the top directory.
  pub dir: PathBuf,
  /// Source files relative to the top directory.
  pub srcs: Vec<PathBuf>,
  /// Dependencies that resolved to a declared module.
  pub deps: Vec<String>,
  /// Dependencies tolerated although undeclared.
  pub missing_deps: Vec<String>,
  pub cmd: Option<String>,
  pub outs: Vec<String>,
  pub api: bool,
}

#[derive(Serialize)]
struct GraphEntry<'a> {
  name: &'a str,
  kind: &'a str,
  dir: &'a PathBuf,
  deps: &'a [String],
}

/// Modules in dependency order, dependencies first.
#[derive(Debug, Default)]
pub struct ModuleGraph {
  modules: Vec<Module>,
}

impl ModuleGraph {
  /// Resolve dependencies between `modules`.
  ///
  /// Undeclared dependencies fail the build unless `allow_missing` is set, in
  /// which case they are moved to [`Module::missing_deps`].
  pub fn build(mut modules: Vec<Module>, allow_missing: bool) -> Result<Self, PipelineError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();
    for module in &modules {
      let idx = graph.add_node(module.name.clone());
      nodes.insert(module.name.clone(), idx);
    }

    for module in &mut modules {
      let dependent = nodes[&module.name];
      let mut resolved = Vec::with_capacity(module.deps.len());
      for dep in module.deps.drain(..) {
        match nodes.get(&dep) {
          Some(&idx) => {
            graph.update_edge(idx, dependent, ());
            resolved.push(dep);
          }
          None if allow_missing => module.missing_deps.push(dep),
          None => {
            return Err(PipelineError::UnknownDependency {
              module: module.name.clone(),
              dep,
            });
          }
        }
      }
      module.deps = resolved;
    }

    toposort(&graph, None).map_err(|cycle| PipelineError::Cycle(graph[cycle.node_id()].clone()))?;

    let order = stable_order(&graph);
    let mut by_name: HashMap<String, Module> = modules.into_iter().map(|m| (m.name.clone(), m)).collect();
    let modules = order
      .into_iter()
      .filter_map(|idx| by_name.remove(&graph[idx]))
      .collect();

    Ok(Self { modules })
  }

  /// Keep only the modules matching `keep`. Dependencies on dropped modules
  /// are removed from the survivors; the order stays dependency-first.
  pub fn retain(self, keep: impl Fn(&Module) -> bool) -> Self {
    let mut modules: Vec<Module> = self.modules.into_iter().filter(|m| keep(m)).collect();
    let kept: HashSet<String> = modules.iter().map(|m| m.name.clone()).collect();
    for module in &mut modules {
      module.deps.retain(|d| kept.contains(d));
    }
    Self { modules }
  }

  pub fn modules(&self) -> &[Module] {
    &self.modules
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  pub fn get(&self, name: &str) -> Option<&Module> {
    self.modules.iter().find(|m| m.name == name)
  }

  /// Emit the graph as a JSON array of `{name, kind, dir, deps}`.
  pub fn write_json(&self, w: &mut dyn Write) -> Result<(), PipelineError> {
    let entries: Vec<GraphEntry<'_>> = self
      .modules
      .iter()
      .map(|m| GraphEntry {
        name: &m.name,
        kind: &m.kind,
        dir: &m.dir,
        deps: &m.deps,
      })
      .collect();
    serde_json::to_writer_pretty(&mut *w, &entries)?;
    w.write_all(b"\n")?;
    Ok(())
  }
}

/// Kahn's algorithm, taking ready nodes in name order.
fn stable_order(graph: &DiGraph<String, ()>) -> Vec<NodeIndex> {
  let mut in_degree: HashMap<NodeIndex, usize> = graph
    .node_indices()
    .map(|idx| (idx, graph.neighbors_directed(idx, Direction::Incoming).count()))
    .collect();

  let mut ready: BTreeSet<(&str, NodeIndex)> = in_degree
    .iter()
    .filter(|(_, d)| **d == 0)
    .map(|(idx, _)| (graph[*idx].as_str(), *idx))
    .collect();

  let mut order = Vec::with_capacity(graph.node_count());
  while let Some(next) = ready.pop_first() {
    let idx = next.1;
    order.push(idx);
    for dependent in graph.neighbors_directed(idx, Direction::Outgoing) {
      if let Some(d) = in_degree.get_mut(&dependent) {
        *d -= 1;
        if *d == 0 {
          ready.insert((graph[dependent].as_str(), dependent));
        }
      }
    }
  }
  order
}
