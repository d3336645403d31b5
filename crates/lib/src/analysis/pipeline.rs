use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::actions::{self, BuildAction};
use super::decl::{load_decl, read_module_list};
use super::glob::{self, GlobResult};
use super::graph::{Module, ModuleGraph};
use super::{AnalysisPipeline, BeforeBuildActions, PipelineError, Purpose, RunRequest, StopBefore};
use crate::config::Config;

/// Analysis over JSON module declarations.
#[derive(Debug, Default)]
pub struct DeclPipeline {
  graph: ModuleGraph,
  globs: Vec<GlobResult>,
  actions: Vec<BuildAction>,
  actions_finalized: bool,
}

impl DeclPipeline {
  pub fn new() -> Self {
    Self::default()
  }

  /// Actions prepared by the last run; empty if it stopped before them.
  pub fn actions(&self) -> &[BuildAction] {
    &self.actions
  }

  pub fn actions_finalized(&self) -> bool {
    self.actions_finalized
  }

  fn load_modules(&mut self, config: &Config) -> Result<(Vec<Module>, Vec<PathBuf>), PipelineError> {
    let top = config.top_dir();
    let mut deps = vec![config.module_list_file().to_path_buf()];
    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut modules = Vec::new();

    for path in read_module_list(top, config.module_list_file())? {
      let decl = load_decl(top, &path)?;
      deps.push(path);

      for m in decl.modules {
        if let Some(first) = seen.get(&m.name) {
          return Err(PipelineError::DuplicateModule {
            name: m.name,
            first: first.clone(),
            second: decl.path,
          });
        }
        seen.insert(m.name.clone(), decl.path.clone());

        if m.cmd.is_some() && m.outs.is_empty() {
          return Err(PipelineError::NoOutputs(m.name));
        }

        let mut srcs = Vec::with_capacity(m.srcs.len());
        for src in &m.srcs {
          let rel = decl.dir.join(src);
          if !glob::is_glob(src) {
            srcs.push(rel);
            continue;
          }

          let pattern = rel.to_string_lossy().into_owned();
          let result = glob::evaluate(top, &m.name, &pattern)?;
          srcs.extend(result.matches.iter().cloned());
          if !self.globs.iter().any(|g| g.pattern == result.pattern) {
            self.globs.push(result);
          }
        }

        modules.push(Module {
          name: m.name,
          kind: m.kind,
          dir: decl.dir.clone(),
          srcs,
          deps: m.deps,
          missing_deps: Vec::new(),
          cmd: m.cmd,
          outs: m.outs,
          api: m.api,
        });
      }
    }

    Ok((modules, deps))
  }

  fn write_ninja(&self, config: &Config) -> Result<(), PipelineError> {
    let path = config.abs(config.output_file());
    let contents = if config.options().empty_ninja_file {
      String::new()
    } else {
      actions::render_ninja(&self.actions)
    };

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(&path, contents).map_err(|source| PipelineError::Write {
      path: path.clone(),
      source,
    })?;
    info!(path = %path.display(), actions = self.actions.len(), "wrote ninja file");
    Ok(())
  }
}

impl AnalysisPipeline for DeclPipeline {
  fn run(
    &mut self,
    request: RunRequest,
    config: &Config,
    before_build_actions: Option<BeforeBuildActions<'_>>,
  ) -> Result<Vec<PathBuf>, PipelineError> {
    *self = Self::default();

    let (modules, deps) = self.load_modules(config)?;
    let graph = ModuleGraph::build(modules, config.allow_missing_dependencies())?;
    self.graph = match request.purpose {
      Purpose::ApiExport => graph.retain(|m| m.api),
      Purpose::Build | Purpose::Conversion => graph,
    };
    debug!(modules = self.graph.len(), globs = self.globs.len(), "analysis complete");

    if request.stop_before == StopBefore::BuildActions {
      return Ok(deps);
    }

    if let Some(hook) = before_build_actions {
      hook()?;
    }
    self.actions = actions::prepare(&self.graph, config.out_dir());
    self.actions_finalized = true;
    debug!(actions = self.actions.len(), "build actions finalized");

    if request.stop_before == StopBefore::WriteOutput {
      return Ok(deps);
    }

    self.write_ninja(config)?;
    Ok(deps)
  }

  fn list_module_paths(&self, config: &Config, root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let everything = root.as_os_str().is_empty() || root == Path::new(".");
    Ok(
      read_module_list(config.top_dir(), config.module_list_file())?
        .into_iter()
        .filter(|p| everything || p.starts_with(root))
        .collect(),
    )
  }

  fn write_json_graph_and_actions(&self, graph: &mut dyn Write, actions: &mut dyn Write) -> Result<(), PipelineError> {
    self.graph.write_json(graph)?;
    actions::write_json(&self.actions, actions)
  }

  fn write_docs(&self, path: &Path) -> Result<(), PipelineError> {
    let mut by_kind: BTreeMap<&str, Vec<&Module>> = BTreeMap::new();
    for m in self.graph.modules() {
      by_kind.entry(m.kind.as_str()).or_default().push(m);
    }

    let mut out = String::from("# Module kinds\n");
    for (kind, modules) in by_kind {
      out.push_str(&format!("\n## {}\n\n", kind));
      for m in modules {
        out.push_str(&format!("- `{}` ({})\n", m.name, m.dir.display()));
      }
    }

    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).map_err(|source| PipelineError::Write {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(path, out).map_err(|source| PipelineError::Write {
      path: path.to_path_buf(),
      source,
    })
  }

  fn globs(&self) -> &[GlobResult] {
    &self.globs
  }

  fn graph(&self) -> &ModuleGraph {
    &self.graph
  }
}
