//! weft-lib: build-mode orchestration for a meta-build tool.
//!
//! One invocation selects a [`mode::BuildMode`], drives an analysis pipeline
//! as far as that mode needs and performs the mode's terminal action. Every
//! file and environment variable read along the way is recorded so the outer
//! scheduler reruns us exactly when something relevant changed:
//! - `depfile`: make-style dependency records
//! - `env`: the used-environment snapshot
//! - `forest`: the merged symlink workspace for the second build system
//! - `mixed`: the one-shot hook into an external work partitioner
//! - `orchestrate`: the run itself

pub mod analysis;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod depfile;
pub mod env;
pub mod forest;
pub mod mixed;
pub mod mode;
pub mod orchestrate;
pub mod util;
