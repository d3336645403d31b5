mod build;
mod env_check;

pub use build::{BuildArgs, cmd_build};
pub use env_check::{EnvCheckArgs, cmd_env_check};
