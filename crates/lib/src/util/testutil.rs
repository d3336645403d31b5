//! Test helpers for running small shell scripts as external tools.

/// Full argv that runs `script` through the platform shell.
#[cfg(unix)]
pub fn shell_argv(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn shell_argv(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}
