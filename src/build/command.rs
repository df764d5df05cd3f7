// src/build/command.rs

//! Shell command composition and execution for the build driver.
//!
//! The environment setup and the build itself must run in one child
//! process (`env && build`), so commands are composed as strings and handed
//! to the platform shell. Output is either passed through to the terminal
//! or captured whole for parsing; nothing in the core streams it.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Error, Result};

/// Quote an argument for the platform shell. Only double quotes appear in
/// practice (paths with spaces); embedded quotes are rejected upstream by
/// the identifier rules.
fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(' ') {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

/// Compose a `cmake -DKEY=VALUE... -P script` invocation.
pub fn make_cmake_cmd(cmake_exe: &Path, script: &Path, definitions: &[(&str, String)]) -> String {
    let mut parts = vec![quote(&cmake_exe.to_string_lossy())];
    for (key, value) in definitions {
        parts.push(format!("-D{}={}", key, quote(value)));
    }
    parts.push("-P".to_string());
    parts.push(quote(&script.to_string_lossy()));
    parts.join(" ")
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/c").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run a composed command, passing stdout/stderr through to the user.
/// Returns the child's exit code.
pub fn cmd_execute(command: &str) -> Result<i32> {
    debug!("executing: {}", command);
    let status = shell_command(command)
        .status()
        .map_err(|e| Error::ToolNotFound(format!("failed to launch '{}': {}", command, e)))?;
    Ok(status.code().unwrap_or(-1))
}

pub struct CapturedOutput {
    pub exit_code: i32,
    pub output: String,
}

/// Run a composed command and capture stdout and stderr as one string.
pub fn cmd_execute_and_capture_output(command: &str) -> Result<CapturedOutput> {
    debug!("executing (captured): {}", command);
    let output = shell_command(command)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::ToolNotFound(format!("failed to launch '{}': {}", command, e)))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(CapturedOutput {
        exit_code: output.status.code().unwrap_or(-1),
        output: text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_make_cmake_cmd() {
        let cmd = make_cmake_cmd(
            &PathBuf::from("cmake"),
            &PathBuf::from("scripts/ports.cmake"),
            &[
                ("CMD", "BUILD".to_string()),
                ("PORT", "zlib".to_string()),
                ("FEATURES", String::new()),
            ],
        );
        assert_eq!(
            cmd,
            "cmake -DCMD=BUILD -DPORT=zlib -DFEATURES=\"\" -P scripts/ports.cmake"
        );
    }

    #[test]
    fn test_quote_spaces() {
        let cmd = make_cmake_cmd(
            &PathBuf::from("C:/Program Files/CMake/cmake.exe"),
            &PathBuf::from("ports.cmake"),
            &[],
        );
        assert!(cmd.starts_with("\"C:/Program Files/CMake/cmake.exe\""));
    }

    #[test]
    fn test_cmd_execute_captures_exit_code() {
        let ok = cmd_execute_and_capture_output("exit 0").unwrap();
        assert_eq!(ok.exit_code, 0);
        let fail = cmd_execute_and_capture_output("exit 3").unwrap();
        assert_eq!(fail.exit_code, 3);
    }
}
