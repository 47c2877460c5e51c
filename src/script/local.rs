//! ASH-015: Local bash execution for script-backed functions.

use super::ExecOutput;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Execute a script via `bash`, fed on stdin, with extra environment variables.
pub fn exec_local(
    script: &str,
    env: &[(String, String)],
    workdir: Option<&Path>,
) -> Result<ExecOutput, String> {
    let mut cmd = Command::new("bash");
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn bash: {}", e))?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(script.as_bytes())
            .map_err(|e| format!("stdin write error: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("wait error: {}", e))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
