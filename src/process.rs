//! Launching client programs
//!
//! Commands run through `/bin/sh` in their own session so they outlive the
//! compositor's process group. The shell backgrounds the command and exits
//! at once, so only the shell is ever waited on.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus, Stdio};

use log::info;

/// Value of `XDG_CURRENT_DESKTOP` for spawned clients
pub const DESKTOP_NAME: &str = "kestrel";

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("empty command")]
    Empty,
    #[error("failed to start shell for {command:?}: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("shell for {command:?} exited with {status}")]
    Shell { command: String, status: ExitStatus },
}

/// Run `command` detached, pointed at the compositor's socket
pub fn spawn(command: &str, socket: &str) -> Result<(), SpawnError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(SpawnError::Empty);
    }

    let mut shell = Command::new("/bin/sh");
    shell
        .arg("-c")
        .arg(format!("{command} &"))
        .env("WAYLAND_DISPLAY", socket)
        .env("XDG_CURRENT_DESKTOP", DESKTOP_NAME)
        .stdin(Stdio::null());
    // SAFETY: setsid is async-signal-safe and touches no parent state.
    unsafe {
        shell.pre_exec(|| {
            rustix::process::setsid()?;
            Ok(())
        });
    }

    let status = shell.status().map_err(|source| SpawnError::Io {
        command: command.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(SpawnError::Shell {
            command: command.to_string(),
            status,
        });
    }
    info!("Spawned {:?} on {}", command, socket);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_true() {
        assert!(spawn("true", "wayland-test").is_ok());
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(spawn("   ", "wayland-test"), Err(SpawnError::Empty)));
    }

    #[test]
    fn test_environment_reaches_child() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("env");
        let command = format!("echo \"$WAYLAND_DISPLAY $XDG_CURRENT_DESKTOP\" > {}", out.display());
        spawn(&command, "wayland-7").unwrap();

        let mut contents = String::new();
        for _ in 0..100 {
            contents = std::fs::read_to_string(&out).unwrap_or_default();
            if contents.ends_with('\n') {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert_eq!(contents.trim(), "wayland-7 kestrel");
    }
}
