// Files a sandbox run reads or leaves behind: the bot's env file and the
// captured stdout/stderr logs.

use std::io;
use std::path::{Path, PathBuf};

/// Captured output streams of one sandbox container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLogs {
    pub stdout: String,
    pub stderr: String,
}

/// Read a bot's dotenv file into the variables passed to its container. The
/// engine's own environment is left untouched.
pub fn read_env_file(path: &Path) -> io::Result<Vec<(String, String)>> {
    dotenvy::from_path_iter(path)
        .map_err(into_io)?
        .map(|item| item.map_err(into_io))
        .collect()
}

fn into_io(err: dotenvy::Error) -> io::Error {
    match err {
        dotenvy::Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Write `<log_dir>/<label>-<bot_id>.stdout` and `.stderr`, creating the
/// directory as needed. Returns both paths.
pub fn write_log_artifacts(
    log_dir: &Path,
    label: &str,
    bot_id: &str,
    logs: &ContainerLogs,
) -> io::Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(log_dir)?;
    let stdout_path = log_dir.join(format!("{label}-{bot_id}.stdout"));
    let stderr_path = log_dir.join(format!("{label}-{bot_id}.stderr"));
    std::fs::write(&stdout_path, &logs.stdout)?;
    std::fs::write(&stderr_path, &logs.stderr)?;
    Ok((stdout_path, stderr_path))
}
