//! Running external optimizers.
//!
//! Two invocation styles are supported: piping the image through stdin/stdout,
//! and, for tools that only work on files, writing it to a temporary directory
//! and reading the tool's output file back.

use crate::error::BackendError;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

fn tool_name(tool: &Path) -> String {
    tool.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| tool.display().to_string())
}

/// Feeds `input` to the tool's stdin and returns its stdout
pub async fn pipe_through(tool: &Path, args: &[String], input: &[u8]) -> Result<Vec<u8>, BackendError> {
    let name = tool_name(tool);
    debug!("Running {} {:?} on {} bytes", name, args, input.len());

    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| BackendError::Spawn {
            tool: name.clone(),
            source,
        })?;

    let mut stdin = child.stdin.take().ok_or_else(|| {
        BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            format!("{} stdin unavailable", name),
        ))
    })?;

    let feed = async move {
        stdin.write_all(input).await?;
        stdin.shutdown().await
    };
    let start_time = std::time::Instant::now();
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output?;

    if !output.status.success() {
        return Err(BackendError::ToolFailed {
            tool: name,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    // A tool that exits cleanly may close stdin early; only trust the exit status then
    if let Err(e) = fed {
        debug!("{} closed stdin early: {}", name, e);
    }

    debug!("{} completed in {:?}", name, start_time.elapsed());
    Ok(output.stdout)
}

/// Writes `input` to a temporary file named `input.<extension>`, runs the tool
/// with the arguments built from the input and output paths, and reads the
/// output file back.
pub async fn run_on_files<F>(
    tool: &Path,
    extension: &str,
    input: &[u8],
    build_args: F,
) -> Result<Vec<u8>, BackendError>
where
    F: FnOnce(&Path, &Path) -> Vec<String>,
{
    let name = tool_name(tool);
    let temp_dir = tempfile::TempDir::new()?;
    let input_path = temp_dir.path().join(format!("input.{}", extension));
    let output_path = temp_dir.path().join(format!("output.{}", extension));
    tokio::fs::write(&input_path, input).await?;

    let args = build_args(&input_path, &output_path);
    debug!("Running {} {:?}", name, args);

    let start_time = std::time::Instant::now();
    let output = Command::new(tool)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BackendError::Spawn {
            tool: name.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(BackendError::ToolFailed {
            tool: name,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!("{} completed in {:?}", name, start_time.elapsed());
    Ok(tokio::fs::read(&output_path).await?)
}
