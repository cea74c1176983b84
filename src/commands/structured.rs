//! Structured (`/`) subcommand handlers.
//!
//! A closed routing table: every name maps to a handler returning a reply
//! or a command error. Unknown names are themselves an error reply.

use std::path::Path;

use serde::Serialize;
use tokio::process::Command;

use super::{CommandError, CommandReply};
use crate::uploads;

/// Host facts reported by `/sysinfo`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub platform: String,
    pub arch: String,
    pub release: String,
    pub uptime_secs: u64,
    pub total_mem_bytes: u64,
    pub free_mem_bytes: u64,
}

/// Gather host facts from std consts and /proc, with graceful fallbacks on
/// platforms where /proc is absent.
pub fn host_info() -> HostInfo {
    HostInfo {
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        release: std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
        uptime_secs: read_proc_uptime().unwrap_or(0),
        total_mem_bytes: read_meminfo_field("MemTotal:").unwrap_or(0),
        free_mem_bytes: read_meminfo_field("MemFree:").unwrap_or(0),
    }
}

fn read_proc_uptime() -> Option<u64> {
    let raw = std::fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = raw.split_whitespace().next()?.parse().ok()?;
    Some(secs as u64)
}

fn read_meminfo_field(field: &str) -> Option<u64> {
    let raw = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = raw.lines().find(|l| l.starts_with(field))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

/// Route one structured command by name.
pub async fn run(name: &str, args: &[String]) -> Result<CommandReply, CommandError> {
    match name {
        "sysinfo" => sysinfo(),
        "listfiles" => {
            let dir = args
                .first()
                .map(String::as_str)
                .filter(|d| !d.is_empty())
                .unwrap_or(".");
            listfiles(dir).await
        }
        "readfile" => {
            let path = args
                .first()
                .ok_or_else(|| CommandError::Argument("please provide a file path".to_string()))?;
            readfile(path).await
        }
        "upload" => Ok(CommandReply::Text(
            "Please send the file you want to upload.".to_string(),
        )),
        "download" => {
            let path = args.first().ok_or_else(|| {
                CommandError::Argument("please provide a file path to download".to_string())
            })?;
            download(path)
        }
        "netstat" => netstat().await,
        "ping" => {
            let host = args
                .first()
                .ok_or_else(|| CommandError::Argument("please provide a host to ping".to_string()))?;
            ping(host).await
        }
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn sysinfo() -> Result<CommandReply, CommandError> {
    let info = host_info();
    let block = serde_json::to_string_pretty(&info)
        .map_err(|e| CommandError::Io(e.to_string()))?;
    Ok(CommandReply::Text(format!("System Info:\n{block}")))
}

async fn listfiles(dir: &str) -> Result<CommandReply, CommandError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CommandError::Io(format!("cannot list {dir}: {e}")))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CommandError::Io(e.to_string()))?
    {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(CommandReply::Text(format!(
        "Files in {dir}:\n{}",
        names.join("\n")
    )))
}

async fn readfile(path: &str) -> Result<CommandReply, CommandError> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CommandError::Io(format!("cannot read {path}: {e}")))?;
    Ok(CommandReply::Text(format!("File contents:\n{data}")))
}

fn download(path: &str) -> Result<CommandReply, CommandError> {
    let attachment = uploads::prepare_outbound(Path::new(path))
        .map_err(|_| CommandError::NotFound(path.to_string()))?;
    Ok(CommandReply::File(attachment))
}

async fn netstat() -> Result<CommandReply, CommandError> {
    let output = Command::new("netstat")
        .arg("-an")
        .output()
        .await
        .map_err(|e| CommandError::Execution(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Execution(stderr.trim_end().to_string()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let connections: Vec<&str> = stdout
        .lines()
        .filter(|line| line.contains("ESTABLISHED"))
        .collect();
    Ok(CommandReply::Text(format!(
        "Active connections:\n{}",
        connections.join("\n")
    )))
}

async fn ping(host: &str) -> Result<CommandReply, CommandError> {
    // Argument vector form: the host never passes through a shell.
    let output = Command::new("ping")
        .arg("-c")
        .arg("4")
        .arg(host)
        .output()
        .await
        .map_err(|e| CommandError::Execution(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            format!("ping exited with {}", output.status)
        } else {
            stderr.trim_end().to_string()
        };
        return Err(CommandError::Execution(message));
    }
    Ok(CommandReply::Text(
        String::from_utf8_lossy(&output.stdout).to_string(),
    ))
}
