//! Execution Environment contract: the filesystem/shell collaborator the core consumes.
//!
//! Built-in tools (`tools::{read,write,edit,glob,grep,bash}`) delegate their I/O through
//! this trait instead of calling `tokio::fs`/`walkdir` directly, so the core can be driven
//! against a fake environment in tests and, in principle, a sandboxed/remote one in
//! production. `LocalEnvironment` is the only implementation shipped here; the per-tool
//! executors' (`tools::read::ReadTool`, `tools::bash::BashTool`, etc.) path-resolution and
//! process-management logic lives here in one place instead of duplicated per tool.

use globset::GlobBuilder;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Grace period between SIGTERM and SIGKILL when a child process is torn down early
/// (timeout or cancellation).
const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Clone, Debug, Default)]
pub struct ExecOptions {
    pub timeout_ms: Option<u64>,
    pub working_dir: Option<String>,
    pub env_vars: HashMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_ms: u64,
}

#[derive(Clone, Debug, Default)]
pub struct GrepOptions {
    pub glob: Option<String>,
    pub case_insensitive: bool,
    pub output_mode: GrepOutputMode,
    pub context_lines: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GrepOutputMode {
    #[default]
    FilesWithMatches,
    Content,
    Count,
}

/// Collaborator trait the core consumes. `Send + Sync` so it can be shared as
/// `Arc<dyn Environment>` across a parent Session and its subagents.
#[async_trait::async_trait]
pub trait Environment: Send + Sync {
    async fn read_file(&self, path: &str, offset: Option<usize>, limit: Option<usize>) -> Result<Vec<u8>, EnvError>;
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), EnvError>;
    async fn delete_file(&self, path: &str) -> Result<(), EnvError>;
    async fn file_exists(&self, path: &str) -> bool;
    async fn list_directory(&self, path: &str, depth: Option<usize>) -> Result<Vec<String>, EnvError>;

    async fn exec_command(
        &self,
        cmd: &str,
        opts: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<ExecOutput, EnvError>;

    async fn grep(&self, pattern: &str, path: &str, opts: GrepOptions) -> Result<String, EnvError>;
    async fn glob(&self, pattern: &str, path: &str) -> Result<Vec<String>, EnvError>;

    fn working_directory(&self) -> &str;
    fn platform(&self) -> &str;
    fn os_version(&self) -> &str;
}

/// Local-filesystem/shell implementation, atop `tokio::fs` and `tokio::process::Command`.
pub struct LocalEnvironment {
    workspace_root: PathBuf,
    platform: String,
    os_version: String,
}

impl LocalEnvironment {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
            platform: std::env::consts::OS.to_string(),
            os_version: std::env::consts::ARCH.to_string(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            dirs::home_dir().unwrap_or_default().join(rest)
        } else if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.workspace_root.join(p)
        };
        expanded.canonicalize().unwrap_or(expanded)
    }
}

#[async_trait::async_trait]
impl Environment for LocalEnvironment {
    async fn read_file(&self, path: &str, offset: Option<usize>, limit: Option<usize>) -> Result<Vec<u8>, EnvError> {
        let resolved = self.resolve(path);
        let content = tokio::fs::read(&resolved).await?;
        let (Some(offset), Some(limit)) = (offset, limit) else {
            return Ok(content);
        };
        // Line-oriented slicing, offset 1-indexed. The caller (ReadTool) does the
        // cat -n formatting; this just narrows the byte range to the requested lines.
        let text = String::from_utf8_lossy(&content);
        let lines: Vec<&str> = text.lines().collect();
        let start = offset.saturating_sub(1).min(lines.len());
        let end = (start + limit).min(lines.len());
        Ok(lines[start..end].join("\n").into_bytes())
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), EnvError> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), EnvError> {
        let resolved = self.resolve(path);
        tokio::fs::remove_file(&resolved).await?;
        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        tokio::fs::metadata(self.resolve(path)).await.is_ok()
    }

    async fn list_directory(&self, path: &str, depth: Option<usize>) -> Result<Vec<String>, EnvError> {
        let root = self.resolve(path);
        if !root.exists() {
            return Err(EnvError::NotFound(path.to_string()));
        }
        let max_depth = depth.unwrap_or(1);
        let mut entries = Vec::new();
        for entry in WalkDir::new(&root).min_depth(1).max_depth(max_depth).into_iter().filter_map(|e| e.ok()) {
            entries.push(entry.path().to_string_lossy().to_string());
        }
        entries.sort();
        Ok(entries)
    }

    async fn exec_command(
        &self,
        cmd: &str,
        opts: ExecOptions,
        cancel: CancellationToken,
    ) -> Result<ExecOutput, EnvError> {
        let working_dir = opts
            .working_dir
            .map(|d| self.resolve(&d))
            .unwrap_or_else(|| self.workspace_root.clone());

        let mut command = Command::new("bash");
        command.arg("-c").arg(cmd).current_dir(&working_dir).kill_on_drop(true);
        for (k, v) in &opts.env_vars {
            command.env(k, v);
        }
        command.stdout(std::process::Stdio::piped()).stderr(std::process::Stdio::piped());

        let mut child = command.spawn()?;
        let timeout = Duration::from_millis(opts.timeout_ms.unwrap_or(120_000));
        let started = std::time::Instant::now();

        tokio::select! {
            result = tokio::time::timeout(timeout, child.wait()) => {
                match result {
                    Ok(Ok(status)) => {
                        let stdout = read_pipe(child.stdout.take()).await;
                        let stderr = read_pipe(child.stderr.take()).await;
                        Ok(ExecOutput {
                            stdout,
                            stderr,
                            exit_code: status.code().unwrap_or(-1),
                            timed_out: false,
                            duration_ms: started.elapsed().as_millis() as u64,
                        })
                    }
                    Ok(Err(e)) => Err(EnvError::Io(e)),
                    Err(_) => {
                        terminate_gracefully(&mut child).await;
                        Ok(ExecOutput {
                            stdout: String::new(),
                            stderr: String::new(),
                            exit_code: -1,
                            timed_out: true,
                            duration_ms: started.elapsed().as_millis() as u64,
                        })
                    }
                }
            }
            _ = cancel.cancelled() => {
                terminate_gracefully(&mut child).await;
                Ok(ExecOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: -1,
                    timed_out: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    async fn grep(&self, pattern: &str, path: &str, opts: GrepOptions) -> Result<String, EnvError> {
        let regex_pattern = if opts.case_insensitive { format!("(?i){pattern}") } else { pattern.to_string() };
        let regex = Regex::new(&regex_pattern).map_err(|e| EnvError::InvalidPattern(e.to_string()))?;
        let search_root = self.resolve(path);

        let file_glob = opts.glob.as_deref().and_then(|g| {
            GlobBuilder::new(g).literal_separator(false).build().ok().map(|g| g.compile_matcher())
        });

        if search_root.is_file() {
            return Ok(grep_file(&search_root, &regex, opts.output_mode, opts.context_lines));
        }

        let mut results = Vec::new();
        for entry in WalkDir::new(&search_root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && name != "node_modules" && name != "target"
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(ref glob) = file_glob {
                if !glob.is_match(entry.file_name().to_string_lossy().as_ref()) {
                    continue;
                }
            }
            let Ok(bytes) = std::fs::read(entry.path()) else { continue };
            if bytes.len() > 512 && bytes[..512].contains(&0) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else { continue };
            if !regex.is_match(&content) {
                continue;
            }
            match opts.output_mode {
                GrepOutputMode::FilesWithMatches => results.push(entry.path().to_string_lossy().to_string()),
                GrepOutputMode::Count => {
                    results.push(format!("{}:{}", entry.path().display(), regex.find_iter(&content).count()))
                }
                GrepOutputMode::Content => {
                    push_content_matches(&mut results, &content, &regex, opts.context_lines, Some(entry.path()))
                }
            }
            if results.len() > 5000 {
                break;
            }
        }
        Ok(results.join("\n"))
    }

    async fn glob(&self, pattern: &str, path: &str) -> Result<Vec<String>, EnvError> {
        let search_root = self.resolve(path);
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| EnvError::InvalidPattern(e.to_string()))?
            .compile_matcher();

        let mut matches: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in WalkDir::new(&search_root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && name != "node_modules" && name != "target"
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel_path = entry.path().strip_prefix(&search_root).unwrap_or(entry.path());
            if glob.is_match(rel_path) {
                let mtime = entry.metadata().ok().and_then(|m| m.modified().ok()).unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                matches.push((entry.path().to_path_buf(), mtime));
            }
        }
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(matches.into_iter().take(1000).map(|(p, _)| p.to_string_lossy().to_string()).collect())
    }

    fn working_directory(&self) -> &str {
        self.workspace_root.to_str().unwrap_or(".")
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn os_version(&self) -> &str {
        &self.os_version
    }
}

fn grep_file(path: &Path, regex: &Regex, mode: GrepOutputMode, context_lines: usize) -> String {
    let Ok(content) = std::fs::read_to_string(path) else {
        return String::new();
    };
    if !regex.is_match(&content) {
        return String::new();
    }
    match mode {
        GrepOutputMode::FilesWithMatches => path.to_string_lossy().to_string(),
        GrepOutputMode::Count => regex.find_iter(&content).count().to_string(),
        GrepOutputMode::Content => {
            let mut results = Vec::new();
            push_content_matches(&mut results, &content, regex, context_lines, None);
            results.join("\n")
        }
    }
}

fn push_content_matches(results: &mut Vec<String>, content: &str, regex: &Regex, context_lines: usize, path: Option<&Path>) {
    let lines: Vec<&str> = content.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if !regex.is_match(line) {
            continue;
        }
        let start = i.saturating_sub(context_lines);
        let end = (i + context_lines + 1).min(lines.len());
        for j in start..end {
            let prefix = if j == i { ">" } else { " " };
            match path {
                Some(p) => results.push(format!("{prefix}{}:{}:{}", p.display(), j + 1, lines[j])),
                None => results.push(format!("{prefix}{}:{}", j + 1, lines[j])),
            }
        }
        if context_lines > 0 && end < lines.len() {
            results.push("--".to_string());
        }
    }
}

/// Sends SIGTERM, gives the process `TERMINATE_GRACE_PERIOD` to exit on its own, and only
/// falls back to SIGKILL (via `Child::kill`) if it's still running after the grace period.
async fn terminate_gracefully(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        sigterm(pid);
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    if tokio::time::timeout(TERMINATE_GRACE_PERIOD, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

/// The only `unsafe` call in this module, isolated here. Sound because `pid` comes from
/// `tokio::process::Child::id()` of a just-spawned child.
#[cfg(unix)]
fn sigterm(pid: u32) {
    // SAFETY: `kill(pid, SIGTERM)` signals the process identified by a valid, live PID.
    unsafe {
        libc::kill(pid as i32, libc::SIGTERM);
    }
}

async fn read_pipe(pipe: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    match pipe {
        Some(mut p) => {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).to_string()
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = std::env::temp_dir().join(format!("agentcore-env-test-{:p}", &0));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let env = LocalEnvironment::new(&dir);
        env.write_file("a.txt", b"hello world").await.unwrap();
        let content = env.read_file("a.txt", None, None).await.unwrap();
        assert_eq!(content, b"hello world");
        assert!(env.file_exists("a.txt").await);
        env.delete_file("a.txt").await.unwrap();
        assert!(!env.file_exists("a.txt").await);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn exec_command_captures_stdout() {
        let dir = std::env::temp_dir();
        let env = LocalEnvironment::new(&dir);
        let out = env
            .exec_command("echo hi", ExecOptions::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.exit_code, 0);
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn exec_command_respects_timeout() {
        let dir = std::env::temp_dir();
        let env = LocalEnvironment::new(&dir);
        let out = env
            .exec_command("sleep 5", ExecOptions { timeout_ms: Some(50), ..Default::default() }, CancellationToken::new())
            .await
            .unwrap();
        assert!(out.timed_out);
    }
}
