//! Git integration
//!
//! The clean check only considers entries inside the workspace, so a
//! workspace nested in a larger repository is not blocked by unrelated
//! changes elsewhere. A directory outside any repository counts as clean.

use crate::error::VcsError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Length of the abbreviated commit hash shown to the user
pub const SHORT_HASH_LEN: usize = 9;

/// Version-control operations needed by the update flow
pub trait VersionControl: Send + Sync {
    /// No tracked-modified, deleted or untracked-but-not-ignored files in `workspace`
    fn is_clean(&self, workspace: &Path) -> Result<bool, VcsError>;

    /// Whether staging everything would produce a commit
    fn has_changes_to_commit(&self, workspace: &Path) -> Result<bool, VcsError>;

    /// Stage everything and commit; returns the short hash
    fn commit(&self, workspace: &Path, message: &str) -> Result<String, VcsError>;
}

/// [`VersionControl`] backed by the `git` executable
#[derive(Debug, Default, Clone)]
pub struct GitAgent;

impl GitAgent {
    pub fn new() -> Self {
        Self
    }

    fn run_git(&self, dir: &Path, args: &[&str]) -> Result<Output, VcsError> {
        debug!("git {}", args.join(" "));
        Command::new("git")
            .current_dir(dir)
            .args(args)
            .output()
            .map_err(|e| VcsError::Spawn {
                command: format!("git {}", args.join(" ")),
                message: e.to_string(),
            })
    }

    fn ensure_success(output: &Output, command: &str) -> Result<(), VcsError> {
        if output.status.success() {
            return Ok(());
        }
        Err(VcsError::CommandFailed {
            command: command.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Repository root, or `None` when `dir` is not inside a repository
    fn toplevel(&self, dir: &Path) -> Result<Option<PathBuf>, VcsError> {
        let output = self.run_git(dir, &["rev-parse", "--show-toplevel"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(PathBuf::from(root)))
    }
}

impl VersionControl for GitAgent {
    fn is_clean(&self, workspace: &Path) -> Result<bool, VcsError> {
        let Some(toplevel) = self.toplevel(workspace)? else {
            debug!("{} is not in a git repository", workspace.display());
            return Ok(true);
        };

        let output = self.run_git(workspace, &["status", "--porcelain"])?;
        Self::ensure_success(&output, "git status")?;

        let toplevel = toplevel.canonicalize().unwrap_or(toplevel);
        let workspace = workspace
            .canonicalize()
            .unwrap_or_else(|_| workspace.to_path_buf());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let dirty = porcelain_paths(&stdout)
            .into_iter()
            .any(|path| toplevel.join(path).starts_with(&workspace));
        Ok(!dirty)
    }

    fn has_changes_to_commit(&self, workspace: &Path) -> Result<bool, VcsError> {
        let output = self.run_git(
            workspace,
            &["ls-files", "-m", "-d", "-o", "--exclude-standard"],
        )?;
        Self::ensure_success(&output, "git ls-files")?;
        Ok(!output.stdout.iter().all(u8::is_ascii_whitespace))
    }

    fn commit(&self, workspace: &Path, message: &str) -> Result<String, VcsError> {
        let output = self.run_git(workspace, &["add", "-A"])?;
        Self::ensure_success(&output, "git add")?;

        let command = "git commit --no-verify -F -";
        let mut child = Command::new("git")
            .current_dir(workspace)
            .args(["commit", "--no-verify", "-F", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VcsError::Spawn {
                command: command.to_string(),
                message: e.to_string(),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .map_err(|e| VcsError::Spawn {
                    command: command.to_string(),
                    message: e.to_string(),
                })?;
        }
        let output = child.wait_with_output().map_err(|e| VcsError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;
        Self::ensure_success(&output, "git commit")?;

        let output = self.run_git(workspace, &["rev-parse", "HEAD"])?;
        Self::ensure_success(&output, "git rev-parse")?;
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(hash.chars().take(SHORT_HASH_LEN).collect())
    }
}

/// Paths of `git status --porcelain` entries, relative to the repository root
fn porcelain_paths(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            // renames are reported as `old -> new`
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            path.trim_matches('"')
        })
        .collect()
}
