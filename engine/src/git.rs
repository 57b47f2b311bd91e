//! Git plumbing for the staleness and refresh pipeline
//!
//! Shells out to the `git` binary for the four commands the map lifecycle
//! relies on: the short HEAD hash, a name-status diff against the stored
//! hash, working-tree status, and recent one-line history. A project
//! without a usable repository resolves to the `no-git` sentinel rather
//! than an error, so map generation works the same on plain directories.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Sentinel hash for projects without usable git state
pub const NO_GIT: &str = "no-git";

/// Git errors
#[derive(Debug, Error)]
pub enum GitError {
    #[error("no git repository at {0:?}")]
    NoRepository(PathBuf),

    #[error("could not invoke git ({0}); is it installed?")]
    Unavailable(std::io::Error),

    #[error("`git {command}` exited nonzero: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("git emitted non-UTF-8 output")]
    BadOutput,
}

/// Change classification shared by diff and status output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Unknown,
}

impl FileStatus {
    /// Classify a `--name-status` field (`M`, `A`, `R100`, ...) or a
    /// trimmed porcelain XY code (`??` counts as added)
    fn from_code(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'A' | b'?') => Self::Added,
            Some(b'M') => Self::Modified,
            Some(b'D') => Self::Deleted,
            Some(b'R') => Self::Renamed,
            Some(b'C') => Self::Copied,
            _ => Self::Unknown,
        }
    }
}

/// A path git reports as touched
#[derive(Debug, Clone)]
pub struct ChangedFile {
    pub path: String,
    pub status: FileStatus,
}

/// Handle on a project's repository; every command runs as `git -C <root>`
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Bind to the repository at `root`
    ///
    /// Worktrees and submodules keep a `.git` file instead of a directory,
    /// so either form counts.
    pub fn open(root: &Path) -> Result<Self, GitError> {
        let marker = root.join(".git");
        if marker.is_dir() || marker.is_file() {
            Ok(Self { root: root.to_path_buf() })
        } else {
            Err(GitError::NoRepository(root.to_path_buf()))
        }
    }

    /// Short HEAD hash for `root`, or the sentinel when git is unusable
    pub fn short_head_or_sentinel(root: &Path) -> String {
        match Self::open(root).and_then(|repo| repo.short_head()) {
            Ok(hash) => hash,
            Err(err) => {
                log::debug!("no usable git state for {}: {err}", root.display());
                NO_GIT.to_owned()
            }
        }
    }

    /// Short hash of HEAD
    pub fn short_head(&self) -> Result<String, GitError> {
        let out = self.capture(&["rev-parse", "--short", "HEAD"])?;
        Ok(out.trim().to_owned())
    }

    /// Files touched between a stored hash and HEAD (`--name-status`)
    ///
    /// A stored hash the current history no longer knows (rebased or
    /// rewritten away) surfaces as [`GitError::Failed`]; callers degrade to
    /// a full refresh.
    pub fn diff_since(&self, stored_hash: &str) -> Result<Vec<ChangedFile>, GitError> {
        let out = self.capture(&["diff", "--name-status", stored_hash, "HEAD"])?;
        Ok(out.lines().filter_map(parse_name_status).collect())
    }

    /// Uncommitted changes in the working tree (`status --porcelain`)
    pub fn status(&self) -> Result<Vec<ChangedFile>, GitError> {
        let out = self.capture(&["status", "--porcelain"])?;
        Ok(out.lines().filter_map(parse_porcelain).collect())
    }

    /// Recent history, one line per commit
    pub fn log_oneline(&self, count: usize) -> Result<Vec<String>, GitError> {
        let out = self.capture(&["log", "--oneline", &format!("-{count}")])?;
        Ok(out.lines().map(str::to_owned).collect())
    }

    /// Run one git command under the repository root and collect stdout
    fn capture(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .map_err(GitError::Unavailable)?;

        if !output.status.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| GitError::BadOutput)
    }
}

/// One `diff --name-status` line: status field, then tab-separated paths;
/// renames and copies list the old path before the new one
fn parse_name_status(line: &str) -> Option<ChangedFile> {
    let mut fields = line.split('\t');
    let status = FileStatus::from_code(fields.next()?);
    let path = match status {
        FileStatus::Renamed | FileStatus::Copied => fields.nth(1)?,
        _ => fields.next()?,
    };
    Some(ChangedFile { path: path.to_owned(), status })
}

/// One porcelain line: two-column XY code, a space, then the path
/// (renames append ` -> new`)
fn parse_porcelain(line: &str) -> Option<ChangedFile> {
    if line.len() < 4 {
        return None;
    }
    let (code, rest) = line.split_at(2);
    let path = rest.trim_start();
    let path = path.rsplit(" -> ").next().unwrap_or(path);
    Some(ChangedFile {
        path: path.to_owned(),
        status: FileStatus::from_code(code.trim()),
    })
}
