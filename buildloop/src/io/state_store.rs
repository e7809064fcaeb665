//! Owner of the two state documents and of every file the loop writes.
//!
//! - `target.md`: desired end state. Created once, never mutated afterwards.
//! - `current.md`: what has been built so far. Grows by progress notes when a
//!   file is created and is replaced wholesale on `UPDATE_CURRENT:`.
//!
//! Writes to the current-state document go through a temp file + rename so a
//! failed write leaves the previous contents intact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::action::Action;
use crate::core::artifact_path::{NameRejection, check_artifact_name, collides_with_reserved};
use crate::io::config::LoopConfig;

pub const TARGET_PLACEHOLDER: &str = "# Target: Simple Task Tracker

Create a working task tracker with:
1. Add tasks via command line
2. Mark tasks complete
3. Show task list
4. Save to tasks.json file

Make it work. Make it simple. Make it real.
";

pub const CURRENT_PLACEHOLDER: &str = "# Current State\n\nNothing built yet.\n";

/// Full text of both documents at the start of an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub target: String,
    pub current: String,
}

/// What `StateStore::apply` did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Artifact written and progress note appended.
    Created { name: String, path: PathBuf },
    /// Current-state document replaced.
    ReplacedCurrent,
    /// Nothing to apply.
    Noop,
    /// `CreateFile` with a name that cannot be written; nothing touched.
    Skipped { name: String, reason: &'static str },
}

impl ApplyOutcome {
    /// Whether the outcome changed anything on disk.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Created { .. } | ApplyOutcome::ReplacedCurrent
        )
    }

    /// One-line human summary for progress output and transcripts.
    pub fn summary(&self) -> String {
        match self {
            ApplyOutcome::Created { name, .. } => format!("created {name}"),
            ApplyOutcome::ReplacedCurrent => "replaced current state".to_string(),
            ApplyOutcome::Noop => "no recognized marker, nothing applied".to_string(),
            ApplyOutcome::Skipped { name, reason } => format!("skipped {name:?}: {reason}"),
        }
    }
}

/// Canonical paths for a working directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
    target_path: PathBuf,
    current_path: PathBuf,
    transcript_dir: Option<PathBuf>,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>, config: &LoopConfig) -> Self {
        let root = root.into();
        Self {
            target_path: root.join(&config.target_path),
            current_path: root.join(&config.current_path),
            transcript_dir: config.transcript_dir.as_ref().map(|dir| root.join(dir)),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn transcript_dir(&self) -> Option<&Path> {
        self.transcript_dir.as_deref()
    }

    /// Paths an artifact must never land on: both documents, the temp file
    /// used to replace the current state, and the transcript directory.
    fn reserved_paths(&self) -> Vec<PathBuf> {
        let mut reserved = vec![self.target_path.clone(), self.current_path.clone()];
        reserved.extend(tmp_sibling(&self.current_path));
        reserved.extend(self.transcript_dir.clone());
        reserved
    }

    /// Create any missing document with its placeholder. Existing documents are
    /// left untouched, so calling this on every start is safe.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn bootstrap(&self) -> Result<()> {
        write_if_missing(&self.target_path, TARGET_PLACEHOLDER)?;
        write_if_missing(&self.current_path, CURRENT_PLACEHOLDER)?;
        Ok(())
    }

    pub fn read(&self) -> Result<Documents> {
        let target = fs::read_to_string(&self.target_path)
            .with_context(|| format!("read {}", self.target_path.display()))?;
        let current = fs::read_to_string(&self.current_path)
            .with_context(|| format!("read {}", self.current_path.display()))?;
        Ok(Documents { target, current })
    }

    #[instrument(skip_all, fields(iteration = iteration, kind = action.kind().as_str()))]
    pub fn apply(&self, action: &Action, iteration: u64) -> Result<ApplyOutcome> {
        match action {
            Action::CreateFile { name, content } => self.create_file(name, content, iteration),
            Action::ReplaceCurrentState { content } => {
                write_atomic(&self.current_path, content)?;
                info!("replaced current state");
                Ok(ApplyOutcome::ReplacedCurrent)
            }
            Action::Noop => {
                debug!("no recognized marker; nothing to apply");
                Ok(ApplyOutcome::Noop)
            }
        }
    }

    fn create_file(&self, name: &str, content: &str, iteration: u64) -> Result<ApplyOutcome> {
        let path = self.root.join(name);
        let rejection = check_artifact_name(name).or_else(|| {
            collides_with_reserved(&path, &self.reserved_paths())
                .then_some(NameRejection::Reserved)
        });
        if let Some(rejection) = rejection {
            warn!(name, reason = rejection.as_str(), "refusing to write artifact");
            return Ok(ApplyOutcome::Skipped {
                name: name.to_string(),
                reason: rejection.as_str(),
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;

        let mut current = fs::read_to_string(&self.current_path)
            .with_context(|| format!("read {}", self.current_path.display()))?;
        current.push_str(&progress_note(iteration, name));
        write_atomic(&self.current_path, &current)?;

        info!(path = %path.display(), bytes = content.len(), "created artifact");
        Ok(ApplyOutcome::Created {
            name: name.to_string(),
            path,
        })
    }
}

/// Note appended to the current-state document after a file is created.
pub fn progress_note(iteration: u64, name: &str) -> String {
    format!("\n\n## Iteration {iteration}\nCreated: {name}\n")
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))?;
    debug!(path = %path.display(), "created placeholder");
    Ok(())
}

fn tmp_sibling(path: &Path) -> Option<PathBuf> {
    let mut tmp_name = path.file_name()?.to_os_string();
    tmp_name.push(".tmp");
    Some(path.with_file_name(tmp_name))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("document path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = tmp_sibling(path)
        .with_context(|| format!("document path missing file name {}", path.display()))?;
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
