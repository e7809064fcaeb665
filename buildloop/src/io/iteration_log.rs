//! Per-iteration transcript under the configured `transcript_dir`.
//!
//! Each iteration gets its own directory holding the raw plan and build
//! replies plus a small JSON summary. The transcript is a record only; the loop
//! never reads it back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::action::ActionKind;

#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub iteration: u64,
    pub action: ActionKind,
    pub artifact: Option<String>,
    pub outcome: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub plan_path: PathBuf,
    pub build_path: PathBuf,
}

impl IterationPaths {
    pub fn new(transcript_dir: &Path, iteration: u64) -> Self {
        let dir = transcript_dir.join(iteration.to_string());
        Self {
            meta_path: dir.join("meta.json"),
            plan_path: dir.join("plan.md"),
            build_path: dir.join("build.md"),
            dir,
        }
    }
}

pub struct IterationWriteRequest<'a> {
    pub transcript_dir: &'a Path,
    pub meta: &'a IterationMeta,
    pub plan: &'a str,
    pub build: &'a str,
}

pub fn write_iteration(request: &IterationWriteRequest<'_>) -> Result<IterationPaths> {
    let paths = IterationPaths::new(request.transcript_dir, request.meta.iteration);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;

    write_text(&paths.plan_path, request.plan)?;
    write_text(&paths.build_path, request.build)?;
    write_json(&paths.meta_path, request.meta)?;

    Ok(paths)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_text(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = IterationPaths::new(&temp.path().join(".buildloop"), 3);

        assert!(paths.dir.ends_with(Path::new(".buildloop/3")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.plan_path.ends_with("plan.md"));
        assert!(paths.build_path.ends_with("build.md"));
    }

    #[test]
    fn writes_replies_and_meta() {
        let temp = tempfile::tempdir().expect("tempdir");
        let transcript_dir = temp.path().join("transcripts");
        let meta = IterationMeta {
            iteration: 2,
            action: ActionKind::CreateFile,
            artifact: Some("app.py".to_string()),
            outcome: "created".to_string(),
            duration_ms: 15,
        };

        let paths = write_iteration(&IterationWriteRequest {
            transcript_dir: &transcript_dir,
            meta: &meta,
            plan: "Add a print statement.",
            build: "FILE: app.py\nprint(1)",
        })
        .expect("write transcript");

        assert_eq!(
            fs::read_to_string(&paths.build_path).expect("read build"),
            "FILE: app.py\nprint(1)"
        );
        let meta_json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.meta_path).expect("read meta"))
                .expect("parse meta");
        assert_eq!(meta_json["iteration"], 2);
        assert_eq!(meta_json["action"], "create_file");
        assert_eq!(meta_json["artifact"], "app.py");
    }
}
