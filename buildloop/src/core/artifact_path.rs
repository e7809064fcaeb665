//! Deterministic checks on artifact names chosen by the reasoning service.

use std::path::{Component, Path, PathBuf};

/// Why an artifact name cannot be written under the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    /// Name is empty or whitespace only.
    Empty,
    /// Name is absolute (or carries a drive/UNC prefix).
    Absolute,
    /// Name contains a `..` component.
    ParentTraversal,
    /// Name resolves to a file the loop owns, or to a directory holding one.
    Reserved,
}

impl NameRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            NameRejection::Empty => "empty file name",
            NameRejection::Absolute => "absolute file name",
            NameRejection::ParentTraversal => "file name escapes the working directory",
            NameRejection::Reserved => "file name is reserved by the loop",
        }
    }
}

/// Return why `name` is not a safe relative artifact path, or `None` if it is.
pub fn check_artifact_name(name: &str) -> Option<NameRejection> {
    if name.trim().is_empty() {
        return Some(NameRejection::Empty);
    }
    let path = Path::new(name);
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => return Some(NameRejection::Absolute),
            Component::ParentDir => return Some(NameRejection::ParentTraversal),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    // `./` alone normalizes to nothing writable.
    if !path
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
    {
        return Some(NameRejection::Empty);
    }
    None
}

/// Drop `.` components so `./current.md` and `current.md` compare equal.
pub fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Whether `candidate` collides with a reserved path.
///
/// A collision is the reserved path itself, anything under it, or any
/// directory it lives in. Both sides are compared without `.` components.
pub fn collides_with_reserved(candidate: &Path, reserved: &[PathBuf]) -> bool {
    let candidate = without_cur_dir(candidate);
    reserved.iter().any(|path| {
        let path = without_cur_dir(path);
        candidate.starts_with(&path) || path.starts_with(&candidate)
    })
}
