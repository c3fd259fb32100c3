//! Project paths and the per-run scratch area.
//!
//! Every run starts from a clean slate: the previous PDF is removed and the
//! temp directory is recreated empty before anything else happens, so a
//! failed run can never leave a stale but plausible-looking `ebook.pdf`.

use crate::config::BuildConfig;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the assembled document inside the temp directory.
pub const HTML_FILE: &str = "ebook.html";
/// Name of the assembly summary inside the temp directory.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Cannot resolve project root {}: {source}", .path.display())]
    Root { path: PathBuf, source: io::Error },
    #[error("Cannot remove {}: {source}", .path.display())]
    Remove { path: PathBuf, source: io::Error },
    #[error("Cannot create {}: {source}", .path.display())]
    Create { path: PathBuf, source: io::Error },
    #[error("temp_dir {} would delete the {name} ({}); it must be a dedicated directory", .temp_dir.display(), .protected.display())]
    UnsafeTempDir {
        temp_dir: PathBuf,
        name: &'static str,
        protected: PathBuf,
    },
}

/// Absolute locations of everything the build reads or writes.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub images_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output: PathBuf,
}

impl Workspace {
    /// Resolve config paths against the project root.
    ///
    /// The root is canonicalized because image and stylesheet references in
    /// the generated HTML must be absolute `file://` URLs.
    pub fn resolve(root: &Path, config: &BuildConfig) -> Result<Self, WorkspaceError> {
        let root = root.canonicalize().map_err(|source| WorkspaceError::Root {
            path: root.to_path_buf(),
            source,
        })?;
        let workspace = Self {
            content_dir: normalize(&root.join(&config.content_dir)),
            images_dir: normalize(&root.join(&config.images_dir)),
            temp_dir: normalize(&root.join(&config.temp_dir)),
            output: normalize(&root.join(&config.output)),
            root,
        };
        workspace.check_temp_dir()?;
        Ok(workspace)
    }

    /// `prepare()` deletes the temp directory recursively, so it must not be
    /// the root, the content or images directory, or any of their ancestors.
    fn check_temp_dir(&self) -> Result<(), WorkspaceError> {
        let protected = [
            ("project root", &self.root),
            ("content_dir", &self.content_dir),
            ("images_dir", &self.images_dir),
        ];
        for (name, path) in protected {
            if path.starts_with(&self.temp_dir) {
                return Err(WorkspaceError::UnsafeTempDir {
                    temp_dir: self.temp_dir.clone(),
                    name,
                    protected: path.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn html_path(&self) -> PathBuf {
        self.temp_dir.join(HTML_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.temp_dir.join(MANIFEST_FILE)
    }

    /// Remove the previous PDF and temp directory, then recreate the temp
    /// directory empty. Absent targets are not an error.
    pub fn prepare(&self) -> Result<(), WorkspaceError> {
        remove_if_exists(&self.output, |p| fs::remove_file(p))?;
        remove_if_exists(&self.temp_dir, |p| fs::remove_dir_all(p))?;
        fs::create_dir_all(&self.temp_dir).map_err(|source| WorkspaceError::Create {
            path: self.temp_dir.clone(),
            source,
        })?;
        if let Some(parent) = self.output.parent() {
            fs::create_dir_all(parent).map_err(|source| WorkspaceError::Create {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        tracing::debug!(temp_dir = %self.temp_dir.display(), "workspace prepared");
        Ok(())
    }
}

fn remove_if_exists(
    path: &Path,
    remove: fn(&Path) -> io::Result<()>,
) -> Result<(), WorkspaceError> {
    match remove(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WorkspaceError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Fold `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(tmp: &TempDir) -> Workspace {
        Workspace::resolve(tmp.path(), &BuildConfig::default()).unwrap()
    }

    #[test]
    fn resolve_makes_paths_absolute() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        assert!(ws.root.is_absolute());
        assert!(ws.content_dir.ends_with("conteudos"));
        assert!(ws.images_dir.ends_with("imagens"));
        assert_eq!(ws.html_path(), ws.temp_dir.join("ebook.html"));
    }

    #[test]
    fn resolve_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = Workspace::resolve(&tmp.path().join("nope"), &BuildConfig::default());
        assert!(matches!(result, Err(WorkspaceError::Root { .. })));
    }

    fn with_temp_dir(temp_dir: &str) -> BuildConfig {
        BuildConfig {
            temp_dir: temp_dir.to_string(),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn resolve_rejects_temp_dir_over_protected_paths() {
        let tmp = TempDir::new().unwrap();
        for temp_dir in ["imagens", "./conteudos", "conteudos/..", ".", "..", "../.."] {
            let result = Workspace::resolve(tmp.path(), &with_temp_dir(temp_dir));
            assert!(
                matches!(result, Err(WorkspaceError::UnsafeTempDir { .. })),
                "temp_dir {temp_dir:?} accepted"
            );
        }
    }

    #[test]
    fn resolve_accepts_dedicated_temp_dirs() {
        let tmp = TempDir::new().unwrap();
        for temp_dir in [".tmp", "build/tmp", "./scratch", "conteudos/../.cache"] {
            assert!(Workspace::resolve(tmp.path(), &with_temp_dir(temp_dir)).is_ok());
        }
    }

    #[test]
    fn rejected_temp_dir_never_reaches_prepare() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("imagens/go.png");
        fs::create_dir_all(image.parent().unwrap()).unwrap();
        fs::write(&image, b"png").unwrap();

        let err = Workspace::resolve(tmp.path(), &with_temp_dir("imagens")).unwrap_err();

        assert!(err.to_string().contains("images_dir"));
        assert!(image.is_file());
    }

    #[test]
    fn resolve_folds_dot_segments() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::resolve(tmp.path(), &with_temp_dir("./build/../.tmp")).unwrap();
        assert_eq!(ws.temp_dir, ws.root.join(".tmp"));
    }

    #[test]
    fn prepare_on_empty_root_creates_temp_dir() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        ws.prepare().unwrap();
        assert!(ws.temp_dir.is_dir());
        assert!(!ws.output.exists());
    }

    #[test]
    fn prepare_removes_previous_artifacts() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        fs::create_dir_all(ws.temp_dir.join("nested")).unwrap();
        fs::write(ws.temp_dir.join("nested/old.html"), "old").unwrap();
        fs::write(ws.html_path(), "old").unwrap();
        fs::write(&ws.output, "%PDF-old").unwrap();

        ws.prepare().unwrap();

        assert!(!ws.output.exists());
        assert!(ws.temp_dir.is_dir());
        assert_eq!(fs::read_dir(&ws.temp_dir).unwrap().count(), 0);
    }

    #[test]
    fn prepare_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace(&tmp);
        ws.prepare().unwrap();
        ws.prepare().unwrap();
        assert!(ws.temp_dir.is_dir());
        assert_eq!(fs::read_dir(&ws.temp_dir).unwrap().count(), 0);
    }
}
