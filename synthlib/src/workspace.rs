//! Per-job scratch directories.
//!
//! A [`Workspace`] is created fresh for every job and is owned by that job alone. The job
//! calls [`Workspace::destroy`] on every exit path; if it never gets there (a panic in the
//! middle of a build, say) the directory is removed when the `Workspace` is dropped.

use crate::config::WorkspaceConfig;
use crate::error::{JobError, Result};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    created_at: SystemTime,
    files: Vec<PathBuf>,
    destroyed: bool,
}

impl Workspace {
    /// Allocate a new, uniquely named directory under `config.root`.
    pub fn create(config: &WorkspaceConfig) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&config.prefix)
            .tempdir_in(&config.root)
            .map_err(JobError::WorkspaceCreation)?;
        // cleanup is ours from here on, not the TempDir's
        let path = dir.keep();
        debug!(path = %path.display(), "created workspace");
        Ok(Self {
            path,
            created_at: SystemTime::now(),
            files: Vec::new(),
            destroyed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Relative paths of the files written so far, in write order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Write `body` to `name` inside the workspace, creating intermediate directories.
    ///
    /// `name` must be relative and made only of normal components: anything that could
    /// resolve outside the workspace fails with [`JobError::InvalidFileName`] before the
    /// filesystem is touched.
    pub async fn write_file(&mut self, name: &str, body: &[u8]) -> Result<()> {
        let relative = sanitize_file_name(name)?;
        let target = self.path.join(&relative);
        let write_err = |source| JobError::FileWrite {
            name: name.to_string(),
            source,
        };
        if let Some(parent) = target.parent() {
            if parent != self.path.as_path() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }
        tokio::fs::write(&target, body).await.map_err(write_err)?;
        debug!(file = %relative.display(), bytes = body.len(), "wrote source file");
        self.files.push(relative);
        Ok(())
    }

    /// Recursively remove the workspace. Removing an already missing directory is not an
    /// error, so this may be called any number of times.
    pub async fn destroy(&mut self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        self.destroyed = true;
        debug!(path = %self.path.display(), "removed workspace");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to remove workspace")
            }
        }
    }
}

fn sanitize_file_name(name: &str) -> Result<PathBuf> {
    let invalid = || JobError::InvalidFileName {
        name: name.to_string(),
    };
    if name.is_empty() {
        return Err(invalid());
    }
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            // `..`, `.`, `/` and prefixes are all refused
            _ => return Err(invalid()),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(invalid());
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> WorkspaceConfig {
        WorkspaceConfig {
            root: root.to_path_buf(),
            ..WorkspaceConfig::default()
        }
    }

    #[tokio::test]
    async fn create_write_destroy() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(&config(root.path())).unwrap();
        assert!(ws.path().starts_with(root.path()));
        let dir_name = ws.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(dir_name.starts_with("icestorm-server_"));

        ws.write_file("top.v", b"module top(); endmodule")
            .await
            .unwrap();
        ws.write_file("rtl/pll.v", b"module pll(); endmodule")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(ws.path().join("top.v")).unwrap(),
            b"module top(); endmodule"
        );
        assert!(ws.path().join("rtl/pll.v").is_file());
        assert_eq!(ws.files(), [PathBuf::from("top.v"), PathBuf::from("rtl/pll.v")]);

        let path = ws.path().to_path_buf();
        ws.destroy().await.unwrap();
        assert!(!path.exists());
        // a second destroy is a no-op
        ws.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn workspaces_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(&config(root.path())).unwrap();
        let b = Workspace::create(&config(root.path())).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = Workspace::create(&config(root.path())).unwrap();
        for name in ["../escape", "../escape.v", "a/../../escape", "/tmp/escape", "", ".", "./"] {
            let err = ws.write_file(name, b"x").await.unwrap_err();
            assert!(
                matches!(err, JobError::InvalidFileName { .. }),
                "accepted {:?}",
                name
            );
        }
        assert!(!root.path().join("escape").exists());
        assert!(!root.path().join("escape.v").exists());
        assert!(ws.files().is_empty());
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let mut ws = Workspace::create(&config(root.path())).unwrap();
            ws.write_file("top.v", b"x").await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn missing_root_is_a_creation_error() {
        let root = tempfile::tempdir().unwrap();
        let err = Workspace::create(&config(&root.path().join("nope"))).unwrap_err();
        assert_eq!(err.kind(), "workspace_creation");
    }
}
