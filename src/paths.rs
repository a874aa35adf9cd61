//! Per-project path layout (spec.md §4.C): socket, lock, log, and build
//! cache paths, all derived from a project root.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};

/// All paths the daemon and client need, derived once from a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub project_root: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub build_dir: PathBuf,
    pub compile_commands_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let socket_path = std::env::temp_dir().join(format!(
            "clangd-query-{}.sock",
            hash_project_root(&project_root)
        ));
        let lock_path = project_root.join(".clangd-query.lock");
        let cache_root = project_root.join(".cache").join("clangd-query");
        let log_path = cache_root.join("daemon.log");
        let build_dir = cache_root.join("build");
        let compile_commands_path = build_dir.join("compile_commands.json");

        Self {
            project_root,
            socket_path,
            lock_path,
            log_path,
            build_dir,
            compile_commands_path,
        }
    }

    /// Ensure the log and build-cache parent directories exist.
    pub fn ensure_cache_dirs(&self) -> std::io::Result<()> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&self.build_dir)?;
        Ok(())
    }
}

/// `md5(project_root)` hex digest, used to key the socket path per project
/// without running into path-length or allowed-character restrictions.
fn hash_project_root(project_root: &Path) -> String {
    let mut hasher = Md5::new();
    hasher.update(project_root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Walk upward from `start` to find the first directory containing
/// `CMakeLists.txt`, per spec.md §6's CLI project-root discovery contract.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent()?.to_path_buf()
    };
    loop {
        if dir.join("CMakeLists.txt").is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_differs_per_project() {
        let a = hash_project_root(Path::new("/home/user/project-a"));
        let b = hash_project_root(Path::new("/home/user/project-a"));
        let c = hash_project_root(Path::new("/home/user/project-b"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn find_project_root_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("CMakeLists.txt"), "").unwrap();
        let nested = root.join("src").join("core");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_project_root(&nested).unwrap();
        assert_eq!(found, root);
    }

    #[test]
    fn find_project_root_returns_none_without_cmakelists() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_project_root(dir.path()).is_none());
    }
}
