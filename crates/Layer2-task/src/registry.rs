//! Project registry - maps project names to working directories

use ralph_foundation::{Error, Result};
use std::path::{Path, PathBuf};

/// Marker directory that makes a directory a Ralph project
pub const PROJECT_MARKER: &str = ".ralph-tui";

/// Resolves project names
pub trait ProjectRegistry: Send + Sync {
    /// Working directory of `project`.
    fn resolve(&self, project: &str) -> Result<PathBuf>;

    /// Known project names, sorted.
    fn list(&self) -> Result<Vec<String>>;

    fn contains(&self, project: &str) -> bool {
        self.resolve(project).is_ok()
    }
}

/// Projects are the direct children of `root` carrying a `.ralph-tui/` marker
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    root: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_name(project: &str) -> Result<()> {
        if project.trim().is_empty() {
            return Err(Error::InvalidInput("Project name is empty".into()));
        }
        if project.contains('/') || project.contains('\\') || project == "." || project == ".." {
            return Err(Error::InvalidInput(format!(
                "Invalid project name: {}",
                project
            )));
        }
        Ok(())
    }

    fn is_project(dir: &Path) -> bool {
        dir.join(PROJECT_MARKER).is_dir()
    }
}

impl ProjectRegistry for DirectoryRegistry {
    fn resolve(&self, project: &str) -> Result<PathBuf> {
        Self::validate_name(project)?;
        let dir = self.root.join(project);
        if Self::is_project(&dir) {
            Ok(dir)
        } else {
            Err(Error::ProjectNotFound(project.to_string()))
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| Self::is_project(&entry.path()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (tempfile::TempDir, DirectoryRegistry) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("beta/.ralph-tui")).unwrap();
        std::fs::create_dir_all(dir.path().join("alpha/.ralph-tui")).unwrap();
        std::fs::create_dir_all(dir.path().join("plain")).unwrap();
        let registry = DirectoryRegistry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn test_list_projects() {
        let (_dir, registry) = registry();
        assert_eq!(registry.list().unwrap(), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_resolve() {
        let (dir, registry) = registry();
        assert_eq!(registry.resolve("alpha").unwrap(), dir.path().join("alpha"));
        assert!(registry.contains("beta"));
        assert!(matches!(
            registry.resolve("plain"),
            Err(Error::ProjectNotFound(_))
        ));
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_rejects_path_names() {
        let (_dir, registry) = registry();
        for name in ["", "..", "a/b", "..\\x"] {
            assert!(
                matches!(registry.resolve(name), Err(Error::InvalidInput(_))),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let registry = DirectoryRegistry::new("/nonexistent/ralph/projects");
        assert!(registry.list().unwrap().is_empty());
    }
}
