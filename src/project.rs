// src/project.rs - Project root lookup for tool working directories

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPaths {
    roots: Vec<PathBuf>,
}

impl ProjectPaths {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// The root containing `file`, else the first local root, else `None`.
    /// Roots that look like URLs (`scheme://...`) are never used as a
    /// working directory.
    pub fn resolve(&self, file: Option<&Path>) -> Option<PathBuf> {
        if let Some(file) = file
            && let Some(root) = self
                .local_roots()
                .filter(|root| file.starts_with(root))
                .max_by_key(|root| root.components().count())
        {
            return Some(root.clone());
        }
        self.local_roots().next().cloned()
    }

    fn local_roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.roots
            .iter()
            .filter(|root| !root.as_os_str().is_empty() && !root.to_string_lossy().contains("://"))
    }
}
