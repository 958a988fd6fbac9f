//! Artifact resolution: package name → local installable files.
//!
//! Layout is `<root>/<package>/*.apk`. A missing package directory and a
//! directory with no `.apk` files lead to the same outcome (the package is
//! skipped and marked failed) but are reported differently.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Default artifact root, relative to the working directory.
pub const DEFAULT_ARTIFACT_ROOT: &str = "apks";

/// Extension identifying installable artifacts. Matched exactly.
pub const ARTIFACT_EXTENSION: &str = "apk";

/// Outcome of resolving one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// One or more artifacts, absolute paths sorted by file name.
    Found(Vec<PathBuf>),
    /// The package directory does not exist.
    MissingDirectory(PathBuf),
    /// The package directory exists but holds no artifacts.
    EmptyDirectory(PathBuf),
}

impl Resolution {
    pub fn artifacts(&self) -> Option<&[PathBuf]> {
        match self {
            Resolution::Found(paths) => Some(paths),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found(paths) => write!(f, "{} artifact(s)", paths.len()),
            Resolution::MissingDirectory(dir) => {
                write!(f, "package directory not found: {}", dir.display())
            }
            Resolution::EmptyDirectory(dir) => {
                write!(f, "package directory empty, no .apk files: {}", dir.display())
            }
        }
    }
}

/// Resolves a package name to the artifacts that install it.
pub trait ArtifactResolver: Send + Sync {
    fn resolve(&self, package: &str) -> std::io::Result<Resolution>;
}

/// [`ArtifactResolver`] over the on-disk `apks/<package>/` layout.
#[derive(Debug, Clone)]
pub struct ApkDirectory {
    root: PathBuf,
}

impl Default for ApkDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_ROOT)
    }
}

impl ApkDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of `package`.
    pub fn package_dir(&self, package: &str) -> std::io::Result<PathBuf> {
        std::path::absolute(self.root.join(package))
    }
}

impl ArtifactResolver for ApkDirectory {
    fn resolve(&self, package: &str) -> std::io::Result<Resolution> {
        let dir = self.package_dir(package)?;
        if !dir.is_dir() {
            return Ok(Resolution::MissingDirectory(dir));
        }

        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && is_artifact(&path) {
                artifacts.push(path);
            }
        }
        artifacts.sort();

        debug!(package = %package, dir = %dir.display(), count = artifacts.len(), "resolved artifacts");

        if artifacts.is_empty() {
            Ok(Resolution::EmptyDirectory(dir))
        } else {
            Ok(Resolution::Found(artifacts))
        }
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == ARTIFACT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_missing_directory() {
        let root = TempDir::new().unwrap();
        let resolver = ApkDirectory::new(root.path());

        let resolution = resolver.resolve("com.example.absent").unwrap();
        assert!(matches!(resolution, Resolution::MissingDirectory(_)));
        assert!(resolution.to_string().contains("not found"));
    }

    #[test]
    fn test_empty_directory_is_distinct_from_missing() {
        let root = TempDir::new().unwrap();
        let pkg = root.path().join("com.example.empty");
        fs::create_dir(&pkg).unwrap();
        touch(&pkg, "desktop.ini");

        let resolution = ApkDirectory::new(root.path())
            .resolve("com.example.empty")
            .unwrap();
        assert!(matches!(resolution, Resolution::EmptyDirectory(_)));
        assert!(resolution.to_string().contains("empty"));
        assert!(!resolution.to_string().contains("not found"));
    }

    #[test]
    fn test_extension_filter_is_exact_and_case_sensitive() {
        let root = TempDir::new().unwrap();
        let pkg = root.path().join("com.example.split");
        fs::create_dir(&pkg).unwrap();
        touch(&pkg, "split_config.en.apk");
        touch(&pkg, "base.apk");
        touch(&pkg, "legacy.APK");
        touch(&pkg, ".DS_Store");
        touch(&pkg, "notes.apk.txt");
        fs::create_dir(pkg.join("nested.apk")).unwrap();

        let resolution = ApkDirectory::new(root.path())
            .resolve("com.example.split")
            .unwrap();
        let artifacts = resolution.artifacts().expect("artifacts found");
        let names: Vec<_> = artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["base.apk", "split_config.en.apk"]);
        assert!(artifacts.iter().all(|p| p.is_absolute()));
    }
}
