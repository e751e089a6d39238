//! `std::fs` backed storage.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

use inkleaf_core::storage::Storage;

/// Files under a root directory on the host filesystem.
///
/// Absolute paths handed to the core are re-rooted, so `/cache/x` lands in
/// `<root>/cache/x`. An empty root uses paths as given.
#[derive(Clone, Debug, Default)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if self.root.as_os_str().is_empty() {
            return path.to_path_buf();
        }
        let relative: PathBuf = path
            .components()
            .filter(|component| !matches!(component, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }
}

impl Storage for FsStorage {
    type Reader = BufReader<File>;
    type Writer = BufWriter<File>;

    fn open_read(&self, path: &Path) -> io::Result<Self::Reader> {
        File::open(self.resolve(path)).map(BufReader::new)
    }

    fn create(&self, path: &Path) -> io::Result<Self::Writer> {
        File::create(self.resolve(path)).map(BufWriter::new)
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.resolve(path))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(self.resolve(path))
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(self.resolve(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))
    }
}
