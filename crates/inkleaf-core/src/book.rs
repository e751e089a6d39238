//! One open document: its archive, cache root, and reading order.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::archive::{ArchiveError, ArchiveReader};
use crate::storage::Storage;

const CACHE_DIR_PREFIX: &str = "epub_";

/// FNV-1a over `bytes`.
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = 0x811C9DC5u32;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Per-document cache directory under `cache_root`, keyed by archive path.
pub fn cache_dir_for(cache_root: &Path, archive_path: &Path) -> PathBuf {
    let key = fnv1a32(archive_path.as_os_str().as_encoded_bytes());
    cache_root.join(format!("{CACHE_DIR_PREFIX}{key:08x}"))
}

fn ends_with_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len()
        && haystack[haystack.len() - needle.len()..].eq_ignore_ascii_case(needle)
}

fn contains_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}

/// Whether an entry looks like chapter markup.
pub fn is_text_resource_name(name: &str) -> bool {
    let name = name.as_bytes();
    if name.is_empty() || name[name.len() - 1] == b'/' {
        return false;
    }

    if contains_ascii_case_insensitive(name, b"META-INF/") {
        return false;
    }

    ends_with_ascii_case_insensitive(name, b".xhtml")
        || ends_with_ascii_case_insensitive(name, b".html")
        || ends_with_ascii_case_insensitive(name, b".htm")
        || ends_with_ascii_case_insensitive(name, b".xml")
}

#[derive(Clone, Debug)]
pub struct Book<S> {
    archive: ArchiveReader<S>,
    cache_dir: PathBuf,
    spine: Vec<String>,
}

impl<S: Storage> Book<S> {
    /// Opens a document with an explicit reading order of entry names.
    pub fn new(storage: S, archive_path: &Path, cache_root: &Path, spine: Vec<String>) -> Self {
        Self {
            archive: ArchiveReader::new(storage, archive_path),
            cache_dir: cache_dir_for(cache_root, archive_path),
            spine,
        }
    }

    /// Opens a document reading its text entries in archive order.
    pub fn open_in_archive_order(
        storage: S,
        archive_path: &Path,
        cache_root: &Path,
    ) -> Result<Self, ArchiveError> {
        let archive = ArchiveReader::new(storage, archive_path);
        let spine: Vec<String> = archive
            .entry_names()?
            .into_iter()
            .filter(|name| is_text_resource_name(name))
            .collect();
        info!(
            "{}: {} chapters in archive order",
            archive_path.display(),
            spine.len()
        );
        Ok(Self {
            archive,
            cache_dir: cache_dir_for(cache_root, archive_path),
            spine,
        })
    }

    /// Creates the document's cache root (and its `sections` directory).
    pub fn setup_cache_dir(&self) -> io::Result<()> {
        self.storage().create_dir_all(&self.cache_dir.join(crate::section::SECTIONS_DIR_NAME))?;
        debug!("cache root ready at {}", self.cache_dir.display());
        Ok(())
    }

    pub fn archive(&self) -> &ArchiveReader<S> {
        &self.archive
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn spine_len(&self) -> usize {
        self.spine.len()
    }

    pub fn spine_item(&self, index: usize) -> Option<&str> {
        self.spine.get(index).map(String::as_str)
    }

    pub fn storage(&self) -> &S {
        self.archive.storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use crate::test_support::ZipBuilder;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(fnv1a32(b""), 0x811C9DC5);
        assert_eq!(fnv1a32(b"a"), 0xE40C292C);
        assert_eq!(fnv1a32(b"foobar"), 0xBF9CF968);
    }

    #[test]
    fn cache_dir_is_stable_per_archive_path() {
        let root = Path::new("/cache");
        let a = cache_dir_for(root, Path::new("/books/a.epub"));
        assert_eq!(a, cache_dir_for(root, Path::new("/books/a.epub")));
        assert_ne!(a, cache_dir_for(root, Path::new("/books/b.epub")));
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("epub_"));
        assert_eq!(name.len(), "epub_".len() + 8);
    }

    #[test]
    fn text_resources_exclude_package_files() {
        assert!(is_text_resource_name("OEBPS/Text/ch01.xhtml"));
        assert!(is_text_resource_name("chapter.HTM"));
        assert!(!is_text_resource_name("META-INF/container.xml"));
        assert!(!is_text_resource_name("OEBPS/content.opf"));
        assert!(!is_text_resource_name("OEBPS/toc.ncx"));
        assert!(!is_text_resource_name("OEBPS/images/"));
        assert!(!is_text_resource_name("mimetype"));
    }

    #[test]
    fn archive_order_keeps_only_text_entries() {
        let storage = MemStorage::new();
        let archive = ZipBuilder::new()
            .stored("mimetype", b"application/epub+zip")
            .deflated("META-INF/container.xml", b"<container/>")
            .deflated("OEBPS/content.opf", b"<package/>")
            .deflated("OEBPS/c2.xhtml", b"<p>2</p>")
            .deflated("OEBPS/c1.xhtml", b"<p>1</p>")
            .stored("OEBPS/cover.png", b"\x89PNG")
            .build();
        storage.write_file("/books/b.epub", &archive);

        let book =
            Book::open_in_archive_order(storage.clone(), Path::new("/books/b.epub"), Path::new("/cache"))
                .unwrap();
        assert_eq!(book.spine_len(), 2);
        assert_eq!(book.spine_item(0), Some("OEBPS/c2.xhtml"));
        assert_eq!(book.spine_item(1), Some("OEBPS/c1.xhtml"));
        assert_eq!(book.spine_item(2), None);

        book.setup_cache_dir().unwrap();
        assert!(storage.exists(&book.cache_dir().join("sections")));
    }
}
