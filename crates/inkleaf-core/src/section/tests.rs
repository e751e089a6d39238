use std::sync::atomic::Ordering;

use super::*;
use crate::storage::MemStorage;
use crate::test_support::{
    BytesPage, ChunkLayout, RecordingDisplay, ZipBuilder, init_logging, sample_text,
};

const ARCHIVE_PATH: &str = "/books/novel.epub";
const BOOK_DIR: &str = "/cache/epub_test";
const VERSION: u8 = 2;

struct Fixture {
    storage: MemStorage,
    archive: ArchiveReader<MemStorage>,
}

fn fixture(builder: ZipBuilder) -> Fixture {
    init_logging();
    let storage = MemStorage::new();
    storage.write_file(ARCHIVE_PATH, &builder.build());
    storage.create_dir_all(Path::new(BOOK_DIR)).unwrap();
    let archive = ArchiveReader::new(storage.clone(), ARCHIVE_PATH);
    Fixture { storage, archive }
}

impl Fixture {
    fn section(&self, spine_index: u16, version: u8) -> Section<MemStorage> {
        Section::new(self.storage.clone(), Path::new(BOOK_DIR), spine_index, version)
    }
}

#[test]
fn build_then_load_round_trips_page_count() {
    let text = sample_text(250, 1);
    let fx = fixture(ZipBuilder::new().deflated("ch0.xhtml", &text));
    let mut layout = ChunkLayout::new(100);

    let mut section = fx.section(0, VERSION);
    assert_eq!(section.build(&fx.archive, "ch0.xhtml", &mut layout, 64).unwrap(), 3);
    assert_eq!(section.page_count(), 3);

    let dir = Path::new(BOOK_DIR).join("sections/0");
    assert_eq!(
        fx.storage.files_in(&dir),
        vec![
            dir.join("page_0.bin"),
            dir.join("page_1.bin"),
            dir.join("page_2.bin"),
            dir.join("section.bin"),
        ]
    );
    assert_eq!(
        fx.storage.file(dir.join("section.bin")),
        Some(vec![VERSION, 3, 0, 0, 0])
    );
    assert!(!fx.storage.exists(&Path::new(BOOK_DIR).join(".tmp_0.html")));

    let mut reloaded = fx.section(0, VERSION);
    assert!(reloaded.load_metadata());
    assert_eq!(reloaded.page_count(), 3);

    let display = RecordingDisplay::new();
    let mut surface = display.clone();
    assert_eq!(
        reloaded.render_page::<BytesPage>(2, &mut surface).unwrap(),
        PageRender::Rendered
    );
    let expected_tail = String::from_utf8_lossy(&text[200..]).into_owned();
    assert_eq!(display.texts(), vec![expected_tail]);
}

#[test]
fn ensure_valid_twice_builds_once() {
    let fx = fixture(ZipBuilder::new().deflated("ch0.xhtml", &sample_text(1_000, 2)));
    let mut layout = ChunkLayout::new(300);
    let runs = layout.runs();

    let mut first = fx.section(0, VERSION);
    let mut notified = 0;
    assert!(
        first
            .ensure_valid(&fx.archive, "ch0.xhtml", &mut layout, 1024, || notified += 1)
            .unwrap()
    );

    let mut second = fx.section(0, VERSION);
    assert!(
        !second
            .ensure_valid(&fx.archive, "ch0.xhtml", &mut layout, 1024, || notified += 1)
            .unwrap()
    );

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(notified, 1);
    assert_eq!(second.page_count(), 4);
}

#[test]
fn version_bump_invalidates_and_rebuilds_once() {
    let fx = fixture(ZipBuilder::new().deflated("ch0.xhtml", &sample_text(500, 3)));
    let mut layout = ChunkLayout::new(100);
    let runs = layout.runs();
    fx.section(0, VERSION)
        .build(&fx.archive, "ch0.xhtml", &mut layout, 1024)
        .unwrap();

    let metadata = Path::new(BOOK_DIR).join("sections/0/section.bin");
    let mut bumped = fx.section(0, VERSION + 1);
    assert!(!bumped.load_metadata());
    assert!(!fx.storage.exists(&metadata));

    let mut bumped = fx.section(0, VERSION + 1);
    assert!(
        bumped
            .ensure_valid(&fx.archive, "ch0.xhtml", &mut layout, 1024, || {})
            .unwrap()
    );
    assert!(
        !fx.section(0, VERSION + 1)
            .ensure_valid(&fx.archive, "ch0.xhtml", &mut layout, 1024, || {})
            .unwrap()
    );
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(fx.storage.file(&metadata).unwrap()[0], VERSION + 1);
}

#[test]
fn truncated_metadata_is_discarded() {
    let fx = fixture(ZipBuilder::new());
    let metadata = Path::new(BOOK_DIR).join("sections/4/section.bin");
    fx.storage.write_file(&metadata, &[VERSION, 7, 0]);

    let mut section = fx.section(4, VERSION);
    assert!(!section.load_metadata());
    assert!(!fx.storage.exists(&metadata));

    fx.storage.write_file(&metadata, &[]);
    assert!(!section.load_metadata());
    assert!(!fx.storage.exists(&metadata));
}

#[test]
fn oversized_page_count_is_discarded() {
    let fx = fixture(ZipBuilder::new());
    let metadata = Path::new(BOOK_DIR).join("sections/0/section.bin");
    fx.storage
        .write_file(&metadata, &[VERSION, 0x00, 0x00, 0x01, 0x00]);

    assert!(!fx.section(0, VERSION).load_metadata());
    assert!(!fx.storage.exists(&metadata));
}

#[test]
fn metadata_with_trailing_bytes_is_rebuilt() {
    let fx = fixture(ZipBuilder::new().stored("ch0.xhtml", &sample_text(150, 2)));
    let metadata = Path::new(BOOK_DIR).join("sections/0/section.bin");
    fx.storage
        .write_file(&metadata, &[VERSION, 9, 0, 0, 0, 0]);

    let mut section = fx.section(0, VERSION);
    assert!(!section.load_metadata());
    assert!(!fx.storage.exists(&metadata));

    fx.storage
        .write_file(&metadata, &[VERSION, 9, 0, 0, 0, 0]);
    let mut layout = ChunkLayout::new(100);
    let runs = layout.runs();
    assert!(section.ensure_valid(&fx.archive, "ch0.xhtml", &mut layout, 64, || {}).unwrap());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(section.page_count(), 2);
    assert_eq!(fx.storage.file(&metadata), Some(vec![VERSION, 2, 0, 0, 0]));
}

#[test]
fn empty_chapter_renders_placeholder_without_reads() {
    let fx = fixture(ZipBuilder::new().stored("blank.xhtml", b""));
    let mut layout = ChunkLayout::new(100);
    let mut section = fx.section(1, VERSION);
    assert_eq!(section.build(&fx.archive, "blank.xhtml", &mut layout, 64).unwrap(), 0);

    fx.storage.reset_stats();
    let display = RecordingDisplay::new();
    let mut surface = display.clone();
    for index in [0, 1, 40] {
        assert_eq!(
            section.render_page::<BytesPage>(index, &mut surface).unwrap(),
            PageRender::EmptyChapter
        );
    }
    assert_eq!(fx.storage.stats().opened_for_read, 0);
    assert!(display.texts().iter().all(|text| text == "Empty chapter"));
}

#[test]
fn page_count_index_is_out_of_bounds() {
    let fx = fixture(ZipBuilder::new().deflated("ch.xhtml", &sample_text(150, 4)));
    let mut layout = ChunkLayout::new(100);
    let mut section = fx.section(0, VERSION);
    let count = section.build(&fx.archive, "ch.xhtml", &mut layout, 64).unwrap();
    assert_eq!(count, 2);

    fx.storage.reset_stats();
    let display = RecordingDisplay::new();
    let mut surface = display.clone();
    assert_eq!(
        section.render_page::<BytesPage>(count, &mut surface).unwrap(),
        PageRender::OutOfBounds
    );
    assert_eq!(fx.storage.stats().opened_for_read, 0);
    assert_eq!(display.texts(), vec!["Out of bounds".to_owned()]);
}

#[test]
fn failed_build_leaves_no_metadata_or_scratch() {
    let fx = fixture(ZipBuilder::new().entry("odd.xhtml", b"<p>x</p>", 14));
    let mut layout = ChunkLayout::new(100);
    let runs = layout.runs();
    let mut section = fx.section(0, VERSION);

    let err = section
        .build(&fx.archive, "odd.xhtml", &mut layout, 64)
        .unwrap_err();
    assert!(matches!(
        err,
        SectionError::Archive(ArchiveError::UnsupportedCompression(14))
    ));
    let err = section
        .build(&fx.archive, "missing.xhtml", &mut layout, 64)
        .unwrap_err();
    assert!(matches!(
        err,
        SectionError::Archive(ArchiveError::EntryNotFound(_))
    ));

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(!fx.storage.exists(&Path::new(BOOK_DIR).join("sections/0/section.bin")));
    assert!(!fx.storage.exists(&Path::new(BOOK_DIR).join(".tmp_0.html")));
    assert!(!section.load_metadata());
}

#[test]
fn rebuild_drops_pages_from_the_previous_build() {
    let fx = fixture(
        ZipBuilder::new()
            .deflated("long.xhtml", &sample_text(900, 5))
            .deflated("short.xhtml", &sample_text(90, 6)),
    );
    let mut layout = ChunkLayout::new(100);
    let mut section = fx.section(0, VERSION);
    assert_eq!(section.build(&fx.archive, "long.xhtml", &mut layout, 64).unwrap(), 9);
    assert_eq!(section.build(&fx.archive, "short.xhtml", &mut layout, 64).unwrap(), 1);

    let dir = Path::new(BOOK_DIR).join("sections/0");
    assert_eq!(fx.storage.files_in(&dir).len(), 2);
}

#[test]
fn clear_removes_the_chapter_directory() {
    let fx = fixture(ZipBuilder::new().deflated("ch.xhtml", &sample_text(300, 7)));
    let mut layout = ChunkLayout::new(100);
    let mut section = fx.section(2, VERSION);
    section.build(&fx.archive, "ch.xhtml", &mut layout, 64).unwrap();

    section.clear().unwrap();
    assert!(!fx.storage.exists(&Path::new(BOOK_DIR).join("sections/2")));
    assert_eq!(section.page_count(), 0);
    section.clear().unwrap();
}
