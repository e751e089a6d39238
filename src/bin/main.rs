//! Terminal front end: reads commands from stdin while the render worker
//! draws pages into a character grid on stdout.

use std::error::Error;
use std::io;

use clap::Parser;
use inkleaf_core::book::Book;
use inkleaf_core::scheduler::{InputOutcome, RenderScheduler, RenderWorker};
use inkleaf_hal_host::{ConsoleDisplay, FsStorage, HostBattery, LineInput, TextLayout};
use log::{LevelFilter, info};

#[path = "main/cli.rs"]
mod cli;

/// Rows kept free below the text for the status line.
const STATUS_ROWS: u16 = 3;

fn main() -> Result<(), Box<dyn Error>> {
    let args = cli::Args::parse();
    // Logs go to stderr so they do not tear the page on stdout.
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let storage = FsStorage::default();
    let book = if args.chapters.is_empty() {
        Book::open_in_archive_order(storage, &args.archive, &args.cache_dir)?
    } else {
        Book::new(storage, &args.archive, &args.cache_dir, args.chapters.clone())
    };
    if book.spine_len() == 0 {
        return Err(format!("{}: no readable chapters", args.archive.display()).into());
    }

    let config = args.reader_config();
    let mut scheduler = RenderScheduler::new(book, config)?;

    let display = ConsoleDisplay::stdout(args.columns, args.rows);
    let layout = TextLayout::for_display(&display, STATUS_ROWS);
    info!(
        "{}x{} screen, {} lines per page",
        args.columns,
        args.rows,
        layout.lines_per_page()
    );
    scheduler.spawn(RenderWorker::new(
        layout,
        display,
        HostBattery::default(),
        &config,
    ))?;

    let mut input = LineInput::new(io::stdin().lock(), config.skip_chapter_hold_ms());
    while scheduler.process_inputs(&mut input)? != InputOutcome::Exit {}

    let (chapter, page) = scheduler.position();
    scheduler.shutdown();
    info!(
        "closed at chapter {chapter}, page {}",
        page.map_or_else(|| String::from("-"), |page| page.to_string())
    );
    Ok(())
}
