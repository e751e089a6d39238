use std::path::PathBuf;

use clap::Parser;
use inkleaf_core::config::ReaderConfig;

/// Page through a ZIP-packaged book in the terminal.
///
/// Commands are read one per line from stdin: `n` (or just enter) for the next
/// page, `p` for the previous one, `N`/`P` to skip a chapter, `q` to quit.
#[derive(Parser, Debug)]
#[command(name = "inkleaf")]
#[command(version)]
pub struct Args {
    /// Path to the book archive
    pub archive: PathBuf,

    /// Directory holding per-book page caches and reading positions
    #[arg(long, default_value = ".inkleaf-cache")]
    pub cache_dir: PathBuf,

    /// Archive entry to read, in order; repeat for each chapter.
    /// Defaults to every text entry in archive order.
    #[arg(long = "chapter", value_name = "NAME")]
    pub chapters: Vec<String>,

    /// Screen width in characters
    #[arg(long, default_value = "80", value_parser = clap::value_parser!(u16).range(8..))]
    pub columns: u16,

    /// Screen height in lines, status line included
    #[arg(long, default_value = "24", value_parser = clap::value_parser!(u16).range(6..))]
    pub rows: u16,

    /// Pages drawn between two full-screen refreshes
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u16).range(1..))]
    pub full_refresh_every: u16,
}

impl Args {
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default().with_pages_per_full_refresh(self.full_refresh_every)
    }
}
