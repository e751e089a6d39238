use std::io::{Read, Write};

use log::debug;
use miniz_oxide::inflate::TINFLStatus;
use miniz_oxide::inflate::core::{DecompressorOxide, decompress, inflate_flags};

use super::{ArchiveError, DEFLATE_WINDOW_BYTES, ZipEntry};

const WINDOW_MASK: usize = DEFLATE_WINDOW_BYTES - 1;

fn status_error(status: TINFLStatus) -> ArchiveError {
    match status {
        TINFLStatus::FailedCannotMakeProgress | TINFLStatus::NeedsMoreInput => {
            ArchiveError::UnexpectedEof
        }
        other => ArchiveError::Decompress(other),
    }
}

/// Inflates a complete raw DEFLATE stream into `out`, which must be exactly
/// the declared uncompressed size.
pub(super) fn inflate_one_shot(deflated: &[u8], out: &mut [u8]) -> Result<(), ArchiveError> {
    let mut decomp = Box::<DecompressorOxide>::default();
    let (status, _consumed, written) = decompress(
        &mut decomp,
        deflated,
        out,
        0,
        inflate_flags::TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF,
    );

    match status {
        TINFLStatus::Done if written == out.len() => Ok(()),
        TINFLStatus::Done => Err(ArchiveError::SizeMismatch {
            expected: out.len() as u64,
            actual: written as u64,
        }),
        // The stream has more to give than the directory declared.
        TINFLStatus::HasMoreOutput => Err(ArchiveError::SizeMismatch {
            expected: out.len() as u64,
            actual: out.len() as u64 + 1,
        }),
        other => Err(status_error(other)),
    }
}

/// Inflates through a circular 32 KiB window, handing each freshly produced
/// run of bytes to `sink` before the window wraps over it.
pub(super) fn inflate_streaming<R: Read, W: Write + ?Sized>(
    file: &mut R,
    entry: &ZipEntry,
    sink: &mut W,
    chunk_size: usize,
) -> Result<u64, ArchiveError> {
    let mut decomp = Box::<DecompressorOxide>::default();
    let mut window = vec![0u8; DEFLATE_WINDOW_BYTES].into_boxed_slice();
    let mut input = vec![0u8; chunk_size];

    let mut input_start = 0usize;
    let mut input_end = 0usize;
    let mut compressed_left = u64::from(entry.compressed_size);
    let mut cursor = 0usize;
    let mut produced = 0u64;

    loop {
        if input_start == input_end && compressed_left > 0 {
            let want = (compressed_left as usize).min(input.len());
            let read_now = file.read(&mut input[..want])?;
            if read_now == 0 {
                return Err(ArchiveError::UnexpectedEof);
            }
            input_start = 0;
            input_end = read_now;
            compressed_left -= read_now as u64;
        }

        let flags = if compressed_left > 0 {
            inflate_flags::TINFL_FLAG_HAS_MORE_INPUT
        } else {
            0
        };
        let (status, consumed, written) = decompress(
            &mut decomp,
            &input[input_start..input_end],
            &mut window,
            cursor,
            flags,
        );
        input_start += consumed;

        if written > 0 {
            sink.write_all(&window[cursor..cursor + written])?;
            produced += written as u64;
            cursor = (cursor + written) & WINDOW_MASK;
        }

        match status {
            TINFLStatus::Done => break,
            TINFLStatus::HasMoreOutput => {}
            TINFLStatus::NeedsMoreInput if compressed_left > 0 => {}
            other => return Err(status_error(other)),
        }
    }

    let expected = u64::from(entry.uncompressed_size);
    if produced != expected {
        return Err(ArchiveError::SizeMismatch {
            expected,
            actual: produced,
        });
    }

    debug!(
        "streamed {} ({} -> {} bytes)",
        entry.name, entry.compressed_size, produced
    );
    Ok(produced)
}
