//! Forward cursors over spilled run files.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;

use spillsort_error::{Result, SortError};

use crate::block::{self, BLOCK_HEADER_LEN};
use crate::row::{Row, RowSchema};

/// Sequential reader over one run file, producing rows lazily.
#[derive(Debug)]
pub(crate) struct RunCursor {
    file: File,
    path: PathBuf,
}

impl RunCursor {
    pub fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        Ok(Self { file, path })
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Read and decode the next row, reusing `scratch` for the payload.
    ///
    /// Returns `Ok(None)` at a clean end of file. A header or payload cut
    /// short mid-block is [`SortError::MalformedRun`], as is a block larger
    /// than `scratch` (all runs are written before any is read, so no block
    /// can legitimately exceed the recorded maximum payload size).
    pub fn next_row(&mut self, scratch: &mut [u8], schema: RowSchema) -> Result<Option<Row>> {
        let Some(payload_len) = self.read_header()? else {
            return Ok(None);
        };
        let payload_len = usize::try_from(payload_len)
            .map_err(|_| SortError::malformed("block length does not fit in memory"))?;
        if payload_len > scratch.len() {
            return Err(SortError::malformed(format!(
                "block of {payload_len} bytes exceeds the {} byte maximum",
                scratch.len(),
            )));
        }
        let payload = &mut scratch[..payload_len];
        self.file.read_exact(payload).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                SortError::malformed("payload shorter than its header claims")
            } else {
                SortError::Io(err)
            }
        })?;
        block::decode_row(payload, schema).map(Some)
    }

    /// Read the 8-byte block header, looping over short reads.
    ///
    /// `Ok(None)` only when EOF falls exactly on a block boundary.
    fn read_header(&mut self) -> Result<Option<u64>> {
        let mut head = [0u8; BLOCK_HEADER_LEN];
        let mut filled = 0;
        while filled < head.len() {
            match self.file.read(&mut head[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(SortError::malformed("truncated block header")),
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(Some(u64::from_be_bytes(head)))
    }
}
