use std::io::{Read, Seek, SeekFrom};

use reportflow_protocol::ChunkRange;

/// Reads arbitrary byte ranges from a seekable source.
///
/// Every read seeks first, so re-reading a range after a failed send returns
/// the same bytes regardless of what was read in between.
pub struct ChunkReader<R> {
    inner: R,
    total_size: u64,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Wraps `inner`, measuring its total size.
    pub fn new(mut inner: R) -> std::io::Result<Self> {
        let total_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, total_size })
    }

    /// Reads exactly the bytes covered by `range`.
    pub fn read_range(&mut self, range: &ChunkRange) -> std::io::Result<Vec<u8>> {
        self.inner.seek(SeekFrom::Start(range.start))?;
        let mut buf = vec![0u8; range.len() as usize];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Total size of the source in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}
