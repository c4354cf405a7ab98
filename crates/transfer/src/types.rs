/// Lifecycle of one file upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    InProgress,
    Complete,
    Failed,
}

/// State of one file's upload as acknowledged by the server.
///
/// `offset` counts bytes the server has confirmed; it never exceeds
/// `total_size` and only moves forward after an acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub filename: String,
    pub total_size: u64,
    pub upload_id: String,
    pub offset: u64,
    pub status: UploadStatus,
}

impl UploadTask {
    pub(crate) fn new(filename: String, total_size: u64, upload_id: String) -> Self {
        Self {
            filename,
            total_size,
            upload_id,
            offset: 0,
            status: UploadStatus::InProgress,
        }
    }

    /// Returns `true` once every byte has been acknowledged.
    ///
    /// This does not mean the upload is complete: completion needs its own
    /// acknowledgment.
    pub fn is_fully_sent(&self) -> bool {
        self.offset == self.total_size
    }

    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            filename: self.filename.clone(),
            offset: self.offset,
            total_size: self.total_size,
        }
    }
}

/// Snapshot of per-file upload progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub filename: String,
    pub offset: u64,
    pub total_size: u64,
}

impl UploadProgress {
    /// Whole-number percentage. An empty file counts as 100%.
    pub fn percent(&self) -> u8 {
        if self.total_size == 0 {
            return 100;
        }
        ((self.offset as u128 * 100 + self.total_size as u128 / 2) / self.total_size as u128) as u8
    }
}
