//! Packet files on disk
//!
//! Each file holds the raw bytes of one voice packet, as delivered by the
//! voice relay. Used by the CLI to feed a capture registry offline.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

/// Errors loading packet files
#[derive(Debug, Clone, Error)]
pub enum PacketFileError {
    #[error("Failed to read packet file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Packet file is empty: {0}")]
    Empty(PathBuf),
}

/// Read packet files in the given order.
///
/// Empty files are rejected since an empty packet carries no audio.
pub async fn load_packet_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Vec<u8>>, PacketFileError> {
    let mut packets = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let bytes = fs::read(path).await.map_err(|e| PacketFileError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(PacketFileError::Empty(path.to_path_buf()));
        }
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded packet file");
        packets.push(bytes);
    }
    Ok(packets)
}
