//! Scene Archive
//!
//! Binary container for saved scenes, undo snapshots and clipboard contents.
//!
//! ```text
//! +----------------+-----------------+-----------------------------+
//! | magic (8 B)    | version (u32 LE)| bincode records, back to back|
//! +----------------+-----------------+-----------------------------+
//! ```
//!
//! The header is written by hand; everything after it goes through
//! `bincode::serde` with the standard configuration. An archive is either
//! writing or reading; [`Archive::into_reader`] turns a finished writer into a
//! reader over the same bytes.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::{Result, SceneError};

pub const ARCHIVE_MAGIC: [u8; 8] = *b"MYTHSCN\0";
pub const ARCHIVE_VERSION: u32 = 1;
const HEADER_SIZE: usize = 8 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Write,
    Read { cursor: usize },
}

#[derive(Debug, Clone)]
pub struct Archive {
    bytes: Vec<u8>,
    mode: Mode,
    version: u32,
}

impl Default for Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Archive {
    /// Starts an empty archive in write mode.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&ARCHIVE_MAGIC);
        bytes.extend_from_slice(&ARCHIVE_VERSION.to_le_bytes());
        Self {
            bytes,
            mode: Mode::Write,
            version: ARCHIVE_VERSION,
        }
    }

    /// Opens `bytes` for reading after validating the header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || bytes[..8] != ARCHIVE_MAGIC {
            return Err(SceneError::ArchiveMagic);
        }
        let mut raw = [0_u8; 4];
        raw.copy_from_slice(&bytes[8..HEADER_SIZE]);
        let version = u32::from_le_bytes(raw);
        if version != ARCHIVE_VERSION {
            return Err(SceneError::VersionMismatch {
                found: version,
                supported: ARCHIVE_VERSION,
            });
        }
        Ok(Self {
            bytes,
            mode: Mode::Read { cursor: HEADER_SIZE },
            version,
        })
    }

    /// Switches a written archive to reading from its first record.
    pub fn into_reader(self) -> Result<Self> {
        Self::from_bytes(self.bytes)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn is_reading(&self) -> bool {
        matches!(self.mode, Mode::Read { .. })
    }

    /// Moves the read cursor back to the first record.
    pub fn rewind(&mut self) {
        if let Mode::Read { cursor } = &mut self.mode {
            *cursor = HEADER_SIZE;
        }
    }

    /// `true` once every record has been read.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        match self.mode {
            Mode::Read { cursor } => cursor >= self.bytes.len(),
            Mode::Write => false,
        }
    }

    /// Appends one record.
    pub fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        if self.mode != Mode::Write {
            return Err(SceneError::ArchiveMode("write"));
        }
        let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
        self.bytes.extend_from_slice(&encoded);
        Ok(())
    }

    /// Reads the next record. The cursor only advances on success.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<T> {
        let Mode::Read { cursor } = &mut self.mode else {
            return Err(SceneError::ArchiveMode("read"));
        };
        let (value, consumed) =
            bincode::serde::decode_from_slice(&self.bytes[*cursor..], bincode::config::standard())?;
        *cursor += consumed;
        Ok(value)
    }
}
