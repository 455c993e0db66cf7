//! Whisper file reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::trace;

use crate::error::{Result, WhisperError};
use crate::format::{self, ArchiveInfo, Header, Sample, ARCHIVE_INFO_SIZE, METADATA_SIZE};

/// An open whisper file with its decoded header.
#[derive(Debug)]
pub struct WhisperFile {
    file: File,
    header: Header,
}

impl WhisperFile {
    /// Opens a file and decodes its header.
    ///
    /// Fails if the header is truncated or malformed, or if any archive
    /// extends past the end of the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let mut head = vec![0u8; METADATA_SIZE];
        read_exact_or_truncated(&mut file, &mut head, 0)?;

        let count = format::archive_count(&head)?;
        let header_len = count
            .checked_mul(ARCHIVE_INFO_SIZE)
            .and_then(|n| n.checked_add(METADATA_SIZE))
            .ok_or_else(|| {
                WhisperError::Malformed(format!("archive count {} overflows", count))
            })?;
        if header_len as u64 > len {
            return Err(WhisperError::Truncated {
                expected: header_len,
                actual: len as usize,
            });
        }
        head.resize(header_len, 0);
        read_exact_or_truncated(&mut file, &mut head[METADATA_SIZE..], METADATA_SIZE)?;

        let header = format::decode_header(&head)?;
        for (index, archive) in header.archives.iter().enumerate() {
            if archive.end() > len {
                return Err(WhisperError::Malformed(format!(
                    "archive {} ends at byte {} but file is {} bytes",
                    index,
                    archive.end(),
                    len
                )));
            }
        }

        trace!(
            path = %path.display(),
            archives = header.archives.len(),
            "Opened whisper file"
        );

        Ok(Self { file, header })
    }

    /// Reads only the header of a file.
    pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
        Ok(Self::open(path)?.header)
    }

    pub fn archives(&self) -> &[ArchiveInfo] {
        &self.header.archives
    }

    /// Reads every slot of an archive in on-disk order, unused slots included.
    pub fn dump_archive(&mut self, index: usize) -> Result<Vec<Sample>> {
        let archive = *self
            .header
            .archives
            .get(index)
            .ok_or(WhisperError::ArchiveIndex {
                index,
                count: self.header.archives.len(),
            })?;

        self.file.seek(SeekFrom::Start(u64::from(archive.offset)))?;
        let mut data = vec![0u8; archive.size_bytes()];
        read_exact_or_truncated(&mut self.file, &mut data, archive.offset as usize)?;

        Ok(format::decode_samples(&data))
    }
}

/// Writes a whisper file, replacing any existing file at `path`.
pub fn create(path: impl AsRef<Path>, header: &Header, archives: &[Vec<Sample>]) -> Result<()> {
    let data = format::encode(header, archives)?;
    std::fs::write(path, data)?;
    Ok(())
}

fn read_exact_or_truncated(file: &mut File, buf: &mut [u8], offset: usize) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(WhisperError::Truncated {
                    expected: offset + buf.len(),
                    actual: offset + filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
