//! Whisper on-disk layout.
//!
//! All integers and floats are big-endian:
//!
//! ```text
//! metadata      aggregation:u32 max_retention:u32 x_files_factor:f32 archive_count:u32
//! archive info  offset:u32 seconds_per_point:u32 points:u32      (archive_count times)
//! archive data  timestamp:u32 value:f64                          (points times, at offset)
//! ```

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, WhisperError};

pub const METADATA_SIZE: usize = 16;
pub const ARCHIVE_INFO_SIZE: usize = 12;
pub const POINT_SIZE: usize = 12;

/// Aggregation method used when rolling up into lower-resolution archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMethod {
    Average,
    Sum,
    Last,
    Max,
    Min,
    AvgZero,
    AbsMax,
    AbsMin,
    Unknown(u32),
}

impl AggregationMethod {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Average,
            2 => Self::Sum,
            3 => Self::Last,
            4 => Self::Max,
            5 => Self::Min,
            6 => Self::AvgZero,
            7 => Self::AbsMax,
            8 => Self::AbsMin,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Average => 1,
            Self::Sum => 2,
            Self::Last => 3,
            Self::Max => 4,
            Self::Min => 5,
            Self::AvgZero => 6,
            Self::AbsMax => 7,
            Self::AbsMin => 8,
            Self::Unknown(code) => *code,
        }
    }
}

/// File-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub aggregation: AggregationMethod,
    pub max_retention: u32,
    pub x_files_factor: f32,
    pub archive_count: u32,
}

/// Location and resolution of one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub offset: u32,
    pub seconds_per_point: u32,
    pub points: u32,
}

impl ArchiveInfo {
    /// Time span covered by this archive.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.seconds_per_point) * u64::from(self.points))
    }

    pub fn size_bytes(&self) -> usize {
        self.points as usize * POINT_SIZE
    }

    /// End of this archive's data, in bytes from the start of the file.
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + self.size_bytes() as u64
    }
}

/// A single archive slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Epoch seconds; zero for a slot that was never written.
    pub timestamp: u32,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: u32, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Metadata plus archive table.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub metadata: Metadata,
    pub archives: Vec<ArchiveInfo>,
}

impl Header {
    /// Build a header for archives laid out back to back after the header.
    ///
    /// `archives` holds `(seconds_per_point, points)` pairs, highest
    /// resolution first.
    pub fn new(aggregation: AggregationMethod, x_files_factor: f32, archives: &[(u32, u32)]) -> Self {
        let mut offset = (METADATA_SIZE + archives.len() * ARCHIVE_INFO_SIZE) as u32;
        let mut infos = Vec::with_capacity(archives.len());
        for &(seconds_per_point, points) in archives {
            infos.push(ArchiveInfo {
                offset,
                seconds_per_point,
                points,
            });
            offset += points * POINT_SIZE as u32;
        }

        let max_retention = infos
            .iter()
            .map(|a| a.seconds_per_point * a.points)
            .max()
            .unwrap_or(0);

        Self {
            metadata: Metadata {
                aggregation,
                max_retention,
                x_files_factor,
                archive_count: archives.len() as u32,
            },
            archives: infos,
        }
    }

    pub fn size_bytes(&self) -> usize {
        METADATA_SIZE + self.archives.len() * ARCHIVE_INFO_SIZE
    }
}

/// Number of archives declared by a metadata block.
pub fn archive_count(metadata: &[u8]) -> Result<usize> {
    if metadata.len() < METADATA_SIZE {
        return Err(WhisperError::Truncated {
            expected: METADATA_SIZE,
            actual: metadata.len(),
        });
    }
    let mut buf = &metadata[12..METADATA_SIZE];
    Ok(buf.get_u32() as usize)
}

/// Decode metadata and the archive table.
pub fn decode_header(data: &[u8]) -> Result<Header> {
    let count = archive_count(data)?;
    if count == 0 {
        return Err(WhisperError::Malformed("no archives".into()));
    }

    let expected = METADATA_SIZE + count * ARCHIVE_INFO_SIZE;
    if data.len() < expected {
        return Err(WhisperError::Truncated {
            expected,
            actual: data.len(),
        });
    }

    let mut buf = &data[..expected];
    let metadata = Metadata {
        aggregation: AggregationMethod::from_code(buf.get_u32()),
        max_retention: buf.get_u32(),
        x_files_factor: buf.get_f32(),
        archive_count: buf.get_u32(),
    };

    let mut archives = Vec::with_capacity(count);
    for index in 0..count {
        let info = ArchiveInfo {
            offset: buf.get_u32(),
            seconds_per_point: buf.get_u32(),
            points: buf.get_u32(),
        };
        if info.seconds_per_point == 0 || info.points == 0 {
            return Err(WhisperError::Malformed(format!(
                "archive {} has {} seconds per point and {} points",
                index, info.seconds_per_point, info.points
            )));
        }
        if (info.offset as usize) < expected {
            return Err(WhisperError::Malformed(format!(
                "archive {} starts inside the header",
                index
            )));
        }
        archives.push(info);
    }

    Ok(Header { metadata, archives })
}

/// Decode a run of archive slots.
pub fn decode_samples(data: &[u8]) -> Vec<Sample> {
    let mut buf = data;
    let mut samples = Vec::with_capacity(data.len() / POINT_SIZE);
    while buf.remaining() >= POINT_SIZE {
        let timestamp = buf.get_u32();
        let value = buf.get_f64();
        samples.push(Sample { timestamp, value });
    }
    samples
}

/// Encode a complete whisper file.
///
/// `archives[i]` fills archive `i` from its first slot; remaining slots are
/// written as unused.
pub fn encode(header: &Header, archives: &[Vec<Sample>]) -> Result<Vec<u8>> {
    if archives.len() != header.archives.len() {
        return Err(WhisperError::Malformed(format!(
            "{} archives declared, {} supplied",
            header.archives.len(),
            archives.len()
        )));
    }

    let total = header.archives.iter().map(ArchiveInfo::end).max().unwrap_or(0) as usize;
    let mut buf = BytesMut::with_capacity(total.max(header.size_bytes()));

    buf.put_u32(header.metadata.aggregation.code());
    buf.put_u32(header.metadata.max_retention);
    buf.put_f32(header.metadata.x_files_factor);
    buf.put_u32(header.archives.len() as u32);
    for info in &header.archives {
        buf.put_u32(info.offset);
        buf.put_u32(info.seconds_per_point);
        buf.put_u32(info.points);
    }

    for (index, (info, samples)) in header.archives.iter().zip(archives).enumerate() {
        if samples.len() > info.points as usize {
            return Err(WhisperError::Malformed(format!(
                "archive {} holds {} points, {} supplied",
                index,
                info.points,
                samples.len()
            )));
        }
        if buf.len() < info.offset as usize {
            buf.resize(info.offset as usize, 0);
        }
        for sample in samples {
            buf.put_u32(sample.timestamp);
            buf.put_f64(sample.value);
        }
        let unused = info.points as usize - samples.len();
        buf.put_bytes(0, unused * POINT_SIZE);
    }

    Ok(buf.to_vec())
}
