//! TFRecord shards holding `tf.train.Example` protobufs.
//!
//! A shard is a sequence of frames:
//! `u64 length | u32 masked crc(length) | payload | u32 masked crc(payload)`,
//! little endian. CRCs are not verified; frame lengths are.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use prost::Message;

use crate::error::{GanError, Result};

const HEADER_LEN: u64 = 12;
const FOOTER_LEN: u64 = 4;

/// Location of one record payload inside a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub shard: PathBuf,
    pub offset: u64,
    pub len: usize,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.shard.display(), self.offset)
    }
}

/// Walks the frame headers of a shard and returns where every payload lives
pub fn index_shard(shard: &Path) -> Result<Vec<RecordRef>> {
    let file = File::open(shard).map_err(|e| GanError::io(shard, e))?;
    let total = file.metadata().map_err(|e| GanError::io(shard, e))?.len();
    let mut reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut offset = 0u64;
    while offset < total {
        if total - offset < HEADER_LEN {
            return Err(malformed(shard, format!("truncated header at byte {offset}")));
        }
        let mut len_bytes = [0u8; 8];
        reader
            .read_exact(&mut len_bytes)
            .map_err(|e| GanError::io(shard, e))?;
        let len = u64::from_le_bytes(len_bytes);

        let payload_offset = offset + HEADER_LEN;
        let next = payload_offset
            .checked_add(len)
            .and_then(|end| end.checked_add(FOOTER_LEN))
            .filter(|end| *end <= total)
            .ok_or_else(|| {
                malformed(shard, format!("record at byte {offset} runs past end of file"))
            })?;

        records.push(RecordRef {
            shard: shard.to_path_buf(),
            offset: payload_offset,
            len: len as usize,
        });

        reader
            .seek(SeekFrom::Start(next))
            .map_err(|e| GanError::io(shard, e))?;
        offset = next;
    }

    Ok(records)
}

/// Reads the raw payload bytes of one record
pub fn read_payload(record: &RecordRef) -> Result<Vec<u8>> {
    let mut file = File::open(&record.shard).map_err(|e| GanError::io(&record.shard, e))?;
    file.seek(SeekFrom::Start(record.offset))
        .map_err(|e| GanError::io(&record.shard, e))?;
    let mut payload = vec![0u8; record.len];
    file.read_exact(&mut payload)
        .map_err(|e| GanError::io(&record.shard, e))?;
    Ok(payload)
}

/// Pulls the first value of a bytes feature out of a serialized `tf.train.Example`
pub fn bytes_feature(record: &RecordRef, payload: &[u8], key: &str) -> Result<Vec<u8>> {
    let example = Example::decode(payload)
        .map_err(|e| malformed(&record.shard, format!("{record}: {e}")))?;

    let feature = example
        .features
        .and_then(|mut features| features.feature.remove(key))
        .ok_or_else(|| malformed(&record.shard, format!("{record}: missing feature '{key}'")))?;

    match feature.kind {
        Some(feature::Kind::BytesList(list)) => list.value.into_iter().next().ok_or_else(|| {
            malformed(&record.shard, format!("{record}: feature '{key}' is empty"))
        }),
        _ => Err(malformed(
            &record.shard,
            format!("{record}: feature '{key}' is not a bytes list"),
        )),
    }
}

fn malformed(path: &Path, reason: String) -> GanError {
    GanError::Record {
        path: path.to_path_buf(),
        reason,
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Example {
    #[prost(message, optional, tag = "1")]
    pub features: Option<Features>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Features {
    #[prost(map = "string, message", tag = "1")]
    pub feature: HashMap<String, Feature>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Feature {
    #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
    pub kind: Option<feature::Kind>,
}

pub mod feature {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        BytesList(super::BytesList),
        #[prost(message, tag = "2")]
        FloatList(super::FloatList),
        #[prost(message, tag = "3")]
        Int64List(super::Int64List),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct BytesList {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub value: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FloatList {
    #[prost(float, repeated, tag = "1")]
    pub value: Vec<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Int64List {
    #[prost(int64, repeated, tag = "1")]
    pub value: Vec<i64>,
}

/// Builds a single-feature example
#[cfg(test)]
pub(crate) fn example_with_bytes(key: &str, bytes: Vec<u8>) -> Example {
    let mut feature = HashMap::new();
    feature.insert(
        key.to_string(),
        Feature {
            kind: Some(feature::Kind::BytesList(BytesList { value: vec![bytes] })),
        },
    );
    Example {
        features: Some(Features { feature }),
    }
}

/// Frames payloads the way TFRecord writers do (CRC fields left zeroed)
#[cfg(test)]
pub(crate) fn frame_records<'a>(payloads: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for payload in payloads {
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0u8; 4]);
    }
    out
}
