use super::delta::apply_delta;
use super::{hash_hex, serialize_object, ObjectKind};
use crate::errors::GitError;
use anyhow::Result;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::bufread::ZlibDecoder;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};

const PACK_MAGIC: &[u8; 4] = b"PACK";

const TYPE_OFS_DELTA: u8 = 6;
const TYPE_REF_DELTA: u8 = 7;

/// Where a deltified entry finds its base.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BaseRef {
    None,
    Offset(u64),
    Digest(String),
}

/// One entry after the read phase: inflated payload (or delta stream) plus
/// enough bookkeeping to resolve it.
#[derive(Debug)]
struct PackEntry {
    offset: u64,
    base: BaseRef,
    kind: Option<ObjectKind>,
    hash: Option<String>,
    data: Vec<u8>,
}

/// A fully resolved pack object, ready for `put_raw`.
#[derive(Debug)]
pub struct ResolvedObject {
    pub kind: ObjectKind,
    pub hash: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct Packfile {
    pub objects: Vec<ResolvedObject>,
}

impl Packfile {
    /// Parses and fully resolves a packfile: read phase (header, per-entry
    /// type/size varints, delta base specifiers, one zlib stream each),
    /// trailer verification, then worklist delta resolution.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let entries = read_entries(data)?;
        let objects = resolve_entries(entries)?;
        Ok(Packfile { objects })
    }
}

fn corrupt(msg: impl Into<String>) -> anyhow::Error {
    GitError::CorruptPack(msg.into()).into()
}

fn kind_from_code(code: u8) -> Option<ObjectKind> {
    match code {
        1 => Some(ObjectKind::Commit),
        2 => Some(ObjectKind::Tree),
        3 => Some(ObjectKind::Blob),
        4 => Some(ObjectKind::Tag),
        _ => None,
    }
}

fn read_entries(data: &[u8]) -> Result<Vec<PackEntry>> {
    let mut cursor = Cursor::new(data);

    let mut magic = [0u8; 4];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| corrupt("truncated header"))?;
    if &magic != PACK_MAGIC {
        return Err(corrupt("missing PACK signature"));
    }

    let version = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| corrupt("truncated version"))?;
    if version != 2 && version != 3 {
        return Err(corrupt(format!("unsupported version {}", version)));
    }

    let count = cursor
        .read_u32::<BigEndian>()
        .map_err(|_| corrupt("truncated object count"))?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let offset = cursor.position();

        let (type_code, size) = read_type_and_size(&mut cursor)?;
        let (kind, base) = match type_code {
            TYPE_OFS_DELTA => {
                let distance = read_negative_offset(&mut cursor)?;
                let base_offset = offset
                    .checked_sub(distance)
                    .ok_or_else(|| corrupt(format!("ofs-delta at {} reaches before the pack", offset)))?;
                (None, BaseRef::Offset(base_offset))
            }
            TYPE_REF_DELTA => {
                let mut raw = [0u8; 20];
                cursor
                    .read_exact(&mut raw)
                    .map_err(|_| corrupt("truncated ref-delta base digest"))?;
                (None, BaseRef::Digest(hex::encode(raw)))
            }
            code => match kind_from_code(code) {
                Some(kind) => (Some(kind), BaseRef::None),
                None => return Err(corrupt(format!("reserved object type {}", code))),
            },
        };

        let start = cursor.position() as usize;
        let mut decoder = ZlibDecoder::new(&data[start..]);
        let mut inflated = Vec::new();
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| corrupt(format!("zlib at offset {}: {}", offset, e)))?;
        if inflated.len() != size {
            return Err(corrupt(format!(
                "object at offset {} inflated to {} bytes, header says {}",
                offset,
                inflated.len(),
                size
            )));
        }
        cursor.set_position((start + decoder.total_in() as usize) as u64);

        entries.push(PackEntry {
            offset,
            base,
            kind,
            hash: None,
            data: inflated,
        });
    }

    verify_trailer(data, cursor.position() as usize)?;
    Ok(entries)
}

/// Per-object header: bits 6-4 of the first byte are the type, bits 3-0 the
/// low bits of the size; continuation bytes add seven bits each at shifts
/// 4, 11, 18, ...
fn read_type_and_size(cursor: &mut Cursor<&[u8]>) -> Result<(u8, usize)> {
    let first = cursor
        .read_u8()
        .map_err(|_| corrupt("truncated object header"))?;
    let type_code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as usize;
    let mut shift = 4;

    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = cursor
            .read_u8()
            .map_err(|_| corrupt("truncated size varint"))?;
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
    }

    Ok((type_code, size))
}

/// ofs-delta distance: `b0 & 0x7F`, then `value = ((value + 1) << 7) | (b & 0x7F)`
/// per continuation byte.
fn read_negative_offset(cursor: &mut Cursor<&[u8]>) -> Result<u64> {
    let mut byte = cursor
        .read_u8()
        .map_err(|_| corrupt("truncated ofs-delta offset"))?;
    let mut value = (byte & 0x7f) as u64;
    while byte & 0x80 != 0 {
        byte = cursor
            .read_u8()
            .map_err(|_| corrupt("truncated ofs-delta offset"))?;
        value = ((value + 1) << 7) | (byte & 0x7f) as u64;
    }
    Ok(value)
}

/// The 20 bytes after the last object are the SHA-1 of everything before
/// them. A pack cut off exactly at the last object is tolerated; anything
/// between 1 and 19 leftover bytes is truncation.
fn verify_trailer(data: &[u8], end_of_objects: usize) -> Result<()> {
    let remaining = data.len() - end_of_objects;
    if remaining == 0 {
        return Ok(());
    }
    if remaining < 20 {
        return Err(corrupt("truncated trailing digest"));
    }

    let mut hasher = Sha1::new();
    hasher.update(&data[..end_of_objects]);
    let expected = hasher.finalize();
    if expected.as_slice() != &data[end_of_objects..end_of_objects + 20] {
        return Err(corrupt("trailing digest mismatch"));
    }
    Ok(())
}

/// Worklist resolution. Non-delta entries seed the queue; each resolved
/// entry releases the deltas registered against its offset and digest. No
/// recursion, and each entry is visited a constant number of times, so long
/// delta chains stay linear.
fn resolve_entries(mut entries: Vec<PackEntry>) -> Result<Vec<ResolvedObject>> {
    let mut waiting_on_offset: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut waiting_on_hash: HashMap<String, Vec<usize>> = HashMap::new();
    let mut ready: VecDeque<usize> = VecDeque::new();

    for i in 0..entries.len() {
        match entries[i].base.clone() {
            BaseRef::None => {
                let kind = entries[i].kind.expect("non-delta entries carry a kind");
                let hash = hash_hex(&serialize_object(kind, &entries[i].data));
                entries[i].hash = Some(hash);
                ready.push_back(i);
            }
            BaseRef::Offset(offset) => {
                waiting_on_offset.entry(offset).or_default().push(i);
            }
            BaseRef::Digest(digest) => {
                waiting_on_hash.entry(digest).or_default().push(i);
            }
        }
    }

    while let Some(base_idx) = ready.pop_front() {
        let base_offset = entries[base_idx].offset;
        let base_hash = entries[base_idx].hash.clone().expect("queued entries are resolved");

        let mut dependents = waiting_on_offset.remove(&base_offset).unwrap_or_default();
        dependents.extend(waiting_on_hash.remove(&base_hash).unwrap_or_default());
        if dependents.is_empty() {
            continue;
        }

        let base_kind = entries[base_idx].kind.expect("queued entries are resolved");
        let base_data = entries[base_idx].data.clone();
        for dep in dependents {
            let target = apply_delta(&base_data, &entries[dep].data)?;
            let hash = hash_hex(&serialize_object(base_kind, &target));
            log::debug!(
                "resolved delta at offset {} against {} -> {}",
                entries[dep].offset,
                base_hash,
                hash
            );
            entries[dep].data = target;
            entries[dep].kind = Some(base_kind);
            entries[dep].hash = Some(hash);
            ready.push_back(dep);
        }
    }

    let leftover = waiting_on_offset.values().map(Vec::len).sum::<usize>()
        + waiting_on_hash.values().map(Vec::len).sum::<usize>();
    if leftover > 0 {
        return Err(GitError::Unresolved(format!(
            "{} delta objects have no resolvable base",
            leftover
        ))
        .into());
    }

    Ok(entries
        .into_iter()
        .map(|e| ResolvedObject {
            kind: e.kind.expect("all entries resolved"),
            hash: e.hash.expect("all entries resolved"),
            data: e.data,
        })
        .collect())
}
