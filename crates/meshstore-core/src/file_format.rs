//! The on-disk store file container: a fixed header, three named sections
//! (`meshid_list`, `cmph_data`, and the dense chunk-data region), addressed
//! directly rather than through a chunk directory -- see `SPEC_FULL.md` §3.
//!
//! This is a from-scratch binary framing, the same spirit as
//! `re_log_encoding`'s `.rrd` framing (magic + version header, length-
//! prefixed sections) rather than a dependency on an external container
//! format.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

pub const MAGIC: &[u8; 8] = b"MSHSTOR1";
pub const FORMAT_VERSION: u32 = 1;

/// Byte offset of the `t` (current time extent) field -- the only header
/// field ever rewritten in place, by [`write_t`].
pub const T_OFFSET: u64 = 24;

#[derive(Debug, Clone)]
pub struct Header {
    pub n: u32,
    pub chunk_t: u32,
    pub chunk_m: u32,
    pub t: u64,
    pub utc_offset_minutes: i32,
    pub epoch: String,
}

/// Writes a brand new store file: header, `meshid_list`, `cmph_data`, no
/// data region yet (callers extend the time axis afterwards). Returns the
/// byte offset where the data region begins.
pub fn write_new(
    file: &mut File,
    header: &Header,
    meshid_list: &[u32],
    cmph_blob: &[u8],
) -> io::Result<u64> {
    assert_eq!(meshid_list.len(), header.n as usize);

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&header.n.to_le_bytes());
    buf.extend_from_slice(&header.chunk_t.to_le_bytes());
    buf.extend_from_slice(&header.chunk_m.to_le_bytes());
    buf.extend_from_slice(&header.t.to_le_bytes());
    buf.extend_from_slice(&header.utc_offset_minutes.to_le_bytes());

    let epoch_bytes = header.epoch.as_bytes();
    buf.extend_from_slice(&(epoch_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(epoch_bytes);

    for &m in meshid_list {
        buf.extend_from_slice(&m.to_le_bytes());
    }

    buf.extend_from_slice(&(cmph_blob.len() as u32).to_le_bytes());
    buf.extend_from_slice(cmph_blob);

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&buf)?;
    file.flush()?;
    Ok(buf.len() as u64)
}

/// Reads back everything `write_new` wrote, plus the offset where the data
/// region begins.
pub fn read(file: &mut File) -> io::Result<(Header, Vec<u32>, Vec<u8>, u64)> {
    file.seek(SeekFrom::Start(0))?;

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let mut u32buf = [0u8; 4];
    file.read_exact(&mut u32buf)?;
    let _version = u32::from_le_bytes(u32buf);

    file.read_exact(&mut u32buf)?;
    let n = u32::from_le_bytes(u32buf);
    file.read_exact(&mut u32buf)?;
    let chunk_t = u32::from_le_bytes(u32buf);
    file.read_exact(&mut u32buf)?;
    let chunk_m = u32::from_le_bytes(u32buf);

    let mut u64buf = [0u8; 8];
    file.read_exact(&mut u64buf)?;
    let t = u64::from_le_bytes(u64buf);

    let mut i32buf = [0u8; 4];
    file.read_exact(&mut i32buf)?;
    let utc_offset_minutes = i32::from_le_bytes(i32buf);

    file.read_exact(&mut u32buf)?;
    let epoch_len = u32::from_le_bytes(u32buf) as usize;
    let mut epoch_bytes = vec![0u8; epoch_len];
    file.read_exact(&mut epoch_bytes)?;
    let epoch = String::from_utf8(epoch_bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "epoch is not valid utf-8"))?;

    let mut mesh_bytes = vec![0u8; n as usize * 4];
    file.read_exact(&mut mesh_bytes)?;
    let meshid_list: Vec<u32> = mesh_bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();

    file.read_exact(&mut u32buf)?;
    let cmph_len = u32::from_le_bytes(u32buf) as usize;
    let mut cmph_blob = vec![0u8; cmph_len];
    file.read_exact(&mut cmph_blob)?;

    let data_start = file.stream_position()?;

    Ok((
        Header {
            n,
            chunk_t,
            chunk_m,
            t,
            utc_offset_minutes,
            epoch,
        },
        meshid_list,
        cmph_blob,
        data_start,
    ))
}

/// Rewrites the `t` field in place -- the only mutation `extend_time` makes
/// to the header once the store has been created.
pub fn write_t(file: &mut File, t: u64) -> io::Result<()> {
    file.seek(SeekFrom::Start(T_OFFSET))?;
    file.write_all(&t.to_le_bytes())?;
    file.flush()
}
