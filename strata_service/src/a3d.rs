// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `.a3d` resource container.
//!
//! A container is a named index over serialized resources:
//!
//! ```text
//! magic "Android3D_ff"
//! u64   index size in bytes
//! index u32 major, u32 minor, u32 flags, u32 count,
//!       then per entry: u32 name length, name bytes, u32 class id,
//!       offset and length (u32 each, or u64 with FLAG_WIDE_OFFSETS)
//! u64   data size in bytes
//! data  entry blobs, offsets relative to the start of this region
//! ```
//!
//! All integers are little-endian. Element blobs hold the four element
//! fields; type blobs embed their element followed by dimensions;
//! allocation blobs embed their type followed by a length-prefixed copy
//! of the cell data, so each entry is loadable without cross-entry
//! references.

use std::io::{self, Read, Write};

use crate::resources::{
    DataKind, DataType, Element, Resource, ResourceError, ResourceId, ResourceTable, TypeDesc,
};

/// The container signature.
pub const MAGIC: &[u8; 12] = b"Android3D_ff";

/// Index flag: offsets and lengths are u64 instead of u32.
pub const FLAG_WIDE_OFFSETS: u32 = 1;

/// Class id of an element entry.
pub const CLASS_ELEMENT: u32 = 1;
/// Class id of a type entry.
pub const CLASS_TYPE: u32 = 2;
/// Class id of an allocation entry.
pub const CLASS_ALLOCATION: u32 = 3;

const MAJOR_VERSION: u32 = 1;
const MINOR_VERSION: u32 = 0;

/// Errors from reading or writing a container.
#[derive(Debug)]
pub enum A3dError {
    /// The underlying stream failed.
    Io(io::Error),
    /// The file does not start with [`MAGIC`].
    BadMagic,
    /// The file ended before a declared region did.
    Truncated,
    /// An entry declared a class this reader does not know.
    UnknownClass(u32),
    /// A structural invariant does not hold.
    Malformed(&'static str),
    /// A loaded resource was rejected by the table.
    Resource(ResourceError),
    /// A narrow-offset container cannot address this much data.
    OffsetOverflow,
}

impl std::fmt::Display for A3dError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::BadMagic => f.write_str("not an a3d container"),
            Self::Truncated => f.write_str("container is truncated"),
            Self::UnknownClass(id) => write!(f, "unknown entry class {id}"),
            Self::Malformed(what) => write!(f, "malformed container: {what}"),
            Self::Resource(e) => write!(f, "resource rejected: {e}"),
            Self::OffsetOverflow => f.write_str("data too large for narrow offsets"),
        }
    }
}

impl std::error::Error for A3dError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Resource(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for A3dError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

impl From<ResourceError> for A3dError {
    fn from(e: ResourceError) -> Self {
        Self::Resource(e)
    }
}

/// Serializes resources into a container.
#[derive(Debug, Default)]
pub struct A3dWriter {
    wide: bool,
    entries: Vec<PendingEntry>,
    data: Vec<u8>,
}

#[derive(Debug)]
struct PendingEntry {
    name: String,
    class_id: u32,
    offset: u64,
    length: u64,
}

impl A3dWriter {
    /// Creates a writer with narrow (u32) offsets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with wide (u64) offsets for containers whose
    /// data region may exceed 4 GiB.
    #[must_use]
    pub fn with_wide_offsets() -> Self {
        Self {
            wide: true,
            ..Self::default()
        }
    }

    /// Appends an element entry.
    pub fn append_element(
        &mut self,
        name: &str,
        table: &ResourceTable,
        id: ResourceId,
    ) -> Result<(), A3dError> {
        let element = table.element(id)?;
        let mut blob = Vec::with_capacity(16);
        encode_element(&mut blob, element);
        self.push_entry(name, CLASS_ELEMENT, blob);
        Ok(())
    }

    /// Appends a type entry, embedding its element.
    pub fn append_type(
        &mut self,
        name: &str,
        table: &ResourceTable,
        id: ResourceId,
    ) -> Result<(), A3dError> {
        let desc = table.type_desc(id)?;
        let element = table.element(desc.element)?;
        let mut blob = Vec::with_capacity(28);
        encode_type(&mut blob, element, desc);
        self.push_entry(name, CLASS_TYPE, blob);
        Ok(())
    }

    /// Appends an allocation entry, embedding its type and a copy of
    /// the cell data.
    pub fn append_allocation(
        &mut self,
        name: &str,
        table: &ResourceTable,
        id: ResourceId,
    ) -> Result<(), A3dError> {
        let allocation = table.allocation(id)?;
        let desc = table.type_desc(allocation.type_desc)?;
        let element = table.element(desc.element)?;
        let data_len =
            u32::try_from(allocation.data.len()).map_err(|_| A3dError::OffsetOverflow)?;
        let mut blob = Vec::with_capacity(32 + allocation.data.len());
        encode_type(&mut blob, element, desc);
        blob.extend_from_slice(&data_len.to_le_bytes());
        blob.extend_from_slice(&allocation.data);
        self.push_entry(name, CLASS_ALLOCATION, blob);
        Ok(())
    }

    /// Writes the finished container.
    pub fn finish(self, out: &mut impl Write) -> Result<(), A3dError> {
        let count = u32::try_from(self.entries.len()).map_err(|_| A3dError::OffsetOverflow)?;
        let flags = if self.wide { FLAG_WIDE_OFFSETS } else { 0 };

        let mut index = Vec::new();
        for v in [MAJOR_VERSION, MINOR_VERSION, flags, count] {
            index.extend_from_slice(&v.to_le_bytes());
        }
        for entry in &self.entries {
            let name_len =
                u32::try_from(entry.name.len()).map_err(|_| A3dError::OffsetOverflow)?;
            index.extend_from_slice(&name_len.to_le_bytes());
            index.extend_from_slice(entry.name.as_bytes());
            index.extend_from_slice(&entry.class_id.to_le_bytes());
            if self.wide {
                index.extend_from_slice(&entry.offset.to_le_bytes());
                index.extend_from_slice(&entry.length.to_le_bytes());
            } else {
                let offset =
                    u32::try_from(entry.offset).map_err(|_| A3dError::OffsetOverflow)?;
                let length =
                    u32::try_from(entry.length).map_err(|_| A3dError::OffsetOverflow)?;
                index.extend_from_slice(&offset.to_le_bytes());
                index.extend_from_slice(&length.to_le_bytes());
            }
        }

        out.write_all(MAGIC)?;
        out.write_all(&(index.len() as u64).to_le_bytes())?;
        out.write_all(&index)?;
        out.write_all(&(self.data.len() as u64).to_le_bytes())?;
        out.write_all(&self.data)?;
        Ok(())
    }

    fn push_entry(&mut self, name: &str, class_id: u32, blob: Vec<u8>) {
        let offset = self.data.len() as u64;
        let length = blob.len() as u64;
        self.data.extend_from_slice(&blob);
        self.entries.push(PendingEntry {
            name: name.to_owned(),
            class_id,
            offset,
            length,
        });
    }
}

/// One index entry of a parsed container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct A3dEntry {
    /// The entry's name.
    pub name: String,
    /// The entry's class id.
    pub class_id: u32,
    /// Byte offset of the blob inside the data region.
    pub offset: u64,
    /// Byte length of the blob.
    pub length: u64,
}

/// A parsed container, ready to load entries into a table.
#[derive(Debug)]
pub struct A3dReader {
    entries: Vec<A3dEntry>,
    data: Vec<u8>,
}

impl A3dReader {
    /// Parses a container's index and data region.
    ///
    /// Entry blobs are validated against the data region here; class
    /// contents are validated lazily by [`load`](Self::load).
    pub fn read(input: &mut impl Read) -> Result<Self, A3dError> {
        let mut magic = [0u8; 12];
        input.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(A3dError::BadMagic);
        }

        let index_size = read_u64(input)?;
        let index_size =
            usize::try_from(index_size).map_err(|_| A3dError::Malformed("index too large"))?;
        let mut index = vec![0u8; index_size];
        input.read_exact(&mut index)?;

        let data_size = read_u64(input)?;
        let data_size =
            usize::try_from(data_size).map_err(|_| A3dError::Malformed("data too large"))?;
        let mut data = vec![0u8; data_size];
        input.read_exact(&mut data)?;

        let mut cursor = SliceReader::new(&index);
        if cursor.u32()? != MAJOR_VERSION {
            return Err(A3dError::Malformed("unsupported major version"));
        }
        let _minor = cursor.u32()?;
        let flags = cursor.u32()?;
        let wide = flags & FLAG_WIDE_OFFSETS != 0;
        let count = cursor.u32()?;

        let mut entries = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let name_len = cursor.u32()? as usize;
            let name = String::from_utf8(cursor.bytes(name_len)?.to_vec())
                .map_err(|_| A3dError::Malformed("entry name is not utf-8"))?;
            let class_id = cursor.u32()?;
            let (offset, length) = if wide {
                (cursor.u64()?, cursor.u64()?)
            } else {
                (u64::from(cursor.u32()?), u64::from(cursor.u32()?))
            };
            let end = offset
                .checked_add(length)
                .ok_or(A3dError::Malformed("entry out of bounds"))?;
            if end > data.len() as u64 {
                return Err(A3dError::Malformed("entry out of bounds"));
            }
            entries.push(A3dEntry {
                name,
                class_id,
                offset,
                length,
            });
        }

        Ok(Self { entries, data })
    }

    /// The container's index entries, in file order.
    #[must_use]
    pub fn entries(&self) -> &[A3dEntry] {
        &self.entries
    }

    /// Loads one entry into `table`, creating every resource the blob
    /// embeds, and returns the outermost resource.
    pub fn load(&self, index: usize, table: &mut ResourceTable) -> Result<ResourceId, A3dError> {
        let entry = self
            .entries
            .get(index)
            .ok_or(A3dError::Malformed("entry index out of range"))?;
        // Bounds were validated by read().
        let offset = usize::try_from(entry.offset)
            .map_err(|_| A3dError::Malformed("entry out of bounds"))?;
        let length = usize::try_from(entry.length)
            .map_err(|_| A3dError::Malformed("entry out of bounds"))?;
        let mut blob = SliceReader::new(&self.data[offset..offset + length]);

        match entry.class_id {
            CLASS_ELEMENT => {
                let element = decode_element(&mut blob)?;
                Ok(table.create_element(element)?)
            }
            CLASS_TYPE => {
                let (element, dims) = decode_type(&mut blob)?;
                let element = table.create_element(element)?;
                Ok(table.create_type(TypeDesc {
                    element,
                    dim_x: dims.0,
                    dim_y: dims.1,
                    mips: dims.2,
                })?)
            }
            CLASS_ALLOCATION => {
                let (element, dims) = decode_type(&mut blob)?;
                let data_len = blob.u32()? as usize;
                let bytes = blob.bytes(data_len)?;
                let element = table.create_element(element)?;
                let desc = table.create_type(TypeDesc {
                    element,
                    dim_x: dims.0,
                    dim_y: dims.1,
                    mips: dims.2,
                })?;
                let allocation = table.create_allocation(desc)?;
                table.allocation_data(allocation, 0, bytes)?;
                Ok(allocation)
            }
            other => Err(A3dError::UnknownClass(other)),
        }
    }
}

/// Serializes everything live in `table` that the ids name, in order.
///
/// Convenience wrapper used by tooling that snapshots a whole table.
pub fn write_table(
    table: &ResourceTable,
    ids: &[(String, ResourceId)],
    out: &mut impl Write,
) -> Result<(), A3dError> {
    let mut writer = A3dWriter::new();
    for (name, id) in ids {
        match table.get(*id)? {
            Resource::Element(_) => writer.append_element(name, table, *id)?,
            Resource::Type(_) => writer.append_type(name, table, *id)?,
            Resource::Allocation(_) => writer.append_allocation(name, table, *id)?,
        }
    }
    writer.finish(out)
}

struct SliceReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], A3dError> {
        let end = self.pos.checked_add(n).ok_or(A3dError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(A3dError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, A3dError> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64, A3dError> {
        let bytes = self.bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }
}

fn read_u64(input: &mut impl Read) -> Result<u64, A3dError> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn encode_element(out: &mut Vec<u8>, element: &Element) {
    for v in [
        element.data_type.to_raw(),
        element.data_kind.to_raw(),
        element.vector_size,
        u32::from(element.normalized),
    ] {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn encode_type(out: &mut Vec<u8>, element: &Element, desc: &TypeDesc) {
    encode_element(out, element);
    for v in [desc.dim_x, desc.dim_y, u32::from(desc.mips)] {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn decode_element(blob: &mut SliceReader<'_>) -> Result<Element, A3dError> {
    let data_type =
        DataType::from_raw(blob.u32()?).ok_or(A3dError::Malformed("unknown data type"))?;
    let data_kind =
        DataKind::from_raw(blob.u32()?).ok_or(A3dError::Malformed("unknown data kind"))?;
    let vector_size = blob.u32()?;
    let normalized = blob.u32()? != 0;
    Ok(Element {
        data_type,
        data_kind,
        vector_size,
        normalized,
    })
}

fn decode_type(blob: &mut SliceReader<'_>) -> Result<(Element, (u32, u32, bool)), A3dError> {
    let element = decode_element(blob)?;
    let dim_x = blob.u32()?;
    let dim_y = blob.u32()?;
    let mips = blob.u32()? != 0;
    Ok((element, (dim_x, dim_y, mips)))
}
