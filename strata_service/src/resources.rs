// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resource objects created by the command stream.
//!
//! The model is three classes deep: an [`Element`] describes one cell
//! (a scalar or short vector of a [`DataType`]), a [`TypeDesc`] gives
//! an element dimensions and an optional mip chain, and an
//! [`Allocation`] is the backing store for a type. [`ResourceTable`]
//! owns them all behind generation-counted [`ResourceId`] handles with
//! the same stale-handle policy as the layer store: a dead or forged
//! handle is an error the worker turns into a traced no-op.
//!
//! Allocations draw from a byte budget fixed at construction; exceeding
//! it is reported as [`ResourceError::BudgetExceeded`] and surfaced to
//! the client as an out-of-memory message.

use std::fmt;

/// Scalar type of one element component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Unsigned 64-bit.
    U64,
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit.
    I16,
    /// Signed 32-bit.
    I32,
    /// Signed 64-bit.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl DataType {
    /// Size of one component in bytes.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// The wire value.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::U8 => 0,
            Self::U16 => 1,
            Self::U32 => 2,
            Self::U64 => 3,
            Self::I8 => 4,
            Self::I16 => 5,
            Self::I32 => 6,
            Self::I64 => 7,
            Self::F32 => 8,
            Self::F64 => 9,
        }
    }

    /// Decodes a wire value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::U8),
            1 => Some(Self::U16),
            2 => Some(Self::U32),
            3 => Some(Self::U64),
            4 => Some(Self::I8),
            5 => Some(Self::I16),
            6 => Some(Self::I32),
            7 => Some(Self::I64),
            8 => Some(Self::F32),
            9 => Some(Self::F64),
            _ => None,
        }
    }
}

/// Interpretation of an element's components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    /// Raw user data.
    User,
    /// Alpha-only pixel.
    PixelA,
    /// RGB pixel.
    PixelRgb,
    /// RGBA pixel.
    PixelRgba,
}

impl DataKind {
    /// The wire value.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::User => 0,
            Self::PixelA => 1,
            Self::PixelRgb => 2,
            Self::PixelRgba => 3,
        }
    }

    /// Decodes a wire value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::User),
            1 => Some(Self::PixelA),
            2 => Some(Self::PixelRgb),
            3 => Some(Self::PixelRgba),
            _ => None,
        }
    }
}

/// The format of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Element {
    /// Component scalar type.
    pub data_type: DataType,
    /// Component interpretation.
    pub data_kind: DataKind,
    /// Components per cell, 1 through 4.
    pub vector_size: u32,
    /// Whether fixed-point components are normalized to `[0, 1]`.
    pub normalized: bool,
}

impl Element {
    /// Size of one cell in bytes.
    #[must_use]
    pub const fn byte_size(&self) -> usize {
        self.data_type.size_bytes() * self.vector_size as usize
    }
}

/// Dimensions over an element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeDesc {
    /// The cell element.
    pub element: ResourceId,
    /// X dimension in cells; must be nonzero.
    pub dim_x: u32,
    /// Y dimension in cells; 0 for one-dimensional types.
    pub dim_y: u32,
    /// Whether a full mip chain is allocated.
    pub mips: bool,
}

impl TypeDesc {
    /// Total cells across every mip level.
    ///
    /// Each level halves both dimensions (clamped at 1) until a 1x1
    /// level is reached. Saturates instead of overflowing; the
    /// allocation path rejects sizes the budget cannot hold anyway.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        let mut total: usize = 0;
        let mut x = self.dim_x as usize;
        let mut y = self.dim_y.max(1) as usize;
        loop {
            total = total.saturating_add(x.saturating_mul(y));
            if !self.mips || (x <= 1 && y <= 1) {
                break;
            }
            x = (x / 2).max(1);
            y = (y / 2).max(1);
        }
        total
    }

    /// Total bytes the type occupies with the given element.
    #[must_use]
    pub fn byte_size(&self, element: &Element) -> usize {
        self.cell_count().saturating_mul(element.byte_size())
    }
}

/// Backing store for one type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    /// The allocation's type.
    pub type_desc: ResourceId,
    /// The cell bytes, zero-filled at creation.
    pub data: Vec<u8>,
}

/// Any resource the table can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    /// A cell format.
    Element(Element),
    /// Dimensions over an element.
    Type(TypeDesc),
    /// Backing store for a type.
    Allocation(Allocation),
}

/// A handle to a resource in a [`ResourceTable`].
///
/// Same shape as a layer handle: slot index plus generation counter, so
/// stale handles are detectable after a slot is recycled.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    idx: u32,
    generation: u32,
}

impl ResourceId {
    /// A handle that never resolves to a live resource.
    pub const NONE: Self = Self {
        idx: u32::MAX,
        generation: 0,
    };

    /// Reassembles a handle from its raw parts (wire decoding).
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, generation: u32) -> Self {
        Self { idx, generation }
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({}@gen{})", self.idx, self.generation)
    }
}

/// Errors reported by the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceError {
    /// The handle's slot was destroyed or recycled.
    StaleResource(ResourceId),
    /// The handle resolves to a resource of the wrong class.
    WrongClass(ResourceId),
    /// An element's vector size was outside 1 through 4.
    InvalidVectorSize(u32),
    /// A type's dimensions were zero or overflow the address space.
    InvalidDimensions,
    /// An allocation write ran past the end of its data.
    OutOfBounds,
    /// An allocation would exceed the byte budget.
    BudgetExceeded {
        /// Bytes the allocation asked for.
        requested: usize,
        /// The configured budget.
        budget: usize,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleResource(id) => write!(f, "stale resource handle {id:?}"),
            Self::WrongClass(id) => write!(f, "resource {id:?} has the wrong class"),
            Self::InvalidVectorSize(n) => write!(f, "vector size {n} outside 1..=4"),
            Self::InvalidDimensions => write!(f, "invalid type dimensions"),
            Self::OutOfBounds => write!(f, "write past the end of the allocation"),
            Self::BudgetExceeded { requested, budget } => {
                write!(f, "allocation of {requested} bytes exceeds the {budget}-byte budget")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Generation-handle arena for every resource class.
#[derive(Debug)]
pub struct ResourceTable {
    entries: Vec<Option<Resource>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    bytes_used: usize,
    budget: usize,
}

impl ResourceTable {
    /// Creates an empty table with the given allocation byte budget.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            entries: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            bytes_used: 0,
            budget,
        }
    }

    /// Creates an element after validating its vector size.
    pub fn create_element(&mut self, element: Element) -> Result<ResourceId, ResourceError> {
        if !(1..=4).contains(&element.vector_size) {
            return Err(ResourceError::InvalidVectorSize(element.vector_size));
        }
        Ok(self.insert(Resource::Element(element)))
    }

    /// Creates a type over an existing element.
    pub fn create_type(&mut self, desc: TypeDesc) -> Result<ResourceId, ResourceError> {
        self.element(desc.element)?;
        if desc.dim_x == 0 {
            return Err(ResourceError::InvalidDimensions);
        }
        Ok(self.insert(Resource::Type(desc)))
    }

    /// Creates a zero-filled allocation for an existing type.
    pub fn create_allocation(&mut self, type_desc: ResourceId) -> Result<ResourceId, ResourceError> {
        let bytes = self.allocation_byte_size(type_desc)?;
        if self.bytes_used.saturating_add(bytes) > self.budget {
            return Err(ResourceError::BudgetExceeded {
                requested: bytes,
                budget: self.budget,
            });
        }
        self.bytes_used += bytes;
        Ok(self.insert(Resource::Allocation(Allocation {
            type_desc,
            data: vec![0; bytes],
        })))
    }

    /// Writes bytes into an allocation at a byte offset.
    pub fn allocation_data(
        &mut self,
        id: ResourceId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let i = self.check(id)?;
        let Some(Resource::Allocation(allocation)) = &mut self.entries[i] else {
            return Err(ResourceError::WrongClass(id));
        };
        let end = offset
            .checked_add(data.len())
            .ok_or(ResourceError::OutOfBounds)?;
        if end > allocation.data.len() {
            return Err(ResourceError::OutOfBounds);
        }
        allocation.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Destroys a resource and recycles its slot.
    pub fn destroy(&mut self, id: ResourceId) -> Result<(), ResourceError> {
        let i = self.check(id)?;
        if let Some(Resource::Allocation(allocation)) = self.entries[i].take() {
            self.bytes_used -= allocation.data.len();
        }
        self.free_list.push(id.idx);
        Ok(())
    }

    /// Resolves a handle to its resource.
    pub fn get(&self, id: ResourceId) -> Result<&Resource, ResourceError> {
        let i = self.check(id)?;
        self.entries[i]
            .as_ref()
            .ok_or(ResourceError::StaleResource(id))
    }

    /// Resolves a handle that must be an element.
    pub fn element(&self, id: ResourceId) -> Result<&Element, ResourceError> {
        match self.get(id)? {
            Resource::Element(element) => Ok(element),
            _ => Err(ResourceError::WrongClass(id)),
        }
    }

    /// Resolves a handle that must be a type.
    pub fn type_desc(&self, id: ResourceId) -> Result<&TypeDesc, ResourceError> {
        match self.get(id)? {
            Resource::Type(desc) => Ok(desc),
            _ => Err(ResourceError::WrongClass(id)),
        }
    }

    /// Resolves a handle that must be an allocation.
    pub fn allocation(&self, id: ResourceId) -> Result<&Allocation, ResourceError> {
        match self.get(id)? {
            Resource::Allocation(allocation) => Ok(allocation),
            _ => Err(ResourceError::WrongClass(id)),
        }
    }

    /// Bytes an allocation of the given type would occupy.
    pub fn allocation_byte_size(&self, type_desc: ResourceId) -> Result<usize, ResourceError> {
        let desc = *self.type_desc(type_desc)?;
        let element = *self.element(desc.element)?;
        desc.cell_count()
            .checked_mul(element.byte_size())
            .ok_or(ResourceError::InvalidDimensions)
    }

    /// Number of live resources.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Bytes currently held by live allocations.
    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    fn insert(&mut self, resource: Resource) -> ResourceId {
        if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.generation[i] += 1;
            self.entries[i] = Some(resource);
            ResourceId {
                idx,
                generation: self.generation[i],
            }
        } else {
            let Ok(idx) = u32::try_from(self.entries.len()) else {
                panic!("resource table exceeded {} slots", u32::MAX);
            };
            self.entries.push(Some(resource));
            self.generation.push(0);
            ResourceId { idx, generation: 0 }
        }
    }

    fn check(&self, id: ResourceId) -> Result<usize, ResourceError> {
        let i = id.idx as usize;
        if i < self.entries.len() && self.generation[i] == id.generation && self.entries[i].is_some()
        {
            Ok(i)
        } else {
            Err(ResourceError::StaleResource(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(data_type: DataType) -> Element {
        Element {
            data_type,
            data_kind: DataKind::User,
            vector_size: 1,
            normalized: false,
        }
    }

    #[test]
    fn element_byte_sizes_scale_with_the_vector() {
        assert_eq!(scalar(DataType::U8).byte_size(), 1);
        assert_eq!(scalar(DataType::F64).byte_size(), 8);
        let rgba = Element {
            data_type: DataType::U8,
            data_kind: DataKind::PixelRgba,
            vector_size: 4,
            normalized: true,
        };
        assert_eq!(rgba.byte_size(), 4);
    }

    #[test]
    fn mip_chains_sum_every_level() {
        let mut table = ResourceTable::new(1 << 20);
        let element = table.create_element(scalar(DataType::U8)).unwrap();

        let flat = TypeDesc {
            element,
            dim_x: 8,
            dim_y: 4,
            mips: false,
        };
        assert_eq!(flat.cell_count(), 32);

        let chain = TypeDesc { mips: true, ..flat };
        // 8x4 + 4x2 + 2x1 + 1x1
        assert_eq!(chain.cell_count(), 43);

        let line = TypeDesc {
            element,
            dim_x: 5,
            dim_y: 0,
            mips: true,
        };
        // 5 + 2 + 1
        assert_eq!(line.cell_count(), 8);
    }

    #[test]
    fn vector_size_must_be_one_through_four() {
        let mut table = ResourceTable::new(0);
        let bad = Element {
            vector_size: 5,
            ..scalar(DataType::F32)
        };
        assert_eq!(
            table.create_element(bad),
            Err(ResourceError::InvalidVectorSize(5))
        );
        assert_eq!(
            table.create_element(Element {
                vector_size: 0,
                ..scalar(DataType::F32)
            }),
            Err(ResourceError::InvalidVectorSize(0))
        );
    }

    #[test]
    fn types_reject_zero_width_and_non_elements() {
        let mut table = ResourceTable::new(1 << 10);
        let element = table.create_element(scalar(DataType::U32)).unwrap();
        let ty = table
            .create_type(TypeDesc {
                element,
                dim_x: 4,
                dim_y: 4,
                mips: false,
            })
            .unwrap();

        assert_eq!(
            table.create_type(TypeDesc {
                element,
                dim_x: 0,
                dim_y: 4,
                mips: false,
            }),
            Err(ResourceError::InvalidDimensions)
        );
        assert_eq!(
            table.create_type(TypeDesc {
                element: ty,
                dim_x: 4,
                dim_y: 0,
                mips: false,
            }),
            Err(ResourceError::WrongClass(ty))
        );
    }

    #[test]
    fn the_byte_budget_is_enforced_and_released() {
        let mut table = ResourceTable::new(64);
        let element = table.create_element(scalar(DataType::U32)).unwrap();
        let ty = table
            .create_type(TypeDesc {
                element,
                dim_x: 4,
                dim_y: 4,
                mips: false,
            })
            .unwrap();

        let first = table.create_allocation(ty).unwrap();
        assert_eq!(table.bytes_used(), 64);
        assert_eq!(
            table.create_allocation(ty),
            Err(ResourceError::BudgetExceeded {
                requested: 64,
                budget: 64,
            })
        );

        table.destroy(first).unwrap();
        assert_eq!(table.bytes_used(), 0);
        assert!(table.create_allocation(ty).is_ok());
    }

    #[test]
    fn allocations_start_zeroed_and_bound_writes() {
        let mut table = ResourceTable::new(1 << 10);
        let element = table.create_element(scalar(DataType::U8)).unwrap();
        let ty = table
            .create_type(TypeDesc {
                element,
                dim_x: 8,
                dim_y: 0,
                mips: false,
            })
            .unwrap();
        let allocation = table.create_allocation(ty).unwrap();

        assert_eq!(table.allocation(allocation).unwrap().data, vec![0; 8]);

        table.allocation_data(allocation, 2, &[7, 8, 9]).unwrap();
        assert_eq!(
            table.allocation(allocation).unwrap().data,
            vec![0, 0, 7, 8, 9, 0, 0, 0]
        );
        assert_eq!(
            table.allocation_data(allocation, 6, &[1, 2, 3]),
            Err(ResourceError::OutOfBounds)
        );
    }

    #[test]
    fn recycled_slots_invalidate_old_handles() {
        let mut table = ResourceTable::new(0);
        let first = table.create_element(scalar(DataType::U8)).unwrap();
        table.destroy(first).unwrap();
        assert_eq!(
            table.element(first),
            Err(ResourceError::StaleResource(first))
        );

        let second = table.create_element(scalar(DataType::U16)).unwrap();
        assert_eq!(second.index(), first.index(), "slot is reused");
        assert_ne!(second.generation(), first.generation());
        assert_eq!(
            table.element(first),
            Err(ResourceError::StaleResource(first))
        );
        assert_eq!(table.element(second), Ok(&scalar(DataType::U16)));
        assert_eq!(table.live_count(), 1);
    }
}
