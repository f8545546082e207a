// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The closed command set between client threads and the worker.
//!
//! Every command is a stable u32 id plus a `bytemuck`-encoded argument
//! struct, little-endian on the wire. [`decode`] turns a raw
//! `(cmd, args)` pair into a [`CoreCommand`]; any validation failure is
//! a `&'static str` reason the worker traces before dropping the
//! command as a no-op. Commands answered with a reply
//! ([`CREATE_LAYER`], the resource creations, and a synchronous
//! [`COMMIT_TRANSACTION`]) carry their reply token as the first four
//! argument bytes, where [`ClientIo::call`](strata_channel::io::ClientIo::call)
//! puts it.

use bytemuck::{Pod, Zeroable};
use strata_core::geometry::{Point, Rect};
use strata_core::layer::{LayerFlags, LayerId};
use strata_core::region::Region;
use strata_core::transform::Transform;

use crate::resources::{DataKind, DataType, Element, ResourceId, TypeDesc};

// -- Command ids --

/// Creates a layer; replies with its [`RawLayerId`] (empty on failure).
pub const CREATE_LAYER: u32 = 1;
/// Adds an external reference to a layer.
pub const RETAIN_LAYER: u32 = 2;
/// Drops an external reference; the last one takes the layer down.
pub const RELEASE_LAYER: u32 = 3;
/// Removes a layer from composition.
pub const REMOVE_LAYER: u32 = 4;
/// Latches a new position for the next committed transaction.
pub const SET_POSITION: u32 = 5;
/// Latches a new size.
pub const SET_SIZE: u32 = 6;
/// Latches a new stacking order.
pub const SET_Z: u32 = 7;
/// Latches a new layer-wide opacity.
pub const SET_ALPHA: u32 = 8;
/// Latches new behavior flags.
pub const SET_FLAGS: u32 = 9;
/// Latches a new content transform.
pub const SET_TRANSFORM: u32 = 10;
/// Latches a new transparent-region hint.
pub const SET_TRANSPARENT_HINT: u32 = 11;
/// Applies every latched mutation at the next frame; replies when the
/// leading token is nonzero.
pub const COMMIT_TRANSACTION: u32 = 12;
/// Suspends presentation.
pub const FREEZE_DISPLAY: u32 = 13;
/// Resumes presentation.
pub const UNFREEZE_DISPLAY: u32 = 14;
/// Requests a compositor frame once the queue drains.
pub const SIGNAL_FRAME: u32 = 15;
/// Creates an element; replies with its [`RawResourceId`].
pub const CREATE_ELEMENT: u32 = 16;
/// Creates a type; replies with its [`RawResourceId`].
pub const CREATE_TYPE: u32 = 17;
/// Creates a zero-filled allocation; replies with its [`RawResourceId`].
pub const CREATE_ALLOCATION: u32 = 18;
/// Writes bytes into an allocation.
pub const ALLOCATION_DATA: u32 = 19;
/// Destroys a resource.
pub const DESTROY_RESOURCE: u32 = 20;
/// Exits the worker loop.
pub const QUIT: u32 = 21;

// -- Layer flag bits --

/// Wire bit for [`LayerFlags::hidden`].
pub const FLAG_HIDDEN: u32 = 1;
/// Wire bit for [`LayerFlags::opaque`].
pub const FLAG_OPAQUE: u32 = 1 << 1;
/// Wire bit for [`LayerFlags::secure`].
pub const FLAG_SECURE: u32 = 1 << 2;

/// Packs layer flags into their wire bits.
#[must_use]
pub const fn layer_flag_bits(flags: LayerFlags) -> u32 {
    let mut bits = 0;
    if flags.hidden {
        bits |= FLAG_HIDDEN;
    }
    if flags.opaque {
        bits |= FLAG_OPAQUE;
    }
    if flags.secure {
        bits |= FLAG_SECURE;
    }
    bits
}

/// Unpacks wire bits into layer flags. Unknown bits are rejected.
#[must_use]
pub const fn layer_flags_from_bits(bits: u32) -> Option<LayerFlags> {
    if bits & !(FLAG_HIDDEN | FLAG_OPAQUE | FLAG_SECURE) != 0 {
        return None;
    }
    Some(LayerFlags {
        hidden: bits & FLAG_HIDDEN != 0,
        opaque: bits & FLAG_OPAQUE != 0,
        secure: bits & FLAG_SECURE != 0,
    })
}

// -- Argument structs --

/// A [`LayerId`] in wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawLayerId {
    /// Slot index.
    pub index: u32,
    /// Generation counter.
    pub generation: u32,
}

impl From<LayerId> for RawLayerId {
    fn from(id: LayerId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

impl From<RawLayerId> for LayerId {
    fn from(raw: RawLayerId) -> Self {
        Self::from_raw(raw.index, raw.generation)
    }
}

/// A [`ResourceId`] in wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawResourceId {
    /// Slot index.
    pub index: u32,
    /// Generation counter.
    pub generation: u32,
}

impl From<ResourceId> for RawResourceId {
    fn from(id: ResourceId) -> Self {
        Self {
            index: id.index(),
            generation: id.generation(),
        }
    }
}

impl From<RawResourceId> for ResourceId {
    fn from(raw: RawResourceId) -> Self {
        Self::from_raw(raw.index, raw.generation)
    }
}

/// Arguments of [`CREATE_LAYER`] (after the reply token).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CreateLayerArgs {
    /// Content width in pixels.
    pub width: u32,
    /// Content height in pixels.
    pub height: u32,
    /// Layer flag bits.
    pub flags: u32,
    /// Buffer slots in the layer's pool.
    pub slot_count: u32,
}

/// Arguments of [`SET_POSITION`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SetPositionArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// New left edge.
    pub x: i32,
    /// New top edge.
    pub y: i32,
}

/// Arguments of [`SET_SIZE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SetSizeArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// New width in pixels.
    pub width: u32,
    /// New height in pixels.
    pub height: u32,
}

/// Arguments of [`SET_Z`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SetZArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// New stacking order.
    pub z: u32,
}

/// Arguments of [`SET_ALPHA`].
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SetAlphaArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// New opacity in `[0, 1]`.
    pub alpha: f32,
}

/// Arguments of [`SET_FLAGS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SetFlagsArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// New flag bits.
    pub flags: u32,
}

/// Arguments of [`SET_TRANSFORM`]: the top two rows of the matrix,
/// `[a, b, tx, c, d, ty]`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SetTransformArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// Matrix coefficients.
    pub coeffs: [f32; 6],
}

/// Fixed prefix of [`SET_TRANSPARENT_HINT`]; `rect_count` rects follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SetTransparentHintArgs {
    /// Target layer.
    pub layer: RawLayerId,
    /// Number of trailing [`RawRect`] entries.
    pub rect_count: u32,
}

/// A rect in wire form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawRect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

/// Arguments of [`CREATE_ELEMENT`] (after the reply token).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CreateElementArgs {
    /// [`DataType`] wire value.
    pub data_type: u32,
    /// [`DataKind`] wire value.
    pub data_kind: u32,
    /// Components per cell.
    pub vector_size: u32,
    /// Nonzero for normalized fixed-point interpretation.
    pub normalized: u32,
}

/// Arguments of [`CREATE_TYPE`] (after the reply token).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CreateTypeArgs {
    /// The cell element.
    pub element: RawResourceId,
    /// X dimension in cells.
    pub dim_x: u32,
    /// Y dimension in cells (0 for one-dimensional types).
    pub dim_y: u32,
    /// Nonzero to allocate a full mip chain.
    pub mips: u32,
}

/// Fixed prefix of [`ALLOCATION_DATA`]; the bytes to write follow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct AllocationDataArgs {
    /// Target allocation.
    pub allocation: RawResourceId,
    /// Byte offset of the write.
    pub offset: u32,
}

// -- Decoded commands --

/// A validated, decoded command, ready for the worker's dispatch match.
#[derive(Clone, Debug, PartialEq)]
pub enum CoreCommand {
    /// Create a layer and reply with its handle.
    CreateLayer {
        /// Reply token.
        token: u32,
        /// Content width in pixels.
        width: u32,
        /// Content height in pixels.
        height: u32,
        /// Behavior flags.
        flags: LayerFlags,
        /// Buffer slots in the layer's pool.
        slot_count: usize,
    },
    /// Add an external reference.
    RetainLayer {
        /// Target layer.
        layer: LayerId,
    },
    /// Drop an external reference.
    ReleaseLayer {
        /// Target layer.
        layer: LayerId,
    },
    /// Remove a layer from composition.
    RemoveLayer {
        /// Target layer.
        layer: LayerId,
    },
    /// Latch a new position.
    SetPosition {
        /// Target layer.
        layer: LayerId,
        /// New top-left corner.
        position: Point,
    },
    /// Latch a new size.
    SetSize {
        /// Target layer.
        layer: LayerId,
        /// New width in pixels.
        width: u32,
        /// New height in pixels.
        height: u32,
    },
    /// Latch a new stacking order.
    SetZ {
        /// Target layer.
        layer: LayerId,
        /// New stacking order.
        z: u32,
    },
    /// Latch a new opacity.
    SetAlpha {
        /// Target layer.
        layer: LayerId,
        /// New opacity in `[0, 1]`.
        alpha: f32,
    },
    /// Latch new behavior flags.
    SetFlags {
        /// Target layer.
        layer: LayerId,
        /// New flags.
        flags: LayerFlags,
    },
    /// Latch a new content transform.
    SetTransform {
        /// Target layer.
        layer: LayerId,
        /// New transform.
        transform: Transform,
    },
    /// Latch a new transparent-region hint.
    SetTransparentHint {
        /// Target layer.
        layer: LayerId,
        /// Content-space region promised fully transparent.
        hint: Region,
    },
    /// Apply every latched mutation at the next frame.
    CommitTransaction {
        /// Reply token, 0 when no acknowledgement is wanted.
        sync_token: u32,
    },
    /// Suspend presentation.
    FreezeDisplay,
    /// Resume presentation.
    UnfreezeDisplay,
    /// Run a frame once the queue drains.
    SignalFrame,
    /// Create an element and reply with its handle.
    CreateElement {
        /// Reply token.
        token: u32,
        /// The element to create.
        element: Element,
    },
    /// Create a type and reply with its handle.
    CreateType {
        /// Reply token.
        token: u32,
        /// The type to create.
        desc: TypeDesc,
    },
    /// Create a zero-filled allocation and reply with its handle.
    CreateAllocation {
        /// Reply token.
        token: u32,
        /// The allocation's type.
        type_desc: ResourceId,
    },
    /// Write bytes into an allocation.
    AllocationData {
        /// Target allocation.
        allocation: ResourceId,
        /// Byte offset of the write.
        offset: usize,
        /// The bytes to write.
        data: Vec<u8>,
    },
    /// Destroy a resource.
    DestroyResource {
        /// Target resource.
        resource: ResourceId,
    },
    /// Exit the worker loop.
    Quit,
}

/// Decodes and validates one command.
///
/// The error is the reason a malformed command was dropped; the worker
/// traces it and continues.
pub fn decode(cmd: u32, args: &[u8]) -> Result<CoreCommand, &'static str> {
    match cmd {
        CREATE_LAYER => {
            let (token, rest) = split_token(args)?;
            let raw: CreateLayerArgs = read_pod(rest)?;
            let Some(flags) = layer_flags_from_bits(raw.flags) else {
                return Err("unknown layer flags");
            };
            // Slot pools reject counts outside 2..=32 by panicking;
            // keep that unreachable from the wire.
            if !(2..=32).contains(&raw.slot_count) {
                return Err("bad slot count");
            }
            Ok(CoreCommand::CreateLayer {
                token,
                width: raw.width,
                height: raw.height,
                flags,
                slot_count: raw.slot_count as usize,
            })
        }
        RETAIN_LAYER => Ok(CoreCommand::RetainLayer {
            layer: read_pod::<RawLayerId>(args)?.into(),
        }),
        RELEASE_LAYER => Ok(CoreCommand::ReleaseLayer {
            layer: read_pod::<RawLayerId>(args)?.into(),
        }),
        REMOVE_LAYER => Ok(CoreCommand::RemoveLayer {
            layer: read_pod::<RawLayerId>(args)?.into(),
        }),
        SET_POSITION => {
            let raw: SetPositionArgs = read_pod(args)?;
            Ok(CoreCommand::SetPosition {
                layer: raw.layer.into(),
                position: Point::new(raw.x, raw.y),
            })
        }
        SET_SIZE => {
            let raw: SetSizeArgs = read_pod(args)?;
            Ok(CoreCommand::SetSize {
                layer: raw.layer.into(),
                width: raw.width,
                height: raw.height,
            })
        }
        SET_Z => {
            let raw: SetZArgs = read_pod(args)?;
            Ok(CoreCommand::SetZ {
                layer: raw.layer.into(),
                z: raw.z,
            })
        }
        SET_ALPHA => {
            let raw: SetAlphaArgs = read_pod(args)?;
            if !raw.alpha.is_finite() {
                return Err("non-finite alpha");
            }
            Ok(CoreCommand::SetAlpha {
                layer: raw.layer.into(),
                alpha: raw.alpha,
            })
        }
        SET_FLAGS => {
            let raw: SetFlagsArgs = read_pod(args)?;
            let Some(flags) = layer_flags_from_bits(raw.flags) else {
                return Err("unknown layer flags");
            };
            Ok(CoreCommand::SetFlags {
                layer: raw.layer.into(),
                flags,
            })
        }
        SET_TRANSFORM => {
            let raw: SetTransformArgs = read_pod(args)?;
            if raw.coeffs.iter().any(|c| !c.is_finite()) {
                return Err("non-finite transform");
            }
            let [a, b, tx, c, d, ty] = raw.coeffs;
            Ok(CoreCommand::SetTransform {
                layer: raw.layer.into(),
                transform: Transform::from_rows([[a, b, tx], [c, d, ty], [0.0, 0.0, 1.0]]),
            })
        }
        SET_TRANSPARENT_HINT => {
            let fixed_len = size_of::<SetTransparentHintArgs>();
            if args.len() < fixed_len {
                return Err("argument length mismatch");
            }
            let raw: SetTransparentHintArgs = read_pod(&args[..fixed_len])?;
            let rects = &args[fixed_len..];
            let expected = (raw.rect_count as usize).checked_mul(size_of::<RawRect>());
            if expected != Some(rects.len()) {
                return Err("hint rect count mismatch");
            }
            let mut hint = Region::new();
            for chunk in rects.chunks_exact(size_of::<RawRect>()) {
                let r: RawRect = bytemuck::pod_read_unaligned(chunk);
                hint.or_rect(Rect::new(r.left, r.top, r.right, r.bottom));
            }
            Ok(CoreCommand::SetTransparentHint {
                layer: raw.layer.into(),
                hint,
            })
        }
        COMMIT_TRANSACTION => match args.len() {
            0 => Ok(CoreCommand::CommitTransaction { sync_token: 0 }),
            4 => {
                let (sync_token, _) = split_token(args)?;
                Ok(CoreCommand::CommitTransaction { sync_token })
            }
            _ => Err("bad commit payload"),
        },
        FREEZE_DISPLAY => no_args(args, CoreCommand::FreezeDisplay),
        UNFREEZE_DISPLAY => no_args(args, CoreCommand::UnfreezeDisplay),
        SIGNAL_FRAME => no_args(args, CoreCommand::SignalFrame),
        CREATE_ELEMENT => {
            let (token, rest) = split_token(args)?;
            let raw: CreateElementArgs = read_pod(rest)?;
            let Some(data_type) = DataType::from_raw(raw.data_type) else {
                return Err("bad data type");
            };
            let Some(data_kind) = DataKind::from_raw(raw.data_kind) else {
                return Err("bad data kind");
            };
            Ok(CoreCommand::CreateElement {
                token,
                element: Element {
                    data_type,
                    data_kind,
                    vector_size: raw.vector_size,
                    normalized: raw.normalized != 0,
                },
            })
        }
        CREATE_TYPE => {
            let (token, rest) = split_token(args)?;
            let raw: CreateTypeArgs = read_pod(rest)?;
            Ok(CoreCommand::CreateType {
                token,
                desc: TypeDesc {
                    element: raw.element.into(),
                    dim_x: raw.dim_x,
                    dim_y: raw.dim_y,
                    mips: raw.mips != 0,
                },
            })
        }
        CREATE_ALLOCATION => {
            let (token, rest) = split_token(args)?;
            Ok(CoreCommand::CreateAllocation {
                token,
                type_desc: read_pod::<RawResourceId>(rest)?.into(),
            })
        }
        ALLOCATION_DATA => {
            let fixed_len = size_of::<AllocationDataArgs>();
            if args.len() < fixed_len {
                return Err("argument length mismatch");
            }
            let raw: AllocationDataArgs = read_pod(&args[..fixed_len])?;
            Ok(CoreCommand::AllocationData {
                allocation: raw.allocation.into(),
                offset: raw.offset as usize,
                data: args[fixed_len..].to_vec(),
            })
        }
        DESTROY_RESOURCE => Ok(CoreCommand::DestroyResource {
            resource: read_pod::<RawResourceId>(args)?.into(),
        }),
        QUIT => no_args(args, CoreCommand::Quit),
        _ => Err("unknown command"),
    }
}

// -- Encode helpers for the variable-length commands --

/// Builds the [`SET_TRANSPARENT_HINT`] argument bytes.
///
/// # Panics
///
/// Panics if the hint has more rects than the count field can carry.
#[must_use]
pub fn transparent_hint_args(layer: LayerId, hint: &Region) -> Vec<u8> {
    let rects = hint.as_slice();
    let Ok(rect_count) = u32::try_from(rects.len()) else {
        panic!("hint of {} rects exceeds the count field", rects.len());
    };
    let fixed = SetTransparentHintArgs {
        layer: layer.into(),
        rect_count,
    };
    let mut args =
        Vec::with_capacity(size_of::<SetTransparentHintArgs>() + rects.len() * size_of::<RawRect>());
    args.extend_from_slice(bytemuck::bytes_of(&fixed));
    for r in rects {
        let raw = RawRect {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        };
        args.extend_from_slice(bytemuck::bytes_of(&raw));
    }
    args
}

/// Builds the [`ALLOCATION_DATA`] argument bytes.
///
/// # Panics
///
/// Panics if `offset` exceeds the wire offset field.
#[must_use]
pub fn allocation_data_args(allocation: ResourceId, offset: usize, data: &[u8]) -> Vec<u8> {
    let Ok(offset) = u32::try_from(offset) else {
        panic!("allocation write offset {offset} exceeds the offset field");
    };
    let fixed = AllocationDataArgs {
        allocation: allocation.into(),
        offset,
    };
    let mut args = Vec::with_capacity(size_of::<AllocationDataArgs>() + data.len());
    args.extend_from_slice(bytemuck::bytes_of(&fixed));
    args.extend_from_slice(data);
    args
}

/// Builds the [`SET_TRANSFORM`] argument struct from a transform.
#[must_use]
pub fn transform_args(layer: LayerId, transform: &Transform) -> SetTransformArgs {
    let rows = transform.rows();
    SetTransformArgs {
        layer: layer.into(),
        coeffs: [
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2],
        ],
    }
}

fn split_token(args: &[u8]) -> Result<(u32, &[u8]), &'static str> {
    let Some((token, rest)) = args.split_first_chunk::<4>() else {
        return Err("missing reply token");
    };
    Ok((u32::from_le_bytes(*token), rest))
}

fn read_pod<T: Pod>(bytes: &[u8]) -> Result<T, &'static str> {
    if bytes.len() != size_of::<T>() {
        return Err("argument length mismatch");
    }
    Ok(bytemuck::pod_read_unaligned(bytes))
}

fn no_args(args: &[u8], command: CoreCommand) -> Result<CoreCommand, &'static str> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err("unexpected arguments")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> LayerId {
        LayerId::from_raw(3, 7)
    }

    #[test]
    fn fixed_commands_round_trip() {
        let args = SetPositionArgs {
            layer: layer().into(),
            x: -4,
            y: 12,
        };
        assert_eq!(
            decode(SET_POSITION, bytemuck::bytes_of(&args)),
            Ok(CoreCommand::SetPosition {
                layer: layer(),
                position: Point::new(-4, 12),
            })
        );

        let args = SetZArgs {
            layer: layer().into(),
            z: 5,
        };
        assert_eq!(
            decode(SET_Z, bytemuck::bytes_of(&args)),
            Ok(CoreCommand::SetZ { layer: layer(), z: 5 })
        );
    }

    #[test]
    fn call_commands_lead_with_their_token() {
        let raw = CreateLayerArgs {
            width: 64,
            height: 32,
            flags: FLAG_OPAQUE | FLAG_SECURE,
            slot_count: 2,
        };
        let mut args = 9_u32.to_le_bytes().to_vec();
        args.extend_from_slice(bytemuck::bytes_of(&raw));

        assert_eq!(
            decode(CREATE_LAYER, &args),
            Ok(CoreCommand::CreateLayer {
                token: 9,
                width: 64,
                height: 32,
                flags: LayerFlags {
                    hidden: false,
                    opaque: true,
                    secure: true,
                },
                slot_count: 2,
            })
        );
        assert_eq!(decode(CREATE_LAYER, &args[..2]), Err("missing reply token"));

        let raw = CreateLayerArgs {
            slot_count: 1,
            ..raw
        };
        let mut args = 9_u32.to_le_bytes().to_vec();
        args.extend_from_slice(bytemuck::bytes_of(&raw));
        assert_eq!(decode(CREATE_LAYER, &args), Err("bad slot count"));
    }

    #[test]
    fn commit_accepts_plain_and_tokened_forms() {
        assert_eq!(
            decode(COMMIT_TRANSACTION, &[]),
            Ok(CoreCommand::CommitTransaction { sync_token: 0 })
        );
        assert_eq!(
            decode(COMMIT_TRANSACTION, &17_u32.to_le_bytes()),
            Ok(CoreCommand::CommitTransaction { sync_token: 17 })
        );
        assert_eq!(decode(COMMIT_TRANSACTION, &[1, 2, 3]), Err("bad commit payload"));
    }

    #[test]
    fn transparent_hint_round_trips() {
        let mut hint = Region::from_rect(Rect::new(0, 0, 10, 10));
        hint.or_rect(Rect::new(20, 20, 30, 40));

        let args = transparent_hint_args(layer(), &hint);
        assert_eq!(
            decode(SET_TRANSPARENT_HINT, &args),
            Ok(CoreCommand::SetTransparentHint {
                layer: layer(),
                hint,
            })
        );
    }

    #[test]
    fn hint_rect_count_must_match_the_payload() {
        let hint = Region::from_rect(Rect::new(0, 0, 10, 10));
        let mut args = transparent_hint_args(layer(), &hint);
        args[8] = 5;
        assert_eq!(
            decode(SET_TRANSPARENT_HINT, &args),
            Err("hint rect count mismatch")
        );
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        let args = SetFlagsArgs {
            layer: layer().into(),
            flags: FLAG_HIDDEN | (1 << 9),
        };
        assert_eq!(
            decode(SET_FLAGS, bytemuck::bytes_of(&args)),
            Err("unknown layer flags")
        );
    }

    #[test]
    fn transforms_round_trip_their_coefficients() {
        let transform =
            Transform::from_orientation(Transform::ROT_90).expect("discrete orientation");
        let args = transform_args(layer(), &transform);
        assert_eq!(
            decode(SET_TRANSFORM, bytemuck::bytes_of(&args)),
            Ok(CoreCommand::SetTransform {
                layer: layer(),
                transform,
            })
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let args = SetAlphaArgs {
            layer: layer().into(),
            alpha: f32::NAN,
        };
        assert_eq!(
            decode(SET_ALPHA, bytemuck::bytes_of(&args)),
            Err("non-finite alpha")
        );

        let mut args = transform_args(layer(), &Transform::identity());
        args.coeffs[2] = f32::INFINITY;
        assert_eq!(
            decode(SET_TRANSFORM, bytemuck::bytes_of(&args)),
            Err("non-finite transform")
        );
    }

    #[test]
    fn allocation_data_splits_prefix_and_payload() {
        let id = ResourceId::from_raw(2, 1);
        let args = allocation_data_args(id, 16, &[1, 2, 3]);
        assert_eq!(
            decode(ALLOCATION_DATA, &args),
            Ok(CoreCommand::AllocationData {
                allocation: id,
                offset: 16,
                data: vec![1, 2, 3],
            })
        );
    }

    #[test]
    fn zero_argument_commands_reject_payloads() {
        assert_eq!(decode(SIGNAL_FRAME, &[]), Ok(CoreCommand::SignalFrame));
        assert_eq!(decode(FREEZE_DISPLAY, b"x"), Err("unexpected arguments"));
        assert_eq!(decode(999, &[]), Err("unknown command"));
    }

    #[test]
    fn truncated_arguments_are_rejected() {
        let args = SetPositionArgs {
            layer: layer().into(),
            x: 0,
            y: 0,
        };
        let bytes = bytemuck::bytes_of(&args);
        assert_eq!(
            decode(SET_POSITION, &bytes[..bytes.len() - 1]),
            Err("argument length mismatch")
        );
    }
}
