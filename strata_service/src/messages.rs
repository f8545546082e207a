// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decoded core-to-client messages.

use strata_channel::io::{IoMessage, KIND_ERROR, KIND_REPLY, KIND_USER};

use crate::error::ErrorCode;

/// A message the core posted to the client ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientMessage {
    /// An asynchronous error the command stream raised.
    Error {
        /// The error code.
        code: ErrorCode,
    },
    /// The reply to a synchronous call.
    ///
    /// [`Runtime`](crate::runtime::Runtime) consumes these internally;
    /// one only reaches [`poll_message`](crate::runtime::Runtime::poll_message)
    /// if a call timed out before its reply arrived.
    Reply {
        /// Token the call carried.
        token: u32,
        /// The reply payload.
        data: Vec<u8>,
    },
    /// A user message posted outside the call protocol.
    User {
        /// Caller-chosen identifier.
        user_id: u32,
        /// The message payload.
        data: Vec<u8>,
    },
}

impl ClientMessage {
    /// Decodes a raw ring message.
    ///
    /// Returns `None` for unknown kinds and for error payloads that are
    /// not a single known code; a malformed core is not worth crashing
    /// the client over.
    #[must_use]
    pub fn from_io(message: IoMessage) -> Option<Self> {
        match message.kind {
            KIND_ERROR => {
                let raw = u32::from_le_bytes(message.data.try_into().ok()?);
                Some(Self::Error {
                    code: ErrorCode::from_raw(raw)?,
                })
            }
            KIND_REPLY => Some(Self::Reply {
                token: message.user_id,
                data: message.data,
            }),
            KIND_USER => Some(Self::User {
                user_id: message.user_id,
                data: message.data,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: u32, user_id: u32, data: &[u8]) -> IoMessage {
        IoMessage {
            kind,
            user_id,
            data: data.to_vec(),
        }
    }

    #[test]
    fn each_kind_maps_to_its_variant() {
        assert_eq!(
            ClientMessage::from_io(raw(KIND_ERROR, 0, &2u32.to_le_bytes())),
            Some(ClientMessage::Error {
                code: ErrorCode::BadSlot,
            })
        );
        assert_eq!(
            ClientMessage::from_io(raw(KIND_REPLY, 17, &[1, 2])),
            Some(ClientMessage::Reply {
                token: 17,
                data: vec![1, 2],
            })
        );
        assert_eq!(
            ClientMessage::from_io(raw(KIND_USER, 9, b"ping")),
            Some(ClientMessage::User {
                user_id: 9,
                data: b"ping".to_vec(),
            })
        );
    }

    #[test]
    fn unknown_kinds_and_codes_decode_to_none() {
        assert_eq!(ClientMessage::from_io(raw(99, 0, &[])), None);
        assert_eq!(
            ClientMessage::from_io(raw(KIND_ERROR, 0, &0xdead_0000u32.to_le_bytes())),
            None
        );
        assert_eq!(ClientMessage::from_io(raw(KIND_ERROR, 0, &[1, 0])), None);
    }
}
