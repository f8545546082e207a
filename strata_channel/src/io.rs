// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Two-ring protocol between client threads and the core worker.
//!
//! [`connect`] builds a pair of [`CommandRing`]s, one per direction, and
//! splits them into the [`ClientIo`] and [`CoreIo`] endpoints. Each ring
//! payload carries its own header: core-bound frames lead with
//! [`CoreHeader`], client-bound frames with [`ClientHeader`]. Replies
//! are matched to callers through per-call tokens; the token travels to
//! the core as the first four bytes of a [`call`](ClientIo::call)
//! payload and comes back in [`ClientHeader::user_id`].
//!
//! Malformed frames never tear the channel down. The core surfaces them
//! as [`CoreEvent::Malformed`] so the worker can trace the drop; the
//! client counts them in [`dropped_frames`](ClientIo::dropped_frames).

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};

use crate::ring::{CommandReader, CommandRing, CommandWriter, Received};

/// Client-bound message kind: an unsolicited error code.
pub const KIND_ERROR: u32 = 1;
/// Client-bound message kind: a reply to a [`ClientIo::call`].
pub const KIND_REPLY: u32 = 2;
/// Client-bound message kind: a user message routed by `user_id`.
pub const KIND_USER: u32 = 3;

/// Transport id for every protocol frame on both rings.
const FRAME_ID: u16 = 1;

const CORE_HEADER_BYTES: usize = size_of::<CoreHeader>();
const CLIENT_HEADER_BYTES: usize = size_of::<ClientHeader>();

/// Leading header of every core-bound frame.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct CoreHeader {
    /// Command selector, interpreted by the worker's dispatch table.
    pub cmd: u32,
    /// Number of argument bytes following the header.
    pub bytes: u32,
}

/// Leading header of every client-bound frame.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct ClientHeader {
    /// One of [`KIND_ERROR`], [`KIND_REPLY`], [`KIND_USER`].
    pub kind: u32,
    /// Number of data bytes following the header.
    pub bytes: u32,
    /// Reply token for replies, routing id for user messages, 0 for
    /// unsolicited errors.
    pub user_id: u32,
}

/// Failure of a blocking client operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoError {
    /// The deadline elapsed before the matching reply arrived.
    TimedOut,
    /// The channel was shut down.
    ShutDown,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut => write!(f, "timed out waiting for the core"),
            Self::ShutDown => write!(f, "channel is shut down"),
        }
    }
}

impl std::error::Error for IoError {}

/// A decoded client-bound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoMessage {
    /// One of [`KIND_ERROR`], [`KIND_REPLY`], [`KIND_USER`].
    pub kind: u32,
    /// Reply token or user routing id.
    pub user_id: u32,
    /// The frame data.
    pub data: Vec<u8>,
}

/// A decoded core-bound frame, as seen by the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreEvent {
    /// A well-formed command.
    Command {
        /// Command selector from the [`CoreHeader`].
        cmd: u32,
        /// Argument bytes (for calls: reply token first).
        args: Vec<u8>,
    },
    /// The timeout elapsed with nothing queued.
    Empty,
    /// The client side shut the channel down.
    ShutDown,
    /// A frame that failed validation and was dropped.
    Malformed {
        /// Which check rejected the frame.
        reason: &'static str,
    },
}

/// Builds the two rings and returns the client and core endpoints.
///
/// Capacities are in 32-bit words per direction; each must be at least
/// large enough that the biggest frame fits in half the ring.
pub fn connect(core_capacity: usize, client_capacity: usize) -> (ClientIo, CoreIo) {
    let (core_writer, core_reader) = CommandRing::with_capacity(core_capacity);
    let (client_writer, client_reader) = CommandRing::with_capacity(client_capacity);
    let client = ClientIo {
        writer: core_writer,
        reader: client_reader,
        next_token: 1,
        pending: VecDeque::new(),
        dropped: 0,
    };
    let core = CoreIo {
        reader: core_reader,
        writer: client_writer,
    };
    (client, core)
}

/// Client endpoint: commands out, replies and messages in.
///
/// `Send` but not `Sync`; a runtime shared by several client threads
/// serializes access with a mutex around this handle.
#[derive(Debug)]
pub struct ClientIo {
    writer: CommandWriter,
    reader: CommandReader,
    next_token: u32,
    pending: VecDeque<IoMessage>,
    dropped: u64,
}

impl ClientIo {
    /// Sends a command without waiting.
    pub fn send(&mut self, cmd: u32, args: &[u8]) {
        let frame = frame(&CoreHeader { cmd, bytes: data_len(args) }, &[], args);
        self.writer.commit(FRAME_ID, &frame);
    }

    /// Sends a command and returns once the worker has dispatched it.
    pub fn send_sync(&mut self, cmd: u32, args: &[u8]) {
        let frame = frame(&CoreHeader { cmd, bytes: data_len(args) }, &[], args);
        self.writer.commit_sync(FRAME_ID, &frame);
    }

    /// Sends a command and blocks for its reply.
    ///
    /// A fresh token is written ahead of `args`; the worker hands it
    /// back through [`CoreIo::reply`]. Client-bound frames that are not
    /// the awaited reply are buffered for [`poll_message`](Self::poll_message).
    pub fn call(
        &mut self,
        cmd: u32,
        args: &[u8],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, IoError> {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        if self.next_token == 0 {
            self.next_token = 1;
        }
        let header = CoreHeader { cmd, bytes: 4 + data_len(args) };
        let request = frame(&header, &token.to_le_bytes(), args);
        self.writer.commit(FRAME_ID, &request);

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let wait = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(IoError::TimedOut);
                    }
                    Some(deadline - now)
                }
            };
            match self.read_frame(wait)? {
                Some(message) if message.kind == KIND_REPLY && message.user_id == token => {
                    return Ok(message.data);
                }
                Some(message) => self.pending.push_back(message),
                None => {}
            }
        }
    }

    /// Returns the next buffered or queued client-bound message.
    pub fn poll_message(&mut self, timeout: Option<Duration>) -> Option<IoMessage> {
        if let Some(message) = self.pending.pop_front() {
            return Some(message);
        }
        self.read_frame(timeout).ok().flatten()
    }

    /// Shuts down the core-bound ring and wakes the worker.
    pub fn shutdown(&mut self) {
        self.writer.shutdown();
    }

    /// Number of malformed client-bound frames dropped so far.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Reads and decodes one client-bound frame. `Ok(None)` means the
    /// timeout elapsed or a malformed frame was dropped.
    fn read_frame(&mut self, timeout: Option<Duration>) -> Result<Option<IoMessage>, IoError> {
        let message = match self.reader.get(timeout) {
            Received::Command { id, payload } => decode_client_frame(id, payload),
            Received::Empty => return Ok(None),
            Received::ShutDown => return Err(IoError::ShutDown),
        };
        self.reader.next();
        if message.is_none() {
            self.dropped += 1;
        }
        Ok(message)
    }
}

/// Worker endpoint: commands in, replies and messages out.
#[derive(Debug)]
pub struct CoreIo {
    reader: CommandReader,
    writer: CommandWriter,
}

impl CoreIo {
    /// Fetches the next command without consuming it.
    ///
    /// The caller dispatches the command and then calls
    /// [`finish`](Self::finish); that ordering is what lets
    /// [`ClientIo::send_sync`] mean "fully processed". Malformed frames
    /// are consumed here and reported as [`CoreEvent::Malformed`].
    pub fn receive(&mut self, timeout: Option<Duration>) -> CoreEvent {
        let decoded = match self.reader.get(timeout) {
            Received::Command { id, payload } => decode_core_frame(id, payload),
            Received::Empty => return CoreEvent::Empty,
            Received::ShutDown => return CoreEvent::ShutDown,
        };
        match decoded {
            Ok(event) => event,
            Err(reason) => {
                self.reader.next();
                CoreEvent::Malformed { reason }
            }
        }
    }

    /// Consumes the command returned by the last [`receive`](Self::receive).
    pub fn finish(&mut self) {
        self.reader.next();
    }

    /// Sends a reply for the call that carried `token`.
    pub fn reply(&mut self, token: u32, data: &[u8]) {
        self.post(KIND_REPLY, token, data);
    }

    /// Posts an unsolicited error code to the client side.
    pub fn post_error(&mut self, code: u32) {
        self.post(KIND_ERROR, 0, &code.to_le_bytes());
    }

    /// Posts a user message routed by `user_id`.
    pub fn post_message(&mut self, user_id: u32, data: &[u8]) {
        self.post(KIND_USER, user_id, data);
    }

    /// Shuts down the client-bound ring, failing any blocked call.
    pub fn shutdown(&mut self) {
        self.writer.shutdown();
    }

    fn post(&mut self, kind: u32, user_id: u32, data: &[u8]) {
        let header = ClientHeader { kind, bytes: data_len(data), user_id };
        let frame = frame(&header, &[], data);
        self.writer.commit(FRAME_ID, &frame);
    }
}

fn frame<H: Pod>(header: &H, prefix: &[u8], data: &[u8]) -> Vec<u8> {
    let header = bytemuck::bytes_of(header);
    let mut frame = Vec::with_capacity(header.len() + prefix.len() + data.len());
    frame.extend_from_slice(header);
    frame.extend_from_slice(prefix);
    frame.extend_from_slice(data);
    frame
}

fn data_len(data: &[u8]) -> u32 {
    let Ok(len) = u32::try_from(data.len()) else {
        panic!("frame data of {} bytes exceeds the length field", data.len());
    };
    len
}

fn decode_client_frame(id: u16, payload: &[u8]) -> Option<IoMessage> {
    if id != FRAME_ID || payload.len() < CLIENT_HEADER_BYTES {
        return None;
    }
    let header: ClientHeader = bytemuck::pod_read_unaligned(&payload[..CLIENT_HEADER_BYTES]);
    if header.bytes as usize != payload.len() - CLIENT_HEADER_BYTES {
        return None;
    }
    Some(IoMessage {
        kind: header.kind,
        user_id: header.user_id,
        data: payload[CLIENT_HEADER_BYTES..].to_vec(),
    })
}

fn decode_core_frame(id: u16, payload: &[u8]) -> Result<CoreEvent, &'static str> {
    if id != FRAME_ID {
        return Err("unexpected transport command");
    }
    if payload.len() < CORE_HEADER_BYTES {
        return Err("short header");
    }
    let header: CoreHeader = bytemuck::pod_read_unaligned(&payload[..CORE_HEADER_BYTES]);
    if header.bytes as usize != payload.len() - CORE_HEADER_BYTES {
        return Err("length mismatch");
    }
    Ok(CoreEvent::Command {
        cmd: header.cmd,
        args: payload[CORE_HEADER_BYTES..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    const ECHO: u32 = 42;
    const CHAT: u32 = 43;

    /// Minimal worker: echoes call payloads reversed, `CHAT` posts a
    /// user message before replying.
    fn spawn_echo_worker(mut core: CoreIo) -> thread::JoinHandle<()> {
        thread::spawn(move || loop {
            match core.receive(None) {
                CoreEvent::Command { cmd, args } => {
                    let token = u32::from_le_bytes(args[..4].try_into().unwrap());
                    if cmd == CHAT {
                        core.post_message(9, b"aside");
                    }
                    let mut data = args[4..].to_vec();
                    data.reverse();
                    core.reply(token, &data);
                    core.finish();
                }
                CoreEvent::ShutDown => return,
                CoreEvent::Empty | CoreEvent::Malformed { .. } => {
                    core.finish();
                }
            }
        })
    }

    #[test]
    fn call_round_trips_a_reply() {
        let (mut client, core) = connect(256, 256);
        let worker = spawn_echo_worker(core);
        let reply = client.call(ECHO, b"abc", Some(Duration::from_secs(5)));
        assert_eq!(reply, Ok(b"cba".to_vec()));
        client.shutdown();
        worker.join().unwrap();
    }

    #[test]
    fn unrelated_messages_buffer_during_a_call() {
        let (mut client, core) = connect(256, 256);
        let worker = spawn_echo_worker(core);
        let reply = client.call(CHAT, b"hi", Some(Duration::from_secs(5)));
        assert_eq!(reply, Ok(b"ih".to_vec()));
        let aside = client.poll_message(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(aside.kind, KIND_USER);
        assert_eq!(aside.user_id, 9);
        assert_eq!(aside.data, b"aside");
        client.shutdown();
        worker.join().unwrap();
    }

    #[test]
    fn malformed_frames_drop_without_tearing_down() {
        let (mut client, mut core) = connect(256, 256);

        client.writer.commit(FRAME_ID, &[1, 2, 3]);
        assert_eq!(core.receive(None), CoreEvent::Malformed { reason: "short header" });

        client.writer.commit(7, b"not a protocol frame at all");
        assert_eq!(
            core.receive(None),
            CoreEvent::Malformed { reason: "unexpected transport command" }
        );

        let lying = CoreHeader { cmd: 5, bytes: 99 };
        client.writer.commit(FRAME_ID, &frame(&lying, &[], b"xy"));
        assert_eq!(
            core.receive(None),
            CoreEvent::Malformed { reason: "length mismatch" }
        );

        client.send(5, b"ok");
        assert_eq!(
            core.receive(None),
            CoreEvent::Command { cmd: 5, args: b"ok".to_vec() }
        );
        core.finish();
    }

    #[test]
    fn post_error_reaches_the_client() {
        let (mut client, mut core) = connect(64, 64);
        core.post_error(0x1001);
        let message = client.poll_message(Some(Duration::from_secs(1))).unwrap();
        assert_eq!(message.kind, KIND_ERROR);
        assert_eq!(message.user_id, 0);
        assert_eq!(message.data, 0x1001_u32.to_le_bytes());
    }

    #[test]
    fn client_shutdown_surfaces_to_the_core() {
        let (mut client, mut core) = connect(64, 64);
        client.send(1, b"");
        client.shutdown();
        assert_eq!(core.receive(None), CoreEvent::Command { cmd: 1, args: Vec::new() });
        core.finish();
        assert_eq!(core.receive(None), CoreEvent::ShutDown);
    }

    #[test]
    fn core_shutdown_fails_a_blocked_call() {
        let (mut client, mut core) = connect(64, 64);
        core.shutdown();
        let reply = client.call(1, b"", Some(Duration::from_secs(5)));
        assert_eq!(reply, Err(IoError::ShutDown));
    }
}
