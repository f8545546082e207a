// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-producer single-consumer command ring.
//!
//! The ring carries variable-length commands between two threads without
//! locking the data path. Storage is a boxed slice of [`AtomicU32`] words
//! with two monotone cursors: `put`, advanced only by the producer, and
//! `get`, advanced only by the consumer. The ring is empty exactly when
//! `put == get`, and the producer never lets the cursors collide from the
//! full side.
//!
//! Wire format: each command is one header word followed by its payload
//! packed little-endian into whole words, zero-padded to a 4-byte
//! boundary. The header packs `{cmd_id: u16, bytes: u16}` with the id in
//! the low half. Commands are always contiguous; when one would not fit
//! before the end of storage the producer writes a sentinel header with
//! id 0 at the tail and restarts at the origin. The sentinel is a
//! transport detail and is never surfaced to the consumer.
//!
//! Blocking is cooperative through two [`Signal`]s: the producer raises
//! `data` after publishing, the consumer raises `space` after advancing
//! `get`. Payload words are written and read relaxed; the publishing
//! `put` store is the release that makes them visible.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::signal::Signal;

/// Shared state of one ring direction.
///
/// Constructed through [`CommandRing::with_capacity`], which hands out
/// the producer and consumer halves. The halves are `Send` but not
/// `Sync`: exactly one thread may hold each side.
pub struct CommandRing {
    words: Box<[AtomicU32]>,
    put: AtomicUsize,
    get: AtomicUsize,
    shutdown: AtomicBool,
    data: Signal,
    space: Signal,
}

impl CommandRing {
    /// Creates a ring of `words` 32-bit words and splits it into its
    /// producer and consumer halves.
    ///
    /// # Panics
    ///
    /// Panics if `words < 4`; smaller rings cannot hold a single
    /// wrapped command.
    pub fn with_capacity(words: usize) -> (CommandWriter, CommandReader) {
        assert!(words >= 4, "a command ring needs at least 4 words");
        let ring = Arc::new(Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
            put: AtomicUsize::new(0),
            get: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            data: Signal::new(),
            space: Signal::new(),
        });
        let writer = CommandWriter {
            ring: Arc::clone(&ring),
            marker: PhantomData,
        };
        let reader = CommandReader {
            ring,
            scratch: Vec::new(),
            pending_words: 0,
            marker: PhantomData,
        };
        (writer, reader)
    }

    fn raise_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.data.set();
        self.space.set();
    }
}

impl fmt::Debug for CommandRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandRing(capacity={}, put={}, get={}, shutdown={})",
            self.words.len(),
            self.put.load(Ordering::Relaxed),
            self.get.load(Ordering::Relaxed),
            self.shutdown.load(Ordering::Relaxed),
        )
    }
}

/// One command as seen by the consumer.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<'a> {
    /// A command and its payload. The payload borrows the reader's
    /// scratch buffer and is valid until the next
    /// [`get`](CommandReader::get).
    Command {
        /// The command id passed to [`CommandWriter::commit`].
        id: u16,
        /// The payload bytes, exactly as committed.
        payload: &'a [u8],
    },
    /// The timeout elapsed with no command available.
    Empty,
    /// The ring was shut down and all queued commands have been drained.
    ShutDown,
}

/// Producer half of a [`CommandRing`].
///
/// Dropping the writer shuts the ring down, so a reader blocked in
/// [`get`](CommandReader::get) never waits on a producer that no longer
/// exists.
#[derive(Debug)]
pub struct CommandWriter {
    ring: Arc<CommandRing>,
    marker: PhantomData<Cell<()>>,
}

impl CommandWriter {
    /// Appends one command, blocking while the ring is too full.
    ///
    /// After [`shutdown`](Self::shutdown) this returns immediately and
    /// the command is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `id` is 0 (reserved for the wrap sentinel), if the
    /// payload exceeds the u16 length field, or if header plus padded
    /// payload exceed half the ring capacity. Commands larger than half
    /// the ring could deadlock against an empty ring, so the limit is a
    /// contract instead.
    pub fn commit(&mut self, id: u16, payload: &[u8]) {
        assert!(id != 0, "command id 0 is reserved for the wrap sentinel");
        let Ok(len) = u16::try_from(payload.len()) else {
            panic!("payload of {} bytes exceeds the u16 length field", payload.len());
        };
        let header = u32::from(id) | (u32::from(len) << 16);
        let need = 1 + payload.len().div_ceil(4);
        let capacity = self.ring.words.len();
        assert!(
            need <= capacity / 2,
            "command of {need} words exceeds half the ring capacity of {capacity}"
        );
        if self.ring.shutdown.load(Ordering::Acquire) {
            return;
        }
        loop {
            let put = self.ring.put.load(Ordering::Relaxed);
            let get = self.ring.get.load(Ordering::Acquire);
            if put >= get {
                let tail = capacity - put;
                if need < tail || (need == tail && get > 0) {
                    self.write_at(put, header, payload);
                    self.publish((put + need) % capacity);
                    return;
                }
                // Wrap once the consumer has left the origin region.
                if need > tail && get > need {
                    self.ring.words[put].store(0, Ordering::Relaxed);
                    self.write_at(0, header, payload);
                    self.publish(need);
                    return;
                }
            } else if need < get - put {
                self.write_at(put, header, payload);
                self.publish(put + need);
                return;
            }
            self.ring.space.wait(None);
            if self.ring.shutdown.load(Ordering::Acquire) {
                return;
            }
        }
    }

    /// [`commit`](Self::commit), then [`flush`](Self::flush).
    ///
    /// When this returns the consumer has advanced past the command,
    /// and because the consumer dispatches before advancing, the
    /// command has been fully processed.
    pub fn commit_sync(&mut self, id: u16, payload: &[u8]) {
        self.commit(id, payload);
        self.flush();
    }

    /// Blocks until the consumer has drained every queued command.
    ///
    /// Returns immediately after shutdown.
    pub fn flush(&mut self) {
        loop {
            if self.ring.shutdown.load(Ordering::Acquire) {
                return;
            }
            let put = self.ring.put.load(Ordering::Relaxed);
            let get = self.ring.get.load(Ordering::Acquire);
            if put == get {
                return;
            }
            self.ring.space.wait(None);
        }
    }

    /// Shuts the ring down and wakes both sides.
    ///
    /// Queued commands are still drained by the reader; subsequent
    /// commits are silent no-ops.
    pub fn shutdown(&mut self) {
        self.ring.raise_shutdown();
    }

    fn write_at(&self, pos: usize, header: u32, payload: &[u8]) {
        self.ring.words[pos].store(header, Ordering::Relaxed);
        for (offset, chunk) in payload.chunks(4).enumerate() {
            let mut word = [0_u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.ring.words[pos + 1 + offset].store(u32::from_le_bytes(word), Ordering::Relaxed);
        }
    }

    fn publish(&self, put: usize) {
        self.ring.put.store(put, Ordering::Release);
        self.ring.data.set();
    }
}

impl Drop for CommandWriter {
    fn drop(&mut self) {
        self.ring.raise_shutdown();
    }
}

/// Consumer half of a [`CommandRing`].
///
/// Dropping the reader shuts the ring down, so a producer blocked on a
/// full ring never waits on a consumer that no longer exists.
#[derive(Debug)]
pub struct CommandReader {
    ring: Arc<CommandRing>,
    scratch: Vec<u8>,
    pending_words: usize,
    marker: PhantomData<Cell<()>>,
}

impl CommandReader {
    /// Fetches the oldest queued command without consuming it.
    ///
    /// Blocks on the data signal, with `timeout` bounding the wait when
    /// given. Wrap sentinels are skipped transparently. The shared
    /// cursor is not advanced; callers dispatch the command and then
    /// call [`next`](Self::next), which is what gives
    /// [`commit_sync`](CommandWriter::commit_sync) its fully-processed
    /// meaning. Queued commands are drained before a shutdown is
    /// reported.
    ///
    /// # Panics
    ///
    /// Panics if the previous command was not consumed with
    /// [`next`](Self::next).
    pub fn get(&mut self, timeout: Option<Duration>) -> Received<'_> {
        assert!(
            self.pending_words == 0,
            "the previous command must be consumed with next() first"
        );
        loop {
            let put = self.ring.put.load(Ordering::Acquire);
            let pos = self.ring.get.load(Ordering::Relaxed);
            if put == pos {
                if self.ring.shutdown.load(Ordering::Acquire) {
                    return Received::ShutDown;
                }
                if !self.ring.data.wait(timeout) {
                    return Received::Empty;
                }
                continue;
            }
            let header = self.ring.words[pos].load(Ordering::Relaxed).to_le_bytes();
            let id = u16::from_le_bytes([header[0], header[1]]);
            if id == 0 {
                // Wrap sentinel: the tail is free again.
                self.ring.get.store(0, Ordering::Release);
                self.ring.space.set();
                continue;
            }
            let len = usize::from(u16::from_le_bytes([header[2], header[3]]));
            self.scratch.clear();
            let mut remaining = len;
            let mut word_pos = pos + 1;
            while remaining > 0 {
                let word = self.ring.words[word_pos].load(Ordering::Relaxed).to_le_bytes();
                let take = remaining.min(4);
                self.scratch.extend_from_slice(&word[..take]);
                word_pos += 1;
                remaining -= take;
            }
            self.pending_words = 1 + len.div_ceil(4);
            return Received::Command {
                id,
                payload: self.scratch.as_slice(),
            };
        }
    }

    /// Consumes the command returned by the last [`get`](Self::get).
    ///
    /// Advances the shared cursor and raises the space signal. A no-op
    /// when the last `get` returned [`Received::Empty`] or
    /// [`Received::ShutDown`].
    pub fn next(&mut self) {
        if self.pending_words == 0 {
            return;
        }
        let capacity = self.ring.words.len();
        let pos = self.ring.get.load(Ordering::Relaxed);
        self.ring
            .get
            .store((pos + self.pending_words) % capacity, Ordering::Release);
        self.pending_words = 0;
        self.ring.space.set();
    }
}

impl Drop for CommandReader {
    fn drop(&mut self) {
        self.ring.raise_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    fn payload_for(i: u32) -> Vec<u8> {
        let pattern = i.to_le_bytes();
        pattern.iter().copied().cycle().take((i % 9) as usize).collect()
    }

    #[test]
    fn commands_round_trip_ids_and_payloads() {
        let (mut writer, mut reader) = CommandRing::with_capacity(64);
        writer.commit(7, b"hello");
        writer.commit(9, b"");
        writer.commit(300, &[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(
            reader.get(None),
            Received::Command { id: 7, payload: b"hello" }
        );
        reader.next();
        assert_eq!(reader.get(None), Received::Command { id: 9, payload: b"" });
        reader.next();
        assert_eq!(
            reader.get(None),
            Received::Command { id: 300, payload: &[1, 2, 3, 4, 5, 6, 7, 8] }
        );
        reader.next();
        assert_eq!(reader.get(Some(Duration::ZERO)), Received::Empty);
    }

    #[test]
    fn wrap_sentinel_is_invisible_to_the_consumer() {
        // Capacity 8, commands of 3 words each: the third command does
        // not fit at the tail and must wrap through the sentinel.
        let (mut writer, mut reader) = CommandRing::with_capacity(8);
        for id in 1_u8..=2 {
            writer.commit(u16::from(id), &[id; 8]);
            assert_eq!(
                reader.get(None),
                Received::Command { id: u16::from(id), payload: &[id; 8] }
            );
            reader.next();
        }
        writer.commit(3, &[3_u8; 8]);
        assert_eq!(
            reader.get(None),
            Received::Command { id: 3, payload: &[3_u8; 8] }
        );
        reader.next();
        assert_eq!(reader.get(Some(Duration::ZERO)), Received::Empty);
    }

    #[test]
    fn commands_arrive_in_order_across_wraps() {
        let (mut writer, mut reader) = CommandRing::with_capacity(32);
        let producer = thread::spawn(move || {
            for i in 1..=500_u32 {
                let id = u16::try_from(i % 200 + 1).unwrap();
                writer.commit(id, &payload_for(i));
            }
        });
        for i in 1..=500_u32 {
            match reader.get(Some(Duration::from_secs(5))) {
                Received::Command { id, payload } => {
                    assert_eq!(id, u16::try_from(i % 200 + 1).unwrap(), "command {i} out of order");
                    assert_eq!(payload, payload_for(i), "payload {i} corrupted");
                }
                other => panic!("expected command {i}, got {other:?}"),
            }
            reader.next();
        }
        producer.join().unwrap();
        assert_eq!(reader.get(Some(Duration::ZERO)), Received::Empty);
    }

    #[test]
    fn a_full_ring_blocks_the_producer_until_space_frees() {
        // Three 3-word commands cannot coexist in an 8-word ring. The
        // wrap also needs the reader past the origin region, so one
        // drained command is still not enough.
        let (mut writer, mut reader) = CommandRing::with_capacity(8);
        writer.commit(1, &[1; 8]);
        writer.commit(2, &[2; 8]);

        let third_committed = Arc::new(AtomicBool::new(false));
        let producer = {
            let third_committed = Arc::clone(&third_committed);
            thread::spawn(move || {
                writer.commit(3, &[3; 8]);
                third_committed.store(true, Ordering::Release);
            })
        };

        thread::sleep(TICK);
        assert!(!third_committed.load(Ordering::Acquire), "producer should be blocked");

        assert!(matches!(reader.get(None), Received::Command { id: 1, .. }));
        reader.next();
        thread::sleep(TICK);
        assert!(
            !third_committed.load(Ordering::Acquire),
            "the wrapped command must wait for the origin region"
        );

        assert!(matches!(reader.get(None), Received::Command { id: 2, .. }));
        reader.next();
        producer.join().unwrap();
        assert!(third_committed.load(Ordering::Acquire));

        assert!(matches!(reader.get(None), Received::Command { id: 3, .. }));
        reader.next();
    }

    #[test]
    fn commit_sync_returns_after_the_command_is_consumed() {
        let (mut writer, mut reader) = CommandRing::with_capacity(64);
        let dispatched = Arc::new(Mutex::new(Vec::new()));
        let consumer = {
            let dispatched = Arc::clone(&dispatched);
            thread::spawn(move || loop {
                match reader.get(None) {
                    Received::Command { id, payload } => {
                        // Dispatch first, consume after: the ordering
                        // commit_sync callers rely on.
                        dispatched.lock().unwrap().push((id, payload.to_vec()));
                        thread::sleep(Duration::from_millis(5));
                        reader.next();
                    }
                    Received::ShutDown => return,
                    Received::Empty => unreachable!(),
                }
            })
        };

        writer.commit_sync(11, b"ping");
        assert_eq!(
            dispatched.lock().unwrap().as_slice(),
            &[(11, b"ping".to_vec())]
        );
        writer.shutdown();
        consumer.join().unwrap();
    }

    #[test]
    fn empty_ring_reports_empty_after_timeout() {
        let (_writer, mut reader) = CommandRing::with_capacity(16);
        assert_eq!(reader.get(Some(Duration::from_millis(10))), Received::Empty);
    }

    #[test]
    fn shutdown_wakes_a_blocked_reader() {
        let (mut writer, mut reader) = CommandRing::with_capacity(16);
        let consumer = thread::spawn(move || reader.get(None) == Received::ShutDown);
        thread::sleep(Duration::from_millis(10));
        writer.shutdown();
        assert!(consumer.join().unwrap());
    }

    #[test]
    fn queued_commands_drain_before_shutdown_reports() {
        let (mut writer, mut reader) = CommandRing::with_capacity(16);
        writer.commit(1, b"a");
        writer.commit(2, b"b");
        writer.shutdown();

        assert!(matches!(reader.get(None), Received::Command { id: 1, .. }));
        reader.next();
        assert!(matches!(reader.get(None), Received::Command { id: 2, .. }));
        reader.next();
        assert_eq!(reader.get(None), Received::ShutDown);
    }

    #[test]
    fn commits_after_shutdown_are_dropped() {
        let (mut writer, mut reader) = CommandRing::with_capacity(16);
        writer.shutdown();
        writer.commit(5, b"late");
        writer.commit_sync(6, b"later");
        assert_eq!(reader.get(None), Received::ShutDown);
    }

    #[test]
    fn dropping_the_writer_shuts_down_the_reader() {
        let (writer, mut reader) = CommandRing::with_capacity(16);
        drop(writer);
        assert_eq!(reader.get(None), Received::ShutDown);
    }

    #[test]
    #[should_panic(expected = "half the ring capacity")]
    fn oversized_command_panics() {
        let (mut writer, _reader) = CommandRing::with_capacity(8);
        writer.commit(1, &[0; 100]);
    }
}
