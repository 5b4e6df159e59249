//! # ContainerAdapter
//!
//! Converts one or more [`ContainerDemuxer`] instances into the pull-style
//! [`ByteSource`] contract the codec parsers expect, enforcing a
//! per-PID Sequential/Fragmented read policy, a 192 MiB overflow guard
//! (exempt for MP4/MOV), and the buffer discipline where each PID's
//! buffer reserves a leading `read_buf_offset` prelude for the consumer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};

use super::byte_source::{ByteSource, SourceRead};
use super::container::{ContainerDemuxer, DemuxBlockRez};
use crate::config;
use crate::error::ErrorKind;
use crate::Result;

/// Per-PID buffering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerReadPolicy {
    /// Wait for `MIN_READED_BLOCK` bytes (or container EOF/error) before
    /// returning anything. The default; reduces per-call overhead for
    /// high-rate audio/video PIDs.
    Sequential,
    /// Return bytes as soon as any exist. Used for PGS/SUP/SRT so a small
    /// subtitle packet isn't held back waiting for a block that will
    /// never reach 16 KiB.
    Fragmented,
}

struct ContainerEntry {
    demuxer: Box<dyn ContainerDemuxer>,
    overflow_exempt: bool,
    pids: Vec<u16>,
}

struct PidEntry {
    container_key: usize,
    pid: u16,
    policy: DemuxerReadPolicy,
    /// Reserved leading bytes the consumer may use to prepend state
    /// without copying the tail.
    read_buf_offset: usize,
    buffer: BytesMut,
    eof: bool,
    delayed: bool,
}

/// Shared across every PID sourced from containers: one
/// instance drives every `ContainerDemuxer` opened by the manifest.
#[derive(Default)]
pub struct ContainerAdapter {
    containers: Vec<ContainerEntry>,
    pids: HashMap<usize, PidEntry>,
    next_reader_id: usize,
    terminated: bool,
}

impl ContainerAdapter {
    /// Creates an empty adapter with no open containers.
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            pids: HashMap::new(),
            next_reader_id: 0,
            terminated: false,
        }
    }

    /// Registers a container demuxer and one of its PIDs, returning the
    /// `reader_id` a [`StreamInfo`](crate::stream_info::StreamInfo) uses
    /// to pull from it. Multiple PIDs from the same container share the
    /// container's demux rounds; pass the same `container_key` for PIDs
    /// that belong to the same open file.
    pub fn open_stream(
        &mut self,
        container_key: usize,
        demuxer: Box<dyn ContainerDemuxer>,
        pid: u16,
        policy: DemuxerReadPolicy,
        read_buf_offset: usize,
    ) -> usize {
        if self.containers.len() <= container_key {
            self.containers.resize_with(container_key + 1, || ContainerEntry {
                demuxer: Box::new(super::container::UnsupportedContainerDemuxer::new("unset")),
                overflow_exempt: false,
                pids: Vec::new(),
            });
        }
        let overflow_exempt = demuxer.is_overflow_exempt();
        self.containers[container_key] = ContainerEntry {
            demuxer,
            overflow_exempt,
            pids: vec![pid],
        };

        let reader_id = self.next_reader_id;
        self.next_reader_id += 1;
        self.pids.insert(
            reader_id,
            PidEntry {
                container_key,
                pid,
                policy,
                read_buf_offset,
                buffer: BytesMut::new(),
                eof: false,
                delayed: false,
            },
        );
        reader_id
    }

    /// Registers an additional PID multiplexed from an already-open
    /// container (e.g. a second PGS track inside the same M2TS).
    pub fn add_pid(
        &mut self,
        container_key: usize,
        pid: u16,
        policy: DemuxerReadPolicy,
        read_buf_offset: usize,
    ) -> usize {
        if let Some(entry) = self.containers.get_mut(container_key) {
            if !entry.pids.contains(&pid) {
                entry.pids.push(pid);
            }
        }
        let reader_id = self.next_reader_id;
        self.next_reader_id += 1;
        self.pids.insert(
            reader_id,
            PidEntry {
                container_key,
                pid,
                policy,
                read_buf_offset,
                buffer: BytesMut::new(),
                eof: false,
                delayed: false,
            },
        );
        reader_id
    }

    /// Releases a reader; once the last PID referencing a container is
    /// released the container entry is dropped too.
    pub fn delete_reader(&mut self, reader_id: usize) {
        if let Some(entry) = self.pids.remove(&reader_id) {
            if let Some(container) = self.containers.get_mut(entry.container_key) {
                container.pids.retain(|p| *p != entry.pid);
            }
        }
    }

    /// Clears every PID's DELAYED mark so the interleaver can retry a
    /// round where every stream reported `Delayed`.
    pub fn reset_delayed_mark(&mut self) {
        for pid in self.pids.values_mut() {
            pid.delayed = false;
        }
    }

    /// Arms cancellation: the current demux round completes, then every
    /// PID raises EOF.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    fn demux_round(&mut self, container_key: usize) -> Result<DemuxBlockRez> {
        let pids: Vec<u16> = self.containers[container_key].pids.clone();
        let mut out: HashMap<u16, BytesMut> = pids.iter().map(|p| (*p, BytesMut::new())).collect();

        let rez = self.containers[container_key].demuxer.simple_demux_block(&mut out)?;
        let overflow_exempt = self.containers[container_key].overflow_exempt;
        let max_size = config::current().max_demux_buffer_size;

        for pid_entry in self.pids.values_mut() {
            if pid_entry.container_key != container_key {
                continue;
            }
            if let Some(extra) = out.get(&pid_entry.pid) {
                if !extra.is_empty() {
                    pid_entry.buffer.extend_from_slice(extra);
                }
            }
            if !overflow_exempt && pid_entry.buffer.len() > max_size {
                return Err(ErrorKind::ContainerStreamNotSync(format!(
                    "pid {} buffer exceeded {} bytes without its consumer advancing",
                    pid_entry.pid, max_size
                ))
                .into());
            }
        }
        Ok(rez)
    }

    fn ready_len(entry: &PidEntry) -> usize {
        entry.buffer.len().saturating_sub(entry.read_buf_offset)
    }

    /// Pulls the next block for `reader_id`, demultiplexing further
    /// rounds from the owning container as needed per the PID's policy.
    pub fn read_block(&mut self, reader_id: usize, consumed: usize) -> Result<SourceRead> {
        let container_key = match self.pids.get(&reader_id) {
            Some(e) => e.container_key,
            None => return Ok(SourceRead::Eof),
        };

        if let Some(entry) = self.pids.get_mut(&reader_id) {
            if consumed > 0 {
                let drop_from = entry.read_buf_offset + consumed;
                if drop_from <= entry.buffer.len() {
                    let _ = entry.buffer.split_to(drop_from);
                } else {
                    entry.buffer.clear();
                }
            }
        }

        let min_block = config::current().min_readed_block;

        loop {
            if self.terminated {
                if let Some(entry) = self.pids.get_mut(&reader_id) {
                    entry.eof = true;
                }
            }

            let (policy, ready, eof) = {
                let entry = self.pids.get(&reader_id).expect("reader_id must be registered");
                (entry.policy, Self::ready_len(entry), entry.eof)
            };

            let satisfied = match policy {
                DemuxerReadPolicy::Sequential => ready >= min_block,
                DemuxerReadPolicy::Fragmented => ready > 0,
            };

            if satisfied || (eof && ready > 0) {
                let entry = self.pids.get(&reader_id).unwrap();
                let off = entry.read_buf_offset;
                return Ok(SourceRead::Ready(Bytes::copy_from_slice(&entry.buffer[off..])));
            }
            if eof {
                return Ok(SourceRead::Eof);
            }

            match self.demux_round(container_key)? {
                DemuxBlockRez::Ok => continue,
                DemuxBlockRez::Eof => {
                    for entry in self.pids.values_mut() {
                        if entry.container_key == container_key {
                            entry.eof = true;
                        }
                    }
                }
                DemuxBlockRez::NotReady => {
                    let entry = self.pids.get_mut(&reader_id).unwrap();
                    return match entry.policy {
                        DemuxerReadPolicy::Sequential => Ok(SourceRead::NotReady),
                        DemuxerReadPolicy::Fragmented => {
                            entry.delayed = true;
                            Ok(SourceRead::Delayed)
                        }
                    };
                }
            }
        }
    }
}

/// The adapter's per-PID view, implementing [`ByteSource`] by delegating
/// to a shared [`ContainerAdapter`]. Several `PidByteSource`s may share
/// one `Rc<RefCell<ContainerAdapter>>` (single-threaded, so no `Mutex` is
/// needed).
pub struct PidByteSource {
    adapter: Rc<RefCell<ContainerAdapter>>,
    reader_id: usize,
}

impl PidByteSource {
    /// Wraps `reader_id`'s view of `adapter`.
    pub fn new(adapter: Rc<RefCell<ContainerAdapter>>, reader_id: usize) -> Self {
        Self { adapter, reader_id }
    }
}

impl ByteSource for PidByteSource {
    fn read_block(&mut self, consumed: usize) -> Result<SourceRead> {
        self.adapter.borrow_mut().read_block(self.reader_id, consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::container::{ContainerDemuxer, TrackInfo};
    use std::collections::HashMap as StdHashMap;

    struct SlowFeedDemuxer {
        chunks: Vec<&'static [u8]>,
        idx: usize,
    }

    impl ContainerDemuxer for SlowFeedDemuxer {
        fn get_track_list(&self) -> Vec<TrackInfo> {
            vec![]
        }
        fn get_track_delay(&self, _pid: u16) -> i64 {
            0
        }
        fn get_file_duration_nano(&self) -> i64 {
            0
        }
        fn simple_demux_block(&mut self, out: &mut StdHashMap<u16, BytesMut>) -> Result<DemuxBlockRez> {
            if self.idx >= self.chunks.len() {
                return Ok(DemuxBlockRez::Eof);
            }
            if let Some(buf) = out.get_mut(&1u16) {
                buf.extend_from_slice(self.chunks[self.idx]);
            }
            self.idx += 1;
            Ok(DemuxBlockRez::Ok)
        }
    }

    #[test]
    fn fragmented_policy_returns_small_chunk_immediately() {
        let mut adapter = ContainerAdapter::new();
        let demuxer = SlowFeedDemuxer {
            chunks: vec![b"pgs-segment"],
            idx: 0,
        };
        let reader_id = adapter.open_stream(0, Box::new(demuxer), 1, DemuxerReadPolicy::Fragmented, 0);
        match adapter.read_block(reader_id, 0).unwrap() {
            SourceRead::Ready(b) => assert_eq!(&b[..], b"pgs-segment"),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn sequential_policy_waits_for_min_block() {
        crate::config::Config::install(crate::config::Config {
            min_readed_block: 10,
            max_demux_buffer_size: crate::MAX_DEMUX_BUFFER_SIZE,
            max_delayed_retries: crate::MAX_DELAYED_RETRIES,
        });
        let mut adapter = ContainerAdapter::new();
        let demuxer = SlowFeedDemuxer {
            chunks: vec![b"12345", b"67890", b"x"],
            idx: 0,
        };
        let reader_id = adapter.open_stream(0, Box::new(demuxer), 1, DemuxerReadPolicy::Sequential, 0);
        match adapter.read_block(reader_id, 0).unwrap() {
            SourceRead::Ready(b) => assert!(b.len() >= 10, "expected >=10 bytes, got {}", b.len()),
            other => panic!("expected Ready, got {other:?}"),
        }
        crate::config::Config::reset();
    }

    #[test]
    fn overflow_guard_trips_for_non_exempt_container() {
        crate::config::Config::install(crate::config::Config {
            min_readed_block: crate::MIN_READED_BLOCK,
            max_demux_buffer_size: 16,
            max_delayed_retries: crate::MAX_DELAYED_RETRIES,
        });
        let mut adapter = ContainerAdapter::new();
        let demuxer = SlowFeedDemuxer {
            chunks: vec![b"0123456789abcdef", b"0123456789abcdef"],
            idx: 0,
        };
        let reader_id = adapter.open_stream(0, Box::new(demuxer), 1, DemuxerReadPolicy::Sequential, 0);
        let result = adapter.read_block(reader_id, 0);
        assert!(result.is_err());
        crate::config::Config::reset();
    }
}
