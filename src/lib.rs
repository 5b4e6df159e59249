#![doc(html_root_url = "https://docs.rs/tsmux-demux/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tsmux-demux
//!
//! `tsmux-demux` is the input-side core of a TS/M2TS muxing pipeline: a
//! multi-stream elementary/container demultiplexing and codec-framing
//! pipeline. Given a manifest describing one or more tracks — each pointing
//! to a raw elementary stream, a container file, or a Blu-ray playlist
//! spanning several segments — the core opens and demultiplexes the
//! underlying container(s), parses codec-level frame boundaries and timing
//! for each track, interleaves tracks by decode timestamp into a single
//! monotone packet stream, and applies back-pressure when any stream
//! temporarily stalls.
//!
//! ## Scheduling model
//!
//! The core is single-threaded cooperative pull, not async: every read
//! either returns data immediately or one of
//! [`pull::PullResult::Delayed`]/[`pull::PullResult::NotReady`]/[`pull::PullResult::Eof`].
//! There is no executor and no blocking I/O inside this crate; a real
//! [`format::ByteSource`] is expected to buffer in the background and report
//! readiness through these codes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tsmux_demux::meta::{MetaDemuxer, MetaReadResult, TrackFileOpener};
//! use tsmux_demux::format::ByteSource;
//! use tsmux_demux::error::Result;
//!
//! struct FileOpener;
//!
//! impl TrackFileOpener for FileOpener {
//!     fn open(&mut self, path: &str) -> Result<Box<dyn ByteSource>> {
//!         todo!("wrap std::fs::File as a ByteSource, e.g. with buffered reads")
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let mut demuxer = MetaDemuxer::new();
//! let mut opener = FileOpener;
//! demuxer.open_file(Path::new("movie.meta"), &mut opener, None)?;
//!
//! loop {
//!     match demuxer.read_packet()? {
//!         MetaReadResult::Eof => break,
//!         MetaReadResult::Packet(packet) => { /* hand `packet` to the muxer */ }
//!         MetaReadResult::NotReady => continue,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module overview
//!
//! - [`packet`] / [`codec_info`] / [`pull`] — the core data model: the
//!   emitted `Packet`, per-codec identity, and the non-blocking read outcome.
//! - [`stream_info`] — per-configured-track state (`StreamInfo`).
//! - [`format`] — `ByteSource`, `ContainerDemuxer`, and the `ContainerAdapter`
//!   that bridges a container demuxer into the pull-style `ByteSource`
//!   contract the codec parsers expect.
//! - [`codec`] — per-codec frame parsers (DTS/DTS-HD, HEVC, MLP/TrueHD,
//!   AC-3, AAC, MPEG audio, LPCM, MPEG-2 video, H.264/MVC, VC-1, VVC, PGS,
//!   DVB subtitle, SRT) and the fixed-order autodetector.
//! - [`meta`] — the top-level DTS interleaver.
//! - [`manifest`] — the line-based manifest grammar.
//! - [`bluray_paths`] — MPLS/CLPI path resolution.
//! - [`lang`] — ISO 639-2/B to 639-2/T normalization.
//! - [`progress`] — the injected progress-reporting observer.
//! - [`error`] — the crate's error type and structured error kinds.
//! - [`config`] — overridable tunables for the fixed constants below.

/// Internal timestamp clock, aligned to MPEG-TS's 90 kHz PTS/DTS domain.
/// All `Packet::pts`/`dts`/`duration` values live in this tick domain.
pub const INTERNAL_PTS_FREQ: i64 = 90_000;

/// Minimum bytes a Sequential-policy PID buffer accumulates before the
/// container adapter hands it to the consumer.
pub const MIN_READED_BLOCK: usize = 16 * 1024;

/// Per-PID buffer size above which the overflow guard raises
/// `ErrorKind::ContainerStreamNotSync` for non-MP4/MOV containers.
pub const MAX_DEMUX_BUFFER_SIZE: usize = 192 * 1024 * 1024;

/// Retry budget for the interleaver's "every stream returned Delayed" cycle
/// before it gives up rather than spin forever on a stalled producer.
pub const MAX_DELAYED_RETRIES: u32 = 64;

/// Core data model: the emitted packet and its flags.
pub mod packet;
pub use packet::{Packet, PacketFlags};

/// Per-codec identity descriptors.
pub mod codec_info;

/// The non-blocking pull outcome shared by every suspension point.
pub mod pull;
pub use pull::PullResult;

/// Error types and the crate's `Result` alias.
pub mod error;
pub use error::{DemuxError, Result};

/// Overridable tunables for the fixed constants above.
pub mod config;

/// Bit-level and CRC helpers.
pub mod utils;

/// ISO 639-2/B to 639-2/T language normalization.
pub mod lang;

/// The line-based manifest grammar.
pub mod manifest;

/// Blu-ray MPLS/CLPI path resolution.
pub mod bluray_paths;

/// Injected progress-reporting observer.
pub mod progress;

/// Per-configured-track state.
pub mod stream_info;

/// Container demuxers, the `ByteSource` contract, and the `ContainerAdapter`.
pub mod format;

/// Per-codec frame parsers and the fixed-order autodetector.
pub mod codec;

/// The top-level DTS interleaver.
pub mod meta;
