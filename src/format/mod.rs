//! # Container & Byte-Source Layer
//!
//! Sits between raw containers/files and the codec parsers:
//!
//! - [`byte_source`] — the [`ByteSource`] contract every suspension point
//!   in the crate goes through, plus the reference in-memory source.
//! - [`container`] — [`container::ContainerDemuxer`], one implementation
//!   per container family (only TS/M2TS extracts bytes in this build;
//!   the other four families are wired through a stub that reports
//!   `ErrorKind::UnsupportedContainerFormat`).
//! - [`container_adapter`] — [`container_adapter::ContainerAdapter`],
//!   which turns any `ContainerDemuxer` into a per-PID `ByteSource` with
//!   the Sequential/Fragmented policy and overflow guard.

pub mod byte_source;
pub use byte_source::{ByteSource, ConcatByteSource, FixedByteSource, SourceRead};

pub mod container;
pub use container::{ContainerDemuxer, ContainerFamily, DemuxBlockRez, TrackInfo};

pub mod container_adapter;
pub use container_adapter::{ContainerAdapter, DemuxerReadPolicy, PidByteSource};
