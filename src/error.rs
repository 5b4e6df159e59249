//! # Error Types
//!
//! This module provides the error types used throughout the crate. It defines
//! a central error type `DemuxError` that encapsulates all possible errors
//! that can occur while opening a manifest, demultiplexing a container, or
//! parsing a codec-level frame boundary.
//!
//! Errors fall into the three bands a caller needs to distinguish:
//! configuration errors (fatal at `open_file`/`add_stream` time), input
//! errors during streaming (fatal, surfaced to the driver), and transient
//! back-pressure (non-fatal, encoded in [`crate::pull::PullResult`] rather
//! than in this type).
//!
//! ## Example Usage
//!
//! ```rust
//! use tsmux_demux::error::{ErrorKind, Result, DemuxError};
//!
//! fn require_track_option(value: Option<&str>) -> Result<&str> {
//!     value.ok_or_else(|| DemuxError::Manifest(ErrorKind::InvalidCodecFormat(
//!         "missing required 'track' option".into(),
//!     )))
//! }
//! ```

use std::num::ParseIntError;
use thiserror::Error;

/// The structured error kinds named by the manifest/container contract
/// (`ERR_INVALID_CODEC_FORMAT`, `ERR_UNSUPPORTER_CONTAINER_FORMAT`,
/// `ERR_UNKNOWN_CODEC`, `ERR_CONTAINER_STREAM_NOT_SYNC`, `ERR_COMMON`).
///
/// Kept as a nested enum rather than flattened into [`DemuxError`] so a
/// caller can match on the kind without parsing the error's display string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A manifest line or option is malformed, or required option is missing.
    #[error("invalid codec format: {0}")]
    InvalidCodecFormat(String),

    /// The container family named by a track's file extension has no
    /// demultiplexing support in this build.
    #[error("unsupported container format: {0}")]
    UnsupportedContainerFormat(String),

    /// The manifest names a codec this crate does not recognize.
    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    /// A per-PID buffer exceeded `MAX_DEMUX_BUFFER_SIZE` without its
    /// consumer advancing; the underlying container is not interleaved
    /// the way this demuxer expects.
    #[error("container stream not in sync: {0}")]
    ContainerStreamNotSync(String),

    /// Any other fatal condition that doesn't fit the kinds above.
    #[error("{0}")]
    Common(String),
}

/// Primary error type for the crate.
#[derive(Error, Debug)]
pub enum DemuxError {
    /// I/O errors that occur opening or reading a source file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to codec-level frame parsing (band 2 of the error
    /// model: a confirmed desync past the parser's resync window, not a
    /// plain "not enough bytes yet" case).
    #[error("codec error: {0}")]
    Codec(String),

    /// Errors related to container demultiplexing.
    #[error("container error: {0}")]
    Container(String),

    /// Manifest/configuration errors, fatal at `open_file`/`add_stream` time.
    #[error("manifest error: {0}")]
    Manifest(#[from] ErrorKind),

    /// Blu-ray playlist/clip path resolution failures.
    #[error("bluray resolve error: {0}")]
    BlurayResolve(String),

    /// Errors for invalid or malformed input data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Errors that occur during integer parsing (e.g. manifest option values).
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// A specialized Result type for this crate's operations.
pub type Result<T> = std::result::Result<T, DemuxError>;
