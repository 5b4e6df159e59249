//! # Packet
//!
//! The unit of data the interleaver emits: a shared byte range plus the
//! timing and flag metadata a downstream TS/M2TS muxer needs to schedule it.
//! Timestamps live in the internal 90 kHz-aligned tick domain
//! ([`crate::INTERNAL_PTS_FREQ`]); `duration` is in the same unit.

use bitflags::bitflags;
use bytes::Bytes;

bitflags! {
    /// Per-packet flags. Mirrors the three independent bits the muxer
    /// contract names: which stream carries PCR, which packets are
    /// random-access points, and which are forced (always muxed even if
    /// the muxer would otherwise drop them).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u8 {
        /// This packet belongs to the stream the downstream muxer should
        /// draw its PCR reference from. Set only on the first configured
        /// stream's packets.
        const PCR_STREAM = 0b001;
        /// Key frame / random-access point.
        const PRIORITY_DATA = 0b010;
        /// Forced: always emitted regardless of muxer-side filtering.
        const FORCED = 0b100;
    }
}

/// A single demultiplexed, timestamped elementary-stream frame.
///
/// A fresh packet starts zero: `pts`/`dts`/`duration` are `0` and `flags`
/// is empty until the emitting parser or the interleaver sets them.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Index of the configured track this packet belongs to.
    pub stream_index: usize,
    /// The packet's payload. A shared byte range so cloning is cheap.
    pub data: Bytes,
    /// Presentation timestamp, internal 90 kHz-aligned ticks.
    pub pts: i64,
    /// Decode timestamp, internal 90 kHz-aligned ticks.
    pub dts: i64,
    /// Duration of this frame in the same tick domain.
    pub duration: i64,
    /// PCR/priority/forced flags.
    pub flags: PacketFlags,
    /// Which static [`crate::codec_info::CodecInfo`] this packet's codec
    /// uses; lets a consumer identify the codec without re-deriving it.
    pub codec_ref: &'static crate::codec_info::CodecInfo,
}

impl Packet {
    /// Creates a zeroed packet carrying `data` for `codec_ref`.
    pub fn new(data: Bytes, codec_ref: &'static crate::codec_info::CodecInfo) -> Self {
        Self {
            stream_index: 0,
            data,
            pts: 0,
            dts: 0,
            duration: 0,
            flags: PacketFlags::empty(),
            codec_ref,
        }
    }

    /// Size of the packet's payload in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns whether this packet is a random-access point.
    pub fn is_priority_data(&self) -> bool {
        self.flags.contains(PacketFlags::PRIORITY_DATA)
    }
}
