//! # Cooperative Pull Result
//!
//! The core is driven by a single loop that never blocks: every
//! [`crate::format::ByteSource`], [`crate::codec::CodecParser`], and
//! [`crate::meta::MetaDemuxer`] read reports one of four outcomes instead of
//! suspending the caller. Fatal conditions (band 1/2 of the error model) are
//! still reported as `Err(DemuxError)`; `PullResult` only carries the
//! non-fatal band-3 transience.

/// Outcome of a single non-blocking pull attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullResult {
    /// Data was produced and is available to the caller.
    Ready,
    /// The underlying producer has not advanced yet, but may shortly;
    /// returned by `Fragmented`-policy sources so the interleaver can skip
    /// this stream for the current round without treating it as stalled.
    Delayed,
    /// The underlying producer is not ready and the caller should
    /// propagate this immediately as upstream back-pressure.
    NotReady,
    /// The underlying producer is exhausted. Residual buffered data, if
    /// any, is drained by a subsequent `flush_packet` call.
    Eof,
}

impl PullResult {
    /// True for [`PullResult::Eof`].
    pub fn is_eof(self) -> bool {
        matches!(self, PullResult::Eof)
    }

    /// True for [`PullResult::Delayed`].
    pub fn is_delayed(self) -> bool {
        matches!(self, PullResult::Delayed)
    }
}
