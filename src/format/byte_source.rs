//! # ByteSource
//!
//! The abstract random-access byte producer every [`crate::stream_info::StreamInfo`]
//! pulls from. A `ByteSource` never blocks: each call reports one of three
//! non-fatal outcomes (ready / delayed / EOF) in addition to the fatal
//! `Err` path. File I/O, socket buffering, and Blu-ray
//! clip-chaining are external collaborators — this crate only defines the
//! contract and the two reference implementations it ships: a fixed
//! in-memory source (used by tests and raw single-file elementary streams)
//! and the [`crate::format::container_adapter::ContainerAdapter`]'s
//! per-PID view.

use bytes::Bytes;

use crate::Result;

/// Outcome of a single `ByteSource::read_block` call.
#[derive(Debug, Clone)]
pub enum SourceRead {
    /// `data` is the full current unconsumed tail (previous residue plus
    /// any newly produced bytes). The caller reports how much of it was
    /// used on its *next* call via `consumed`.
    Ready(Bytes),
    /// The underlying producer has not advanced since the last call but
    /// may shortly (e.g. a Fragmented-policy PID still waiting on its
    /// container demuxer). Distinct from `NotReady`: the interleaver may
    /// skip this stream for the current round rather than stalling on it.
    Delayed,
    /// The underlying producer is not ready; propagate as upstream
    /// back-pressure immediately.
    NotReady,
    /// The producer is exhausted. Any residue already delivered by a prior
    /// `Ready` must be drained by the consumer's own flush path.
    Eof,
}

/// A pull-style, non-blocking byte producer.
///
/// `read_block` is the crate's only suspension point: it is
/// synchronous and must never block on I/O itself. A real implementation
/// backed by a file or socket performs its own background buffering and
/// reports `SourceRead::Delayed`/`NotReady` until data is available.
pub trait ByteSource {
    /// Reports that `consumed` bytes of the previously returned `Ready`
    /// buffer were used, then asks for the next block. `consumed` is `0`
    /// on the first call.
    fn read_block(&mut self, consumed: usize) -> Result<SourceRead>;
}

/// A `ByteSource` over a fixed in-memory buffer, treated as though it
/// arrived as a single block followed by EOF. Used for raw single-file
/// elementary streams (where no container demultiplexing is needed) and
/// as the reference fixture for parser unit tests.
pub struct FixedByteSource {
    data: Bytes,
    delivered: bool,
    exhausted: bool,
}

impl FixedByteSource {
    /// Wraps `data` as a one-shot source.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            delivered: false,
            exhausted: false,
        }
    }
}

impl ByteSource for FixedByteSource {
    fn read_block(&mut self, consumed: usize) -> Result<SourceRead> {
        if self.exhausted {
            return Ok(SourceRead::Eof);
        }
        if !self.delivered {
            self.delivered = true;
            return Ok(SourceRead::Ready(self.data.clone()));
        }
        if consumed < self.data.len() {
            self.data = self.data.slice(consumed..);
            // Residual data the consumer hasn't drained yet; hand it back
            // once more before reporting EOF so flush logic sees it.
            if !self.data.is_empty() {
                let residue = self.data.clone();
                self.data = Bytes::new();
                return Ok(SourceRead::Ready(residue));
            }
        }
        self.exhausted = true;
        Ok(SourceRead::Eof)
    }
}

/// A `ByteSource` that chains several sources end to end, advancing to the
/// next once the current one reports EOF. Backs the manifest's `"a"+"b"`
/// multi-file track concatenation and Blu-ray multi-clip
/// playlists: both name more than one file
/// for a single logical track.
pub struct ConcatByteSource {
    sources: std::collections::VecDeque<Box<dyn ByteSource>>,
}

impl ConcatByteSource {
    /// Chains `sources` in order. Panics only if `sources` is empty, which
    /// would indicate a caller bug (a track with zero resolved files)
    /// rather than a runtime condition.
    pub fn new(sources: Vec<Box<dyn ByteSource>>) -> Self {
        assert!(!sources.is_empty(), "ConcatByteSource needs at least one source");
        Self {
            sources: sources.into(),
        }
    }
}

impl ByteSource for ConcatByteSource {
    fn read_block(&mut self, consumed: usize) -> Result<SourceRead> {
        let mut consumed = consumed;
        loop {
            let Some(front) = self.sources.front_mut() else {
                return Ok(SourceRead::Eof);
            };
            match front.read_block(consumed)? {
                SourceRead::Eof => {
                    self.sources.pop_front();
                    // The next source in the chain has never been asked
                    // for a block; nothing of its data was "consumed" yet.
                    consumed = 0;
                    if self.sources.is_empty() {
                        return Ok(SourceRead::Eof);
                    }
                }
                other => return Ok(other),
            }
        }
    }
}

/// A `ByteSource` that replays a fixed sequence of canned outcomes, one
/// per call; used to drive the interleaver's DELAYED/NOT_READY handling
/// in tests without a real container behind it.
#[cfg(test)]
pub struct ScriptedByteSource {
    script: std::collections::VecDeque<SourceRead>,
}

#[cfg(test)]
impl ScriptedByteSource {
    pub fn new(script: Vec<SourceRead>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[cfg(test)]
impl ByteSource for ScriptedByteSource {
    fn read_block(&mut self, _consumed: usize) -> Result<SourceRead> {
        Ok(self.script.pop_front().unwrap_or(SourceRead::Eof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_delivers_then_eofs() {
        let mut src = FixedByteSource::new(Bytes::from_static(b"hello"));
        match src.read_block(0).unwrap() {
            SourceRead::Ready(b) => assert_eq!(&b[..], b"hello"),
            other => panic!("expected Ready, got {other:?}"),
        }
        match src.read_block(5).unwrap() {
            SourceRead::Eof => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }

    #[test]
    fn concat_source_chains_across_eof() {
        let mut src = ConcatByteSource::new(vec![
            Box::new(FixedByteSource::new(Bytes::from_static(b"abc"))),
            Box::new(FixedByteSource::new(Bytes::from_static(b"def"))),
        ]);
        match src.read_block(0).unwrap() {
            SourceRead::Ready(b) => assert_eq!(&b[..], b"abc"),
            other => panic!("expected Ready, got {other:?}"),
        }
        match src.read_block(3).unwrap() {
            SourceRead::Ready(b) => assert_eq!(&b[..], b"def"),
            other => panic!("expected Ready from next source, got {other:?}"),
        }
        match src.read_block(3).unwrap() {
            SourceRead::Eof => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }

    #[test]
    fn fixed_source_returns_residue_before_eof() {
        let mut src = FixedByteSource::new(Bytes::from_static(b"hello"));
        src.read_block(0).unwrap();
        match src.read_block(2).unwrap() {
            SourceRead::Ready(b) => assert_eq!(&b[..], b"llo"),
            other => panic!("expected Ready residue, got {other:?}"),
        }
        match src.read_block(3).unwrap() {
            SourceRead::Eof => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }
}
