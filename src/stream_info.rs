//! # StreamInfo
//!
//! Per-configured-track state: owns the track's
//! [`crate::format::ByteSource`] handle, its [`crate::codec::CodecParser`],
//! a time shift, the last-produced DTS, and the EOF/flush bookkeeping
//! [`crate::meta::MetaDemuxer`] drives every track through.
//!
//! Invariant: `last_dts` is monotone non-decreasing after each successful
//! `read_packet`, and equals `pts + duration` of the packet just emitted
//! (already including `time_shift`).

use std::collections::HashMap;

use bytes::Bytes;

use crate::codec::{CodecParser, FrameResult};
use crate::error::DemuxError;
use crate::format::byte_source::{ByteSource, SourceRead};
use crate::{Packet, PullResult, Result, INTERNAL_PTS_FREQ};

/// Converts a manifest `timeshift=` value into internal ticks: a bare integer is milliseconds; `ms`/`s`/`ns` suffixes name the
/// unit explicitly. Grounded on `METADemuxer::addStreamToList`'s
/// timeshift option handling in the original.
pub fn parse_time_shift(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    let (digits, ns_per_unit) = if let Some(d) = raw.strip_suffix("ms") {
        (d, 1_000_000i128)
    } else if let Some(d) = raw.strip_suffix("ns") {
        (d, 1i128)
    } else if let Some(d) = raw.strip_suffix('s') {
        (d, 1_000_000_000i128)
    } else {
        (raw, 1_000_000i128)
    };

    let value: i128 = digits
        .trim()
        .parse()
        .map_err(|_| DemuxError::InvalidData(format!("invalid timeshift value: {raw}")))?;

    let ticks = value * ns_per_unit / 1000 * INTERNAL_PTS_FREQ as i128 / 1_000_000;
    Ok(ticks as i64)
}

/// Per-configured-track state. One instance per manifest line (per
/// resolved sub-track, in the combined-AVC+MVC split case).
pub struct StreamInfo {
    /// Index into [`crate::meta::MetaDemuxer`]'s track list; also the
    /// `stream_index` stamped onto every packet this track emits.
    pub stream_index: usize,
    /// The `reader_id`/PID this track was registered under, when sourced
    /// from a container; `0` for a raw elementary-stream source.
    pub pid: u16,
    /// Whether this track is a dependent/secondary sub-stream (e.g. the
    /// MVC view split out of a combined AVC+MVC file, or a secondary PG
    /// composition) rather than a primary track.
    pub is_sub_stream: bool,
    /// Manifest codec program name, e.g. `"A_DTS"`.
    pub codec_name: String,
    /// The manifest's source path (first file, if the track concatenates
    /// several — only used for diagnostics).
    pub source_file_name: String,
    /// The manifest line's raw `key=value` options, preserved for any
    /// downstream consumer that needs an option this crate doesn't
    /// interpret itself (e.g. subtitle rendering hints).
    pub add_params: HashMap<String, String>,
    /// Internal-tick offset added to every emitted packet's `pts`/`dts`.
    pub time_shift: i64,
    /// DTS (ticks, post-shift) of the last packet emitted by this track;
    /// monotone non-decreasing. Initialized to `time_shift` so a
    /// positively-shifted stream isn't selected before its shift elapses.
    pub last_dts: i64,
    /// The most recent [`PullResult`] this track's `read` reported,
    /// cached so the interleaver's refill phase can skip a track that
    /// already has pending input this round.
    pub last_read_rez: PullResult,
    /// Set once the underlying source has reported EOF.
    pub is_eof: bool,
    /// Set once this track's final `flush_packet` has been taken.
    pub flushed: bool,
    /// ISO 639-2/T language code, already normalized.
    pub lang: Option<String>,

    source: Box<dyn ByteSource>,
    parser: CodecParser,
    primed: bool,
    last_tail_len: usize,
}

impl StreamInfo {
    /// Constructs a track from its resolved source and parser. `time_shift`
    /// is already in internal ticks (see [`parse_time_shift`]).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        stream_index: usize,
        pid: u16,
        is_sub_stream: bool,
        codec_name: String,
        source_file_name: String,
        add_params: HashMap<String, String>,
        time_shift: i64,
        lang: Option<String>,
        source: Box<dyn ByteSource>,
        parser: CodecParser,
    ) -> Self {
        Self {
            stream_index,
            pid,
            is_sub_stream,
            codec_name,
            source_file_name,
            add_params,
            time_shift,
            last_dts: time_shift,
            last_read_rez: PullResult::NotReady,
            is_eof: false,
            flushed: false,
            lang,
            source,
            parser,
            primed: false,
            last_tail_len: 0,
        }
    }

    /// Pulls the next block from this track's `ByteSource` and hands it to
    /// the codec parser. The crate's only suspension point below
    /// `MetaDemuxer`: never blocks, always reports one of the
    /// four [`PullResult`] outcomes.
    pub fn read(&mut self) -> Result<PullResult> {
        let consumed = if self.primed {
            self.last_tail_len.saturating_sub(self.parser.buffer_remaining())
        } else {
            self.primed = true;
            0
        };

        let rez = match self.source.read_block(consumed)? {
            SourceRead::Ready(data) => {
                self.last_tail_len = data.len();
                self.parser.set_buffer(data, false);
                PullResult::Ready
            }
            SourceRead::Delayed => PullResult::Delayed,
            SourceRead::NotReady => PullResult::NotReady,
            SourceRead::Eof => {
                self.is_eof = true;
                let residue = self.parser.buffer_remaining_bytes();
                self.last_tail_len = residue.len();
                self.parser.set_buffer(residue, true);
                PullResult::Eof
            }
        };
        self.last_read_rez = rez;
        Ok(rez)
    }

    /// Attempts to emit this track's next frame as a packet, with
    /// `time_shift` applied and `last_dts` advanced.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        match self.parser.read_packet()? {
            FrameResult::Packet(packet) => Ok(Some(self.finalize(packet))),
            FrameResult::NeedMoreData | FrameResult::Eof => Ok(None),
        }
    }

    /// Drains this track's residual buffered frame once its source has
    /// reached EOF; marks `flushed` regardless of whether a packet came
    /// out, since a track gets exactly one flush attempt.
    pub fn flush_packet(&mut self) -> Result<Option<Packet>> {
        let rez = match self.parser.flush_packet()? {
            FrameResult::Packet(packet) => Some(self.finalize(packet)),
            FrameResult::NeedMoreData | FrameResult::Eof => None,
        };
        self.flushed = true;
        Ok(rez)
    }

    fn finalize(&mut self, mut packet: Packet) -> Packet {
        packet.stream_index = self.stream_index;
        packet.pts += self.time_shift;
        packet.dts += self.time_shift;
        self.last_dts = packet.pts + packet.duration;
        packet
    }

    /// Whether this track's source should use
    /// [`crate::format::DemuxerReadPolicy::Fragmented`].
    pub fn is_fragmented_policy(&self) -> bool {
        self.parser.is_fragmented_policy()
    }

    /// The codec descriptor this track currently reports.
    pub fn codec_info(&self) -> &'static crate::codec_info::CodecInfo {
        self.parser.codec_info()
    }

    /// Read-only access to this track's codec parser, for capability
    /// queries the interleaver needs that don't belong on `CodecParser`
    /// itself, e.g. the
    /// MVC `insertSEI` propagation pass.
    pub fn parser(&self) -> &CodecParser {
        &self.parser
    }

    /// Mutable access to this track's codec parser, for the same
    /// capability-query use as [`StreamInfo::parser`].
    pub fn parser_mut(&mut self) -> &mut CodecParser {
        &mut self.parser
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::dts::DtsParser;
    use crate::format::byte_source::FixedByteSource;

    fn dts_frame() -> Vec<u8> {
        // Minimal 16-byte DTS core frame: sync + enough header bytes that
        // `find_frame` can read `fsize`/`amode`/`sfreq`, doubled so the
        // second-sync confirmation in `find_frame` succeeds.
        let header: Vec<u8> = vec![0x7F, 0xFE, 0x80, 0x01, 0x00, 0x00, 0x40, 0x98, 0x00, 0x00];
        let mut frame = header.clone();
        frame.extend_from_slice(&header);
        frame
    }

    #[test]
    fn parse_time_shift_bare_integer_is_milliseconds() {
        assert_eq!(parse_time_shift("500").unwrap(), 500 * 90);
    }

    #[test]
    fn parse_time_shift_ms_suffix() {
        assert_eq!(parse_time_shift("500ms").unwrap(), 45000);
    }

    #[test]
    fn parse_time_shift_seconds_suffix() {
        assert_eq!(parse_time_shift("1s").unwrap(), INTERNAL_PTS_FREQ);
    }

    #[test]
    fn parse_time_shift_nanoseconds_suffix() {
        assert_eq!(parse_time_shift("1000000000ns").unwrap(), INTERNAL_PTS_FREQ);
    }

    #[test]
    fn parse_time_shift_negative_value() {
        assert_eq!(parse_time_shift("-500ms").unwrap(), -45000);
    }

    #[test]
    fn initial_last_dts_equals_time_shift() {
        let src = FixedByteSource::new(Bytes::from(dts_frame()));
        let stream = StreamInfo::new(
            0,
            0,
            false,
            "A_DTS".into(),
            "a.dts".into(),
            HashMap::new(),
            45000,
            None,
            Box::new(src),
            CodecParser::Dts(DtsParser::new()),
        );
        assert_eq!(stream.last_dts, 45000);
    }

    #[test]
    fn read_packet_advances_last_dts_and_applies_shift() {
        let src = FixedByteSource::new(Bytes::from(dts_frame()));
        let mut stream = StreamInfo::new(
            0,
            0,
            false,
            "A_DTS".into(),
            "a.dts".into(),
            HashMap::new(),
            1000,
            None,
            Box::new(src),
            CodecParser::Dts(DtsParser::new()),
        );
        stream.read().unwrap();
        let packet = stream.read_packet().unwrap().expect("expected a packet");
        assert_eq!(packet.dts, 1000);
        assert_eq!(stream.last_dts, packet.pts + packet.duration);
        assert!(stream.last_dts >= 1000);
    }
}
