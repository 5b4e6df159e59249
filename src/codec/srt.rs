//! # SRT (SubRip text subtitles)
//!
//! The only parser in this crate that reads text rather than a binary
//! elementary stream: a raw `.srt` file is a sequence of cues separated
//! by a blank line, each cue an index line, a
//! `HH:MM:SS,mmm --> HH:MM:SS,mmm` timecode line, and one or more text
//! lines. `pts`/`duration` come straight from the timecode; the emitted
//! packet's payload is the text only (index and timecode stripped).
//! Fragmented policy: one cue in, one packet out.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, SRT_CODEC_INFO};
use crate::error::DemuxError;
use crate::{Packet, Result};

pub struct SrtParser {
    buffer: Bytes,
    is_eof: bool,
}

impl SrtParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        match std::str::from_utf8(buf) {
            Ok(text) if text.lines().any(|l| l.contains("-->")) => {
                CheckStreamRez::Recognized(&SRT_CODEC_INFO)
            }
            _ => CheckStreamRez::NotDetected,
        }
    }

    pub fn set_buffer(&mut self, data: Bytes, is_eof: bool) {
        self.buffer = data;
        self.is_eof = is_eof;
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    pub fn remaining_bytes(&self) -> Bytes {
        self.buffer.clone()
    }

    pub fn codec_info(&self) -> &'static CodecInfo {
        &SRT_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        let text = std::str::from_utf8(&self.buffer)
            .map_err(|e| DemuxError::InvalidData(format!("non-UTF-8 SRT cue: {e}")))?;

        let Some(block_end) = text.find("\n\n").or_else(|| text.find("\r\n\r\n")) else {
            if self.is_eof && !text.trim().is_empty() {
                return self.emit_cue(text.len());
            }
            return Ok(FrameResult::NeedMoreData);
        };

        self.emit_cue(block_end)
    }

    fn emit_cue(&mut self, block_end: usize) -> Result<FrameResult> {
        let block_bytes = self.buffer.slice(0..block_end);
        let consumed = (block_end + 2).min(self.buffer.len());
        self.buffer = self.buffer.slice(consumed..);

        let block_text = std::str::from_utf8(&block_bytes)
            .map_err(|e| DemuxError::InvalidData(format!("non-UTF-8 SRT cue: {e}")))?;
        let mut lines = block_text.lines();
        let _index = lines.next();
        let Some(timecode_line) = lines.next() else {
            return Ok(FrameResult::NeedMoreData);
        };
        let Some((start_ms, end_ms)) = parse_timecode_line(timecode_line) else {
            return Err(DemuxError::InvalidData(format!(
                "malformed SRT timecode line: {timecode_line}"
            )));
        };
        let text_body: String = lines.collect::<Vec<_>>().join("\n");

        let start_ticks = start_ms * crate::INTERNAL_PTS_FREQ / 1000;
        let end_ticks = end_ms * crate::INTERNAL_PTS_FREQ / 1000;

        let mut packet = Packet::new(Bytes::from(text_body.into_bytes()), &SRT_CODEC_INFO);
        packet.pts = start_ticks;
        packet.dts = start_ticks;
        packet.duration = end_ticks - start_ticks;
        Ok(FrameResult::Packet(packet))
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.is_empty() {
            return Ok(FrameResult::Eof);
        }
        self.is_eof = true;
        match self.read_packet()? {
            FrameResult::Packet(p) => Ok(FrameResult::Packet(p)),
            _ => {
                self.buffer = Bytes::new();
                Ok(FrameResult::Eof)
            }
        }
    }
}

impl Default for SrtParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `"HH:MM:SS,mmm --> HH:MM:SS,mmm"` into `(start_ms, end_ms)`.
fn parse_timecode_line(line: &str) -> Option<(i64, i64)> {
    let (start, end) = line.split_once("-->")?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end.trim())?))
}

fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.split_whitespace().next()?;
    let (hms, ms) = s.split_once(',').or_else(|| s.split_once('.'))?;
    let mut parts = hms.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    let millis: i64 = ms.parse().ok()?;
    Some(((hours * 3600 + minutes * 60 + seconds) * 1000) + millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_stream_detects_arrow() {
        let data = b"1\n00:00:01,000 --> 00:00:02,000\nHello\n\n";
        assert!(SrtParser::check_stream(data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_plain_text() {
        assert!(!SrtParser::check_stream(b"just some text", ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_timecode_line() {
        assert_eq!(
            parse_timecode_line("00:00:01,500 --> 00:00:03,250"),
            Some((1500, 3250))
        );
    }

    #[test]
    fn emits_one_packet_per_cue() {
        let data = b"1\n00:00:01,000 --> 00:00:02,500\nHello\nworld\n\n2\n00:00:03,000 --> 00:00:04,000\nBye\n\n";
        let mut parser = SrtParser::new();
        parser.set_buffer(Bytes::from(data.to_vec()), false);

        let first = parser.read_packet().unwrap();
        let FrameResult::Packet(p1) = first else {
            panic!("expected first cue");
        };
        assert_eq!(p1.pts, 90_000);
        assert_eq!(p1.duration, 135_000);
        assert_eq!(std::str::from_utf8(&p1.data).unwrap(), "Hello\nworld");

        let second = parser.read_packet().unwrap();
        assert!(matches!(second, FrameResult::Packet(_)));
    }

    #[test]
    fn incomplete_cue_requests_more_data() {
        let data = b"1\n00:00:01,000 --> 00:00:02,000\nHello";
        let mut parser = SrtParser::new();
        parser.set_buffer(Bytes::from(data.to_vec()), false);
        assert!(matches!(parser.read_packet().unwrap(), FrameResult::NeedMoreData));
    }
}
