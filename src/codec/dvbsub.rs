//! # DVB Subtitle
//!
//! DVB subtitles (ETSI EN 300 743) arrive one PES payload per display
//! update: `data_identifier` (`0x20`), `subtitle_stream_id` (`0x00`), a
//! run of subtitling segments, and an `end_of_PES_data_field_marker`
//! (`0xFF`). Like PGS and SRT this is a Fragmented-policy parser;
//! unlike PGS, the container already delivers exactly
//! one complete PES payload per `set_buffer` call, so there is no
//! multi-segment accumulation to do here — the whole buffer is the frame.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, DVBSUB_CODEC_INFO};
use crate::{Packet, Result};

const DATA_IDENTIFIER: u8 = 0x20;
const SUBTITLE_STREAM_ID: u8 = 0x00;

pub struct DvbSubParser {
    buffer: Bytes,
    is_eof: bool,
}

impl DvbSubParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        if buf.len() >= 2 && buf[0] == DATA_IDENTIFIER && buf[1] == SUBTITLE_STREAM_ID {
            CheckStreamRez::Recognized(&DVBSUB_CODEC_INFO)
        } else {
            CheckStreamRez::NotDetected
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
        &DVBSUB_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.is_empty() {
            return Ok(FrameResult::NeedMoreData);
        }
        let data = std::mem::replace(&mut self.buffer, Bytes::new());
        Ok(FrameResult::Packet(Packet::new(data, &DVBSUB_CODEC_INFO)))
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.is_empty() {
            return Ok(FrameResult::Eof);
        }
        self.read_packet()
    }
}

impl Default for DvbSubParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_stream_detects_data_identifier() {
        let data = [DATA_IDENTIFIER, SUBTITLE_STREAM_ID, 0x0F, 0, 0];
        assert!(DvbSubParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_other_data() {
        assert!(!DvbSubParser::check_stream(&[0x21, 0x00], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn whole_buffer_becomes_one_packet() {
        let data = vec![DATA_IDENTIFIER, SUBTITLE_STREAM_ID, 0x0F, 1, 2, 3, 0xFF];
        let mut parser = DvbSubParser::new();
        parser.set_buffer(Bytes::from(data.clone()), false);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => assert_eq!(p.data.as_ref(), data.as_slice()),
            other => panic!("expected packet, got {other:?}"),
        }
        assert!(matches!(parser.read_packet().unwrap(), FrameResult::NeedMoreData));
    }
}
