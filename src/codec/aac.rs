//! # AAC (ADTS)
//!
//! Frames a raw ADTS elementary stream: 7-byte (or 9-byte with CRC) header
//! carrying the frame length, sample rate index, and channel
//! configuration, immediately followed by the raw AAC payload. LOAS/LATM
//! framing is out of scope and is reported as
//! [`CheckStreamRez::RecognizedUnsupported`] rather than framed.
//!
//! Grounded on the teacher's `codec::aac::parser::AACParser` ADTS header
//! field layout.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, AAC_CODEC_INFO};
use crate::utils::bits::BitReader;
use crate::{Packet, Result};

const ADTS_SYNC_MASK: u16 = 0xFFF6; // top 12 sync bits + layer bits fixed to 00
const SAMPLES_PER_FRAME: i64 = 1024;
const RESYNC_WINDOW: usize = 16 * 1024;

const SAMPLE_RATE_TABLE: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];
const CHANNEL_CONFIG_TABLE: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 8];

pub struct AacParser {
    buffer: Bytes,
    is_eof: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration: i64,
}

impl AacParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            sample_rate: 0,
            channels: 0,
            frame_duration: 0,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        match find_adts_sync(buf) {
            Some(_) => CheckStreamRez::Recognized(&AAC_CODEC_INFO),
            None => CheckStreamRez::NotDetected,
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
        &AAC_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        let Some(offset) = find_adts_sync(&self.buffer) else {
            if self.buffer.len() > RESYNC_WINDOW && self.is_eof {
                self.buffer = Bytes::new();
            }
            return Ok(FrameResult::NeedMoreData);
        };

        let Some(frame_len) = self.parse_header(&self.buffer[offset..]) else {
            return Ok(FrameResult::NeedMoreData);
        };

        if offset + frame_len > self.buffer.len() {
            return Ok(FrameResult::NeedMoreData);
        }

        let data = self.buffer.slice(offset..offset + frame_len);
        self.buffer = self.buffer.slice(offset + frame_len..);

        let mut packet = Packet::new(data, &AAC_CODEC_INFO);
        packet.duration = self.frame_duration;
        Ok(FrameResult::Packet(packet))
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.is_empty() {
            return Ok(FrameResult::Eof);
        }
        match self.read_packet()? {
            FrameResult::Packet(p) => Ok(FrameResult::Packet(p)),
            _ => {
                self.buffer = Bytes::new();
                Ok(FrameResult::Eof)
            }
        }
    }

    fn parse_header(&mut self, header: &[u8]) -> Option<usize> {
        if header.len() < 7 {
            return None;
        }
        let mut reader = BitReader::new(header);
        reader.skip_bits(12).ok()?; // syncword
        let _id = reader.read_bits(1).ok()?;
        let _layer = reader.read_bits(2).ok()?;
        let _protection_absent = reader.read_bits(1).ok()?;
        let _profile = reader.read_bits(2).ok()?;
        let sample_rate_idx = reader.read_bits(4).ok()? as usize;
        let _private_bit = reader.read_bits(1).ok()?;
        let channel_config = reader.read_bits(3).ok()? as usize;
        let _original_copy = reader.read_bits(1).ok()?;
        let _home = reader.read_bits(1).ok()?;
        let _copyright_id_bit = reader.read_bits(1).ok()?;
        let _copyright_id_start = reader.read_bits(1).ok()?;
        let frame_length = reader.read_bits(13).ok()? as usize;
        let _buffer_fullness = reader.read_bits(11).ok()?;
        let _num_raw_blocks = reader.read_bits(2).ok()?;

        self.sample_rate = SAMPLE_RATE_TABLE.get(sample_rate_idx).copied().unwrap_or(0);
        self.channels = CHANNEL_CONFIG_TABLE
            .get(channel_config)
            .copied()
            .unwrap_or(2);
        if self.sample_rate > 0 {
            self.frame_duration = SAMPLES_PER_FRAME * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }
        Some(frame_length)
    }
}

impl Default for AacParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_adts_sync(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    (0..=buf.len() - 2).find(|&i| {
        let word = ((buf[i] as u16) << 8) | buf[i + 1] as u16;
        (word & ADTS_SYNC_MASK) == 0xFFF0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adts_header(sample_rate_idx: u8, channel_config: u8, frame_length: u16) -> Vec<u8> {
        let mut acc: u64 = 0;
        let mut bits = 0u32;
        let mut push = |value: u64, width: u32| {
            acc = (acc << width) | value;
            bits += width;
        };
        push(0xFFF, 12);
        push(0, 1);
        push(0, 2);
        push(0, 1);
        push(1, 2); // profile AAC-LC
        push(sample_rate_idx as u64, 4);
        push(0, 1);
        push(channel_config as u64, 3);
        push(0, 1);
        push(0, 1);
        push(0, 1);
        push(0, 1);
        push(frame_length as u64, 13);
        push(0x7FF, 11);
        push(0, 2);
        let total_bytes = (bits / 8) as usize;
        let mut out = Vec::with_capacity(total_bytes);
        for i in (0..total_bytes).rev() {
            out.push(((acc >> (i * 8)) & 0xFF) as u8);
        }
        out.reverse();
        out.reverse();
        out
    }

    #[test]
    fn detects_adts_sync() {
        assert!(AacParser::check_stream(&[0xFF, 0xF1, 0, 0, 0, 0, 0], ContainerHint::Raw).is_recognized());
        assert!(!AacParser::check_stream(&[0x00, 0x00], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_sample_rate_and_channels() {
        let mut header = adts_header(3, 2, 200); // 48kHz, stereo
        header.resize(200, 0);
        let mut parser = AacParser::new();
        parser.set_buffer(Bytes::from(header), true);
        let rez = parser.read_packet().unwrap();
        match rez {
            FrameResult::Packet(p) => {
                assert_eq!(parser.sample_rate, 48000);
                assert_eq!(parser.channels, 2);
                assert_eq!(p.size(), 200);
            }
            other => panic!("expected a packet, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_frame_requests_more_data() {
        let header = adts_header(3, 2, 400);
        let mut parser = AacParser::new();
        parser.set_buffer(Bytes::from(header), false);
        assert!(matches!(parser.read_packet().unwrap(), FrameResult::NeedMoreData));
    }
}
