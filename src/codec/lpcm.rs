//! # Blu-ray LPCM
//!
//! BDAV/HDMV LPCM has no internal frame sync: a single 4-byte header
//! (channel assignment, sample rate, bits-per-sample) precedes a
//! continuous run of raw PCM samples whose only natural boundary is the
//! PES packet that carried it. This parser reads the header once, then
//! packetizes the remaining raw PCM into fixed-size chunks so the
//! interleaver still has a `last_dts`-advancing cadence to schedule on.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, LPCM_CODEC_INFO};
use crate::{Packet, Result};

const HEADER_LEN: usize = 4;
/// Samples (per channel) packetized per emitted chunk.
const CHUNK_SAMPLES: i64 = 200;

const CHANNEL_TABLE: [u32; 16] = [0, 1, 0, 2, 3, 3, 4, 4, 5, 6, 7, 8, 0, 0, 0, 0];
const SAMPLE_RATE_TABLE: [u32; 16] = [
    0, 0, 0, 0, 48000, 0, 0, 0, 96000, 0, 0, 0, 192000, 0, 0, 0,
];

pub struct LpcmParser {
    buffer: Bytes,
    is_eof: bool,
    header_parsed: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub frame_duration: i64,
}

impl LpcmParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            header_parsed: false,
            sample_rate: 0,
            channels: 0,
            bits_per_sample: 16,
            frame_duration: 0,
        }
    }

    /// LPCM has no sync pattern to probe; a container's stream-type
    /// mapping is the only way it gets selected.
    pub fn check_stream(_buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        CheckStreamRez::NotDetected
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
        &LPCM_CODEC_INFO
    }

    fn chunk_bytes(&self) -> usize {
        let bytes_per_sample = (self.bits_per_sample / 8).max(2) as i64;
        (CHUNK_SAMPLES * self.channels.max(1) as i64 * bytes_per_sample) as usize
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        if !self.header_parsed {
            if self.buffer.len() < HEADER_LEN {
                return Ok(FrameResult::NeedMoreData);
            }
            self.parse_header();
            self.buffer = self.buffer.slice(HEADER_LEN..);
            self.header_parsed = true;
        }

        let chunk = self.chunk_bytes();
        if self.buffer.len() < chunk && !self.is_eof {
            return Ok(FrameResult::NeedMoreData);
        }
        if self.buffer.is_empty() {
            return Ok(FrameResult::NeedMoreData);
        }

        let take = chunk.min(self.buffer.len());
        let data = self.buffer.slice(0..take);
        self.buffer = self.buffer.slice(take..);

        if self.sample_rate > 0 && self.channels > 0 {
            let bytes_per_sample = (self.bits_per_sample / 8).max(2) as i64;
            let samples = take as i64 / (self.channels as i64 * bytes_per_sample);
            self.frame_duration = samples * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }

        let mut packet = Packet::new(data, &LPCM_CODEC_INFO);
        packet.duration = self.frame_duration;
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

    fn parse_header(&mut self) {
        let channel_assignment = (self.buffer[1] >> 4) & 0x0F;
        let sample_rate_code = (self.buffer[2] >> 4) & 0x0F;
        let bits_code = (self.buffer[2] >> 2) & 0x03;

        self.channels = CHANNEL_TABLE
            .get(channel_assignment as usize)
            .copied()
            .filter(|&c| c != 0)
            .unwrap_or(2);
        self.sample_rate = SAMPLE_RATE_TABLE
            .get(sample_rate_code as usize)
            .copied()
            .filter(|&r| r != 0)
            .unwrap_or(48000);
        self.bits_per_sample = match bits_code {
            1 => 20,
            2 => 24,
            _ => 16,
        };
    }
}

impl Default for LpcmParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(channel_assignment: u8, sample_rate_code: u8, bits_code: u8) -> [u8; HEADER_LEN] {
        [
            0,
            channel_assignment << 4,
            (sample_rate_code << 4) | (bits_code << 2),
            0,
        ]
    }

    #[test]
    fn check_stream_never_claims_lpcm() {
        assert!(!LpcmParser::check_stream(&[0, 0, 0, 0], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_header_then_chunks_pcm() {
        let mut data = header(3, 4, 0).to_vec(); // stereo, 48kHz, 16-bit
        data.extend(std::iter::repeat(0u8).take(4000));
        let mut parser = LpcmParser::new();
        parser.set_buffer(Bytes::from(data), false);
        let rez = parser.read_packet().unwrap();
        match rez {
            FrameResult::Packet(p) => {
                assert_eq!(parser.channels, 2);
                assert_eq!(parser.sample_rate, 48000);
                assert_eq!(p.size(), (CHUNK_SAMPLES as usize) * 2 * 2);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn flush_emits_residual_partial_chunk() {
        let mut data = header(3, 4, 0).to_vec();
        data.extend(std::iter::repeat(0u8).take(40));
        let mut parser = LpcmParser::new();
        parser.set_buffer(Bytes::from(data), true);
        let rez = parser.flush_packet().unwrap();
        assert!(matches!(rez, FrameResult::Packet(_)));
    }
}
