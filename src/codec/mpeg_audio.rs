//! # MPEG Audio (MP1/MP2/MP3)
//!
//! Frames an `ISO/IEC 11172-3` / `13818-3` elementary stream from its
//! 4-byte header: MPEG version, layer, bitrate and sampling-frequency
//! indices give the exact frame length in bytes, per the standard
//! per-layer formula.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, MPEG_AUDIO_CODEC_INFO};
use crate::{Packet, Result};

const RESYNC_WINDOW: usize = 16 * 1024;

// [MPEG1, MPEG2/2.5] x [L1, L2, L3] bitrate tables, kbps, index 0 = free/bad.
const BITRATE_V1_L1: [u32; 16] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0,
];
const BITRATE_V1_L2: [u32; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0,
];
const BITRATE_V1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATE_V2_L1: [u32; 16] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0,
];
const BITRATE_V2_L23: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];

const SAMPLE_RATE_MPEG1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATE_MPEG2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATE_MPEG25: [u32; 3] = [11025, 12000, 8000];

pub struct MpegAudioParser {
    buffer: Bytes,
    is_eof: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration: i64,
}

impl MpegAudioParser {
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
        match find_sync(buf) {
            Some(_) => CheckStreamRez::Recognized(&MPEG_AUDIO_CODEC_INFO),
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
        &MPEG_AUDIO_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        let Some(offset) = find_sync(&self.buffer) else {
            if self.buffer.len() > RESYNC_WINDOW && self.is_eof {
                self.buffer = Bytes::new();
            }
            return Ok(FrameResult::NeedMoreData);
        };

        let Some((frame_len, samples)) = parse_header(&self.buffer[offset..], &mut self.sample_rate, &mut self.channels)
        else {
            return Ok(FrameResult::NeedMoreData);
        };

        if offset + frame_len > self.buffer.len() {
            return Ok(FrameResult::NeedMoreData);
        }

        if self.sample_rate > 0 {
            self.frame_duration = samples * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }

        let data = self.buffer.slice(offset..offset + frame_len);
        self.buffer = self.buffer.slice(offset + frame_len..);

        let mut packet = Packet::new(data, &MPEG_AUDIO_CODEC_INFO);
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
}

impl Default for MpegAudioParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    if buf.len() < 2 {
        return None;
    }
    (0..=buf.len() - 2).find(|&i| buf[i] == 0xFF && (buf[i + 1] & 0xE0) == 0xE0)
}

/// Returns `(frame_length_bytes, samples_per_frame)`.
fn parse_header(header: &[u8], sample_rate_out: &mut u32, channels_out: &mut u32) -> Option<(usize, i64)> {
    if header.len() < 4 {
        return None;
    }
    let version_bits = (header[1] >> 3) & 0x03;
    let layer_bits = (header[1] >> 1) & 0x03;
    let bitrate_idx = ((header[2] >> 4) & 0x0F) as usize;
    let sample_rate_idx = ((header[2] >> 2) & 0x03) as usize;
    let padding = (header[2] >> 1) & 0x01;
    let channel_mode = (header[3] >> 6) & 0x03;

    if layer_bits == 0 || sample_rate_idx == 3 {
        return None;
    }

    let (is_mpeg1, is_mpeg25) = match version_bits {
        0b11 => (true, false),
        0b10 => (false, false),
        0b00 => (false, true),
        _ => return None, // reserved
    };
    let layer = match layer_bits {
        0b11 => 1,
        0b10 => 2,
        0b01 => 3,
        _ => return None,
    };

    let sample_rate = if is_mpeg1 {
        SAMPLE_RATE_MPEG1[sample_rate_idx]
    } else if is_mpeg25 {
        SAMPLE_RATE_MPEG25[sample_rate_idx]
    } else {
        SAMPLE_RATE_MPEG2[sample_rate_idx]
    };

    let bitrate_kbps = match (is_mpeg1, layer) {
        (true, 1) => BITRATE_V1_L1[bitrate_idx],
        (true, 2) => BITRATE_V1_L2[bitrate_idx],
        (true, 3) => BITRATE_V1_L3[bitrate_idx],
        (false, 1) => BITRATE_V2_L1[bitrate_idx],
        (false, _) => BITRATE_V2_L23[bitrate_idx],
    };
    if bitrate_kbps == 0 || sample_rate == 0 {
        return None;
    }
    let bitrate_bps = bitrate_kbps * 1000;

    let frame_len = if layer == 1 {
        (12 * bitrate_bps / sample_rate + padding as u32) * 4
    } else {
        let coeff = if is_mpeg1 { 144 } else { 72 };
        coeff * bitrate_bps / sample_rate + padding as u32
    };

    *sample_rate_out = sample_rate;
    *channels_out = if channel_mode == 0b11 { 1 } else { 2 };

    let samples = if layer == 1 {
        384
    } else if layer == 2 || is_mpeg1 {
        1152
    } else {
        576
    };

    Some((frame_len as usize, samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_sync() {
        assert!(MpegAudioParser::check_stream(&[0xFF, 0xFB, 0x90, 0x00], ContainerHint::Raw).is_recognized());
        assert!(!MpegAudioParser::check_stream(&[0x00, 0x00], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_mpeg1_layer3_128kbps_44100() {
        // version=11(MPEG1), layer=01(L3), protection=1, bitrate_idx=1001(9->128kbps),
        // sample_rate_idx=00(44100), padding=0, mode=stereo(00)
        let header = [0xFF, 0xFB, 0x90, 0x00];
        let mut rate = 0;
        let mut channels = 0;
        let (len, samples) = parse_header(&header, &mut rate, &mut channels).unwrap();
        assert_eq!(rate, 44100);
        assert_eq!(channels, 2);
        assert_eq!(samples, 1152);
        assert_eq!(len, 144 * 128000 / 44100);
    }

    #[test]
    fn rejects_reserved_sample_rate_index() {
        let header = [0xFF, 0xFB, 0x9C, 0x00];
        let mut rate = 0;
        let mut channels = 0;
        assert!(parse_header(&header, &mut rate, &mut channels).is_none());
    }
}
