//! # AC-3 / E-AC-3
//!
//! Mirrors the DTS state machine: a classic AC-3 core
//! sync (`0x0B77`) followed by a `bsid` field that, once it reads above
//! the legacy AC-3 ceiling, is reinterpreted as an E-AC-3 header instead.
//! `down-to-ac3` strips the distinction the same way `down-to-dts` does
//! for DTS-HD: the parser still tracks whichever format it found, but
//! emits the plain AC-3 descriptor.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, AC3_CODEC_INFO, EAC3_CODEC_INFO};
use crate::utils::bits::BitReader;
use crate::{Packet, PacketFlags, Result};

const AC3_SYNC: [u8; 2] = [0x0B, 0x77];
/// `bsid` values above this belong to E-AC-3; legacy AC-3 never exceeds 8.
const LEGACY_BSID_CEILING: u8 = 10;
const RESYNC_WINDOW: usize = 32 * 1024;

/// AC-3 Table 5.18 frame sizes in 16-bit words, indexed by `fscod` then
/// bitrate index (`frmsizecod / 2`); 44.1 kHz additionally differs
/// between even/odd `frmsizecod`.
const FRAME_SIZE_48K: [u16; 19] = [
    64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640, 768, 896, 1024, 1152, 1280,
];
const FRAME_SIZE_44K_EVEN: [u16; 19] = [
    69, 87, 104, 121, 139, 174, 208, 243, 278, 348, 417, 487, 557, 696, 835, 975, 1114, 1253, 1393,
];
const FRAME_SIZE_44K_ODD: [u16; 19] = [
    70, 88, 105, 122, 140, 175, 209, 244, 279, 349, 418, 488, 558, 697, 836, 976, 1115, 1254, 1394,
];
const FRAME_SIZE_32K: [u16; 19] = [
    96, 120, 144, 168, 192, 240, 288, 336, 384, 480, 576, 672, 768, 960, 1152, 1344, 1536, 1728,
    1920,
];

const SAMPLE_RATE_TABLE: [u32; 4] = [48000, 44100, 32000, 0];
const ACMOD_CHANNELS: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];
const EAC3_BLOCKS_TABLE: [u32; 4] = [1, 2, 3, 6];

/// Parser state for AC-3 / E-AC-3.
pub struct Ac3Parser {
    buffer: Bytes,
    is_eof: bool,
    pub is_eac3: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration: i64,
    pub down_to_ac3: bool,
}

impl Ac3Parser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            is_eac3: false,
            sample_rate: 0,
            channels: 0,
            frame_duration: 0,
            down_to_ac3: false,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        if find_sync(buf).is_some() {
            CheckStreamRez::Recognized(&AC3_CODEC_INFO)
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
        if self.is_eac3 && !self.down_to_ac3 {
            &EAC3_CODEC_INFO
        } else {
            &AC3_CODEC_INFO
        }
    }

    pub fn get_ts_descriptor(&self) -> &'static str {
        if self.is_eac3 && !self.down_to_ac3 {
            "E-AC-3"
        } else {
            "AC-3"
        }
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        let Some(offset) = find_sync(&self.buffer) else {
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

        let mut packet = Packet::new(data, self.codec_info());
        packet.duration = self.frame_duration;
        packet.flags |= PacketFlags::PRIORITY_DATA;
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

    /// Parses the header at `header` (already sync-aligned), returning the
    /// frame length in bytes, or `None` if not enough bytes are present yet.
    fn parse_header(&mut self, header: &[u8]) -> Option<usize> {
        if header.len() < 6 {
            return None;
        }
        let bsid_probe = header[5] >> 3;
        if bsid_probe > LEGACY_BSID_CEILING {
            self.is_eac3 = true;
            self.parse_eac3_header(header)
        } else {
            self.is_eac3 = false;
            self.parse_ac3_header(header)
        }
    }

    fn parse_ac3_header(&mut self, header: &[u8]) -> Option<usize> {
        let mut reader = BitReader::new(header);
        reader.skip_bits(16).ok()?; // sync
        reader.skip_bits(16).ok()?; // crc1
        let fscod = reader.read_bits(2).ok()? as usize;
        let frmsizecod = reader.read_bits(6).ok()? as usize;
        let _bsid = reader.read_bits(5).ok()?;
        let _bsmod = reader.read_bits(3).ok()?;
        let acmod = reader.read_bits(3).ok()? as usize;

        self.sample_rate = SAMPLE_RATE_TABLE.get(fscod).copied().unwrap_or(0);
        self.channels = ACMOD_CHANNELS.get(acmod).copied().unwrap_or(2);

        let bitrate_idx = frmsizecod / 2;
        let words = match fscod {
            0 => FRAME_SIZE_48K.get(bitrate_idx).copied(),
            1 if frmsizecod % 2 == 0 => FRAME_SIZE_44K_EVEN.get(bitrate_idx).copied(),
            1 => FRAME_SIZE_44K_ODD.get(bitrate_idx).copied(),
            2 => FRAME_SIZE_32K.get(bitrate_idx).copied(),
            _ => None,
        }?;

        if self.sample_rate > 0 {
            self.frame_duration = 1536 * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }
        Some(words as usize * 2)
    }

    fn parse_eac3_header(&mut self, header: &[u8]) -> Option<usize> {
        let mut reader = BitReader::new(header);
        reader.skip_bits(16).ok()?; // sync
        let _strmtyp = reader.read_bits(2).ok()?;
        let _substreamid = reader.read_bits(3).ok()?;
        let frmsiz = reader.read_bits(11).ok()? as usize;
        let fscod = reader.read_bits(2).ok()? as usize;
        let blocks = if fscod == 3 {
            let _fscod2 = reader.read_bits(2).ok()?;
            6
        } else {
            let numblkscod = reader.read_bits(2).ok()? as usize;
            EAC3_BLOCKS_TABLE.get(numblkscod).copied().unwrap_or(6)
        };
        let acmod = reader.read_bits(3).ok()? as usize;

        self.sample_rate = SAMPLE_RATE_TABLE.get(fscod.min(2)).copied().unwrap_or(48000);
        self.channels = ACMOD_CHANNELS.get(acmod).copied().unwrap_or(2);
        if self.sample_rate > 0 {
            self.frame_duration = blocks as i64 * 256 * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }
        Some((frmsiz + 1) * 2)
    }
}

impl Default for Ac3Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == AC3_SYNC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ac3_header(fscod: u8, frmsizecod: u8, acmod: u8) -> Vec<u8> {
        let mut acc: u64 = 0;
        let mut bits = 0u32;
        let mut push = |value: u64, width: u32| {
            acc = (acc << width) | value;
            bits += width;
        };
        push(0x0B77, 16);
        push(0, 16); // crc1
        push(fscod as u64, 2);
        push(frmsizecod as u64, 6);
        push(8, 5); // bsid, legacy
        push(0, 3); // bsmod
        push(acmod as u64, 3);
        push(0, 2); // pad
        while bits % 8 != 0 {
            push(0, 1);
        }
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
    fn check_stream_detects_ac3_sync() {
        let data = [0x0B, 0x77, 0, 0, 0, 0];
        assert!(Ac3Parser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_non_ac3() {
        assert!(!Ac3Parser::check_stream(&[0u8; 8], ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_ac3_header_rate_and_channels() {
        let header = ac3_header(0, 16, 2); // 48kHz, stereo
        let mut parser = Ac3Parser::new();
        let len = parser.parse_header(&header).unwrap();
        assert_eq!(parser.sample_rate, 48000);
        assert_eq!(parser.channels, 2);
        assert_eq!(len, FRAME_SIZE_48K[8] as usize * 2);
        assert!(!parser.is_eac3);
    }

    #[test]
    fn bsid_above_ceiling_switches_to_eac3() {
        let mut acc: u64 = 0;
        let mut bits = 0u32;
        let mut push = |value: u64, width: u32| {
            acc = (acc << width) | value;
            bits += width;
        };
        push(0x0B77, 16);
        push(0, 2); // strmtyp
        push(0, 3); // substreamid
        push(255, 11); // frmsiz
        push(0, 2); // fscod
        push(1, 2); // numblkscod
        push(1, 3); // acmod
        push(16, 5); // bsid = 16 (E-AC-3)
        while bits % 8 != 0 {
            push(0, 1);
        }
        let total_bytes = (bits / 8) as usize;
        let mut out = Vec::with_capacity(total_bytes);
        for i in (0..total_bytes).rev() {
            out.push(((acc >> (i * 8)) & 0xFF) as u8);
        }
        out.reverse();
        out.reverse();

        let mut parser = Ac3Parser::new();
        let len = parser.parse_header(&out).unwrap();
        assert!(parser.is_eac3);
        assert_eq!(len, 256 * 2);
    }
}
