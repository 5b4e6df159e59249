//! # MPEG-2 Video
//!
//! Scans `00 00 01` start codes (shared scanner in `utils::annexb`) for
//! picture boundaries: a `picture_start_code` (`0x00`) opens a new access
//! unit, everything up to (not including) the next one belongs to it. The
//! sequence header's `frame_rate_code` gives per-frame duration.

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, MPEG2_VIDEO_CODEC_INFO};
use crate::utils::annexb::next_start_code;
use crate::{Packet, PacketFlags, Result};

const PICTURE_START_CODE: u8 = 0x00;
const SEQUENCE_HEADER_CODE: u8 = 0xB3;
const GOP_START_CODE: u8 = 0xB8;

/// `(numerator, denominator)` for `frame_rate_code` 1..=8 (Table 6-4);
/// index 0 is the reserved/forbidden entry.
const FRAME_RATE_TABLE: [(u32, u32); 9] = [
    (0, 0),
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];

pub struct Mpeg2VideoParser {
    buffer: Bytes,
    is_eof: bool,
    pending_au: BytesMut,
    au_has_picture: bool,
    pub is_i_frame: bool,
    pub frame_duration: i64,
    pub width: u32,
    pub height: u32,
    decode_index: i64,
}

impl Mpeg2VideoParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            pending_au: BytesMut::new(),
            au_has_picture: false,
            is_i_frame: false,
            frame_duration: 0,
            width: 0,
            height: 0,
            decode_index: 0,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        let mut from = 0;
        while let Some(code_start) = next_start_code(buf, from) {
            if buf.get(code_start) == Some(&SEQUENCE_HEADER_CODE) {
                return CheckStreamRez::Recognized(&MPEG2_VIDEO_CODEC_INFO);
            }
            from = code_start + 1;
        }
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
        &MPEG2_VIDEO_CODEC_INFO
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        loop {
            let Some(unit_start) = next_start_code(&self.buffer, 0) else {
                if self.is_eof && !self.buffer.is_empty() {
                    self.pending_au.extend_from_slice(&self.buffer);
                    self.buffer = Bytes::new();
                }
                return Ok(FrameResult::NeedMoreData);
            };
            // `unit_start` is the byte right after `00 00 01`; back up to
            // include the start code itself in whatever we consume.
            let prefix_start = unit_start - 3;
            let code = self.buffer[unit_start];

            let Some(next_unit) = next_start_code(&self.buffer, unit_start) else {
                if !self.is_eof {
                    return Ok(FrameResult::NeedMoreData);
                }
                let unit_end = self.buffer.len();
                self.consume_unit(prefix_start, code, unit_end);
                self.buffer = Bytes::new();
                continue;
            };
            let unit_end = next_unit - 3;

            if code == PICTURE_START_CODE && self.au_has_picture {
                return Ok(FrameResult::Packet(self.emit_pending()));
            }

            self.consume_unit(prefix_start, code, unit_end);
        }
    }

    fn consume_unit(&mut self, prefix_start: usize, code: u8, unit_end: usize) {
        match code {
            SEQUENCE_HEADER_CODE => self.parse_sequence_header(&self.buffer[prefix_start + 4..unit_end].to_vec()),
            PICTURE_START_CODE => self.au_has_picture = true,
            GOP_START_CODE => {}
            _ => {}
        }
        self.pending_au.extend_from_slice(&self.buffer[prefix_start..unit_end]);
        self.buffer = self.buffer.slice(unit_end..);
    }

    fn parse_sequence_header(&mut self, header: &[u8]) {
        if header.len() < 8 {
            return;
        }
        self.width = ((header[0] as u32) << 4) | ((header[1] as u32) >> 4);
        self.height = (((header[1] as u32) & 0x0F) << 8) | header[2] as u32;
        let frame_rate_code = (header[3] & 0x0F) as usize;
        if let Some(&(num, den)) = FRAME_RATE_TABLE.get(frame_rate_code) {
            if num > 0 {
                self.frame_duration = crate::INTERNAL_PTS_FREQ * den as i64 / num as i64;
            }
        }
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_au.split().freeze();
        self.au_has_picture = true; // the picture_start_code we just saw starts the next AU
        self.is_i_frame = detect_i_frame(&data);

        let mut packet = Packet::new(data, &MPEG2_VIDEO_CODEC_INFO);
        packet.duration = self.frame_duration;
        packet.dts = self.decode_index * self.frame_duration;
        packet.pts = packet.dts;
        self.decode_index += 1;
        if self.is_i_frame {
            packet.flags |= PacketFlags::PRIORITY_DATA;
        }
        packet
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if !self.buffer.is_empty() {
            self.pending_au.extend_from_slice(&self.buffer);
            self.buffer = Bytes::new();
        }
        if self.au_has_picture && !self.pending_au.is_empty() {
            self.au_has_picture = false;
            Ok(FrameResult::Packet(self.emit_pending()))
        } else {
            Ok(FrameResult::Eof)
        }
    }
}

impl Default for Mpeg2VideoParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads `picture_coding_type` (3 bits, byte 2 of `picture_header`) out of
/// an access unit that opens with a picture start code; `1` is I-frame.
fn detect_i_frame(au: &[u8]) -> bool {
    let mut from = 0;
    while let Some(start) = next_start_code(au, from) {
        if au.get(start) == Some(&PICTURE_START_CODE) {
            // `start` is the picture_start_code byte itself; the payload
            // begins at `start + 1`. `temporal_reference` occupies that
            // whole byte plus the top 2 bits of `start + 2`, so
            // `picture_coding_type` is bits 3..5 of `start + 2`.
            if let Some(&b) = au.get(start + 2) {
                let coding_type = (b >> 3) & 0x07;
                return coding_type == 1;
            }
        }
        from = start + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_code(code: u8) -> Vec<u8> {
        vec![0, 0, 1, code]
    }

    #[test]
    fn check_stream_detects_sequence_header() {
        let mut data = start_code(SEQUENCE_HEADER_CODE);
        data.extend_from_slice(&[0x01, 0x40, 0x01, 0x23]);
        assert!(Mpeg2VideoParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_without_sequence_header() {
        let data = start_code(GOP_START_CODE);
        assert!(!Mpeg2VideoParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_sequence_header_dimensions_and_frame_rate() {
        let mut data = start_code(SEQUENCE_HEADER_CODE);
        // width=1920 (0x780), height=1080 (0x438), frame_rate_code=4 (30000/1001)
        data.extend_from_slice(&[0x78, 0x04, 0x38, 0x14, 0, 0, 0, 0]);
        data.extend_from_slice(&start_code(PICTURE_START_CODE));
        // byte0 = temporal_reference high bits (arbitrary); byte1's bits
        // 3..5 are coding_type=1 (I-frame)
        data.extend_from_slice(&[0, 0x08, 0]);
        data.extend_from_slice(&start_code(PICTURE_START_CODE));
        data.extend_from_slice(&[0, 0x10, 0]); // coding_type=2 (P-frame)

        let mut parser = Mpeg2VideoParser::new();
        parser.set_buffer(Bytes::from(data), true);
        let rez = parser.read_packet().unwrap();
        let packet = match rez {
            FrameResult::Packet(p) => p,
            other => panic!("expected a packet, got {other:?}"),
        };
        assert!(packet.flags.contains(PacketFlags::PRIORITY_DATA));
        assert_eq!(parser.width, 1920);
        assert_eq!(parser.height, 1080);
    }
}
