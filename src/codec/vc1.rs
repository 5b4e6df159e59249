//! # VC-1 (Advanced Profile, Annex-B framed)
//!
//! Blu-ray VC-1 elementary streams use byte-aligned `00 00 01` start codes
//! (same scanner as MPEG-2/H.264/HEVC) with a VC-1-specific BDU type byte:
//! `0x0F` sequence header, `0x0E` entry point, `0x0D` frame start. A new
//! frame begins at each `0x0D`.

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, VC1_CODEC_INFO};
use crate::utils::annexb::next_start_code;
use crate::{Packet, PacketFlags, Result};

const BDU_SEQUENCE_HEADER: u8 = 0x0F;
const BDU_ENTRY_POINT: u8 = 0x0E;
const BDU_FRAME_START: u8 = 0x0D;

pub struct Vc1Parser {
    buffer: Bytes,
    is_eof: bool,
    pending_au: BytesMut,
    au_has_frame: bool,
    pub frame_duration: i64,
    pub is_i_frame: bool,
    decode_index: i64,
}

impl Vc1Parser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            pending_au: BytesMut::new(),
            au_has_frame: false,
            frame_duration: 0,
            is_i_frame: false,
            decode_index: 0,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        let mut from = 0;
        while let Some(code_start) = next_start_code(buf, from) {
            if buf.get(code_start) == Some(&BDU_SEQUENCE_HEADER) {
                return CheckStreamRez::Recognized(&VC1_CODEC_INFO);
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
        &VC1_CODEC_INFO
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
            let prefix_start = unit_start - 3;
            let bdu_type = self.buffer[unit_start];

            let Some(next_unit) = next_start_code(&self.buffer, unit_start) else {
                if !self.is_eof {
                    return Ok(FrameResult::NeedMoreData);
                }
                let unit_end = self.buffer.len();
                self.consume_unit(prefix_start, bdu_type, unit_end);
                self.buffer = Bytes::new();
                continue;
            };
            let unit_end = next_unit - 3;

            if bdu_type == BDU_FRAME_START && self.au_has_frame {
                return Ok(FrameResult::Packet(self.emit_pending()));
            }

            self.consume_unit(prefix_start, bdu_type, unit_end);
        }
    }

    fn consume_unit(&mut self, prefix_start: usize, bdu_type: u8, unit_end: usize) {
        match bdu_type {
            BDU_FRAME_START => {
                self.au_has_frame = true;
                if let Some(&picture_byte) = self.buffer.get(prefix_start + 4) {
                    self.is_i_frame = (picture_byte >> 7) == 0;
                }
            }
            BDU_SEQUENCE_HEADER | BDU_ENTRY_POINT => {}
            _ => {}
        }
        self.pending_au.extend_from_slice(&self.buffer[prefix_start..unit_end]);
        self.buffer = self.buffer.slice(unit_end..);
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_au.split().freeze();
        self.au_has_frame = true;

        let mut packet = Packet::new(data, &VC1_CODEC_INFO);
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
        if self.au_has_frame && !self.pending_au.is_empty() {
            self.au_has_frame = false;
            Ok(FrameResult::Packet(self.emit_pending()))
        } else {
            Ok(FrameResult::Eof)
        }
    }
}

impl Default for Vc1Parser {
    fn default() -> Self {
        Self::new()
    }
}
