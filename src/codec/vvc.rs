//! # VVC / H.266
//!
//! Same Annex-B access-unit assembly shape as HEVC, adapted to VVC's
//! 2-byte NAL header (`forbidden_zero_bit`, `nuh_reserved_zero_bit`,
//! 6-bit `nuh_layer_id`, 5-bit `nal_unit_type`, 3-bit
//! `nuh_temporal_id_plus1`). Picture order count is not decoded; `pts`/`dts` advance in decode order like
//! H.264's.

use bytes::{Bytes, BytesMut};

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, VVC_CODEC_INFO};
use crate::utils::annexb::next_complete_nal;
use crate::{Packet, PacketFlags, Result};

const NAL_TRAIL_NUT: u8 = 0;
const NAL_IDR_W_RADL: u8 = 7;
const NAL_IDR_N_LP: u8 = 8;
const NAL_CRA_NUT: u8 = 9;
const NAL_GDR_NUT: u8 = 10;
const NAL_OPI_NUT: u8 = 12;
const NAL_VPS_NUT: u8 = 14;
const NAL_SPS_NUT: u8 = 15;
const NAL_PPS_NUT: u8 = 16;
const NAL_PH_NUT: u8 = 19;
const NAL_AUD_NUT: u8 = 20;
const NAL_PREFIX_SEI_NUT: u8 = 23;

fn is_slice(nal_type: u8) -> bool {
    nal_type <= NAL_TRAIL_NUT + 3 || (NAL_IDR_W_RADL..=NAL_GDR_NUT).contains(&nal_type)
}

fn is_idr_or_cra(nal_type: u8) -> bool {
    matches!(nal_type, NAL_IDR_W_RADL | NAL_IDR_N_LP | NAL_CRA_NUT)
}

pub struct VvcParser {
    buffer: Bytes,
    is_eof: bool,
    pending_au: BytesMut,
    au_has_slice: bool,
    pub last_i_frame: bool,
    pub frame_duration: i64,
    decode_index: i64,
}

impl VvcParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            pending_au: BytesMut::new(),
            au_has_slice: false,
            last_i_frame: false,
            frame_duration: 0,
            decode_index: 0,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        let mut from = 0;
        while let Some(nal_start) = crate::utils::annexb::next_start_code(buf, from) {
            if let Some(nal_type) = nal_type_at(buf, nal_start) {
                if nal_type == NAL_VPS_NUT || nal_type == NAL_SPS_NUT {
                    return CheckStreamRez::Recognized(&VVC_CODEC_INFO);
                }
            }
            from = nal_start + 1;
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
        &VVC_CODEC_INFO
    }

    pub fn set_frame_rate(&mut self, num: u32, den: u32) {
        if num > 0 {
            self.frame_duration = crate::INTERNAL_PTS_FREQ * den as i64 / num as i64;
        }
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        loop {
            let Some((nal_start, nal_end)) = next_complete_nal(&self.buffer, 0) else {
                if self.is_eof && !self.buffer.is_empty() {
                    if let Some(nal_start) = crate::utils::annexb::next_start_code(&self.buffer, 0) {
                        let nal_end = self.buffer.len();
                        self.consume_nal(nal_start, nal_end);
                        self.buffer = Bytes::new();
                        continue;
                    }
                }
                return Ok(FrameResult::NeedMoreData);
            };

            let Some(nal_type) = nal_type_at(&self.buffer, nal_start) else {
                self.buffer = self.buffer.slice(nal_end..);
                continue;
            };

            if self.starts_new_access_unit(nal_type) && self.au_has_slice {
                return Ok(FrameResult::Packet(self.emit_pending()));
            }

            self.consume_nal(nal_start, nal_end);
        }
    }

    fn starts_new_access_unit(&self, nal_type: u8) -> bool {
        matches!(
            nal_type,
            NAL_VPS_NUT | NAL_SPS_NUT | NAL_PPS_NUT | NAL_PH_NUT | NAL_AUD_NUT | NAL_OPI_NUT | NAL_PREFIX_SEI_NUT
        )
    }

    fn consume_nal(&mut self, nal_start: usize, nal_end: usize) {
        if let Some(nal_type) = nal_type_at(&self.buffer, nal_start) {
            if is_slice(nal_type) {
                self.last_i_frame = is_idr_or_cra(nal_type);
                self.au_has_slice = true;
            }
        }
        self.pending_au.extend_from_slice(&[0, 0, 1]);
        self.pending_au.extend_from_slice(&self.buffer[nal_start..nal_end]);
        self.buffer = self.buffer.slice(nal_end..);
    }

    fn emit_pending(&mut self) -> Packet {
        let data = self.pending_au.split().freeze();
        self.au_has_slice = false;

        let mut packet = Packet::new(data, &VVC_CODEC_INFO);
        packet.duration = self.frame_duration;
        packet.dts = self.decode_index * self.frame_duration;
        packet.pts = packet.dts;
        self.decode_index += 1;
        if self.last_i_frame {
            packet.flags |= PacketFlags::PRIORITY_DATA;
        }
        packet
    }

    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if !self.buffer.is_empty() {
            if let Some(nal_start) = crate::utils::annexb::next_start_code(&self.buffer, 0) {
                let nal_end = self.buffer.len();
                self.consume_nal(nal_start, nal_end);
            }
            self.buffer = Bytes::new();
        }
        if self.au_has_slice {
            Ok(FrameResult::Packet(self.emit_pending()))
        } else {
            Ok(FrameResult::Eof)
        }
    }
}

impl Default for VvcParser {
    fn default() -> Self {
        Self::new()
    }
}

fn nal_type_at(buf: &[u8], nal_start: usize) -> Option<u8> {
    let b = *buf.get(nal_start + 1)?;
    Some((b >> 3) & 0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nal(nal_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0, 0, 1, 0, nal_type << 3];
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn check_stream_detects_sps_nut() {
        let data = nal(NAL_SPS_NUT, &[0, 0, 0, 0]);
        assert!(VvcParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_without_parameter_sets() {
        let data = nal(NAL_TRAIL_NUT, &[0, 0, 0]);
        assert!(!VvcParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn emits_access_unit_at_aud() {
        let mut data = nal(NAL_IDR_W_RADL, &[0x80, 0, 0]);
        data.extend_from_slice(&nal(NAL_AUD_NUT, &[0]));
        data.extend_from_slice(&nal(NAL_TRAIL_NUT, &[0x80, 0, 0]));
        let mut parser = VvcParser::new();
        parser.set_buffer(Bytes::from(data), true);
        let rez = parser.read_packet().unwrap();
        assert!(matches!(rez, FrameResult::Packet(_)));
        if let FrameResult::Packet(p) = rez {
            assert!(p.is_priority_data());
        }
    }
}
