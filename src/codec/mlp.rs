//! # MLP / TrueHD
//!
//! Every access unit opens with a 4-byte header: a parity nibble plus a
//! 12-bit length (in 16-bit words) and a 2-byte input timing field.
//! Access units that also carry a major sync (`0xF8726FBA`) announce the
//! stream's sample rate and, via the format byte right after the sync,
//! whether this is plain MLP or a TrueHD (Dolby) extension layer.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, MLP_CODEC_INFO, TRUEHD_CODEC_INFO};
use crate::{Packet, PacketFlags, Result};

const MAJOR_SYNC: [u8; 4] = [0xF8, 0x72, 0x6F, 0xBA];
const TRUEHD_FORMAT_BYTE: u8 = 0xBB;
const AU_HEADER_LEN: usize = 4;
const RESYNC_WINDOW: usize = 32 * 1024;
/// Access units are 40 samples, scaled by sample rate, but that scaling
/// cancels out: 40 samples / 48000 Hz == 80 samples / 96000 Hz.
const SAMPLES_PER_AU: i64 = 40;

/// `'mlpa'`, the SMPTE-RA-registered MPEG-TS descriptor tag for MLP/TrueHD.
const TS_DESCRIPTOR: &str = "mlpa";

pub struct MlpParser {
    buffer: Bytes,
    is_eof: bool,
    pub is_truehd: bool,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration: i64,
    /// Substream count from the major sync's extended substream info; 4
    /// indicates an embedded Atmos layer.
    pub substreams: u8,
    /// Largest per-access-unit bitrate observed so far (bits/sec).
    pub peak_bitrate: u32,
    /// Cumulative sample count across every access unit decoded so far,
    /// the basis for PTS=DTS (`totalTHDSamples * INTERNAL_PTS_FREQ / samplerate`).
    total_thd_samples: i64,
}

impl MlpParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            is_truehd: false,
            sample_rate: 0,
            channels: 0,
            frame_duration: 0,
            substreams: 0,
            peak_bitrate: 0,
            total_thd_samples: 0,
        }
    }

    /// Whether the major sync's substream count indicates an embedded
    /// Dolby Atmos layer (4 substreams).
    pub fn is_atmos(&self) -> bool {
        self.substreams == 4
    }

    /// Composes the `'mlpa'` registration descriptor tag.
    pub fn get_ts_descriptor(&self) -> &'static str {
        TS_DESCRIPTOR
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        if find_major_sync(buf).is_some() {
            CheckStreamRez::Recognized(&MLP_CODEC_INFO)
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
        if self.is_truehd {
            &TRUEHD_CODEC_INFO
        } else {
            &MLP_CODEC_INFO
        }
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.len() < AU_HEADER_LEN {
            if self.buffer.len() > RESYNC_WINDOW && self.is_eof {
                self.buffer = Bytes::new();
            }
            return Ok(FrameResult::NeedMoreData);
        }

        let length_field = (((self.buffer[0] as u16) & 0x0F) << 8) | self.buffer[1] as u16;
        let au_len = length_field as usize * 2;
        if au_len < AU_HEADER_LEN || self.buffer.len() < au_len {
            if self.is_eof && self.buffer.len() < au_len {
                return Ok(FrameResult::NeedMoreData);
            }
            if au_len < AU_HEADER_LEN {
                // Not aligned on an access unit boundary; resync on next byte.
                self.buffer = self.buffer.slice(1..);
                return Ok(FrameResult::NeedMoreData);
            }
            return Ok(FrameResult::NeedMoreData);
        }

        let has_major_sync = find_major_sync(&self.buffer[..au_len])
            .map(|sync_off| {
                self.parse_major_sync(&self.buffer[sync_off..]);
                true
            })
            .unwrap_or(false);

        if self.sample_rate > 0 {
            self.frame_duration = SAMPLES_PER_AU * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
            let bps = au_len as u32 * 8 * self.sample_rate / SAMPLES_PER_AU as u32;
            self.peak_bitrate = self.peak_bitrate.max(bps);
        }

        let data = self.buffer.slice(0..au_len);
        self.buffer = self.buffer.slice(au_len..);

        let mut packet = Packet::new(data, self.codec_info());
        packet.duration = self.frame_duration;
        if has_major_sync {
            packet.flags |= PacketFlags::PRIORITY_DATA;
        }
        if self.sample_rate > 0 {
            packet.pts = self.total_thd_samples * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
            packet.dts = packet.pts;
        }
        self.total_thd_samples += SAMPLES_PER_AU;
        Ok(FrameResult::Packet(packet))
    }

    /// Drains the parser's residue. A leftover access unit that isn't a
    /// priority (major-sync-bearing) packet is re-timed to the next HD
    /// packet's position; a priority packet's already-correct PTS/DTS
    /// from `read_packet` is left untouched.
    pub fn flush_packet(&mut self) -> Result<FrameResult> {
        if self.buffer.is_empty() {
            return Ok(FrameResult::Eof);
        }
        self.is_eof = true;
        match self.read_packet()? {
            FrameResult::Packet(mut p) => {
                if !p.flags.contains(PacketFlags::PRIORITY_DATA) && self.sample_rate > 0 {
                    p.pts = self.total_thd_samples * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
                    p.dts = p.pts;
                }
                Ok(FrameResult::Packet(p))
            }
            _ => {
                self.buffer = Bytes::new();
                Ok(FrameResult::Eof)
            }
        }
    }

    fn parse_major_sync(&mut self, sync: &[u8]) {
        if sync.len() < 11 {
            return;
        }
        self.is_truehd = sync[4] == TRUEHD_FORMAT_BYTE;
        let rate_code = (sync[6] >> 4) & 0x0F;
        self.sample_rate = match rate_code {
            0x0 => 48000,
            0x1 => 96000,
            0x2 => 192000,
            0x8 => 44100,
            0x9 => 88200,
            0xA => 176400,
            _ => 0,
        };
        self.channels = ((sync[7] as u32) & 0x1F) + 1;
        // Extended substream info lives in the low 2 bits of byte 10 of
        // the major sync, biased so 0b11 (3) means 4 substreams.
        self.substreams = ((sync[10] & 0x03) + 1) as u8;
    }
}

impl Default for MlpParser {
    fn default() -> Self {
        Self::new()
    }
}

fn find_major_sync(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == MAJOR_SYNC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access_unit_full(truehd: bool, rate_code: u8, channels_field: u8, substream_byte: u8, extra_len: usize) -> Vec<u8> {
        let mut body = vec![0u8; 4]; // input timing + placeholder
        body.extend_from_slice(&MAJOR_SYNC);
        body.push(if truehd { TRUEHD_FORMAT_BYTE } else { 0xBA });
        body.push(0); // stream format / flags
        body.push(rate_code << 4);
        body.push(channels_field);
        body.extend_from_slice(&[0, 0]); // reserved
        body.push(substream_byte);
        body.extend(std::iter::repeat(0u8).take(extra_len));

        let words = (body.len() + AU_HEADER_LEN) / 2;
        let mut au = Vec::with_capacity(body.len() + AU_HEADER_LEN);
        au.push(((words >> 8) & 0x0F) as u8);
        au.push((words & 0xFF) as u8);
        au.extend_from_slice(&[0, 0]); // input timing
        au.extend_from_slice(&body);
        au
    }

    fn access_unit(truehd: bool, rate_code: u8, extra_len: usize) -> Vec<u8> {
        access_unit_full(truehd, rate_code, 0, 0, extra_len)
    }

    #[test]
    fn detects_major_sync() {
        let au = access_unit(false, 0, 10);
        assert!(MlpParser::check_stream(&au, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn parses_truehd_flag_and_sample_rate() {
        let au = access_unit(true, 0, 10);
        let mut parser = MlpParser::new();
        parser.set_buffer(Bytes::from(au), true);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(_) => {
                assert!(parser.is_truehd);
                assert_eq!(parser.sample_rate, 48000);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn plain_mlp_format_byte_is_not_truehd() {
        let au = access_unit(false, 8, 10);
        let mut parser = MlpParser::new();
        parser.set_buffer(Bytes::from(au), true);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(_) => {
                assert!(!parser.is_truehd);
                assert_eq!(parser.sample_rate, 44100);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_access_unit_requests_more_data() {
        let mut au = access_unit(false, 0, 10);
        au.truncate(au.len() - 2);
        let mut parser = MlpParser::new();
        parser.set_buffer(Bytes::from(au), false);
        assert!(matches!(parser.read_packet().unwrap(), FrameResult::NeedMoreData));
    }

    #[test]
    fn four_substreams_is_flagged_atmos() {
        let au = access_unit_full(true, 0, 0, 3, 10); // substream_byte 3 -> 4 substreams
        let mut parser = MlpParser::new();
        parser.set_buffer(Bytes::from(au), true);
        parser.read_packet().unwrap();
        assert_eq!(parser.substreams, 4);
        assert!(parser.is_atmos());
    }

    #[test]
    fn fewer_substreams_is_not_atmos() {
        let au = access_unit_full(true, 0, 0, 1, 10); // substream_byte 1 -> 2 substreams
        let mut parser = MlpParser::new();
        parser.set_buffer(Bytes::from(au), true);
        parser.read_packet().unwrap();
        assert_eq!(parser.substreams, 2);
        assert!(!parser.is_atmos());
    }

    #[test]
    fn ts_descriptor_is_mlpa() {
        let parser = MlpParser::new();
        assert_eq!(parser.get_ts_descriptor(), "mlpa");
    }

    #[test]
    fn pts_accumulates_from_total_sample_count_across_access_units() {
        let au = access_unit(true, 0, 10); // 48kHz
        let mut parser = MlpParser::new();
        let mut buf = au.clone();
        buf.extend_from_slice(&au);
        parser.set_buffer(Bytes::from(buf), true);

        let first = match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => p,
            other => panic!("expected packet, got {other:?}"),
        };
        assert_eq!(first.pts, 0);

        let second = match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => p,
            other => panic!("expected packet, got {other:?}"),
        };
        // 40 samples at 48kHz in INTERNAL_PTS_FREQ (90kHz) ticks.
        assert_eq!(second.pts, 40 * crate::INTERNAL_PTS_FREQ / 48000);
        assert_eq!(second.dts, second.pts);
    }
}
