//! # DTS / DTS-HD
//!
//! Implements a state machine with three phases: `DecodeDts` until a
//! DTS-HD extension substream prefix is found immediately after a core
//! sync, then `DecodeHd`/`DecodeHd2` while the HD asset header is parsed.
//! If only the DTS-HD Express extension is present (no core sync ever
//! observed), `core_exists` stays `false` and the parser still emits
//! frames, but `codec_info()` falls back to the plain DTS descriptor.

use bytes::Bytes;

use crate::codec::{CheckStreamRez, ContainerHint, FrameResult};
use crate::codec_info::{CodecInfo, DTSHD_CODEC_INFO, DTS_CODEC_INFO};
use crate::{Packet, PacketFlags, Result};

const DTS_CORE_SYNC: [u8; 4] = [0x7F, 0xFE, 0x80, 0x01];
const DTS_HD_SYNC: [u8; 4] = [0x64, 0x58, 0x20, 0x25];
/// How far past a DTS core sync the parser searches for a second sync
/// marker before giving up on the current candidate offset.
const RESYNC_WINDOW: usize = 32 * 1024;

const SAMPLE_RATE_TABLE: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

/// DTS channel arrangement (`AMODE`) → channel count, the subset this
/// crate needs for descriptor/metadata purposes.
const CHANNEL_TABLE: [u32; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

/// DTS-HD extension subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtsHdSubtype {
    MasterAudio,
    HighRes,
    Express,
    DtsEs,
    Dts9624,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    DecodeDts,
    DecodeHd,
    DecodeHd2,
}

/// Parser state for DTS / DTS-HD.
pub struct DtsParser {
    buffer: Bytes,
    is_eof: bool,
    state: DecodeState,
    /// `false` once a DTS-HD-Express-only stream is confirmed (no core
    /// sync ever found ahead of the HD prefix).
    pub core_exists: bool,
    pub hd_type: Option<DtsHdSubtype>,
    pub hd_channels: u32,
    pub hd_sample_rate: u32,
    pub sample_rate: u32,
    pub channels: u32,
    pub frame_duration: i64,
    frame_length: usize,
    /// Strip HD extension data before emission when `down-to-dts` is set
    ///; HD state is still tracked for the descriptor.
    pub down_to_dts: bool,
    pub bluray_mode: bool,
}

impl DtsParser {
    pub fn new() -> Self {
        Self {
            buffer: Bytes::new(),
            is_eof: false,
            state: DecodeState::DecodeDts,
            core_exists: true,
            hd_type: None,
            hd_channels: 0,
            hd_sample_rate: 0,
            sample_rate: 0,
            channels: 0,
            frame_duration: 0,
            frame_length: 0,
            down_to_dts: false,
            bluray_mode: false,
        }
    }

    pub fn check_stream(buf: &[u8], _hint: ContainerHint) -> CheckStreamRez {
        if test_sync_info16be(buf) {
            CheckStreamRez::Recognized(&DTS_CODEC_INFO)
        } else {
            CheckStreamRez::NotDetected
        }
    }

    pub fn set_buffer(&mut self, data: Bytes, is_eof: bool) {
        self.buffer = data;
        self.is_eof = is_eof;
    }

    /// Bytes not yet consumed out of the last buffer handed to `set_buffer`.
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// Clone of the unconsumed tail, used by [`crate::stream_info::StreamInfo`]
    /// to re-arm the parser with an EOF flag without losing residue.
    pub fn remaining_bytes(&self) -> Bytes {
        self.buffer.clone()
    }

    pub fn codec_info(&self) -> &'static CodecInfo {
        // Without a backward-compatible DTS core, this track can't be
        // muxed as a DTS-HD elementary stream; report plain DTS even
        // though `hd_type` is known from the Express extension header.
        if self.core_exists && self.hd_type.is_some() && !self.down_to_dts {
            &DTSHD_CODEC_INFO
        } else {
            &DTS_CODEC_INFO
        }
    }

    /// Composes the registration descriptor names:
    /// the plain DTS descriptor, or the HD variant naming `hd_type` when
    /// an HD extension has been found and `down-to-dts` isn't stripping it.
    pub fn get_ts_descriptor(&self) -> &'static str {
        if self.hd_type.is_some() && !self.down_to_dts {
            match self.hd_type {
                Some(DtsHdSubtype::MasterAudio) => "DTS-HD/MA",
                Some(DtsHdSubtype::HighRes) => "DTS-HD/HR",
                Some(DtsHdSubtype::Express) => "DTS-HD/Express",
                Some(DtsHdSubtype::DtsEs) => "DTS-ES",
                Some(DtsHdSubtype::Dts9624) => "DTS-96/24",
                _ => "DTS-HD",
            }
        } else {
            "DTS"
        }
    }

    pub fn read_packet(&mut self) -> Result<FrameResult> {
        // DTS-HD Express carries no core sync ahead of it, so `find_frame`
        // (which only scans for `DTS_CORE_SYNC`) never matches this case;
        // it must be recognized before falling through to the core path.
        if self.buffer.starts_with(&DTS_HD_SYNC) {
            if self.buffer.len() < 9 {
                return Ok(FrameResult::NeedMoreData);
            }
            self.core_exists = false;
            self.state = DecodeState::DecodeHd2;
            let total_len = self.decode_hd_info(&self.buffer);

            if total_len > self.buffer.len() {
                return Ok(FrameResult::NeedMoreData);
            }

            let frame_data = self.buffer.slice(0..total_len);
            self.buffer = self.buffer.slice(total_len..);

            let mut packet = Packet::new(frame_data, self.codec_info());
            packet.duration = self.frame_duration;
            packet.flags |= PacketFlags::PRIORITY_DATA;
            return Ok(FrameResult::Packet(packet));
        }

        match find_frame(&self.buffer) {
            Some((offset, core_len)) => {
                self.parse_core_header(&self.buffer[offset..offset + core_len.min(self.buffer.len() - offset)]);

                let mut total_len = core_len;
                if self.buffer.len() >= offset + core_len + 4
                    && self.buffer[offset + core_len..offset + core_len + 4] == DTS_HD_SYNC
                {
                    self.state = DecodeState::DecodeHd;
                    let hd_len = self.decode_hd_info(&self.buffer[offset + core_len..]);
                    total_len += hd_len;
                }

                if self.down_to_dts && self.core_exists {
                    total_len = core_len;
                }

                if offset + total_len > self.buffer.len() {
                    return Ok(FrameResult::NeedMoreData);
                }

                let frame_data = self.buffer.slice(offset..offset + total_len);
                self.buffer = self.buffer.slice(offset + total_len..);

                let mut packet = Packet::new(frame_data, self.codec_info());
                packet.duration = self.frame_duration;
                packet.flags |= PacketFlags::PRIORITY_DATA;
                Ok(FrameResult::Packet(packet))
            }
            None => {
                if self.buffer.len() > RESYNC_WINDOW && self.is_eof {
                    self.buffer = Bytes::new();
                }
                Ok(FrameResult::NeedMoreData)
            }
        }
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

    fn parse_core_header(&mut self, header: &[u8]) {
        if header.len() < 10 {
            return;
        }
        let bits = BitView::new(header);
        // Skip 32-bit sync already matched by `find_frame`.
        let mut pos = 32;
        let _ftype = bits.get(pos, 1);
        pos += 1;
        let _short = bits.get(pos, 5);
        pos += 5;
        let _cpf = bits.get(pos, 1);
        pos += 1;
        let nblks = bits.get(pos, 7) as u32 + 1;
        pos += 7;
        let fsize = bits.get(pos, 14) as usize + 1;
        pos += 14;
        let amode = bits.get(pos, 6) as usize;
        pos += 6;
        let sfreq = bits.get(pos, 4) as usize;

        self.frame_length = fsize;
        self.sample_rate = SAMPLE_RATE_TABLE.get(sfreq).copied().unwrap_or(0);
        self.channels = CHANNEL_TABLE.get(amode).copied().unwrap_or(2);
        let samples = nblks * 32;
        if self.sample_rate > 0 {
            self.frame_duration = samples as i64 * crate::INTERNAL_PTS_FREQ / self.sample_rate as i64;
        }
    }

    /// Parses the DTS-HD extension substream header (`decodeHdInfo`).
    /// Returns the byte length of the HD extension so the caller can
    /// compute the total frame size to slice out.
    fn decode_hd_info(&mut self, hd: &[u8]) -> usize {
        if hd.len() < 9 {
            return hd.len();
        }
        let bits = BitView::new(hd);
        let mut pos = 32; // sync
        let _user_defined = bits.get(pos, 8);
        pos += 8;
        let _ext_ss_index = bits.get(pos, 2);
        pos += 2;
        let header_size_type = bits.get(pos, 1);
        pos += 1;
        let (header_size, frame_size) = if header_size_type == 0 {
            let hs = bits.get(pos, 8) as usize + 1;
            pos += 8;
            let fs = bits.get(pos, 16) as usize + 1;
            (hs, fs)
        } else {
            let hs = bits.get(pos, 12) as usize + 1;
            pos += 12;
            let fs = bits.get(pos, 20) as usize + 1;
            (hs, fs)
        };
        let _ = header_size;

        let coding_mode = bits.get(pos, 2);
        self.hd_type = Some(match coding_mode {
            0 => DtsHdSubtype::Other,
            1 => DtsHdSubtype::MasterAudio,
            2 => DtsHdSubtype::HighRes,
            _ => DtsHdSubtype::Express,
        });
        self.hd_sample_rate = if self.sample_rate > 0 { self.sample_rate } else { 48000 };
        self.hd_channels = self.channels.max(2);

        frame_size.max(9)
    }
}

impl Default for DtsParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Scans for the DTS sync word in 16-bit big-endian form (`findFrame`),
/// verifying a second sync one frame away before accepting. The marker
/// one frame away is either another core sync (consecutive plain DTS
/// frames) or the DTS-HD extension sync (a core frame immediately
/// followed by its HD substream) — either confirms the boundary.
fn find_frame(buf: &[u8]) -> Option<(usize, usize)> {
    let mut offset = 0;
    while offset + 14 <= buf.len() {
        if buf[offset..offset + 4] == DTS_CORE_SYNC {
            if let Some(len) = core_frame_len(&buf[offset..]) {
                if offset + len + 4 <= buf.len() {
                    let next = &buf[offset + len..offset + len + 4];
                    if next == DTS_CORE_SYNC || next == DTS_HD_SYNC {
                        return Some((offset, len));
                    }
                } else {
                    // Not enough data yet to confirm the second sync;
                    // still a plausible candidate.
                    return Some((offset, len));
                }
            }
        }
        offset += 1;
    }
    None
}

fn core_frame_len(header: &[u8]) -> Option<usize> {
    if header.len() < 10 {
        return None;
    }
    let bits = BitView::new(header);
    let fsize = bits.get(32 + 1 + 5 + 1 + 7, 14) as usize + 1;
    Some(fsize)
}

/// Looser sync acceptance used by `checkStream`/autodetection
/// (`testSyncInfo16be`): only requires the sync word to be present, not a
/// confirmed second frame.
pub fn test_sync_info16be(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == DTS_CORE_SYNC)
}

/// Minimal MSB-first bit accessor over a byte slice, used only by this
/// module's fixed-offset header field reads.
struct BitView<'a> {
    data: &'a [u8],
}

impl<'a> BitView<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn get(&self, bit_offset: usize, count: u8) -> u32 {
        let mut result = 0u32;
        for i in 0..count as usize {
            let bit_pos = bit_offset + i;
            let byte_idx = bit_pos / 8;
            let bit_idx = 7 - (bit_pos % 8);
            let bit = self
                .data
                .get(byte_idx)
                .map(|b| (b >> bit_idx) & 1)
                .unwrap_or(0);
            result = (result << 1) | bit as u32;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core_header(fsize: usize, amode: usize, sfreq: usize, nblks: usize) -> Vec<u8> {
        // Builds a minimal 10-byte DTS core header honoring the bit
        // layout `parse_core_header` reads.
        let mut bits: Vec<u8> = Vec::new();
        let mut acc: u64 = 0;
        let mut bitcount = 0u32;
        let mut push = |value: u64, width: u32| {
            acc = (acc << width) | value;
            bitcount += width;
        };
        push(0x7FFE8001, 32);
        push(0, 1); // ftype
        push(0, 5); // short
        push(0, 1); // cpf
        push((nblks - 1) as u64, 7);
        push((fsize - 1) as u64, 14);
        push(amode as u64, 6);
        push(sfreq as u64, 4);
        push(0, 2); // pad to byte boundary territory
        while bitcount % 8 != 0 {
            push(0, 1);
        }
        let total_bytes = (bitcount / 8) as usize;
        for i in (0..total_bytes).rev() {
            bits.push(((acc >> (i * 8)) & 0xFF) as u8);
        }
        bits.reverse();
        bits.reverse();
        bits
    }

    #[test]
    fn test_sync_info_detects_core_sync_word() {
        let data = [0x00, 0x7F, 0xFE, 0x80, 0x01, 0x00];
        assert!(test_sync_info16be(&data));
        assert!(!test_sync_info16be(&[0u8; 8]));
    }

    #[test]
    fn parses_core_header_channels_and_rate() {
        let header = core_header(512, 2, 13, 16);
        let mut parser = DtsParser::new();
        parser.parse_core_header(&header);
        assert_eq!(parser.sample_rate, 48000);
        assert_eq!(parser.channels, 2);
    }

    #[test]
    fn check_stream_accepts_dts_sync() {
        let data = [0x7F, 0xFE, 0x80, 0x01, 0, 0, 0, 0];
        assert!(DtsParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    #[test]
    fn check_stream_rejects_non_dts_buffer() {
        let data = [0u8; 16];
        assert!(!DtsParser::check_stream(&data, ContainerHint::Raw).is_recognized());
    }

    struct BitWriter {
        acc: u64,
        bitcount: u32,
        out: Vec<u8>,
    }

    impl BitWriter {
        fn new() -> Self {
            Self {
                acc: 0,
                bitcount: 0,
                out: Vec::new(),
            }
        }
        fn push(&mut self, value: u64, width: u32) {
            self.acc = (self.acc << width) | (value & ((1u64 << width) - 1));
            self.bitcount += width;
            while self.bitcount >= 8 {
                let shift = self.bitcount - 8;
                self.out.push(((self.acc >> shift) & 0xFF) as u8);
                self.bitcount -= 8;
                self.acc &= (1u64 << shift) - 1;
            }
        }
        fn finish(mut self) -> Vec<u8> {
            if self.bitcount > 0 {
                let pad = 8 - self.bitcount;
                self.acc <<= pad;
                self.out.push((self.acc & 0xFF) as u8);
            }
            self.out
        }
    }

    /// Builds a standalone DTS-HD extension substream (no core ahead of
    /// it), `total_len` bytes long, announcing `coding_mode`.
    fn hd_extension(coding_mode: u32, total_len: usize) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.push(0x6458_2025, 32); // DTS-HD extension sync
        w.push(0, 8); // user_defined_bits
        w.push(0, 2); // ext_ss_index
        w.push(0, 1); // header_size_type = short form
        w.push(7, 8); // header_size - 1
        w.push((total_len - 1) as u64, 16); // frame_size - 1
        w.push(coding_mode as u64, 2);
        let mut out = w.finish();
        out.resize(total_len, 0);
        out
    }

    #[test]
    fn express_only_stream_has_no_core_and_reports_plain_dts() {
        let data = hd_extension(1, 16); // coding_mode 1 -> MasterAudio
        let mut parser = DtsParser::new();
        parser.set_buffer(Bytes::from(data), true);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(p) => {
                assert!(!parser.core_exists);
                assert_eq!(parser.hd_type, Some(DtsHdSubtype::MasterAudio));
                assert_eq!(parser.codec_info().program_name, "A_DTS");
                assert_eq!(p.size(), 16);
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }

    #[test]
    fn core_plus_hd_extension_reports_dts_hd() {
        let core = core_header(64, 2, 13, 16);
        let mut data = core.clone();
        data.extend_from_slice(&hd_extension(1, 16));
        let mut parser = DtsParser::new();
        parser.set_buffer(Bytes::from(data), true);
        match parser.read_packet().unwrap() {
            FrameResult::Packet(_) => {
                assert!(parser.core_exists);
                assert_eq!(parser.hd_type, Some(DtsHdSubtype::MasterAudio));
                assert_eq!(parser.codec_info().program_name, "A_DTS/HD");
            }
            other => panic!("expected packet, got {other:?}"),
        }
    }
}
