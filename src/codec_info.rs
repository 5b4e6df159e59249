//! # Codec Identity
//!
//! `CodecInfo` is an immutable descriptor: one canonical static instance per
//! codec, exposed by each parser's `getCodecInfo`-equivalent so a consumer
//! can identify a packet's codec without downcasting the parser itself.

/// Coarse family a codec belongs to, used by the manifest and autodetector
/// to route a track to the right parser constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeFamily {
    /// Video elementary stream.
    Video,
    /// Audio elementary stream.
    Audio,
    /// Subtitle/graphic overlay stream.
    Subtitle,
}

/// Immutable, codec-identifying metadata. One static instance per codec;
/// parsers return a `&'static CodecInfo` rather than constructing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    /// Stable identifier used for equality/matching (e.g. in tests).
    pub codec_id: &'static str,
    /// Manifest program name, e.g. `"A_DTS"`, `"V_MPEGH/ISO/HEVC"`.
    pub program_name: &'static str,
    /// Human-readable name for logs/progress reporting.
    pub display_name: &'static str,
    /// Coarse stream family.
    pub mime_family: MimeFamily,
}

macro_rules! codec_info {
    ($name:ident, $id:literal, $program:literal, $display:literal, $family:expr) => {
        /// Canonical codec descriptor.
        pub static $name: CodecInfo = CodecInfo {
            codec_id: $id,
            program_name: $program,
            display_name: $display,
            mime_family: $family,
        };
    };
}

codec_info!(DTS_CODEC_INFO, "dts", "A_DTS", "DTS", MimeFamily::Audio);
codec_info!(
    DTSHD_CODEC_INFO,
    "dts-hd",
    "A_DTS/HD",
    "DTS-HD",
    MimeFamily::Audio
);
codec_info!(AC3_CODEC_INFO, "ac3", "A_AC3", "AC-3", MimeFamily::Audio);
codec_info!(
    EAC3_CODEC_INFO,
    "eac3",
    "A_AC3/EAC3",
    "E-AC-3",
    MimeFamily::Audio
);
codec_info!(MLP_CODEC_INFO, "mlp", "A_MLP", "MLP", MimeFamily::Audio);
codec_info!(
    TRUEHD_CODEC_INFO,
    "truehd",
    "A_MLP/TRUEHD",
    "TrueHD",
    MimeFamily::Audio
);
codec_info!(AAC_CODEC_INFO, "aac", "A_AAC", "AAC", MimeFamily::Audio);
codec_info!(
    MPEG_AUDIO_CODEC_INFO,
    "mpa",
    "A_MP3",
    "MPEG Audio",
    MimeFamily::Audio
);
codec_info!(
    LPCM_CODEC_INFO,
    "lpcm",
    "A_LPCM",
    "LPCM",
    MimeFamily::Audio
);
codec_info!(
    MPEG2_VIDEO_CODEC_INFO,
    "mpeg2video",
    "V_MPEG-2",
    "MPEG-2 Video",
    MimeFamily::Video
);
codec_info!(
    H264_CODEC_INFO,
    "h264",
    "V_MPEG4/ISO/AVC",
    "H.264/AVC",
    MimeFamily::Video
);
codec_info!(
    MVC_CODEC_INFO,
    "mvc",
    "V_MPEG4/ISO/MVC",
    "H.264/MVC",
    MimeFamily::Video
);
codec_info!(
    HEVC_CODEC_INFO,
    "hevc",
    "V_MPEGH/ISO/HEVC",
    "H.265/HEVC",
    MimeFamily::Video
);
codec_info!(
    VVC_CODEC_INFO,
    "vvc",
    "V_MPEGI/ISO/VVC",
    "H.266/VVC",
    MimeFamily::Video
);
codec_info!(
    VC1_CODEC_INFO,
    "vc1",
    "V_MS/VFW/WVC1",
    "VC-1",
    MimeFamily::Video
);
codec_info!(
    PGS_CODEC_INFO,
    "pgs",
    "S_HDMV/PGS",
    "PGS Subtitle",
    MimeFamily::Subtitle
);
codec_info!(
    DVBSUB_CODEC_INFO,
    "dvbsub",
    "S_SUP",
    "DVB Subtitle",
    MimeFamily::Subtitle
);
codec_info!(
    SRT_CODEC_INFO,
    "srt",
    "S_TEXT/UTF8",
    "SubRip",
    MimeFamily::Subtitle
);
