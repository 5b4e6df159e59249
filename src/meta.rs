//! # MetaDemuxer
//!
//! The top-level interleaver: holds every configured
//! track's [`crate::stream_info::StreamInfo`] and emits a single packet
//! stream, monotone by DTS across tracks, applying each track's time
//! shift and the cooperative refill/selection/flush algorithm.
//!
//! Grounded on `METADemuxer::readPacket`/`openFile`/`addStream` in the
//! original `metaDemuxer.cpp`: the refill loop calls every live stream's
//! `read()` each round (an unconditional call is cheap and idempotent —
//! see [`crate::stream_info::StreamInfo::read`] — so this crate keeps that
//! shape rather than tracking a separate "already pending" flag per
//! stream), the selection phase picks the smallest `last_dts` among
//! streams that aren't both EOF and flushed, and exhausting every stream
//! flips into a second flush-only pass before reporting EOF.
//!
//! File I/O is an external collaborator: `MetaDemuxer` never
//! opens a file itself. A caller supplies a [`TrackFileOpener`] that turns
//! a manifest path into a [`crate::format::ByteSource`], and (for Blu-ray
//! playlist tracks) a [`PlaylistResolver`] that turns an MPLS path and a
//! requested PID into its ordered clip list — MPLS/CLPI binary parsing
//! itself is out of scope, only the clip-to-file path
//! resolution in [`crate::bluray_paths`] is this crate's job.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::bluray_paths;
use crate::codec::autodetect;
use crate::codec::h264::InsertSeiMode;
use crate::codec::CodecParser;
use crate::config;
use crate::error::ErrorKind;
use crate::format::container::{ContainerDemuxer, ContainerFamily, UnsupportedContainerDemuxer};
use crate::format::container::ts::TsContainerDemuxer;
use crate::format::container_adapter::{ContainerAdapter, DemuxerReadPolicy, PidByteSource};
use crate::format::{ByteSource, ConcatByteSource};
use crate::lang;
use crate::manifest::{self, TrackEntry};
use crate::progress::{NullProgressObserver, ProgressObserver};
use crate::stream_info::{parse_time_shift, StreamInfo};
use crate::{Packet, PullResult, Result};

/// Opens a manifest track's source path into a [`ByteSource`]. The only
/// file-I/O seam this crate defines: a real embedder backs
/// this with buffered file reads; tests back it with in-memory fixtures.
pub trait TrackFileOpener {
    /// Opens `path` (as named literally in the manifest, or as resolved by
    /// [`bluray_paths`] for a playlist clip) for reading from the start.
    fn open(&mut self, path: &str) -> Result<Box<dyn ByteSource>>;
}

/// Resolves a Blu-ray playlist (`.mpls`/`.mpl`) and a requested PID to the
/// ordered list of clip numbers (e.g. `["00001", "00002"]`) the manifest's
/// `track=` selects. MPLS/CLPI binary parsing is out of scope for this
/// crate; an embedder supplies the parsed result through
/// this trait.
pub trait PlaylistResolver {
    /// Returns the clip numbers a playlist's `track` PID spans, in
    /// playback order.
    fn resolve_clips(&mut self, mpls_path: &str, track: Option<u32>) -> Result<Vec<String>>;
}

/// Outcome of one [`MetaDemuxer::read_packet`] call — the Rust shape of
/// `readPacket(out Packet) -> Ok | DATA_NOT_READY | DATA_EOF`.
#[derive(Debug)]
pub enum MetaReadResult {
    /// A packet was produced; `stream_index`/`pts`/`dts` already carry the
    /// emitting track's time shift.
    Packet(Packet),
    /// Upstream back-pressure: a track's `ByteSource` isn't ready yet, or
    /// no track could produce a packet from its currently buffered bytes.
    NotReady,
    /// Every track is exhausted and flushed.
    Eof,
}

struct ContainerKey {
    container_key: usize,
}

/// The top-level interleaver.
pub struct MetaDemuxer {
    streams: Vec<StreamInfo>,
    adapter: Rc<RefCell<ContainerAdapter>>,
    container_keys: HashMap<String, ContainerKey>,
    next_container_key: usize,
    flush_mode: bool,
    progress: Box<dyn ProgressObserver>,
    total_size_hint: i64,
    processed_size: i64,
}

impl Default for MetaDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaDemuxer {
    /// Creates an empty demuxer with no configured tracks and a
    /// [`NullProgressObserver`].
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            adapter: Rc::new(RefCell::new(ContainerAdapter::new())),
            container_keys: HashMap::new(),
            next_container_key: 0,
            flush_mode: false,
            progress: Box::new(NullProgressObserver),
            total_size_hint: 0,
            processed_size: 0,
        }
    }

    /// Creates an empty demuxer reporting progress through `progress`
    /// instead of discarding it.
    pub fn with_progress_observer(progress: Box<dyn ProgressObserver>) -> Self {
        let mut demuxer = Self::new();
        demuxer.progress = progress;
        demuxer
    }

    /// Sets the total byte count progress percentages are computed
    /// against (see [`crate::progress::percent_of`]). Optional: without a
    /// hint, progress is reported as complete once any packet flows,
    /// matching [`crate::progress::percent_of`]'s zero-total behavior.
    pub fn set_total_size_hint(&mut self, bytes: i64) {
        self.total_size_hint = bytes;
    }

    /// Number of configured tracks.
    pub fn track_count(&self) -> usize {
        self.streams.len()
    }

    /// Opens a manifest file, reading it via `std::fs` (the manifest's own
    /// text is small, synchronous configuration — distinct from the
    /// per-track elementary-stream/container data calls out as
    /// an external collaborator) and then parsing it exactly as
    /// [`MetaDemuxer::open_manifest`] does.
    pub fn open_file(
        &mut self,
        manifest_path: &Path,
        opener: &mut dyn TrackFileOpener,
        playlists: Option<&mut dyn PlaylistResolver>,
    ) -> Result<()> {
        let contents = std::fs::read_to_string(manifest_path)?;
        self.open_manifest(&contents, opener, playlists)
    }

    /// Parses `manifest_text` and opens every
    /// track it names through `opener`/`playlists`. Fatal configuration
    /// errors abort before any track is added.
    pub fn open_manifest(
        &mut self,
        manifest_text: &str,
        opener: &mut dyn TrackFileOpener,
        mut playlists: Option<&mut dyn PlaylistResolver>,
    ) -> Result<()> {
        let entries = manifest::parse(manifest_text)?;
        for entry in &entries {
            let index = self.streams.len();
            let stream = self.build_stream(index, entry, opener, playlists.as_deref_mut())?;
            self.streams.push(stream);
        }
        self.propagate_insert_sei();
        Ok(())
    }

    /// Registers one already-resolved track directly, bypassing the
    /// manifest grammar. Used by tests and by embedders that already have
    /// a parsed track list.
    pub fn add_stream(
        &mut self,
        codec_name: &str,
        source: Box<dyn ByteSource>,
        time_shift: i64,
        lang: Option<String>,
        is_sub_stream: bool,
    ) -> Result<()> {
        let parser = autodetect::by_program_name(codec_name)
            .ok_or_else(|| ErrorKind::UnknownCodec(codec_name.to_string()))?;
        let index = self.streams.len();
        let stream = StreamInfo::new(
            index,
            0,
            is_sub_stream,
            codec_name.to_string(),
            String::new(),
            HashMap::new(),
            time_shift,
            lang,
            source,
            parser,
        );
        self.streams.push(stream);
        Ok(())
    }

    fn build_stream(
        &mut self,
        index: usize,
        entry: &TrackEntry,
        opener: &mut dyn TrackFileOpener,
        playlists: Option<&mut dyn PlaylistResolver>,
    ) -> Result<StreamInfo> {
        let mut parser = autodetect::by_program_name(&entry.codec)
            .ok_or_else(|| ErrorKind::UnknownCodec(entry.codec.clone()))?;

        let time_shift = match entry.timeshift_raw() {
            Some(raw) => parse_time_shift(raw)?,
            None => 0,
        };
        let lang = entry.lang().map(lang::normalize);
        let track_number = entry.track_number()?;
        let is_sub_stream = matches!(entry.codec.as_str(), "V_MPEG4/ISO/MVC")
            || entry.option("subTrack").is_some()
            || entry.option("secondary").is_some()
            || entry.option("subClip").is_some();

        if let CodecParser::H264(h264) = &mut parser {
            if entry.option("forceSEI").is_some() {
                h264.set_insert_sei(InsertSeiMode::Force);
            } else if entry.option("autoSEI").is_some() {
                h264.set_insert_sei(InsertSeiMode::Auto);
            } else if entry.option("insertSEI").is_some() {
                h264.set_insert_sei(InsertSeiMode::Insert);
            }
        }

        let primary_path = entry
            .paths
            .first()
            .cloned()
            .ok_or_else(|| ErrorKind::InvalidCodecFormat(format!("track has no source path: {}", entry.codec)))?;

        let (source, pid) = self.resolve_source(&primary_path, entry, track_number, &parser, opener, playlists)?;

        let mut stream = StreamInfo::new(
            index,
            pid,
            is_sub_stream,
            entry.codec.clone(),
            primary_path,
            entry.options.clone(),
            time_shift,
            lang,
            source,
            parser,
        );
        if stream.codec_info().program_name == "S_TEXT/UTF8" {
            // SRT requires its subtitle-hint options; the
            // renderer these hints feed is an external collaborator, but
            // the manifest contract is this crate's to enforce.
            if entry.option("video-width").is_none() || entry.option("video-height").is_none() {
                return Err(ErrorKind::InvalidCodecFormat(
                    "S_TEXT/UTF8 requires 'video-width' and 'video-height' options".to_string(),
                )
                .into());
            }
        }
        Ok(stream)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_source(
        &mut self,
        primary_path: &str,
        entry: &TrackEntry,
        track_number: Option<u32>,
        parser: &CodecParser,
        opener: &mut dyn TrackFileOpener,
        playlists: Option<&mut dyn PlaylistResolver>,
    ) -> Result<(Box<dyn ByteSource>, u16)> {
        let policy = if parser.is_fragmented_policy() {
            DemuxerReadPolicy::Fragmented
        } else {
            DemuxerReadPolicy::Sequential
        };
        let ext = Path::new(primary_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        if matches!(ext.as_deref(), Some("mpls") | Some("mpl")) {
            let resolver = playlists.ok_or_else(|| {
                ErrorKind::InvalidCodecFormat(format!(
                    "'{primary_path}' names a Blu-ray playlist but no PlaylistResolver was supplied"
                ))
            })?;
            let pid = track_number.ok_or_else(|| {
                ErrorKind::InvalidCodecFormat(format!("playlist track '{primary_path}' is missing 'track='"))
            })? as u16;
            let path_key = format!("mpls::{primary_path}");

            if let Some(existing) = self.container_keys.get(&path_key) {
                let reader_id = self.adapter.borrow_mut().add_pid(existing.container_key, pid, policy, 0);
                return Ok((Box::new(PidByteSource::new(self.adapter.clone(), reader_id)), pid));
            }

            let clips = resolver.resolve_clips(primary_path, Some(pid as u32))?;
            if clips.is_empty() {
                return Err(ErrorKind::InvalidCodecFormat(format!(
                    "playlist '{primary_path}' resolved no clips for track {pid}"
                ))
                .into());
            }
            let mpls_path = Path::new(primary_path);
            let mut clip_sources = Vec::with_capacity(clips.len());
            for clip in &clips {
                let clip_path = bluray_paths::mpls_track_to_full_name(mpls_path, clip)?;
                let opened = match opener.open(&clip_path.to_string_lossy()) {
                    Ok(src) => src,
                    Err(primary_err) => {
                        let ssif_path = bluray_paths::mpls_track_to_ssif_name(mpls_path, clip)?;
                        opener.open(&ssif_path.to_string_lossy()).map_err(|_| primary_err)?
                    }
                };
                clip_sources.push(opened);
            }
            let container_source = Self::concat(clip_sources);
            let reader_id = self.open_container_key(
                path_key,
                || Box::new(TsContainerDemuxer::new(container_source)),
                pid,
                policy,
            );
            return Ok((Box::new(PidByteSource::new(self.adapter.clone(), reader_id)), pid));
        }

        if let Some(family) = ContainerFamily::from_path(Path::new(primary_path)) {
            let pid = track_number.ok_or_else(|| {
                ErrorKind::InvalidCodecFormat(format!("'{primary_path}' is a container source but is missing 'track='"))
            })? as u16;

            if let Some(existing) = self.container_keys.get(primary_path) {
                let reader_id = self.adapter.borrow_mut().add_pid(existing.container_key, pid, policy, 0);
                return Ok((Box::new(PidByteSource::new(self.adapter.clone(), reader_id)), pid));
            }

            let mut file_sources = Vec::with_capacity(entry.paths.len());
            for path in &entry.paths {
                file_sources.push(opener.open(path)?);
            }
            let container_source = Self::concat(file_sources);
            let demuxer: Box<dyn ContainerDemuxer> = if matches!(family, ContainerFamily::Ts) {
                Box::new(TsContainerDemuxer::new(container_source))
            } else {
                Box::new(UnsupportedContainerDemuxer::new(family.name()))
            };
            let reader_id = self.open_container_key(primary_path.to_string(), || demuxer, pid, policy);
            return Ok((Box::new(PidByteSource::new(self.adapter.clone(), reader_id)), pid));
        }

        // Raw elementary stream: no container demultiplexing needed.
        let mut file_sources = Vec::with_capacity(entry.paths.len());
        for path in &entry.paths {
            file_sources.push(opener.open(path)?);
        }
        Ok((Self::concat(file_sources), 0))
    }

    fn concat(mut sources: Vec<Box<dyn ByteSource>>) -> Box<dyn ByteSource> {
        if sources.len() == 1 {
            sources.pop().unwrap()
        } else {
            Box::new(ConcatByteSource::new(sources))
        }
    }

    /// Registers a fresh container + its first PID, reusing `path_key`'s
    /// slot if the same key was already opened (multi-PID containers call
    /// this once per PID via [`ContainerAdapter::add_pid`] instead, so
    /// this path is only reached on the first PID for a given container).
    fn open_container_key(
        &mut self,
        path_key: String,
        make_demuxer: impl FnOnce() -> Box<dyn ContainerDemuxer>,
        pid: u16,
        policy: DemuxerReadPolicy,
    ) -> usize {
        let container_key = self.next_container_key;
        self.next_container_key += 1;
        let reader_id = self
            .adapter
            .borrow_mut()
            .open_stream(container_key, make_demuxer(), pid, policy, 0);
        self.container_keys.insert(path_key, ContainerKey { container_key });
        reader_id
    }

    /// Propagates the primary (non-sub-stream) H.264 view's `insertSEI`
    /// mode to every MVC dependent-view track, warning once if a
    /// dependent view's manifest line requested a different mode.
    fn propagate_insert_sei(&mut self) {
        let mut primary_mode = None;
        for stream in &self.streams {
            if stream.is_sub_stream {
                continue;
            }
            if let CodecParser::H264(h264) = stream.parser() {
                if let Some(mode) = h264.insert_sei() {
                    primary_mode = Some(mode);
                    break;
                }
            }
        }
        let Some(primary_mode) = primary_mode else {
            return;
        };
        let mut warned = false;
        for stream in &mut self.streams {
            if !stream.is_sub_stream {
                continue;
            }
            if let CodecParser::H264(h264) = stream.parser_mut() {
                if let Some(dependent_mode) = h264.insert_sei() {
                    if dependent_mode != primary_mode && !warned {
                        log::warn!(
                            "insertSEI for MVC dependent view differs from the base view's value; \
                             overriding with the base view's setting"
                        );
                        warned = true;
                    }
                }
                h264.set_insert_sei(primary_mode);
            }
        }
    }

    /// Emits the interleaver's next packet. Never blocks.
    pub fn read_packet(&mut self) -> Result<MetaReadResult> {
        if self.streams.is_empty() {
            return Ok(MetaReadResult::Eof);
        }
        loop {
            let selected = self.select_next()?;
            let Some(selected) = selected else {
                if !self.flush_mode {
                    self.flush_mode = true;
                    continue;
                }
                self.progress.on_finished();
                return Ok(MetaReadResult::Eof);
            };
            match selected {
                Selection::NotReady => return Ok(MetaReadResult::NotReady),
                Selection::Index(idx) => {
                    let is_pcr = idx == 0;
                    let packet = if !self.flush_mode && !self.streams[idx].last_read_rez.is_eof() {
                        self.streams[idx].read_packet()?
                    } else {
                        self.streams[idx].flush_packet()?
                    };
                    match packet {
                        Some(mut packet) => {
                            if is_pcr {
                                packet.flags |= crate::PacketFlags::PCR_STREAM;
                            }
                            self.processed_size += packet.size() as i64;
                            self.progress
                                .on_progress(crate::progress::percent_of(self.processed_size, self.total_size_hint));
                            return Ok(MetaReadResult::Packet(packet));
                        }
                        // Flush produced nothing: the stream is now
                        // permanently `flushed`, so the next pass excludes
                        // it. A live stream producing nothing means its
                        // buffered bytes don't complete a frame yet;
                        // report back-pressure rather than spin.
                        None => {
                            if self.flush_mode || self.streams[idx].flushed {
                                continue;
                            }
                            return Ok(MetaReadResult::NotReady);
                        }
                    }
                }
            }
        }
    }

    /// Refill + selection phase. Returns the
    /// chosen stream index, `NotReady` for upstream back-pressure, or
    /// `None` when no stream is currently eligible (the caller then
    /// decides whether to enter/continue flush mode).
    fn select_next(&mut self) -> Result<Option<Selection>> {
        let max_retries = config::current().max_delayed_retries;
        let mut retries = 0u32;
        loop {
            let mut min_dts = i64::MAX;
            let mut min_index = None;
            let mut all_delayed = true;

            if !self.flush_mode {
                for i in 0..self.streams.len() {
                    let rez = self.streams[i].read()?;
                    if rez == PullResult::Delayed {
                        continue;
                    }
                    all_delayed = false;
                    if rez == PullResult::NotReady {
                        return Ok(Some(Selection::NotReady));
                    }
                    let eligible = rez != PullResult::Eof || !self.streams[i].flushed;
                    if eligible && self.streams[i].last_dts < min_dts {
                        min_dts = self.streams[i].last_dts;
                        min_index = Some(i);
                    }
                }
            } else {
                all_delayed = false;
                for i in 0..self.streams.len() {
                    if !self.streams[i].flushed && self.streams[i].last_dts < min_dts {
                        min_dts = self.streams[i].last_dts;
                        min_index = Some(i);
                    }
                }
            }

            if all_delayed {
                retries += 1;
                if retries > max_retries {
                    return Err(ErrorKind::Common(
                        "all streams remained DATA_DELAYED past the retry budget; producer appears stalled".into(),
                    )
                    .into());
                }
                self.adapter.borrow_mut().reset_delayed_mark();
                continue;
            }

            return Ok(min_index.map(Selection::Index));
        }
    }
}

enum Selection {
    Index(usize),
    NotReady,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::byte_source::FixedByteSource;
    use bytes::Bytes;

    struct InMemoryOpener {
        files: HashMap<String, Bytes>,
    }

    impl InMemoryOpener {
        fn new(files: Vec<(&str, Vec<u8>)>) -> Self {
            Self {
                files: files.into_iter().map(|(k, v)| (k.to_string(), Bytes::from(v))).collect(),
            }
        }
    }

    impl TrackFileOpener for InMemoryOpener {
        fn open(&mut self, path: &str) -> Result<Box<dyn ByteSource>> {
            self.files
                .get(path)
                .map(|b| Box::new(FixedByteSource::new(b.clone())) as Box<dyn ByteSource>)
                .ok_or_else(|| ErrorKind::InvalidCodecFormat(format!("no such fixture: {path}")).into())
        }
    }

    fn ac3_frame() -> Vec<u8> {
        // 48kHz, frmsizecod=0 (smallest table entry, 64 words = 128 bytes),
        // stereo. The frame must be padded out to its full decoded length
        // or the parser reports NeedMoreData forever.
        let mut acc: u64 = 0;
        let mut bits = 0u32;
        let mut push = |value: u64, width: u32| {
            acc = (acc << width) | value;
            bits += width;
        };
        push(0x0B77, 16); // sync
        push(0, 16); // crc1
        push(0, 2); // fscod = 48kHz
        push(0, 6); // frmsizecod
        push(8, 5); // bsid, legacy AC-3
        push(0, 3); // bsmod
        push(2, 3); // acmod = stereo
        while bits % 8 != 0 {
            push(0, 1);
        }
        let header_bytes = (bits / 8) as usize;
        let mut out = Vec::with_capacity(header_bytes);
        for i in (0..header_bytes).rev() {
            out.push(((acc >> (i * 8)) & 0xFF) as u8);
        }
        out.resize(128, 0);
        out
    }

    fn dts_frame() -> Vec<u8> {
        let header: Vec<u8> = vec![0x7F, 0xFE, 0x80, 0x01, 0x00, 0x00, 0x40, 0x98, 0x00, 0x00];
        let mut frame = header.clone();
        frame.extend_from_slice(&header);
        frame
    }

    #[test]
    fn empty_demuxer_reports_eof_immediately() {
        let mut demuxer = MetaDemuxer::new();
        match demuxer.read_packet().unwrap() {
            MetaReadResult::Eof => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }

    #[test]
    fn first_configured_stream_is_pcr() {
        let mut opener = InMemoryOpener::new(vec![("a.dts", dts_frame()), ("b.ac3", ac3_frame())]);
        let manifest = "A_DTS, \"a.dts\"\nA_AC3, \"b.ac3\"\n";
        let mut demuxer = MetaDemuxer::new();
        demuxer.open_manifest(manifest, &mut opener, None).unwrap();
        assert_eq!(demuxer.track_count(), 2);

        match demuxer.read_packet().unwrap() {
            MetaReadResult::Packet(p) => {
                assert!(p.flags.contains(crate::PacketFlags::PCR_STREAM));
                assert_eq!(p.stream_index, 0);
            }
            other => panic!("expected a packet, got {other:?}"),
        }
    }

    #[test]
    fn unknown_codec_is_rejected_at_open_time() {
        let mut opener = InMemoryOpener::new(vec![("a.bin", vec![0u8; 4])]);
        let mut demuxer = MetaDemuxer::new();
        let err = demuxer
            .open_manifest("X_NOPE, \"a.bin\"\n", &mut opener, None)
            .unwrap_err();
        assert!(matches!(err, crate::DemuxError::Manifest(ErrorKind::UnknownCodec(_))));
    }

    #[test]
    fn container_track_without_track_option_is_rejected() {
        let mut opener = InMemoryOpener::new(vec![("a.ts", vec![0u8; 4])]);
        let mut demuxer = MetaDemuxer::new();
        let err = demuxer
            .open_manifest("A_AC3, \"a.ts\"\n", &mut opener, None)
            .unwrap_err();
        assert!(matches!(err, crate::DemuxError::Manifest(ErrorKind::InvalidCodecFormat(_))));
    }

    #[test]
    fn timeshift_delays_first_selection() {
        let mut opener = InMemoryOpener::new(vec![("a.dts", dts_frame()), ("b.ac3", ac3_frame())]);
        let manifest = "A_AC3, \"b.ac3\", timeshift=500ms\nA_DTS, \"a.dts\"\n";
        let mut demuxer = MetaDemuxer::new();
        demuxer.open_manifest(manifest, &mut opener, None).unwrap();
        // The unshifted DTS track (stream_index 1) starts at last_dts=0,
        // strictly less than the 45000-tick-shifted AC-3 track, so it is
        // selected first even though it was declared second.
        match demuxer.read_packet().unwrap() {
            MetaReadResult::Packet(p) => assert_eq!(p.stream_index, 1),
            other => panic!("expected a packet, got {other:?}"),
        }
    }

    #[test]
    fn srt_without_video_dimensions_is_rejected() {
        let mut opener = InMemoryOpener::new(vec![("a.srt", b"1\n00:00:00,000 --> 00:00:01,000\nhi\n\n".to_vec())]);
        let mut demuxer = MetaDemuxer::new();
        let err = demuxer
            .open_manifest("S_TEXT/UTF8, \"a.srt\"\n", &mut opener, None)
            .unwrap_err();
        assert!(matches!(err, crate::DemuxError::Manifest(ErrorKind::InvalidCodecFormat(_))));
    }

    #[test]
    fn eof_drains_to_eof_after_single_track_exhausts() {
        let mut opener = InMemoryOpener::new(vec![("a.dts", dts_frame())]);
        let mut demuxer = MetaDemuxer::new();
        demuxer.open_manifest("A_DTS, \"a.dts\"\n", &mut opener, None).unwrap();

        let mut saw_packet = false;
        for _ in 0..8 {
            match demuxer.read_packet().unwrap() {
                MetaReadResult::Packet(_) => saw_packet = true,
                MetaReadResult::NotReady => continue,
                MetaReadResult::Eof => {
                    assert!(saw_packet, "expected at least one packet before EOF");
                    return;
                }
            }
        }
        panic!("demuxer never reached EOF");
    }
}
