//! # Blu-ray Path Resolution
//!
//! A manifest track naming an `.mpls`/`.mpl` playlist does not point at an
//! elementary stream directly: the playlist names a clip number, and the
//! actual media lives under `STREAM/<clip>.m2ts` next to the disc's
//! `PLAYLIST` directory, with an optional `STREAM/SSIF/<clip>.ssif`
//! alongside it for 3D/interleaved Blu-rays. Grounded on
//! `METADemuxer::mplsTrackToFullName`/`mplsTrackToSSIFName`.

use std::path::{Path, PathBuf};

use crate::error::DemuxError;
use crate::Result;

/// Resolves an MPLS/MPL playlist path and a clip number to the clip's
/// `STREAM/<clip>.m2ts` (or `.mts` for an `.mpl` playlist) path.
///
/// `mpls_path` is the playlist file as named in the manifest, e.g.
/// `.../PLAYLIST/00001.mpls`; `clip_number` is the clip id named inside the
/// playlist (e.g. `"00002"`).
pub fn mpls_track_to_full_name(mpls_path: &Path, clip_number: &str) -> Result<PathBuf> {
    let disc_root = playlist_parent(mpls_path)?;
    let ext = stream_ext(mpls_path);
    Ok(disc_root.join("STREAM").join(format!("{clip_number}.{ext}")))
}

/// Resolves the SSIF companion file for a clip, under
/// `STREAM/SSIF/<clip>.ssif` (or `.sif` for an `.mpl` playlist).
pub fn mpls_track_to_ssif_name(mpls_path: &Path, clip_number: &str) -> Result<PathBuf> {
    let disc_root = playlist_parent(mpls_path)?;
    let ext = ssif_ext(mpls_path);
    Ok(disc_root
        .join("STREAM")
        .join("SSIF")
        .join(format!("{clip_number}.{ext}")))
}

/// Resolves a clip's `CLIPINF/<clip>.clpi` path, falling back to
/// `BACKUP/CLIPINF/<clip>.clpi` when the primary copy is absent. Blu-ray
/// discs keep a backup copy of playlist/clip metadata under `BACKUP/` and
/// tsMuxer's CLPI reader falls back to it when the primary is missing or
/// unreadable.
pub fn clip_info_path(disc_root: &Path, clip_number: &str, primary_exists: impl Fn(&Path) -> bool) -> PathBuf {
    let primary = disc_root.join("CLIPINF").join(format!("{clip_number}.clpi"));
    if primary_exists(&primary) {
        return primary;
    }
    disc_root
        .join("BACKUP")
        .join("CLIPINF")
        .join(format!("{clip_number}.clpi"))
}

/// The disc root directory (the parent of `PLAYLIST/`) a playlist path
/// lives under.
fn playlist_parent(mpls_path: &Path) -> Result<PathBuf> {
    let playlist_dir = mpls_path.parent().ok_or_else(|| {
        DemuxError::BlurayResolve(format!(
            "playlist path has no parent directory: {}",
            mpls_path.display()
        ))
    })?;
    let disc_root = playlist_dir.parent().ok_or_else(|| {
        DemuxError::BlurayResolve(format!(
            "playlist directory has no parent (expected .../PLAYLIST): {}",
            playlist_dir.display()
        ))
    })?;
    Ok(disc_root.to_path_buf())
}

fn stream_ext(mpls_path: &Path) -> &'static str {
    match mpls_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    {
        Some(ref e) if e == "mpls" => "m2ts",
        _ => "mts",
    }
}

fn ssif_ext(mpls_path: &Path) -> &'static str {
    match mpls_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
    {
        Some(ref e) if e == "mpls" => "ssif",
        _ => "sif",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_m2ts_path_for_mpls_playlist() {
        let mpls = Path::new("/disc/PLAYLIST/00001.mpls");
        let resolved = mpls_track_to_full_name(mpls, "00002").unwrap();
        assert_eq!(resolved, PathBuf::from("/disc/STREAM/00002.m2ts"));
    }

    #[test]
    fn resolves_mts_path_for_mpl_playlist() {
        let mpls = Path::new("/disc/PLAYLIST/00001.mpl");
        let resolved = mpls_track_to_full_name(mpls, "00002").unwrap();
        assert_eq!(resolved, PathBuf::from("/disc/STREAM/00002.mts"));
    }

    #[test]
    fn resolves_ssif_path() {
        let mpls = Path::new("/disc/PLAYLIST/00001.mpls");
        let resolved = mpls_track_to_ssif_name(mpls, "00002").unwrap();
        assert_eq!(resolved, PathBuf::from("/disc/STREAM/SSIF/00002.ssif"));
    }

    #[test]
    fn falls_back_to_clip_info_backup() {
        let disc_root = Path::new("/disc");
        let resolved = clip_info_path(disc_root, "00001", |_| false);
        assert_eq!(
            resolved,
            PathBuf::from("/disc/BACKUP/CLIPINF/00001.clpi")
        );
    }

    #[test]
    fn errors_on_path_without_playlist_parent() {
        let mpls = Path::new("00001.mpls");
        assert!(mpls_track_to_full_name(mpls, "00002").is_err());
    }
}
