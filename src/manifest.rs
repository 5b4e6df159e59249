//! # Manifest Grammar
//!
//! The line-based track list a [`crate::meta::MetaDemuxer`] opens: one line
//! per track, `#` comments, a `MUXOPT` line that is recognized and skipped,
//! and quoted-path concatenation via `+` for a track split across several
//! files. Grounded on `METADemuxer::openFile`'s line loop.

use std::collections::HashMap;

use crate::error::{DemuxError, ErrorKind};
use crate::Result;

/// One parsed manifest line: a codec program name, one or more source
/// paths to concatenate, and a `key=value` option table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEntry {
    /// Manifest program name, upper-cased (e.g. `"A_DTS"`, `"V_MPEGH/ISO/HEVC"`).
    pub codec: String,
    /// Source paths, in concatenation order. More than one entry means the
    /// track's data spans files joined with `+`.
    pub paths: Vec<String>,
    /// Raw `key=value` options, trimmed but otherwise unparsed.
    pub options: HashMap<String, String>,
}

impl TrackEntry {
    /// Looks up a raw option value by key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Parses the `track=` option, if present.
    pub fn track_number(&self) -> Result<Option<u32>> {
        self.parse_u32_option("track")
    }

    /// The raw `timeshift=` option text, e.g. `"500ms"`, `"-2s"`, `"4500"`.
    /// Suffix parsing and unit conversion to internal ticks is
    /// [`crate::stream_info::parse_time_shift`]'s job, not the manifest
    /// grammar's.
    pub fn timeshift_raw(&self) -> Option<&str> {
        self.option("timeshift")
    }

    /// Parses the `lang=` option, if present.
    pub fn lang(&self) -> Option<&str> {
        self.option("lang")
    }

    fn parse_u32_option(&self, key: &str) -> Result<Option<u32>> {
        match self.option(key) {
            None => Ok(None),
            Some(v) => v
                .parse::<u32>()
                .map(Some)
                .map_err(|_| DemuxError::InvalidData(format!("invalid {key} value: {v}"))),
        }
    }
}

/// Parses a full manifest file's contents into its track entries.
///
/// Blank lines, `#` comments, and the `MUXOPT` line are skipped. Every
/// other non-blank line must match the `CODEC, "path"[+...][, key=value]...`
/// grammar or parsing fails with [`ErrorKind::InvalidCodecFormat`].
pub fn parse(contents: &str) -> Result<Vec<TrackEntry>> {
    let mut entries = Vec::new();

    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.to_ascii_uppercase().starts_with("MUXOPT") {
            continue;
        }
        entries.push(parse_line(line)?);
    }

    Ok(entries)
}

fn parse_line(line: &str) -> Result<TrackEntry> {
    let fields = split_quoted(line, ',');
    if fields.len() < 2 {
        return Err(ErrorKind::InvalidCodecFormat(line.to_string()).into());
    }

    let codec = fields[0].trim().to_ascii_uppercase();
    let path_field = fields[1].trim();
    let paths = split_concatenated_paths(path_field);
    if paths.is_empty() {
        return Err(ErrorKind::InvalidCodecFormat(line.to_string()).into());
    }

    let mut options = HashMap::new();
    for field in &fields[2..] {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let mut parts = field.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim().to_string();
        let value = parts.next().unwrap_or("").trim().to_string();
        options.insert(key, value);
    }

    Ok(TrackEntry {
        codec,
        paths,
        options,
    })
}

/// Splits `"a.ts"+"b.ts"` (or a single unquoted/quoted path) into its parts.
fn split_concatenated_paths(field: &str) -> Vec<String> {
    split_quoted(field, '+')
        .into_iter()
        .map(|p| unquote(p.trim()))
        .filter(|p| !p.is_empty())
        .collect()
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Splits on `sep`, treating anything between a matching pair of double
/// quotes as opaque (so a comma or `+` inside a quoted path is not a
/// separator).
fn split_quoted(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == sep && !in_quotes => {
                out.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    out.push(current);
    out
}
