// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! MIME type allow-lists and the extension/content based MIME lookup used
//! while resolving dropped files.

use std::fmt;

use regex::{Regex, RegexBuilder};

const REGEX_PREFIX: &str = "__REGEX__";
const FLAGS_DELIMITER: &str = "__FLAGS__";

/// Fallback MIME type for bytes nothing could identify.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// One entry of an allow-list: a literal MIME type or a regular expression.
#[derive(Clone)]
pub enum MimeRule {
    Exact(String),
    Pattern {
        source: String,
        flags: String,
        /// `None` when the source failed to compile; such a rule never matches.
        compiled: Option<Regex>,
    },
}

impl MimeRule {
    pub fn exact(mime: impl Into<String>) -> Self {
        Self::Exact(mime.into())
    }

    /// Builds a pattern rule. `flags` follows the JavaScript convention:
    /// `i` (case-insensitive), `m` (multi-line) and `s` (dot matches newline)
    /// are honoured, anything else is ignored.
    pub fn pattern(source: impl Into<String>, flags: impl Into<String>) -> Self {
        let source = source.into();
        let flags = flags.into();
        let compiled = RegexBuilder::new(&source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
            .map_err(|e| tracing::debug!(%source, error = %e, "ignoring invalid MIME pattern"))
            .ok();
        Self::Pattern {
            source,
            flags,
            compiled,
        }
    }

    /// Parses the wire form: `__REGEX__<pattern>__FLAGS__<flags>` for patterns,
    /// anything else is an exact MIME string.
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix(REGEX_PREFIX) {
            Some(rest) if rest.contains(FLAGS_DELIMITER) => {
                let (source, flags) = rest.split_once(FLAGS_DELIMITER).unwrap_or((rest, ""));
                Self::pattern(source, flags)
            }
            _ => Self::exact(value),
        }
    }

    /// Inverse of [`MimeRule::parse`].
    pub fn to_wire(&self) -> String {
        match self {
            MimeRule::Exact(mime) => mime.clone(),
            MimeRule::Pattern { source, flags, .. } => {
                format!("{REGEX_PREFIX}{source}{FLAGS_DELIMITER}{flags}")
            }
        }
    }

    pub fn matches(&self, mime: &str) -> bool {
        match self {
            MimeRule::Exact(expected) => expected == mime,
            MimeRule::Pattern { compiled, .. } => {
                compiled.as_ref().map(|re| re.is_match(mime)).unwrap_or(false)
            }
        }
    }
}

impl fmt::Debug for MimeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MimeRule::Exact(mime) => f.debug_tuple("Exact").field(mime).finish(),
            MimeRule::Pattern { source, flags, .. } => f
                .debug_struct("Pattern")
                .field("source", source)
                .field("flags", flags)
                .finish(),
        }
    }
}

impl PartialEq for MimeRule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MimeRule::Exact(a), MimeRule::Exact(b)) => a == b,
            (
                MimeRule::Pattern {
                    source: a,
                    flags: fa,
                    ..
                },
                MimeRule::Pattern {
                    source: b,
                    flags: fb,
                    ..
                },
            ) => a == b && fa == fb,
            _ => false,
        }
    }
}

impl From<&str> for MimeRule {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for MimeRule {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_wire())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for MimeRule {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Wire(String),
            Pattern {
                pattern: String,
                #[serde(default)]
                flags: String,
            },
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Wire(value) => MimeRule::parse(&value),
            Raw::Pattern { pattern, flags } => MimeRule::pattern(pattern, flags),
        })
    }
}

/// Decides whether `mime` passes `rules`.
///
/// - no rule set: everything passes
/// - empty rule set: nothing passes
/// - a missing or empty candidate never passes a restrictive rule set
pub fn is_allowed(mime: Option<&str>, rules: Option<&[MimeRule]>) -> bool {
    let Some(rules) = rules else {
        return true;
    };
    if rules.is_empty() {
        return false;
    }
    match mime {
        Some(mime) if !mime.is_empty() => rules.iter().any(|rule| rule.matches(mime)),
        _ => false,
    }
}

/// An owned, optional rule set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MimeFilter {
    rules: Option<Vec<MimeRule>>,
}

impl MimeFilter {
    pub fn allow_all() -> Self {
        Self { rules: None }
    }

    pub fn new(rules: Option<Vec<MimeRule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> Option<&[MimeRule]> {
        self.rules.as_deref()
    }

    pub fn is_restrictive(&self) -> bool {
        self.rules.is_some()
    }

    pub fn allows(&self, mime: Option<&str>) -> bool {
        is_allowed(mime, self.rules())
    }
}

const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("3gp", "video/3gpp"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("rtf", "application/rtf"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("sqlite", "application/vnd.sqlite3"),
    ("db", "application/vnd.sqlite3"),
];

/// Looks `ext` (with or without the leading dot, any case) up in the
/// maintained extension table.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// Preferred file extension for a MIME type, e.g. `image/jpeg` -> `jpg`.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    EXTENSION_TABLE
        .iter()
        .find(|(_, known)| *known == mime)
        .map(|(ext, _)| *ext)
}

/// Identifies a MIME type from the leading bytes of a file.
pub fn sniff(head: &[u8]) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(head) {
        let mime = format.to_mime_type();
        if mime != OCTET_STREAM {
            return Some(mime);
        }
    }

    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(match &head[8..12] {
            b"qt  " => "video/quicktime",
            b"M4V " | b"M4VH" | b"M4VP" => "video/x-m4v",
            b"M4A " => "audio/mp4",
            b"3gp4" | b"3gp5" | b"3gp6" => "video/3gpp",
            _ => "video/mp4",
        });
    }
    if head.len() >= 8 && (&head[4..8] == b"moov" || &head[4..8] == b"mdat") {
        return Some("video/quicktime");
    }

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"\x1a\x45\xdf\xa3", "video/webm"),
        (b"SQLite format 3\0", "application/vnd.sqlite3"),
        (b"ID3", "audio/mpeg"),
    ];
    SIGNATURES
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, mime)| *mime)
}
