// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Minimal ISO base media (MP4 / QuickTime) reader: pixel size of the first
//! video track and the movie duration.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use crate::{Error, Result};

/// Upper bound on the `moov` box we are willing to buffer.
const MAX_MOOV_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// Milliseconds.
    pub duration: Option<u64>,
}

pub fn inspect(path: &Path) -> Result<VideoMetadata> {
    let mut reader = BufReader::new(File::open(path)?);
    let moov = find_moov(&mut reader)?
        .ok_or_else(|| Error::UnsupportedMedia(format!("no movie header in {}", path.display())))?;
    parse_moov(&moov)
}

fn find_moov<R: Read + Seek>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header = [0u8; 8];
    loop {
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];

        let (header_len, size) = match size {
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (16, Some(u64::from_be_bytes(large)))
            }
            0 => (8, None),
            size => (8, Some(size)),
        };

        if &kind == b"moov" {
            let payload_len = match size {
                Some(size) => size.saturating_sub(header_len),
                None => {
                    let here = reader.stream_position()?;
                    let end = reader.seek(SeekFrom::End(0))?;
                    reader.seek(SeekFrom::Start(here))?;
                    end - here
                }
            };
            if payload_len > MAX_MOOV_SIZE {
                return Err(Error::UnsupportedMedia("movie header too large".into()));
            }
            let mut payload = vec![0u8; payload_len as usize];
            reader.read_exact(&mut payload)?;
            return Ok(Some(payload));
        }

        match size {
            Some(size) if size >= header_len => {
                reader.seek(SeekFrom::Current((size - header_len) as i64))?;
            }
            // malformed box or the last box running to EOF
            _ => return Ok(None),
        }
    }
}

/// Iterates over the child boxes of a container payload.
struct Boxes<'a> {
    data: &'a [u8],
}

impl<'a> Boxes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn child(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
        Boxes::new(data)
            .find(|(k, _)| k == kind)
            .map(|(_, payload)| payload)
    }
}

impl<'a> Iterator for Boxes<'a> {
    type Item = ([u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        if data.len() < 8 {
            return None;
        }
        let size = be_u32(data, 0)? as usize;
        let kind = [data[4], data[5], data[6], data[7]];
        let (header_len, size) = match size {
            1 => (16, usize::try_from(be_u64(data, 8)?).ok()?),
            0 => (8, data.len()),
            size => (8, size),
        };
        if size < header_len || size > data.len() {
            self.data = &[];
            return None;
        }
        self.data = &data[size..];
        Some((kind, &data[header_len..size]))
    }
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u64(data: &[u8], at: usize) -> Option<u64> {
    data.get(at..at + 8).map(|b| {
        u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    })
}

fn parse_moov(moov: &[u8]) -> Result<VideoMetadata> {
    let duration = Boxes::child(moov, b"mvhd").and_then(movie_duration);

    let (width, height) = Boxes::new(moov)
        .filter(|(kind, _)| kind == b"trak")
        .find_map(|(_, trak)| video_track_size(trak))
        .ok_or_else(|| Error::UnsupportedMedia("no video track".into()))?;

    Ok(VideoMetadata {
        width,
        height,
        duration,
    })
}

fn movie_duration(mvhd: &[u8]) -> Option<u64> {
    let (timescale, duration) = match mvhd.first()? {
        1 => (be_u32(mvhd, 20)?, be_u64(mvhd, 24)?),
        _ => {
            let duration = be_u32(mvhd, 16)?;
            if duration == u32::MAX {
                return None;
            }
            (be_u32(mvhd, 12)?, duration as u64)
        }
    };
    if timescale == 0 || duration == u64::MAX {
        return None;
    }
    Some(duration.saturating_mul(1000) / timescale as u64)
}

fn video_track_size(trak: &[u8]) -> Option<(u32, u32)> {
    let handler = Boxes::child(trak, b"mdia")
        .and_then(|mdia| Boxes::child(mdia, b"hdlr"))
        .and_then(|hdlr| hdlr.get(8..12))?;
    if handler != b"vide" {
        return None;
    }

    let tkhd = Boxes::child(trak, b"tkhd")?;
    let matrix_at = match tkhd.first()? {
        1 => 52,
        _ => 40,
    };
    let a = be_u32(tkhd, matrix_at)? as i32;
    let b = be_u32(tkhd, matrix_at + 4)? as i32;
    let width = be_u32(tkhd, matrix_at + 36)? >> 16;
    let height = be_u32(tkhd, matrix_at + 40)? >> 16;

    // a quarter turn leaves a == 0 and puts the rotation into b
    if a == 0 && b != 0 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 8);
        out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn tkhd(width: u32, height: u32, rotated: bool) -> Vec<u8> {
        let mut payload = vec![0u8; 40];
        let (a, b, c, d): (i32, i32, i32, i32) = if rotated {
            (0, 0x0001_0000, -0x0001_0000, 0)
        } else {
            (0x0001_0000, 0, 0, 0x0001_0000)
        };
        for value in [a, b, 0, c, d, 0, 0, 0, 0x4000_0000] {
            payload.extend_from_slice(&value.to_be_bytes());
        }
        payload.extend_from_slice(&(width << 16).to_be_bytes());
        payload.extend_from_slice(&(height << 16).to_be_bytes());
        mp4_box(b"tkhd", &payload)
    }

    fn trak(handler: &[u8; 4], width: u32, height: u32, rotated: bool) -> Vec<u8> {
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(handler);
        hdlr.extend_from_slice(&[0u8; 13]);
        let mdia = mp4_box(b"mdia", &mp4_box(b"hdlr", &hdlr));

        let mut body = tkhd(width, height, rotated);
        body.extend(mdia);
        mp4_box(b"trak", &body)
    }

    /// Builds a tiny but structurally valid MP4 file.
    pub(crate) fn sample_mp4(width: u32, height: u32, duration_ms: u32, rotated: bool) -> Vec<u8> {
        let mut ftyp = b"isom".to_vec();
        ftyp.extend_from_slice(&0u32.to_be_bytes());
        ftyp.extend_from_slice(b"isommp41");

        let mut mvhd = vec![0u8; 12];
        mvhd.extend_from_slice(&1000u32.to_be_bytes());
        mvhd.extend_from_slice(&duration_ms.to_be_bytes());
        mvhd.extend_from_slice(&[0u8; 80]);

        let mut moov = mp4_box(b"mvhd", &mvhd);
        moov.extend(trak(b"soun", 0, 0, false));
        moov.extend(trak(b"vide", width, height, rotated));

        let mut file = mp4_box(b"ftyp", &ftyp);
        file.extend(mp4_box(b"free", &[0u8; 16]));
        file.extend(mp4_box(b"moov", &moov));
        file.extend(mp4_box(b"mdat", &[0u8; 32]));
        file
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_size_and_duration() {
        let file = write_temp(&sample_mp4(1920, 1080, 2500, false));
        assert_eq!(
            inspect(file.path()).unwrap(),
            VideoMetadata {
                width: 1920,
                height: 1080,
                duration: Some(2500),
            }
        );
    }

    #[test]
    fn rotated_tracks_swap_dimensions() {
        let file = write_temp(&sample_mp4(1920, 1080, 1000, true));
        let metadata = inspect(file.path()).unwrap();
        assert_eq!((metadata.width, metadata.height), (1080, 1920));
    }

    #[test]
    fn non_mp4_content_is_rejected() {
        let file = write_temp(b"definitely not a movie");
        assert!(inspect(file.path()).is_err());
    }
}
