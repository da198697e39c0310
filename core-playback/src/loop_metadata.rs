//! # Loop Metadata
//!
//! Extracts `LOOPSTART` / `LOOPLENGTH` loop points and the sample rate from
//! encoded audio without decoding samples.
//!
//! ## Ogg/Vorbis
//!
//! Pages are walked from the start of the stream. Each page's segment table
//! is grouped into packets (a packet ends at a segment shorter than 255
//! bytes). Packets starting with `\x01vorbis` carry the sample rate as a
//! little-endian `u32` at packet offset 12; packets starting with
//! `\x03vorbis` carry the comments. The walk stops at the first non-page
//! bytes, at the first page without a Vorbis header, or once both headers
//! were seen.
//!
//! ## MP4/M4A
//!
//! Top-level and `moov` child atoms are walked. `mvhd` supplies the timescale
//! (used as sample rate) and a duration; `udta`/`meta` are scanned for tags.
//!
//! ## Tag encodings
//!
//! Two encodings are recognised wherever a `LOOP` marker appears:
//!
//! - inline text, `LOOPSTART=<digits>` / `LOOPLENGTH=<digits>`
//! - a bare key (`LOOPSTART`, NUL-terminated) followed 16 bytes later by the
//!   NUL-terminated decimal value, as written by iTunes-style `data` atoms
//!
//! Input that matches neither container yields [`LoopMetadata::default`].

use bridge_traits::audio::DecodeHint;
use tracing::debug;

const OGG_CAPTURE: &[u8] = b"OggS";
const OGG_PAGE_HEADER_LEN: usize = 27;
const VORBIS_IDENTIFICATION: u8 = 1;
const VORBIS_COMMENT: u8 = 3;

/// Loop points and stream facts read from container headers.
///
/// Loop points are in PCM sample frames; the `*_seconds` accessors convert
/// with the parsed sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopMetadata {
    pub loop_start_samples: u64,
    pub loop_length_samples: u64,
    /// Hertz, or 0 when no header provided one.
    pub sample_rate: u32,
    /// Stream duration in seconds derived from container headers.
    pub duration_hint: Option<f64>,
}

impl LoopMetadata {
    fn to_seconds(&self, samples: u64) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            samples as f64 / self.sample_rate as f64
        }
    }

    pub fn loop_start_seconds(&self) -> f64 {
        self.to_seconds(self.loop_start_samples)
    }

    pub fn loop_length_seconds(&self) -> f64 {
        self.to_seconds(self.loop_length_samples)
    }

    /// Whether an explicit loop region was tagged.
    pub fn has_loop_points(&self) -> bool {
        self.loop_length_samples > 0 && self.sample_rate > 0
    }

    /// Hint handed to the platform decoder.
    pub fn decode_hint(&self) -> DecodeHint {
        DecodeHint {
            duration: self.duration_hint,
            sample_rate: (self.sample_rate > 0).then_some(self.sample_rate),
        }
    }

    /// Region a looping source repeats through, for media of `duration` seconds.
    pub fn window(&self, duration: f64) -> LoopWindow {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };

        let (mut start, length) = if self.has_loop_points() {
            (self.loop_start_seconds(), self.loop_length_seconds())
        } else {
            (0.0, duration)
        };

        if duration > 0.0 && start >= duration {
            start = 0.0;
        }

        let mut end = start + length;
        if duration > 0.0 {
            end = end.min(duration);
        }
        if end <= start {
            end = duration.max(start);
        }

        LoopWindow { start, end }
    }
}

/// `[start, end]` region in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopWindow {
    pub start: f64,
    pub end: f64,
}

impl LoopWindow {
    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Fold a position past the window end back into the window.
    pub fn wrap(&self, position: f64) -> f64 {
        let length = self.length();
        if length <= 0.0 || position < self.end {
            return position;
        }
        self.start + (position - self.start).rem_euclid(length)
    }

    /// Number of completed passes through the window at `position`.
    pub fn passes(&self, position: f64) -> u64 {
        let length = self.length();
        if length <= 0.0 || position < self.end {
            return 0;
        }
        ((position - self.start) / length).floor() as u64
    }
}

/// Reads [`LoopMetadata`] from encoded bytes.
#[derive(Debug, Clone, Copy)]
pub struct LoopMetadataReader {
    loop_start_ceiling: u64,
}

impl Default for LoopMetadataReader {
    fn default() -> Self {
        Self::new(50_000)
    }
}

#[derive(Debug, Default)]
struct RawTags {
    sample_rate: u32,
    loop_start: u64,
    loop_length: u64,
    duration: Option<f64>,
}

impl LoopMetadataReader {
    /// Reader discarding loop starts above `loop_start_ceiling` sample frames.
    pub fn new(loop_start_ceiling: u64) -> Self {
        Self { loop_start_ceiling }
    }

    pub fn read(&self, data: &[u8]) -> LoopMetadata {
        let mut tags = RawTags::default();

        if is_mp4(data) {
            read_mp4(data, &mut tags);
        } else if data.starts_with(OGG_CAPTURE) {
            read_ogg(data, &mut tags);
        }

        if tags.loop_start > self.loop_start_ceiling {
            debug!(
                loop_start = tags.loop_start,
                ceiling = self.loop_start_ceiling,
                "Discarding loop start above ceiling"
            );
            tags.loop_start = 0;
        }

        LoopMetadata {
            loop_start_samples: tags.loop_start,
            loop_length_samples: tags.loop_length,
            sample_rate: tags.sample_rate,
            duration_hint: tags.duration,
        }
    }
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64_le(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_le_bytes(buf))
}

fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64_be(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset + 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

// ============================================================================
// Ogg
// ============================================================================

fn read_ogg(data: &[u8], tags: &mut RawTags) {
    let mut index = 0;
    let mut seen_identification = false;
    let mut seen_comment = false;

    while data.get(index..index + 4) == Some(OGG_CAPTURE) {
        let Some(&segment_count) = data.get(index + OGG_PAGE_HEADER_LEN - 1) else {
            break;
        };
        let table_start = index + OGG_PAGE_HEADER_LEN;
        let Some(segments) = data.get(table_start..table_start + segment_count as usize) else {
            break;
        };

        let mut vorbis_header_found = false;
        let mut packet_start = table_start + segments.len();
        let mut packet_len = 0usize;

        for (i, &segment) in segments.iter().enumerate() {
            packet_len += segment as usize;
            let last = i + 1 == segments.len();
            if segment < 255 || last {
                let packet_end = (packet_start + packet_len).min(data.len());
                let packet = data.get(packet_start..packet_end).unwrap_or(&[]);
                match scan_vorbis_packet(packet, tags) {
                    Some(VORBIS_IDENTIFICATION) => {
                        seen_identification = true;
                        vorbis_header_found = true;
                    }
                    Some(VORBIS_COMMENT) => {
                        seen_comment = true;
                        vorbis_header_found = true;
                    }
                    Some(_) => vorbis_header_found = true,
                    None => {}
                }
                packet_start += packet_len;
                packet_len = 0;
            }
        }

        if !vorbis_header_found {
            break;
        }
        index = packet_start;
        if seen_identification && seen_comment {
            break;
        }
    }

    if seen_identification && tags.sample_rate > 0 {
        tags.duration = last_granule_position(data)
            .map(|granule| granule as f64 / tags.sample_rate as f64);
    }
}

/// Returns the Vorbis header type when `packet` is a Vorbis header.
fn scan_vorbis_packet(packet: &[u8], tags: &mut RawTags) -> Option<u8> {
    if packet.get(1..7) != Some(b"vorbis".as_slice()) {
        return None;
    }
    let header_type = packet[0];
    match header_type {
        VORBIS_IDENTIFICATION => {
            if let Some(rate) = read_u32_le(packet, 12) {
                tags.sample_rate = rate;
            }
        }
        VORBIS_COMMENT => scan_vorbis_comments(packet, tags),
        _ => {}
    }
    Some(header_type)
}

/// Walk the length-prefixed user comments of a comment header and match
/// loop tags inside each entry only.
///
/// Entries are not NUL-terminated, so the next entry's length prefix must
/// never be read as part of a value.
fn scan_vorbis_comments(packet: &[u8], tags: &mut RawTags) {
    let Some(vendor_len) = read_u32_le(packet, 7) else {
        return;
    };
    let mut index = 11usize.saturating_add(vendor_len as usize);
    let Some(count) = read_u32_le(packet, index) else {
        return;
    };
    index += 4;

    for _ in 0..count {
        let Some(len) = read_u32_le(packet, index) else {
            break;
        };
        let start = index + 4;
        let end = start.saturating_add(len as usize).min(packet.len());
        scan_loop_tags(&packet[start..end], tags);
        if end == packet.len() {
            break;
        }
        index = end;
    }
}

/// Granule position of the last page, or `None` when it is unset.
fn last_granule_position(data: &[u8]) -> Option<u64> {
    if data.len() < OGG_PAGE_HEADER_LEN {
        return None;
    }
    let mut index = data.len() - OGG_PAGE_HEADER_LEN;
    loop {
        if &data[index..index + 4] == OGG_CAPTURE {
            return read_u64_le(data, index + 6).filter(|&g| g != u64::MAX && g > 0);
        }
        if index == 0 {
            return None;
        }
        index -= 1;
    }
}

// ============================================================================
// MP4
// ============================================================================

fn is_mp4(data: &[u8]) -> bool {
    data.get(4..8) == Some(b"ftyp".as_slice())
}

fn read_mp4(data: &[u8], tags: &mut RawTags) {
    let mut index = 0;
    while index + 8 <= data.len() {
        let Some(size) = read_u32_be(data, index) else {
            break;
        };
        let size = size as usize;
        let name = &data[index + 4..index + 8];

        if name == b"moov" {
            index += 8;
            continue;
        }

        if name == b"mvhd" {
            read_mvhd(data, index, tags);
        }
        if name == b"udta" || name == b"meta" {
            let end = index.saturating_add(size).min(data.len());
            scan_loop_tags(&data[index..end], tags);
        }

        if size <= 1 {
            break;
        }
        index = index.saturating_add(size);
    }
}

fn read_mvhd(data: &[u8], index: usize, tags: &mut RawTags) {
    let version = data.get(index + 8).copied().unwrap_or(0);
    let (timescale, duration) = if version == 1 {
        (read_u32_be(data, index + 28), read_u64_be(data, index + 32))
    } else {
        (
            read_u32_be(data, index + 20),
            read_u32_be(data, index + 24).map(u64::from),
        )
    };

    if let Some(timescale) = timescale {
        tags.sample_rate = timescale;
        if timescale > 0 {
            tags.duration = duration
                .filter(|&d| d > 0)
                .map(|d| d as f64 / timescale as f64);
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

fn scan_loop_tags(region: &[u8], tags: &mut RawTags) {
    let mut i = 0;
    while i + 10 < region.len() {
        if &region[i..i + 4] != b"LOOP" {
            i += 1;
            continue;
        }

        let text_end = nul_terminated_end(region, i);
        let text = &region[i..text_end];

        if let Some(value) = inline_value(text, b"LOOPSTART=") {
            tags.loop_start = value;
        }
        if let Some(value) = inline_value(text, b"LOOPLENGTH=") {
            tags.loop_length = value;
        }

        let mut next = text_end;
        if text == b"LOOPSTART" || text == b"LOOPLENGTH" {
            let value_start = text_end + 16;
            if value_start < region.len() {
                let value_end = nul_terminated_end(region, value_start);
                if let Some(value) = leading_digits(&region[value_start..value_end]) {
                    if text == b"LOOPSTART" {
                        tags.loop_start = value;
                    } else {
                        tags.loop_length = value;
                    }
                }
                next = value_end;
            } else {
                next = region.len();
            }
        }

        i = next + 1;
    }
}

fn nul_terminated_end(region: &[u8], start: usize) -> usize {
    region[start..]
        .iter()
        .position(|&b| b == 0)
        .map(|p| start + p)
        .unwrap_or(region.len())
}

fn inline_value(text: &[u8], key: &[u8]) -> Option<u64> {
    let at = text.windows(key.len()).position(|w| w == key)?;
    leading_digits(&text[at + key.len()..])
}

fn leading_digits(bytes: &[u8]) -> Option<u64> {
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    std::str::from_utf8(&bytes[..digits]).ok()?.parse().ok()
}
