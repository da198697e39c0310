//! Stream probing using Symphonia
//!
//! Used by the headless platform when the core could not extract a duration
//! from container headers itself.

use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Stream properties recovered by probing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamInfo {
    pub duration: Option<f64>,
    pub sample_rate: Option<u32>,
}

/// Probe `data` for duration and sample rate.
///
/// Returns `None` when Symphonia does not recognize the container.
pub fn probe_stream(data: &Bytes) -> Option<StreamInfo> {
    let source = Cursor::new(data.clone());
    let stream = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = match symphonia::default::get_probe().format(
        &Hint::new(),
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            debug!(error = %e, "Format probe failed");
            return None;
        }
    };

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;
    let params = &track.codec_params;

    let duration = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
        _ => None,
    };

    Some(StreamInfo {
        duration,
        sample_rate: params.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_not_recognized() {
        assert!(probe_stream(&Bytes::from_static(b"not an audio stream")).is_none());
        assert!(probe_stream(&Bytes::new()).is_none());
    }
}
