//! Stem decoding: symphonia decode, stereo fold, rubato resample

use std::fs::File;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{MashupError, MashupResult};
use crate::types::{Sample, StereoBuffer, StereoSample};

/// Decode an audio file to a stereo buffer at `target_rate`
///
/// Mono files are duplicated to both sides; files with more than two
/// channels keep their first two. Files without any audio frames are
/// rejected.
pub fn decode_file(path: &Path, target_rate: u32) -> MashupResult<StereoBuffer> {
    let (interleaved, source_rate, channels) = decode_interleaved(path)?;
    let buffer = to_stereo(&interleaved, channels);
    if buffer.is_empty() {
        return Err(MashupError::load_failure(path, "no audio frames"));
    }

    if source_rate == target_rate {
        return Ok(buffer);
    }
    log::debug!(
        "decode_file: resampling {:?} from {}Hz to {}Hz",
        path,
        source_rate,
        target_rate
    );
    resample(&buffer, source_rate, target_rate)
        .map_err(|reason| MashupError::load_failure(path, reason))
}

/// Decode every packet of the first audio track
///
/// Returns (interleaved samples, sample rate, channel count).
fn decode_interleaved(path: &Path) -> MashupResult<(Vec<Sample>, u32, usize)> {
    let file = File::open(path).map_err(|e| MashupError::load_failure(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MashupError::load_failure(path, format!("unsupported format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MashupError::load_failure(path, "no audio track"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MashupError::load_failure(path, "unknown sample rate"))?;
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MashupError::load_failure(path, format!("unsupported codec: {}", e)))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<Sample>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("decode: error reading packet from {:?}: {}", path, e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("decode: skipping bad packet in {:?}: {}", path, e);
                continue;
            }
        };

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    Ok((samples, sample_rate, channels))
}

/// Fold interleaved audio with any channel count to stereo
fn to_stereo(interleaved: &[Sample], channels: usize) -> StereoBuffer {
    match channels {
        0 => StereoBuffer::default(),
        1 => StereoBuffer::from_vec(interleaved.iter().map(|&s| StereoSample::mono(s)).collect()),
        2 => StereoBuffer::from_interleaved(interleaved),
        n => StereoBuffer::from_vec(
            interleaved
                .chunks_exact(n)
                .map(|frame| StereoSample::new(frame[0], frame[1]))
                .collect(),
        ),
    }
}

/// Sinc-resample a whole buffer
///
/// The filter's output delay is trimmed from the front and its tail flushed,
/// so frame `n` of the input lands at `n * ratio` in the output.
fn resample(
    buffer: &StereoBuffer,
    source_rate: u32,
    target_rate: u32,
) -> Result<StereoBuffer, String> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;
    let target_len = (buffer.len() as f64 * ratio).round() as usize;

    let mut resampler = SincFixedIn::<Sample>::new(ratio, 2.0, params, buffer.len(), 2)
        .map_err(|e| format!("failed to create resampler: {}", e))?;

    let left: Vec<Sample> = buffer.iter().map(|s| s.left).collect();
    let right: Vec<Sample> = buffer.iter().map(|s| s.right).collect();
    let delay = resampler.output_delay();
    let mut output = resampler
        .process(&[left, right], None)
        .map_err(|e| format!("failed to resample: {}", e))?;
    let tail = resampler
        .process_partial(None::<&[Vec<Sample>]>, None)
        .map_err(|e| format!("failed to flush resampler: {}", e))?;

    for (channel, rest) in output.iter_mut().zip(tail) {
        channel.extend_from_slice(&rest);
        channel.drain(..delay.min(channel.len()));
        channel.resize(target_len, 0.0);
    }
    Ok(StereoBuffer::from_channels(&output[0], &output[1]))
}
