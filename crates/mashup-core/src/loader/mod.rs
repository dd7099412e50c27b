//! Asynchronous stem loading
//!
//! Stems are decoded on tokio's blocking pool, one task per file, so a
//! catalog of many files decodes in parallel without stalling the runtime.
//! Loading is all-or-nothing per channel: one unreadable track fails its
//! channel, and a failed channel aborts the session setup.
//!
//! ```ignore
//! let loader = FileLoader::new(host.sample_rate());
//! let mixer = runtime.block_on(load_mixer(&loader, &mut host, &config))?;
//! ```

mod decode;

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::config::MashupConfig;
use crate::engine::{Mixer, TrackSource};
use crate::error::{MashupError, MashupResult};
use crate::host::AudioHost;
use crate::types::StereoBuffer;

pub use decode::decode_file;

/// Turns asset paths into playable buffers
pub trait BufferLoader {
    /// Load every path; results are returned in input order
    fn load_buffers(
        &self,
        paths: Vec<PathBuf>,
    ) -> impl Future<Output = Vec<MashupResult<StereoBuffer>>> + Send;
}

/// Loads audio files from disk at a fixed output sample rate
#[derive(Debug, Clone, Copy)]
pub struct FileLoader {
    sample_rate: u32,
}

impl FileLoader {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl BufferLoader for FileLoader {
    fn load_buffers(
        &self,
        paths: Vec<PathBuf>,
    ) -> impl Future<Output = Vec<MashupResult<StereoBuffer>>> + Send {
        let sample_rate = self.sample_rate;
        async move {
            let tasks: Vec<_> = paths
                .into_iter()
                .map(|path| {
                    let task_path = path.clone();
                    let task =
                        tokio::task::spawn_blocking(move || decode_file(&task_path, sample_rate));
                    (path, task)
                })
                .collect();

            let mut results = Vec::with_capacity(tasks.len());
            for (path, task) in tasks {
                let result = match task.await {
                    Ok(result) => result,
                    Err(e) => Err(MashupError::load_failure(
                        &path,
                        format!("decode task failed: {}", e),
                    )),
                };
                results.push(result);
            }
            results
        }
    }
}

/// A channel whose tracks all decoded
#[derive(Debug, Clone)]
pub struct LoadedChannel {
    pub name: String,
    pub gain: f32,
    pub sources: Vec<TrackSource>,
}

/// Display name of a track file
fn track_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Load every channel of the config
///
/// Fails with the first `LoadFailure` of the first failing channel.
pub async fn load_catalog<L>(
    loader: &L,
    config: &MashupConfig,
) -> MashupResult<Vec<LoadedChannel>>
where
    L: BufferLoader + Sync,
{
    let total = config.channels.len();
    let mut catalog = Vec::with_capacity(total);

    for (idx, definition) in config.channels.iter().enumerate() {
        let results = loader.load_buffers(definition.tracks.clone()).await;

        let mut sources = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (path, result) in definition.tracks.iter().zip(results) {
            match result {
                Ok(buffer) => sources.push(TrackSource::new(track_name(path), buffer)),
                Err(e) => {
                    log::error!("Loader: channel '{}': {}", definition.name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        log::info!(
            "Loader: channel '{}' ready ({} tracks, {}/{} channels loaded)",
            definition.name,
            sources.len(),
            idx + 1,
            total
        );
        catalog.push(LoadedChannel {
            name: definition.name.clone(),
            gain: definition.gain,
            sources,
        });
    }
    Ok(catalog)
}

/// Bind a loaded catalog into a mixer on `host`
pub fn build_mixer(
    host: &mut dyn AudioHost,
    config: &MashupConfig,
    catalog: Vec<LoadedChannel>,
) -> MashupResult<Mixer> {
    let mut mixer = Mixer::new(&mut *host).with_track_gain(config.track_gain);
    for channel in catalog {
        let id = mixer.add_channel(&mut *host, channel.name, channel.sources)?;
        if let Some(added) = mixer.channel_at_mut(id) {
            added.set_gain(&mut *host, channel.gain);
        }
    }
    Ok(mixer)
}

/// Load the whole catalog and build the mixer, or fail
pub async fn load_mixer<L>(
    loader: &L,
    host: &mut dyn AudioHost,
    config: &MashupConfig,
) -> MashupResult<Mixer>
where
    L: BufferLoader + Sync,
{
    let catalog = load_catalog(loader, config).await?;
    build_mixer(host, config, catalog)
}


#[cfg(test)]
mod tests {
    use super::fixtures::write_wav;
    use super::*;
    use crate::config::ChannelDefinition;
    use crate::error::ErrorKind;
    use crate::host::manual::ManualHost;

    fn config_with(channels: Vec<ChannelDefinition>) -> MashupConfig {
        MashupConfig {
            channels,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_buffers_keeps_order_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.wav");
        let long = dir.path().join("long.wav");
        write_wav(&short, 48000, 2, 100);
        write_wav(&long, 48000, 2, 300);

        let loader = FileLoader::new(48000);
        let results = loader
            .load_buffers(vec![long.clone(), dir.path().join("missing.wav"), short.clone()])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().len(), 300);
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::LoadFailure);
        assert_eq!(results[2].as_ref().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_catalog_builds_mixer() {
        let dir = tempfile::tempdir().unwrap();
        let mut beat = Vec::new();
        for name in ["backseat", "yonkers"] {
            let path = dir.path().join(format!("{}.wav", name));
            write_wav(&path, 48000, 2, 480);
            beat.push(path);
        }
        let vocals = dir.path().join("gucci.wav");
        write_wav(&vocals, 48000, 1, 480);

        let mut acapella = ChannelDefinition::new("acapella", vec![vocals]);
        acapella.gain = 0.8;
        let config = config_with(vec![ChannelDefinition::new("beat", beat), acapella]);

        let loader = FileLoader::new(48000);
        let mut host = ManualHost::new();
        let mixer = load_mixer(&loader, &mut host, &config).await.unwrap();

        let snapshot = mixer.snapshot();
        assert_eq!(snapshot.channels.len(), 2);
        let names: Vec<&str> = snapshot.channels[0]
            .tracks
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["backseat", "yonkers"]);
        assert_eq!(snapshot.channel("acapella").unwrap().gain, 0.8);
    }

    #[tokio::test]
    async fn test_one_bad_track_fails_channel() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("1994.wav");
        write_wav(&good, 48000, 2, 480);
        let bad = dir.path().join("mercy_me.wav");
        std::fs::write(&bad, b"RIFF but not really").unwrap();

        let config = config_with(vec![ChannelDefinition::new("melody", vec![good, bad])]);
        let loader = FileLoader::new(48000);

        let err = load_catalog(&loader, &config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadFailure);
        assert!(err.to_string().contains("mercy_me.wav"));
    }
}
