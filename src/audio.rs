use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;
use oddball_core::BlockDefinition;

/// Stimulus playback device.
///
/// `load` prepares the next stimulus and reports its length so the caller
/// can schedule the end of the trial; `play` must start with minimal latency.
pub trait AudioSink {
    fn load(&mut self, path: &Path) -> Result<Duration>;
    fn play(&mut self) -> Result<()>;
    fn stop(&mut self);
}

impl<A: AudioSink + ?Sized> AudioSink for Box<A> {
    fn load(&mut self, path: &Path) -> Result<Duration> {
        (**self).load(path)
    }
    fn play(&mut self) -> Result<()> {
        (**self).play()
    }
    fn stop(&mut self) {
        (**self).stop()
    }
}

pub fn stimulus_path(dir: &Path, stimulus: &str) -> PathBuf {
    dir.join(format!("{stimulus}.wav"))
}

/// Stimulus files referenced by `blocks` that do not exist under `dir`.
pub fn missing_stimuli(dir: &Path, blocks: &[BlockDefinition]) -> Vec<PathBuf> {
    let ids: BTreeSet<&str> = blocks.iter().flat_map(|b| b.stimuli()).collect();
    ids.into_iter()
        .map(|id| stimulus_path(dir, id))
        .filter(|path| !path.is_file())
        .collect()
}

/// Length of a WAV file, read from its header.
pub fn wav_duration(path: &Path) -> Result<Duration> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open stimulus {}", path.display()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        bail!("stimulus {} has a zero sample rate", path.display());
    }
    Ok(Duration::from_secs_f64(
        reader.duration() as f64 / spec.sample_rate as f64,
    ))
}

/// Sink that times stimuli from their WAV headers without producing sound.
#[derive(Debug, Default)]
pub struct SilentSink {
    loaded: Option<PathBuf>,
}

impl AudioSink for SilentSink {
    fn load(&mut self, path: &Path) -> Result<Duration> {
        let duration = wav_duration(path)?;
        self.loaded = Some(path.to_path_buf());
        Ok(duration)
    }
    fn play(&mut self) -> Result<()> {
        match &self.loaded {
            Some(path) => {
                debug!("silent playback of {}", path.display());
                Ok(())
            }
            None => bail!("play called before a stimulus was loaded"),
        }
    }
    fn stop(&mut self) {
        self.loaded = None;
    }
}

#[cfg(feature = "audio")]
pub use self::rodio_sink::RodioSink;

#[cfg(feature = "audio")]
mod rodio_sink {
    use std::fs::File;
    use std::io::BufReader;
    use std::path::Path;
    use std::time::Duration;

    use anyhow::{bail, Context, Result};
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::{wav_duration, AudioSink};

    /// Plays stimuli on the default output device.
    ///
    /// Each stimulus is decoded and queued on a paused sink in `load`, so
    /// `play` only has to unpause it.
    pub struct RodioSink {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sink: Option<Sink>,
        volume: f32,
    }

    impl RodioSink {
        pub fn new(volume: f32) -> Result<Self> {
            let (stream, handle) =
                OutputStream::try_default().context("no audio output device available")?;
            Ok(Self {
                _stream: stream,
                handle,
                sink: None,
                volume,
            })
        }
    }

    impl AudioSink for RodioSink {
        fn load(&mut self, path: &Path) -> Result<Duration> {
            let duration = wav_duration(path)?;
            let file = File::open(path)
                .with_context(|| format!("failed to open stimulus {}", path.display()))?;
            let source = Decoder::new(BufReader::new(file))
                .with_context(|| format!("failed to decode stimulus {}", path.display()))?;
            let sink = Sink::try_new(&self.handle).context("failed to create audio sink")?;
            sink.pause();
            sink.set_volume(self.volume);
            sink.append(source);
            if let Some(previous) = self.sink.replace(sink) {
                previous.stop();
            }
            Ok(duration)
        }

        fn play(&mut self) -> Result<()> {
            match &self.sink {
                Some(sink) => {
                    sink.play();
                    Ok(())
                }
                None => bail!("play called before a stimulus was loaded"),
            }
        }

        fn stop(&mut self) {
            if let Some(sink) = self.sink.take() {
                sink.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a mono 16-bit WAV of `frames` silent samples at `rate` Hz.
    fn write_wav(path: &Path, rate: u32, frames: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn duration_comes_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.wav");
        write_wav(&path, 8000, 2000);
        assert_eq!(wav_duration(&path).unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn silent_sink_requires_load_before_play() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s1.wav");
        write_wav(&path, 1000, 100);
        let mut sink = SilentSink::default();
        assert!(sink.play().is_err());
        assert_eq!(sink.load(&path).unwrap(), Duration::from_millis(100));
        sink.play().unwrap();
        sink.stop();
        assert!(sink.play().is_err());
    }

    #[test]
    fn reports_each_missing_file_once() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("s1.wav"), 1000, 10);
        let blocks = [
            BlockDefinition::new("A", ["s1", "s2"], ["d1"]),
            BlockDefinition::new("B", ["s2"], ["d1"]),
        ];
        let missing = missing_stimuli(dir.path(), &blocks);
        assert_eq!(
            missing,
            [dir.path().join("d1.wav"), dir.path().join("s2.wav")]
        );
    }
}
