//! WAV file writer fed from the audio thread
//!
//! Audio callbacks push buffers into a bounded queue; a dedicated thread
//! drains the queue into a 16-bit PCM WAV file. The callback never blocks:
//! when the queue is full the buffer is dropped and counted.

use super::error::{CaptureError, CaptureResult};
use super::traits::CaptureFormat;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Producer side of a writer queue, cloned into stream callbacks
#[derive(Clone)]
pub struct FrameSink {
    tx: SyncSender<Vec<f32>>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    /// Queue a buffer of interleaved samples without blocking
    pub fn push(&self, samples: Vec<f32>) {
        match self.tx.try_send(samples) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Writer already finished; late buffers after stop are discarded.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Number of buffers dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Totals reported when a writer finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WavStats {
    pub samples_written: u64,
    pub dropped_buffers: u64,
}

/// Owns the output file and the thread writing to it
pub struct WavFileWriter {
    path: PathBuf,
    sink: Option<FrameSink>,
    handle: Option<JoinHandle<CaptureResult<u64>>>,
}

impl WavFileWriter {
    /// Create (or truncate) `path` and start the writer thread
    pub fn create(path: &Path, format: CaptureFormat, queue_capacity: usize) -> CaptureResult<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let file = File::create(path)?;
        let created = CreatedFile::new(path);
        let writer = WavWriter::new(BufWriter::new(file), spec)?;

        let (tx, rx) = mpsc::sync_channel(queue_capacity.max(1));
        let sink = FrameSink {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };

        let thread_name = format!(
            "wav-writer-{}",
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || drain_into(writer, rx))?;
        created.keep();

        tracing::debug!(
            "WAV writer opened: {:?} ({}Hz, {}ch)",
            path,
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            path: path.to_path_buf(),
            sink: Some(sink),
            handle: Some(handle),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A new producer handle for a stream callback
    pub fn sink(&self) -> Option<FrameSink> {
        self.sink.clone()
    }

    /// Wait for queued audio to be written and finalize the file
    ///
    /// Every other [`FrameSink`] clone must have been dropped first, otherwise
    /// this waits for them.
    pub fn finish(mut self) -> CaptureResult<WavStats> {
        self.finish_inner()
    }

    fn finish_inner(&mut self) -> CaptureResult<WavStats> {
        let dropped_buffers = self.sink.take().map(|sink| sink.dropped()).unwrap_or(0);

        let Some(handle) = self.handle.take() else {
            return Ok(WavStats::default());
        };

        let samples_written = handle
            .join()
            .map_err(|_| CaptureError::WriterPanicked(self.path.display().to_string()))??;

        if dropped_buffers > 0 {
            tracing::warn!(
                "Dropped {} audio buffers while writing {:?}",
                dropped_buffers,
                self.path
            );
        }

        Ok(WavStats {
            samples_written,
            dropped_buffers,
        })
    }
}

impl Drop for WavFileWriter {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.finish_inner() {
                tracing::warn!("Failed to finalize {:?}: {}", self.path, e);
            }
        }
    }
}

/// Removes a freshly created file on drop unless kept
struct CreatedFile<'a> {
    path: &'a Path,
    keep: bool,
}

impl<'a> CreatedFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for CreatedFile<'_> {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            tracing::debug!("Could not remove {:?}: {}", self.path, e);
        }
    }
}

fn drain_into(
    mut writer: WavWriter<BufWriter<File>>,
    rx: Receiver<Vec<f32>>,
) -> CaptureResult<u64> {
    for buffer in rx {
        for sample in buffer {
            writer.write_sample(f32_to_i16(sample))?;
        }
    }
    let samples_written = u64::from(writer.len());
    writer.finalize()?;
    Ok(samples_written)
}

/// Convert a normalized float sample to 16-bit PCM
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMAT: CaptureFormat = CaptureFormat {
        sample_rate: 16000,
        channels: 1,
    };

    #[test]
    fn test_f32_to_i16_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn test_created_file_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic.wav");

        File::create(&path).unwrap();
        drop(CreatedFile::new(&path));
        assert!(!path.exists());

        File::create(&path).unwrap();
        CreatedFile::new(&path).keep();
        assert!(path.exists());
    }

    #[test]
    fn test_writer_persists_queued_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic.wav");

        let writer = WavFileWriter::create(&path, FORMAT, 8).unwrap();
        let sink = writer.sink().unwrap();
        sink.push(vec![0.5; 100]);
        sink.push(vec![-0.5; 60]);
        drop(sink);

        let stats = writer.finish().unwrap();
        assert_eq!(stats.samples_written, 160);
        assert_eq!(stats.dropped_buffers, 0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len(), 160);
    }

    #[test]
    fn test_empty_recording_is_still_a_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.wav");

        let writer = WavFileWriter::create(&path, FORMAT, 8).unwrap();
        writer.finish().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 0);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_drop_finalizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mic.wav");

        {
            let writer = WavFileWriter::create(&path, FORMAT, 4).unwrap();
            let sink = writer.sink().unwrap();
            sink.push(vec![0.25; 32]);
        }

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 32);
    }
}
