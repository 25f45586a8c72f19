//! Audio capture through cpal
//!
//! Microphone capture opens an input stream on the default input device.
//! System audio uses WASAPI loopback, which on Windows means building an
//! input stream on an output device. Other hosts report loopback as
//! unsupported so the recorder can fall back to mic-only.

use super::error::{CaptureError, CaptureResult};
use super::traits::{ActiveStream, AudioBackend, AudioDeviceInfo, StreamRequest};
use super::wav::FrameSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SizedSample, StreamConfig};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// [`AudioBackend`] backed by the platform's default cpal host
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn default_input_device(&self) -> CaptureResult<AudioDeviceInfo> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("No default input device".to_string()))?;

        let config = device.default_input_config().map_err(|e| {
            CaptureError::Configuration(format!("Failed to get input config: {}", e))
        })?;
        let max_channels = device
            .supported_input_configs()
            .ok()
            .and_then(|configs| configs.map(|c| c.channels()).max())
            .unwrap_or(0)
            .max(config.channels());

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Ok(AudioDeviceInfo {
            id: name.clone(),
            name,
            is_input: true,
            default_sample_rate: config.sample_rate().0,
            max_channels,
        })
    }

    fn default_output_device(&self) -> CaptureResult<AudioDeviceInfo> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("No default output device".to_string()))?;

        let config = device.default_output_config().map_err(|e| {
            CaptureError::Configuration(format!("Failed to get output config: {}", e))
        })?;
        let max_channels = device
            .supported_output_configs()
            .ok()
            .and_then(|configs| configs.map(|c| c.channels()).max())
            .unwrap_or(0)
            .max(config.channels());

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Ok(AudioDeviceInfo {
            id: name.clone(),
            name,
            is_input: false,
            default_sample_rate: config.sample_rate().0,
            max_channels,
        })
    }

    fn supports_loopback(&self) -> bool {
        host_supports_loopback(&cpal::default_host())
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
        sink: FrameSink,
    ) -> CaptureResult<Box<dyn ActiveStream>> {
        // cpal streams are not Send, so each one lives on its own thread
        // until the stop sender is dropped.
        let (ready_tx, ready_rx) = mpsc::channel::<CaptureResult<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread_request = request.clone();

        let handle = thread::Builder::new()
            .name(format!("capture-{}", request.role))
            .spawn(move || {
                let stream = match build_stream(&thread_request, sink) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Stream(format!(
                        "Failed to start audio stream: {}",
                        e
                    ))));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                tracing::info!("{} capture stream started", thread_request.role);

                // Blocks until stop is requested or the handle is dropped.
                let _ = stop_rx.recv();

                if let Err(e) = stream.pause() {
                    tracing::debug!("{} stream pause failed: {}", thread_request.role, e);
                }
                drop(stream);
                tracing::info!("{} capture stream stopped", thread_request.role);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Stream(
                    "Capture thread exited before the stream started".to_string(),
                ))
            }
        }
    }
}

/// Handle to a stream running on its own thread
struct CpalStream {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ActiveStream for CpalStream {
    fn stop(&mut self) -> CaptureResult<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| CaptureError::Stream("Capture thread panicked".to_string()))?;
        }
        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread; no join so drop never blocks.
        self.stop_tx.take();
    }
}

#[cfg(target_os = "windows")]
fn host_supports_loopback(host: &Host) -> bool {
    host.id() == cpal::HostId::Wasapi
}

#[cfg(not(target_os = "windows"))]
fn host_supports_loopback(_host: &Host) -> bool {
    false
}

/// Find the requested device by name, falling back to the default
fn find_device(host: &Host, request: &StreamRequest) -> CaptureResult<Device> {
    let matches_name =
        |device: &Device| device.name().ok().as_deref() == Some(request.device_id.as_str());

    let found = if request.loopback {
        host.output_devices()
            .ok()
            .and_then(|mut devices| devices.find(matches_name))
            .or_else(|| host.default_output_device())
    } else {
        host.input_devices()
            .ok()
            .and_then(|mut devices| devices.find(matches_name))
            .or_else(|| host.default_input_device())
    };

    found.ok_or_else(|| CaptureError::DeviceNotFound(request.device_id.clone()))
}

fn build_stream(request: &StreamRequest, sink: FrameSink) -> CaptureResult<cpal::Stream> {
    let host = cpal::default_host();
    if request.loopback && !host_supports_loopback(&host) {
        return Err(CaptureError::LoopbackUnsupported);
    }

    let device = find_device(&host, request)?;

    let sample_format = if request.loopback {
        device.default_output_config().map(|c| c.sample_format())
    } else {
        device.default_input_config().map(|c| c.sample_format())
    }
    .map_err(|e| CaptureError::Configuration(format!("Failed to get audio config: {}", e)))?;

    let config = StreamConfig {
        channels: request.format.channels,
        sample_rate: cpal::SampleRate(request.format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let label = request.role.to_string();
    let stream = match sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(&device, &config, sink, label),
        SampleFormat::I16 => build_typed_stream::<i16>(&device, &config, sink, label),
        SampleFormat::U16 => build_typed_stream::<u16>(&device, &config, sink, label),
        SampleFormat::I32 => build_typed_stream::<i32>(&device, &config, sink, label),
        other => {
            return Err(CaptureError::Configuration(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| CaptureError::Stream(format!("Failed to build {} stream: {}", request.role, e)))
}

fn build_typed_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: FrameSink,
    label: String,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data
                .iter()
                .map(|&sample| cpal::Sample::from_sample(sample))
                .collect();
            sink.push(samples);
        },
        move |err| tracing::error!("{} stream error: {}", label, err),
        None,
    )
}
