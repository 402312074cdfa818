//! Audio capture via cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not**:
//! - Allocate heap memory (after the first callback sized the mix buffer)
//! - Block on a mutex or condvar
//! - Perform I/O, logging included
//!
//! Each callback downmixes to mono and writes into a
//! [`TapWriter`](crate::buffering::TapWriter) ring whose `push_slice` is
//! lock-free and allocation-free. Dropped samples are only counted; the
//! total is logged when the device is closed.
//!
//! # Audio-silent
//!
//! Only input streams are ever built. Nothing in this module opens an output
//! stream, so analysing the system's playback through a loopback device can
//! never play it a second time.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `CaptureSource` must be created, ticked and dropped on one thread,
//! which matches the single render-loop thread that drives a session.

pub mod device;

pub use device::{list_input_devices, DeviceInfo, DeviceRole};

use serde::{Deserialize, Serialize};

/// Which input device a `CaptureSource` should open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CaptureConfig {
    /// Exact device name to try first. `None` picks by `role`.
    pub preferred_device: Option<String>,
    /// What the device should be hearing. Default: microphone.
    pub role: DeviceRole,
}

#[cfg(feature = "audio-cpal")]
pub use capture::{AudioCapture, CaptureSource};

#[cfg(feature = "audio-cpal")]
mod capture {
    use std::sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    };

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    };
    use tracing::{error, info, warn};

    use super::{device::preference_score, CaptureConfig, DeviceRole};
    use crate::{
        buffering::{AudioTap, Producer, TapProducer},
        error::{ConnectError, Result},
        spectrum::{AnalyserConfig, SpectralFrameSource, StreamTapSource},
    };

    /// Handle to an active input stream feeding an [`AudioTap`].
    ///
    /// **Not `Send`**: `cpal::Stream` is bound to its creation thread on
    /// Windows/macOS.
    pub struct AudioCapture {
        /// Kept alive so the stream is not dropped prematurely.
        _stream: Stream,
        /// Shared flag; set to `false` to make the callback no-op.
        running: Arc<AtomicBool>,
        /// Samples the callback could not fit into the tap.
        dropped: Arc<AtomicU64>,
        /// Actual capture sample rate reported by the device (Hz).
        pub sample_rate: u32,
        pub device_name: String,
    }

    impl AudioCapture {
        /// Open an input device for `config` and start streaming into a new tap.
        ///
        /// Device order: exact `preferred_device`, then the best-scored device
        /// for `role` (loopback) or the default input (microphone), then the
        /// first input available.
        ///
        /// # Errors
        /// `ConnectError::NoInputDevice` when nothing can be opened,
        /// `ConnectError::DeviceUnavailable` / `PermissionDenied` / `Stream`
        /// when cpal refuses the device.
        pub fn open(config: &CaptureConfig) -> Result<(Self, AudioTap)> {
            let host = cpal::default_host();
            let device = select_device(&host, config)?;
            let device_name = device.name().unwrap_or_default();

            info!(device = device_name.as_str(), role = ?config.role, "opening input device");

            let supported = device
                .default_input_config()
                .map_err(|e| classify_error(e.to_string(), true))?;

            let sample_rate = supported.sample_rate().0;
            let channels = supported.channels();
            info!(sample_rate, channels, "audio config selected");

            let stream_config = StreamConfig {
                channels,
                sample_rate: supported.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let (writer, tap) = AudioTap::new(sample_rate);
            let producer = writer.into_producer();
            let running = Arc::new(AtomicBool::new(true));
            let dropped = Arc::new(AtomicU64::new(0));
            let shared = (Arc::clone(&running), Arc::clone(&dropped));

            let stream = match supported.sample_format() {
                SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, producer, shared),
                SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, producer, shared),
                SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, producer, shared),
                SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, producer, shared),
                SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, producer, shared),
                fmt => {
                    return Err(ConnectError::Stream(format!(
                        "unsupported sample format: {fmt:?}"
                    )))
                }
            }
            .map_err(|e| classify_error(e.to_string(), false))?;

            // Streams may start paused; resume so the tap fills.
            stream
                .play()
                .map_err(|e| classify_error(e.to_string(), false))?;

            Ok((
                Self {
                    _stream: stream,
                    running,
                    dropped,
                    sample_rate,
                    device_name,
                },
                tap,
            ))
        }

        /// Signal the callback to no-op on its next invocation.
        pub fn stop(&self) {
            self.running.store(false, Ordering::Release);
        }

        pub fn dropped_samples(&self) -> u64 {
            self.dropped.load(Ordering::Relaxed)
        }
    }

    fn select_device(host: &cpal::Host, config: &CaptureConfig) -> Result<cpal::Device> {
        if let Some(preferred) = config.preferred_device.as_deref() {
            match host.input_devices() {
                Ok(mut devices) => {
                    let found =
                        devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if let Some(device) = found {
                        return Ok(device);
                    }
                    warn!("preferred input device '{preferred}' not found, falling back");
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        if config.role == DeviceRole::Loopback {
            let best = host.input_devices().ok().and_then(|devices| {
                devices.max_by_key(|d| {
                    d.name()
                        .map(|n| preference_score(&n, DeviceRole::Loopback))
                        .unwrap_or(i32::MIN)
                })
            });
            if let Some(device) = best {
                return Ok(device);
            }
        }

        if let Some(default) = host.default_input_device() {
            return Ok(default);
        }

        let mut devices = host
            .input_devices()
            .map_err(|e| ConnectError::DeviceUnavailable(e.to_string()))?;
        let fallback = devices.next().ok_or(ConnectError::NoInputDevice)?;
        warn!("no default input device, falling back to first available input");
        Ok(fallback)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut producer: TapProducer,
        (running, dropped): (Arc<AtomicBool>, Arc<AtomicU64>),
    ) -> std::result::Result<Stream, cpal::BuildStreamError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let ch = config.channels.max(1) as usize;
        let mut mix_buf: Vec<f32> = Vec::new();

        device.build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (slot, frame) in mix_buf.iter_mut().zip(data.chunks_exact(ch)) {
                    let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                    *slot = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    dropped.fetch_add((mix_buf.len() - written) as u64, Ordering::Relaxed);
                }
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
    }

    fn classify_error(message: String, device_stage: bool) -> ConnectError {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("permission") || lowered.contains("denied") {
            ConnectError::PermissionDenied(message)
        } else if device_stage || lowered.contains("not available") {
            ConnectError::DeviceUnavailable(message)
        } else {
            ConnectError::Stream(message)
        }
    }

    /// `SpectralFrameSource` that captures from a cpal input device.
    pub struct CaptureSource {
        capture: Option<AudioCapture>,
        tap_source: StreamTapSource,
    }

    impl CaptureSource {
        pub fn new(config: AnalyserConfig) -> Self {
            Self {
                capture: None,
                tap_source: StreamTapSource::new(config),
            }
        }

        /// Name of the open device, if any.
        pub fn device_name(&self) -> Option<&str> {
            self.capture.as_ref().map(|c| c.device_name.as_str())
        }
    }

    impl Default for CaptureSource {
        fn default() -> Self {
            Self::new(AnalyserConfig::default())
        }
    }

    impl SpectralFrameSource for CaptureSource {
        type Input = CaptureConfig;

        fn connect(&mut self, input: CaptureConfig) -> Result<()> {
            self.disconnect();

            let (capture, tap) = AudioCapture::open(&input)?;
            if let Err(e) = self.tap_source.connect(tap) {
                capture.stop();
                return Err(e);
            }
            self.capture = Some(capture);
            Ok(())
        }

        fn next_frame(&mut self) -> Option<&[f32]> {
            self.capture.as_ref()?;
            self.tap_source.next_frame()
        }

        fn disconnect(&mut self) {
            if let Some(capture) = self.capture.take() {
                capture.stop();
                info!(
                    device = capture.device_name.as_str(),
                    dropped_samples = capture.dropped_samples(),
                    "input device closed"
                );
                // Stream drops here, releasing the device.
            }
            self.tap_source.disconnect();
        }

        fn is_connected(&self) -> bool {
            self.capture.is_some() && self.tap_source.is_connected()
        }

        fn bin_width(&self) -> f32 {
            self.tap_source.bin_width()
        }
    }

    impl Drop for CaptureSource {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

}
