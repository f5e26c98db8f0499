//! Local microphone capture.
//!
//! Format selection, downmixing and level measurement are plain functions.
//! The cpal device binding is behind the `microphone` feature because it
//! links the platform audio stack.

use crate::peer::{LocalTrack, MediaConstraints};
use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::debug;

/// Captured buffers held for a slow reader before new ones are dropped.
pub const FRAME_BUFFER: usize = 32;

/// One input format offered by a capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
}

impl CaptureRange {
    fn contains(&self, rate: u32) -> bool {
        (self.min_rate..=self.max_rate).contains(&rate)
    }

    fn clamp(&self, rate: u32) -> u32 {
        rate.clamp(self.min_rate, self.max_rate)
    }
}

/// Picks the device format closest to `constraints`: exact channel count
/// and rate first, then exact channels at the nearest rate, then any
/// channel count at the exact rate (downmixed later).
pub fn choose_capture(ranges: &[CaptureRange], constraints: &MediaConstraints) -> Option<(usize, u32)> {
    let rate = constraints.sample_rate;
    let channels = constraints.channel_count.max(1);

    if let Some(i) = ranges.iter().position(|r| r.channels == channels && r.contains(rate)) {
        return Some((i, rate));
    }
    if let Some(i) = ranges.iter().position(|r| r.channels == channels) {
        return Some((i, ranges[i].clamp(rate)));
    }
    if let Some(i) = ranges
        .iter()
        .position(|r| r.channels > channels && r.contains(rate))
    {
        return Some((i, rate));
    }
    ranges.first().map(|r| (0, r.clamp(rate)))
}

/// Converts interleaved samples from `from` channels to `to` channels.
/// Mono output averages each frame; otherwise channels are taken in order
/// and the last one repeated when the device has fewer.
pub fn downmix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let from = usize::from(from.max(1));
    let to = usize::from(to.max(1));
    if from == to {
        return samples.to_vec();
    }
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|c| frame[c.min(from - 1)]));
        }
    }
    out
}

/// What arrived from a track during a listening window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputLevel {
    pub buffers: usize,
    pub samples: usize,
    pub peak: f32,
}

/// Drains `frames` for `window` and reports how much signal arrived.
pub async fn measure(frames: &mut mpsc::Receiver<Vec<f32>>, window: Duration) -> InputLevel {
    let mut level = InputLevel::default();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            buffer = frames.recv() => match buffer {
                Some(buffer) => {
                    level.buffers += 1;
                    level.samples += buffer.len();
                    level.peak = buffer.iter().fold(level.peak, |peak, s| peak.max(s.abs()));
                }
                None => break,
            },
        }
    }
    level
}

/// A live capture. Stopping it tells the capture thread to drop the
/// device stream.
pub struct MicrophoneTrack {
    id: String,
    live: AtomicBool,
    stop: Mutex<Option<std_mpsc::Sender<()>>>,
    frames: Mutex<Option<mpsc::Receiver<Vec<f32>>>>,
}

impl MicrophoneTrack {
    pub fn new(
        id: impl Into<String>,
        stop: std_mpsc::Sender<()>,
        frames: mpsc::Receiver<Vec<f32>>,
    ) -> Self {
        Self {
            id: id.into(),
            live: AtomicBool::new(true),
            stop: Mutex::new(Some(stop)),
            frames: Mutex::new(Some(frames)),
        }
    }

    /// Hands out the captured buffers. Only the first caller gets them.
    pub fn take_frames(&self) -> Option<mpsc::Receiver<Vec<f32>>> {
        self.frames.lock().ok()?.take()
    }
}

impl LocalTrack for MicrophoneTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender wakes the capture thread.
        if let Ok(mut stop) = self.stop.lock() {
            stop.take();
        }
        debug!(track = %self.id, "Microphone stopped");
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[cfg(feature = "microphone")]
pub use device::MicrophoneSource;

#[cfg(feature = "microphone")]
mod device {
    use super::*;
    use crate::{
        error::{RealtimeError, Result},
        peer::MediaSource,
    };
    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tracing::{info, warn};

    /// Captures from the host's default input device.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct MicrophoneSource;

    impl MicrophoneSource {
        /// Starts capture and returns the concrete track, whose buffers can
        /// be taken with [`MicrophoneTrack::take_frames`].
        pub async fn open(&self, constraints: &MediaConstraints) -> Result<Arc<MicrophoneTrack>> {
            let constraints = *constraints;
            let (ready_tx, ready_rx) = oneshot::channel::<std::result::Result<(), String>>();
            let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
            let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);

            // cpal streams are not Send; the stream lives and dies on this thread.
            std::thread::Builder::new()
                .name("microphone".to_string())
                .spawn(move || {
                    let stream = match open_stream(&constraints, frames_tx) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                    debug!("Microphone stream released");
                })
                .map_err(|e| RealtimeError::MediaAccess(e.to_string()))?;

            match ready_rx.await {
                Ok(Ok(())) => Ok(Arc::new(MicrophoneTrack::new("microphone", stop_tx, frames_rx))),
                Ok(Err(e)) => Err(RealtimeError::MediaAccess(e)),
                Err(_) => Err(RealtimeError::MediaAccess(
                    "capture thread exited before the device opened".to_string(),
                )),
            }
        }
    }

    #[async_trait]
    impl MediaSource for MicrophoneSource {
        async fn acquire_audio(&self, constraints: &MediaConstraints) -> Result<Arc<dyn LocalTrack>> {
            let track: Arc<dyn LocalTrack> = self.open(constraints).await?;
            Ok(track)
        }
    }

    fn open_stream(
        constraints: &MediaConstraints,
        frames: mpsc::Sender<Vec<f32>>,
    ) -> std::result::Result<cpal::Stream, String> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| "no input device available".to_string())?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| e.to_string())?
            .filter(|r| r.sample_format() == cpal::SampleFormat::F32)
            .collect();
        let offered: Vec<CaptureRange> = ranges
            .iter()
            .map(|r| CaptureRange {
                channels: r.channels(),
                min_rate: r.min_sample_rate().0,
                max_rate: r.max_sample_rate().0,
            })
            .collect();
        let (index, rate) = choose_capture(&offered, constraints)
            .ok_or_else(|| format!("{name} offers no f32 capture format"))?;
        let range = ranges
            .get(index)
            .cloned()
            .ok_or_else(|| "capture format vanished".to_string())?;
        let config: cpal::StreamConfig = range.with_sample_rate(cpal::SampleRate(rate)).config();

        if constraints.echo_cancellation || constraints.noise_suppression {
            debug!("Echo cancellation and noise suppression are left to the device");
        }

        let device_channels = config.channels;
        let wanted = constraints.channel_count.max(1);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Reader behind: drop the buffer.
                    let _ = frames.try_send(downmix(data, device_channels, wanted));
                },
                |e| warn!(error = %e, "Microphone stream error"),
                None,
            )
            .map_err(|e| e.to_string())?;
        stream.play().map_err(|e| e.to_string())?;

        info!(device = %name, rate, channels = device_channels, "Microphone capture started");
        Ok(stream)
    }
}
