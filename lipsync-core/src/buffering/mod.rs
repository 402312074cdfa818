//! Lock-free SPSC tap between the audio provider and the analyser.
//!
//! The provider keeps the [`TapWriter`] on whatever thread already renders
//! the audio and copies each mono block into it. The session owns the
//! [`AudioTap`] and drains it once per tick. Nothing here can reach an output
//! device: the tap is a copy of samples, not a routing node.

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Producer half, held by the audio provider.
pub type TapProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the frame source.
pub type TapConsumer = ringbuf::HeapCons<f32>;

/// Ring capacity: 2^16 = 65 536 samples ≈ 1.4 s at 48 kHz.
/// A stalled render loop only needs the most recent analysis window, so
/// anything older is dropped at the writer.
pub const TAP_CAPACITY: usize = 1 << 16;

/// Writer handle for the audio provider. Never blocks, never allocates.
pub struct TapWriter {
    producer: TapProducer,
}

impl TapWriter {
    /// Copy mono f32 samples into the tap.
    ///
    /// Returns how many samples were accepted; the remainder is dropped when
    /// the reader has fallen behind.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Unwrap into the raw ring producer (used by the cpal callback).
    pub fn into_producer(self) -> TapProducer {
        self.producer
    }
}

/// Reader side of a tap, plus the sample rate the writer promised.
pub struct AudioTap {
    consumer: TapConsumer,
    sample_rate: u32,
}

impl AudioTap {
    /// Create a matched writer/tap pair with the default capacity.
    pub fn new(sample_rate: u32) -> (TapWriter, AudioTap) {
        Self::with_capacity(sample_rate, TAP_CAPACITY)
    }

    pub fn with_capacity(sample_rate: u32, capacity: usize) -> (TapWriter, AudioTap) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        (
            TapWriter { producer },
            AudioTap {
                consumer,
                sample_rate,
            },
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples currently waiting to be analysed.
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Pop up to `out.len()` samples, returning how many were read.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        self.consumer.pop_slice(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_readable_in_order() {
        let (mut writer, mut tap) = AudioTap::new(48_000);
        assert_eq!(writer.write(&[0.1, 0.2, 0.3]), 3);
        assert_eq!(tap.pending(), 3);

        let mut out = [0.0f32; 8];
        let n = tap.read(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[0.1, 0.2, 0.3]);
        assert_eq!(tap.pending(), 0);
    }

    #[test]
    fn overflow_drops_instead_of_blocking() {
        let (mut writer, tap) = AudioTap::with_capacity(16_000, 4);
        let written = writer.write(&[0.5; 10]);
        assert_eq!(written, 4);
        assert_eq!(tap.pending(), 4);
        assert_eq!(tap.sample_rate(), 16_000);
    }
}
