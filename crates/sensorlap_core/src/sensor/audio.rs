//! Audio capture seam and a push-fed PCM source.
//!
//! # Responsibility
//! - Define what the noise sampler needs from a microphone.
//! - Provide `PcmFeed`, a bounded queue the platform shell pushes captured
//!   16-bit mono frames into.
//!
//! # Invariants
//! - `PcmFeed` keeps at most `capacity` samples; the oldest are dropped first.
//! - A source cannot start once its writer side is closed.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Capture sample rate used when the platform does not say otherwise.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    InitFailed(String),
    ReadFailed(String),
}

impl Display for AudioError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitFailed(message) => write!(f, "audio capture init failed: {message}"),
            Self::ReadFailed(message) => write!(f, "audio read failed: {message}"),
        }
    }
}

impl Error for AudioError {}

/// 16-bit mono PCM capture device.
pub trait AudioSource: Send {
    /// Begins recording. Failure disables noise sampling for the screen.
    fn start(&mut self) -> Result<(), AudioError>;
    /// Copies up to `buffer.len()` samples and returns how many were written.
    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError>;
    /// Stops recording and releases the device.
    fn stop(&mut self);
}

#[derive(Debug)]
struct PcmQueue {
    samples: VecDeque<i16>,
    capacity: usize,
    closed: bool,
}

fn lock(queue: &Mutex<PcmQueue>) -> MutexGuard<'_, PcmQueue> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer side of a push-fed PCM queue.
#[derive(Debug, Clone)]
pub struct PcmFeed {
    queue: Arc<Mutex<PcmQueue>>,
}

impl PcmFeed {
    /// Creates a feed and its matching `AudioSource`.
    pub fn channel(capacity: usize) -> (Self, PcmFeedSource) {
        let queue = Arc::new(Mutex::new(PcmQueue {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            closed: false,
        }));
        (
            Self {
                queue: Arc::clone(&queue),
            },
            PcmFeedSource { queue },
        )
    }

    /// Appends captured samples, dropping the oldest beyond capacity.
    ///
    /// Returns the number of samples dropped. Pushing to a closed feed is a
    /// no-op.
    pub fn push(&self, frame: &[i16]) -> usize {
        let mut queue = lock(&self.queue);
        if queue.closed {
            return 0;
        }
        queue.samples.extend(frame.iter().copied());
        let overflow = queue.samples.len().saturating_sub(queue.capacity);
        queue.samples.drain(..overflow);
        overflow
    }

    pub fn buffered(&self) -> usize {
        lock(&self.queue).samples.len()
    }

    /// Marks the platform capture as gone.
    pub fn close(&self) {
        let mut queue = lock(&self.queue);
        queue.closed = true;
        queue.samples.clear();
    }
}

/// Reader side of a `PcmFeed`.
#[derive(Debug)]
pub struct PcmFeedSource {
    queue: Arc<Mutex<PcmQueue>>,
}

impl AudioSource for PcmFeedSource {
    fn start(&mut self) -> Result<(), AudioError> {
        if lock(&self.queue).closed {
            return Err(AudioError::InitFailed("pcm feed is closed".to_string()));
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        let mut queue = lock(&self.queue);
        let count = buffer.len().min(queue.samples.len());
        for (slot, sample) in buffer.iter_mut().zip(queue.samples.drain(..count)) {
            *slot = sample;
        }
        Ok(count)
    }

    fn stop(&mut self) {
        lock(&self.queue).samples.clear();
    }
}
