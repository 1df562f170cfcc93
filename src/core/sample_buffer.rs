//! Growable FIFO of interleaved sample frames.
//!
//! Each processing stage owns its buffers and passes frames downstream by
//! copying them out of one buffer and into the next. Reads advance a cursor
//! instead of shifting memory; the unread region is compacted to the front
//! only when a write would otherwise run past the end of the allocation.

use std::mem::size_of;

use log::trace;

use crate::core::types::Sample;
use crate::error::{Result, StretchError};

/// Storage is grown in whole pages of this many bytes.
const GROWTH_ALIGN_BYTES: usize = 4096;

/// Frames allocated by a fresh buffer.
const INITIAL_CAPACITY_FRAMES: usize = 32;

/// FIFO pipe interface shared by buffers, processing stages and the stream
/// processor, so that any of them can act as a frame source.
pub trait SamplePipe<S: Sample> {
    /// Number of interleaved channels per frame.
    fn channels(&self) -> usize;

    /// Number of frames ready to be received.
    fn num_samples(&self) -> usize;

    /// Returns true when no frames are ready.
    fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Moves up to `max_frames` frames into `out`, limited by the room in `out`.
    ///
    /// Returns the number of frames written.
    fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize;

    /// Drops up to `max_frames` frames from the front.
    ///
    /// Returns the number of frames dropped.
    fn discard_samples(&mut self, max_frames: usize) -> usize;

    /// Drops all buffered frames.
    fn clear(&mut self);
}

/// Growable FIFO of interleaved frames with a lazily compacted read cursor.
///
/// Invariant: `read_pos + count <= capacity()` (all in frames).
#[derive(Debug, Clone)]
pub struct SampleBuffer<S: Sample> {
    data: Vec<S>,
    channels: usize,
    read_pos: usize,
    count: usize,
}

impl<S: Sample> SampleBuffer<S> {
    /// Creates an empty buffer for `channels` interleaved channels.
    ///
    /// A channel count of zero is treated as mono.
    pub fn new(channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            data: vec![S::ZERO; INITIAL_CAPACITY_FRAMES * channels],
            channels,
            read_pos: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames ready to be read.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Allocated size in frames.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len() / self.channels
    }

    /// Appends whole frames from `src`. A trailing partial frame is ignored.
    ///
    /// # Errors
    /// Returns [`StretchError::AllocationFailure`] if the buffer cannot grow;
    /// the buffer is left unchanged in that case.
    pub fn put_samples(&mut self, src: &[S]) -> Result<()> {
        let frames = src.len() / self.channels;
        if frames == 0 {
            return Ok(());
        }
        self.ensure_capacity(self.count + frames)?;
        let start = (self.read_pos + self.count) * self.channels;
        let len = frames * self.channels;
        self.data[start..start + len].copy_from_slice(&src[..len]);
        self.count += frames;
        Ok(())
    }

    /// Marks `frames` frames written directly into the slice returned by
    /// [`reserve_tail`](Self::reserve_tail) as ready.
    pub fn commit(&mut self, frames: usize) -> Result<()> {
        self.ensure_capacity(self.count + frames)?;
        self.count += frames;
        Ok(())
    }

    /// Returns a writable region of `slack` frames directly after the
    /// ready frames. Contents of the region are unspecified; call
    /// [`commit`](Self::commit) to publish what was written.
    pub fn reserve_tail(&mut self, slack: usize) -> Result<&mut [S]> {
        self.ensure_capacity(self.count + slack)?;
        let start = (self.read_pos + self.count) * self.channels;
        Ok(&mut self.data[start..start + slack * self.channels])
    }

    /// Ready frames, oldest first.
    #[inline]
    pub fn frames(&self) -> &[S] {
        let start = self.read_pos * self.channels;
        &self.data[start..start + self.count * self.channels]
    }

    /// Copies up to `max_frames` frames into `out` and removes them.
    pub fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize {
        let n = max_frames.min(self.count).min(out.len() / self.channels);
        let len = n * self.channels;
        out[..len].copy_from_slice(&self.frames()[..len]);
        self.discard_samples(n)
    }

    /// Removes up to `max_frames` frames from the front without copying.
    pub fn discard_samples(&mut self, max_frames: usize) -> usize {
        let n = max_frames.min(self.count);
        self.read_pos += n;
        self.count -= n;
        if self.count == 0 {
            self.read_pos = 0;
        }
        n
    }

    /// Shrinks the ready count to `frames` if it is larger.
    ///
    /// Returns the resulting ready count.
    pub fn truncate(&mut self, frames: usize) -> usize {
        if frames < self.count {
            self.count = frames;
        }
        self.count
    }

    /// Moves every ready frame of `other` to the end of this buffer.
    ///
    /// Returns the number of frames moved.
    pub fn append_from(&mut self, other: &mut SampleBuffer<S>) -> Result<usize> {
        let moved = other.count;
        self.put_samples(other.frames())?;
        other.clear();
        Ok(moved)
    }

    /// Changes the channel count, reinterpreting the stored samples as frames
    /// of the new width.
    pub fn set_channels(&mut self, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(StretchError::InvalidParameter(
                "channel count must be at least 1".into(),
            ));
        }
        if channels == self.channels {
            return Ok(());
        }
        let used = self.count * self.channels;
        self.rewind();
        self.channels = channels;
        self.count = used / channels;
        Ok(())
    }

    /// Drops all frames. The allocation is kept.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.count = 0;
    }

    /// Moves the ready frames to the start of the storage.
    fn rewind(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        let start = self.read_pos * self.channels;
        let len = self.count * self.channels;
        self.data.copy_within(start..start + len, 0);
        self.read_pos = 0;
    }

    fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        let capacity = self.capacity();
        if required > capacity {
            return self.grow(required);
        }
        if self.read_pos + required > capacity {
            self.rewind();
        }
        Ok(())
    }

    fn grow(&mut self, required: usize) -> Result<()> {
        let sample_size = size_of::<S>();
        let requested = required.saturating_mul(self.channels);
        let bytes = requested
            .checked_mul(sample_size)
            .and_then(|b| b.checked_add(GROWTH_ALIGN_BYTES - 1))
            .ok_or(StretchError::AllocationFailure { requested })?
            & !(GROWTH_ALIGN_BYTES - 1);
        let mut new_len = bytes / sample_size;
        new_len -= new_len % self.channels;

        let mut grown: Vec<S> = Vec::new();
        grown
            .try_reserve_exact(new_len)
            .map_err(|_| StretchError::AllocationFailure { requested: new_len })?;
        grown.extend_from_slice(self.frames());
        grown.resize(new_len, S::ZERO);

        trace!(
            "sample buffer grown from {} to {} frames",
            self.capacity(),
            new_len / self.channels
        );
        self.data = grown;
        self.read_pos = 0;
        Ok(())
    }
}

impl<S: Sample> Default for SampleBuffer<S> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<S: Sample> SamplePipe<S> for SampleBuffer<S> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn num_samples(&self) -> usize {
        self.count
    }

    fn receive_samples(&mut self, out: &mut [S], max_frames: usize) -> usize {
        SampleBuffer::receive_samples(self, out, max_frames)
    }

    fn discard_samples(&mut self, max_frames: usize) -> usize {
        SampleBuffer::discard_samples(self, max_frames)
    }

    fn clear(&mut self) {
        SampleBuffer::clear(self)
    }
}
