//! Bounded hand-off slot between the capture and render contexts.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use crate::{OverflowPolicy, SampleBlock, StreamConfig, StreamError};

/// Counters describing what has passed through a [`BlockChannel`].
///
/// Every published block ends up counted exactly once as `taken` or `dropped`
/// (blocks still queued when the channel closes count as dropped).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Blocks accepted by `publish`.
    pub published: u64,
    /// Blocks handed to the render side.
    pub taken: u64,
    /// Blocks discarded by the overflow policy or at close.
    pub dropped: u64,
}

/// Storage behind the lock, one variant per overflow policy.
enum Slot {
    Latest(Option<SampleBlock>),
    Queue(HeapRb<SampleBlock>),
}

impl Slot {
    fn new(policy: OverflowPolicy) -> Self {
        match policy {
            OverflowPolicy::LatestWins => Self::Latest(None),
            OverflowPolicy::BoundedQueue { capacity } => Self::Queue(HeapRb::new(capacity)),
        }
    }

    /// Stores a block, returning whichever block the policy displaced.
    fn push(&mut self, block: SampleBlock) -> Option<SampleBlock> {
        match self {
            Self::Latest(slot) => slot.replace(block),
            Self::Queue(queue) => queue.push_overwrite(block),
        }
    }

    fn pop(&mut self) -> Option<SampleBlock> {
        match self {
            Self::Latest(slot) => slot.take(),
            Self::Queue(queue) => queue.try_pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Latest(slot) => usize::from(slot.is_some()),
            Self::Queue(queue) => queue.occupied_len(),
        }
    }

    fn drain(&mut self) -> Vec<SampleBlock> {
        let mut discarded = Vec::with_capacity(self.len());
        while let Some(block) = self.pop() {
            discarded.push(block);
        }
        discarded
    }
}

struct Inner {
    slot: Slot,
    closed: bool,
    last_published: Option<u64>,
    last_taken: Option<u64>,
    stats: ChannelStats,
}

/// The hand-off point between a capture context and a render context.
///
/// `publish` and `try_take` may run concurrently from different threads. Both
/// hold an internal lock only for O(1) work (a slot swap or a ring-buffer
/// push/pop), so neither side can stall the other. Displaced blocks are freed
/// after the lock is released.
///
/// Blocks must arrive with strictly increasing sequence numbers, so the render
/// side never sees a sequence number go backwards. The policy may skip numbers.
///
/// # Example
///
/// ```
/// use scope_stream::{BlockChannel, OverflowPolicy, SampleBlock, StreamConfig};
/// use std::time::Duration;
///
/// let config = StreamConfig { block_len: 4, ..Default::default() };
/// let channel = BlockChannel::new(&config, OverflowPolicy::LatestWins).unwrap();
///
/// for seq in 1..=3 {
///     let block = SampleBlock::new(seq, vec![0.0; 4], Duration::ZERO, 44100, 1);
///     channel.publish(block).unwrap();
/// }
///
/// assert_eq!(channel.try_take().unwrap().map(|b| b.sequence()), Some(3));
/// assert!(channel.try_take().unwrap().is_none());
/// ```
pub struct BlockChannel {
    inner: Mutex<Inner>,
    policy: OverflowPolicy,
    block_samples: usize,
    channels: u16,
}

impl BlockChannel {
    /// Creates a channel for blocks shaped by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config is invalid or a bounded queue has
    /// zero capacity.
    pub fn new(config: &StreamConfig, policy: OverflowPolicy) -> Result<Self, StreamError> {
        config.validate()?;
        if policy.capacity() == 0 {
            return Err(StreamError::invalid_config(
                "bounded queue capacity must be at least 1",
            ));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                slot: Slot::new(policy),
                closed: false,
                last_published: None,
                last_taken: None,
                stats: ChannelStats::default(),
            }),
            policy,
            block_samples: config.samples_per_block(),
            channels: config.channels,
        })
    }

    /// Hands a block to the render side. Never blocks on the consumer.
    ///
    /// Under [`OverflowPolicy::LatestWins`] an unread block is replaced; under
    /// [`OverflowPolicy::BoundedQueue`] the oldest queued block is dropped when full.
    ///
    /// # Errors
    ///
    /// - `StreamClosed` after [`close()`](Self::close); the slot is left untouched
    /// - `InvalidBlock` if the block's shape differs from the stream's or its
    ///   sequence number does not follow the previous one
    pub fn publish(&self, block: SampleBlock) -> Result<(), StreamError> {
        let displaced = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(StreamError::StreamClosed);
            }
            self.check_shape(&block)?;
            if let Some(last) = inner.last_published {
                if block.sequence() <= last {
                    return Err(StreamError::invalid_block(format!(
                        "sequence {} does not follow {last}",
                        block.sequence()
                    )));
                }
            }

            inner.last_published = Some(block.sequence());
            inner.stats.published += 1;
            let displaced = inner.slot.push(block);
            if displaced.is_some() {
                inner.stats.dropped += 1;
            }
            displaced
        };
        drop(displaced);
        Ok(())
    }

    /// Takes the next block for rendering without waiting.
    ///
    /// Returns `Ok(None)` when nothing new has arrived since the last take.
    /// Under latest-wins this is the newest block; under bounded-queue it is the
    /// oldest queued block.
    ///
    /// # Errors
    ///
    /// Returns `StreamClosed` after [`close()`](Self::close).
    pub fn try_take(&self) -> Result<Option<SampleBlock>, StreamError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StreamError::StreamClosed);
        }

        let block = inner.slot.pop();
        if let Some(ref block) = block {
            debug_assert!(inner.last_taken.map_or(true, |last| block.sequence() > last));
            inner.last_taken = Some(block.sequence());
            inner.stats.taken += 1;
        }
        Ok(block)
    }

    /// Closes the channel and discards any blocks still in flight.
    ///
    /// Returns `false` if the channel was already closed.
    pub fn close(&self) -> bool {
        let discarded = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }
            inner.closed = true;
            let discarded = inner.slot.drain();
            inner.stats.dropped += discarded.len() as u64;
            discarded
        };
        if !discarded.is_empty() {
            tracing::debug!("Block channel closed with {} unread blocks", discarded.len());
        }
        true
    }

    /// Returns `true` once [`close()`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of blocks waiting to be taken.
    pub fn len(&self) -> usize {
        self.inner.lock().slot.len()
    }

    /// Returns `true` if no block is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the last block handed to the render side.
    pub fn last_taken(&self) -> Option<u64> {
        self.inner.lock().last_taken
    }

    /// Returns a snapshot of the channel counters.
    pub fn stats(&self) -> ChannelStats {
        self.inner.lock().stats
    }

    /// The overflow policy chosen at construction.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    fn check_shape(&self, block: &SampleBlock) -> Result<(), StreamError> {
        if block.channels() != self.channels {
            return Err(StreamError::invalid_block(format!(
                "expected {} channels, got {}",
                self.channels,
                block.channels()
            )));
        }
        if block.len() != self.block_samples {
            return Err(StreamError::invalid_block(format!(
                "expected {} samples, got {}",
                self.block_samples,
                block.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const BLOCK_LEN: usize = 8;

    fn config() -> StreamConfig {
        StreamConfig {
            block_len: BLOCK_LEN,
            ..Default::default()
        }
    }

    fn block(seq: u64) -> SampleBlock {
        SampleBlock::new(seq, vec![seq as f32; BLOCK_LEN], Duration::ZERO, 44100, 1)
    }

    fn take_seq(channel: &BlockChannel) -> Option<u64> {
        channel.try_take().unwrap().map(|b| b.sequence())
    }

    #[test]
    fn test_latest_wins_keeps_newest() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();
        for seq in 1..=3 {
            channel.publish(block(seq)).unwrap();
        }

        assert_eq!(take_seq(&channel), Some(3));
        assert_eq!(take_seq(&channel), None);

        let stats = channel.stats();
        assert_eq!(stats.published, 3);
        assert_eq!(stats.taken, 1);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let capacity = 4;
        let channel = BlockChannel::new(&config(), OverflowPolicy::bounded(capacity)).unwrap();
        for seq in 1..=(capacity as u64 + 5) {
            channel.publish(block(seq)).unwrap();
        }

        let mut taken = Vec::new();
        while let Some(seq) = take_seq(&channel) {
            taken.push(seq);
        }
        assert_eq!(taken, vec![6, 7, 8, 9]);
        assert_eq!(channel.stats().dropped, 5);
    }

    #[test]
    fn test_empty_channel_returns_none() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();
        assert!(channel.is_empty());
        assert_eq!(take_seq(&channel), None);
    }

    #[test]
    fn test_interleaved_takes_are_monotonic() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::bounded(2)).unwrap();
        let mut observed = Vec::new();
        for seq in 1..=20 {
            channel.publish(block(seq)).unwrap();
            if seq % 3 == 0 {
                observed.extend(take_seq(&channel));
            }
        }
        while let Some(seq) = take_seq(&channel) {
            observed.push(seq);
        }
        assert!(observed.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(observed.last(), Some(&20));
    }

    #[test]
    fn test_publish_after_close_is_rejected() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();
        channel.publish(block(1)).unwrap();
        assert!(channel.close());

        let before = channel.stats();
        assert_eq!(channel.publish(block(2)), Err(StreamError::StreamClosed));
        assert_eq!(channel.stats(), before);
        assert_eq!(channel.len(), 0);
        assert_eq!(channel.try_take(), Err(StreamError::StreamClosed));
    }

    #[test]
    fn test_close_is_idempotent_and_counts_discards() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::bounded(3)).unwrap();
        channel.publish(block(1)).unwrap();
        channel.publish(block(2)).unwrap();

        assert!(channel.close());
        assert!(!channel.close());
        assert!(channel.is_closed());

        let stats = channel.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.taken + stats.dropped, 2);
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();

        let short = SampleBlock::new(1, vec![0.0; BLOCK_LEN - 1], Duration::ZERO, 44100, 1);
        assert!(matches!(
            channel.publish(short),
            Err(StreamError::InvalidBlock { .. })
        ));

        let stereo = SampleBlock::new(1, vec![0.0; BLOCK_LEN], Duration::ZERO, 44100, 2);
        assert!(matches!(
            channel.publish(stereo),
            Err(StreamError::InvalidBlock { .. })
        ));
        assert_eq!(channel.stats().published, 0);
    }

    #[test]
    fn test_rejects_non_increasing_sequence() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();
        channel.publish(block(5)).unwrap();
        assert!(channel.publish(block(5)).is_err());
        assert!(channel.publish(block(4)).is_err());
        assert_eq!(take_seq(&channel), Some(5));
    }

    #[test]
    fn test_rejects_zero_capacity_queue() {
        let result = BlockChannel::new(&config(), OverflowPolicy::bounded(0));
        assert!(matches!(result, Err(StreamError::InvalidConfig { .. })));
    }

    #[test]
    fn test_last_taken_tracks_reads() {
        let channel = BlockChannel::new(&config(), OverflowPolicy::LatestWins).unwrap();
        assert_eq!(channel.last_taken(), None);
        channel.publish(block(7)).unwrap();
        channel.try_take().unwrap();
        assert_eq!(channel.last_taken(), Some(7));
    }
}
