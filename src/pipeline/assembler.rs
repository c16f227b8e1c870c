//! Fixed-size block assembly for device callbacks.

use std::time::Duration;

use crate::{SampleBlock, StreamConfig};

/// Cuts an arbitrary-sized stream of interleaved samples into fixed-size blocks.
///
/// Device callbacks deliver whatever buffer size the backend chose; the render
/// side expects exactly `block_len` frames per block. The assembler carries the
/// remainder between callbacks and stamps each completed block with the next
/// sequence number (starting at 1) and its stream timestamp.
pub struct BlockAssembler {
    current: Vec<f32>,
    block_samples: usize,
    block_len: usize,
    sample_rate: u32,
    channels: u16,
    next_sequence: u64,
    frames_emitted: u64,
}

impl BlockAssembler {
    /// Creates an assembler for blocks shaped by `config`.
    pub fn new(config: &StreamConfig) -> Self {
        let block_samples = config.samples_per_block();
        Self {
            current: Vec::with_capacity(block_samples),
            block_samples,
            block_len: config.block_len,
            sample_rate: config.sample_rate,
            channels: config.channels,
            next_sequence: 1,
            frames_emitted: 0,
        }
    }

    /// Appends interleaved samples, calling `emit` for every block they complete.
    ///
    /// Stops at the first error from `emit`; any samples after it are discarded.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `emit`.
    pub fn push<E>(
        &mut self,
        mut data: &[f32],
        mut emit: impl FnMut(SampleBlock) -> Result<(), E>,
    ) -> Result<(), E> {
        while !data.is_empty() {
            let room = self.block_samples - self.current.len();
            let take = room.min(data.len());
            self.current.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.current.len() == self.block_samples {
                let samples =
                    std::mem::replace(&mut self.current, Vec::with_capacity(self.block_samples));
                emit(self.stamp(samples))?;
            }
        }
        Ok(())
    }

    /// Wraps an already complete buffer as the next block in the stream.
    ///
    /// Used by blocking readers that fill whole blocks themselves.
    pub fn stamp(&mut self, samples: Vec<f32>) -> SampleBlock {
        let timestamp =
            Duration::from_secs_f64(self.frames_emitted as f64 / f64::from(self.sample_rate));
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.frames_emitted += self.block_len as u64;

        SampleBlock::new(
            sequence,
            samples,
            timestamp,
            self.sample_rate,
            self.channels,
        )
    }

    /// Samples waiting for the current block to fill.
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Sequence number the next completed block will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(block_len: usize, channels: u16) -> StreamConfig {
        StreamConfig {
            sample_rate: 16000,
            channels,
            block_len,
            ..Default::default()
        }
    }

    fn collect(assembler: &mut BlockAssembler, data: &[f32]) -> Vec<SampleBlock> {
        let mut blocks = Vec::new();
        assembler
            .push(data, |block| {
                blocks.push(block);
                Ok::<(), ()>(())
            })
            .unwrap();
        blocks
    }

    #[test]
    fn test_assembles_full_blocks() {
        let mut assembler = BlockAssembler::new(&config(1600, 1));

        // 250ms at 16kHz = 2.5 blocks
        let data: Vec<f32> = (0..4000).map(|i| i as f32).collect();
        let blocks = collect(&mut assembler, &data);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].len(), 1600);
        assert_eq!(blocks[1].samples()[0], 1600.0);
        assert_eq!(assembler.pending(), 800);
    }

    #[test]
    fn test_carries_remainder_across_callbacks() {
        let mut assembler = BlockAssembler::new(&config(100, 1));

        assert!(collect(&mut assembler, &[0.0; 60]).is_empty());
        let blocks = collect(&mut assembler, &[1.0; 60]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].samples()[59], 0.0);
        assert_eq!(blocks[0].samples()[60], 1.0);
        assert_eq!(assembler.pending(), 20);
    }

    #[test]
    fn test_sequence_and_timestamp() {
        let mut assembler = BlockAssembler::new(&config(1600, 1));
        let blocks = collect(&mut assembler, &[0.0; 3200]);

        assert_eq!(blocks[0].sequence(), 1);
        assert_eq!(blocks[1].sequence(), 2);
        assert_eq!(blocks[0].timestamp(), Duration::from_millis(0));
        assert_eq!(blocks[1].timestamp(), Duration::from_millis(100));
        assert_eq!(assembler.next_sequence(), 3);
    }

    #[test]
    fn test_stereo_block_size() {
        let mut assembler = BlockAssembler::new(&config(4, 2));
        let blocks = collect(&mut assembler, &[0.5; 8]);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].frame_count(), 4);
        assert_eq!(blocks[0].channels(), 2);
    }

    #[test]
    fn test_stops_on_emit_error() {
        let mut assembler = BlockAssembler::new(&config(10, 1));
        let mut emitted = 0;
        let result = assembler.push(&[0.0; 50], |_| {
            emitted += 1;
            Err("closed")
        });

        assert_eq!(result, Err("closed"));
        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_stamp_continues_sequence() {
        let mut assembler = BlockAssembler::new(&config(10, 1));
        collect(&mut assembler, &[0.0; 10]);

        let block = assembler.stamp(vec![0.0; 10]);
        assert_eq!(block.sequence(), 2);
        assert_eq!(block.timestamp(), Duration::from_secs_f64(10.0 / 16000.0));
    }
}
