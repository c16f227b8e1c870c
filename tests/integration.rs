//! Integration tests for scope-stream.
//!
//! Note: Tests that require actual audio hardware are marked with
//! `#[ignore]` and should be run manually.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use scope_stream::{
    BlockChannel, ChannelRenderer, CpalSource, DeviceSource, LiveCapture, MockSignal, MockSource,
    OverflowPolicy, RenderDriver, RenderError, Renderer, SampleBlock, Session, StopReason,
    StopSignal, StreamConfig, StreamError, StreamEvent, StreamState,
};
use tokio::sync::mpsc;

/// A renderer that records what it drew and closes after a given sequence.
struct RecordingRenderer {
    sequences: Vec<u64>,
    lengths: Vec<usize>,
    close_after: u64,
}

impl RecordingRenderer {
    fn closing_after(sequence: u64) -> Self {
        Self {
            sequences: Vec::new(),
            lengths: Vec::new(),
            close_after: sequence,
        }
    }
}

impl Renderer for RecordingRenderer {
    fn update(&mut self, block: SampleBlock) -> Result<(), RenderError> {
        self.sequences.push(block.sequence());
        self.lengths.push(block.len());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.sequences.last().is_some_and(|&s| s >= self.close_after)
    }
}

#[tokio::test]
async fn test_end_to_end_live_capture() {
    let source = MockSource::new()
        .with_block_interval(Duration::from_millis(4))
        .with_block_limit(50);
    let session = LiveCapture::builder()
        .sample_rate(44100)
        .channels(1)
        .block_len(1024)
        .open(&source)
        .unwrap();

    // Render at half the capture cadence
    let mut driver = RenderDriver::new(RecordingRenderer::closing_after(50));
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        driver.run(session, Duration::from_millis(8)),
    )
    .await
    .expect("render loop timed out")
    .unwrap();

    let renderer = driver.renderer();
    assert!(renderer.sequences.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(renderer.sequences.last(), Some(&50));
    // Half cadence under latest-wins: a gapped, still increasing subsequence
    assert!(renderer.sequences.len() < 50);
    assert!(summary.render.skipped > 0);
    assert!(renderer.lengths.iter().all(|&len| len == 1024));

    assert_eq!(summary.reason, StopReason::DisplayClosed);
    assert_eq!(summary.final_state, StreamState::Closed);
    assert_eq!(summary.channel.published, 50);
    assert_eq!(
        summary.channel.published,
        summary.channel.taken + summary.channel.dropped
    );
    assert_eq!(source.releases(), 1);
}

#[test]
fn test_concurrent_publish_and_take() {
    const BLOCKS: u64 = 10_000;
    const BLOCK_LEN: usize = 32;

    let (done_tx, done_rx) = std_mpsc::channel();

    std::thread::spawn(move || {
        let config = StreamConfig {
            block_len: BLOCK_LEN,
            ..Default::default()
        };
        let channel = Arc::new(BlockChannel::new(&config, OverflowPolicy::LatestWins).unwrap());
        let producer_done = Arc::new(AtomicBool::new(false));

        let producer = {
            let channel = Arc::clone(&channel);
            let producer_done = Arc::clone(&producer_done);
            std::thread::spawn(move || {
                for seq in 1..=BLOCKS {
                    let samples = vec![seq as f32; BLOCK_LEN];
                    let block = SampleBlock::new(seq, samples, Duration::ZERO, 44100, 1);
                    channel.publish(block).unwrap();
                }
                producer_done.store(true, Ordering::SeqCst);
            })
        };

        let mut last = 0;
        let mut takes = 0_u64;
        loop {
            let finished = producer_done.load(Ordering::SeqCst);
            match channel.try_take().unwrap() {
                Some(block) => {
                    // A torn block would mix values from two publishes
                    assert_eq!(block.len(), BLOCK_LEN);
                    assert!(block.samples().iter().all(|&s| s == block.sequence() as f32));
                    assert!(block.sequence() > last);
                    last = block.sequence();
                    takes += 1;
                }
                None if finished => break,
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();

        let stats = channel.stats();
        done_tx.send((last, takes, stats)).unwrap();
    });

    let (last, takes, stats) = done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("publish/take deadlocked");

    assert_eq!(last, BLOCKS);
    assert_eq!(stats.published, BLOCKS);
    assert_eq!(stats.taken, takes);
    assert_eq!(stats.taken + stats.dropped, BLOCKS);
}

#[test]
fn test_close_is_idempotent_and_releases_once() {
    let source = MockSource::new().unpaced();
    let mut session = LiveCapture::builder().block_len(128).open(&source).unwrap();

    session.close();
    session.close();
    assert_eq!(session.state(), StreamState::Closed);
    drop(session);

    assert_eq!(source.opens(), 1);
    assert_eq!(source.releases(), 1);
}

#[test]
fn test_close_after_failed_open_never_releases() {
    let source = MockSource::new().unavailable("device busy");
    let mut session = LiveCapture::builder().build().unwrap();

    let err = session.open(&source).unwrap_err();
    assert!(matches!(err, StreamError::DeviceUnavailable { .. }));
    assert_eq!(session.state(), StreamState::Idle);

    session.close();
    session.close();
    assert_eq!(source.releases(), 0);
}

#[test]
fn test_publish_after_close_is_rejected() {
    let source = MockSource::new().unpaced().with_block_limit(3);
    let mut session = LiveCapture::builder().block_len(16).open(&source).unwrap();
    let channel = Arc::clone(session.channel());
    session.close();

    let before = channel.stats();
    let late = SampleBlock::new(u64::MAX, vec![0.0; 16], Duration::ZERO, 44100, 1);
    assert_eq!(channel.publish(late), Err(StreamError::StreamClosed));
    assert_eq!(channel.stats(), before);
    assert_eq!(session.try_take(), Err(StreamError::StreamClosed));
}

#[tokio::test]
async fn test_device_error_stops_loop_and_is_reraised() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);

    let source = MockSource::new()
        .with_block_interval(Duration::from_millis(1))
        .fail_after(10);
    let session = LiveCapture::builder()
        .block_len(64)
        .on_event(move |event| sink.lock().push(event))
        .open(&source)
        .unwrap();

    let mut driver = RenderDriver::new(RecordingRenderer::closing_after(u64::MAX));
    let result = driver.run(session, Duration::from_millis(2)).await;

    assert_eq!(
        result,
        Err(StreamError::DeviceError {
            reason: "simulated device disconnect".to_string()
        })
    );
    assert_eq!(driver.stop_reason(), Some(StopReason::DeviceError));
    assert_eq!(source.releases(), 1);

    let events = events.lock();
    let device_errors = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::DeviceError { .. }))
        .count();
    assert_eq!(device_errors, 1);
    assert!(matches!(events.last(), Some(StreamEvent::Closed { .. })));
}

#[tokio::test]
async fn test_finite_source_ends_render_loop() {
    let source = MockSource::new().unpaced().with_block_limit(3);
    let session = LiveCapture::builder().block_len(64).open(&source).unwrap();

    let mut driver = RenderDriver::new(RecordingRenderer::closing_after(u64::MAX));
    let summary = tokio::time::timeout(
        Duration::from_millis(500),
        driver.run(session, Duration::from_millis(5)),
    )
    .await
    .expect("render loop kept running after end of stream")
    .unwrap();

    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(summary.final_state, StreamState::Closed);
    assert_eq!(driver.renderer().sequences.last(), Some(&3));
    assert_eq!(source.releases(), 1);
}

#[tokio::test]
async fn test_cancellation_closes_session() {
    let source = MockSource::new().with_block_interval(Duration::from_millis(2));
    let session = LiveCapture::builder().block_len(64).open(&source).unwrap();

    let signal = StopSignal::new();
    let canceller = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let mut driver =
        RenderDriver::new(RecordingRenderer::closing_after(u64::MAX)).with_stop_signal(signal);
    let summary = driver
        .run(session, Duration::from_millis(4))
        .await
        .unwrap();

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.final_state, StreamState::Closed);
    assert_eq!(source.releases(), 1);
}

#[tokio::test]
async fn test_channel_renderer_pipeline() {
    let source = MockSource::new()
        .with_signal(MockSignal::Sine {
            frequency: 1000.0,
            amplitude: 0.8,
        })
        .with_block_interval(Duration::from_millis(2));
    let session = LiveCapture::builder()
        .block_len(256)
        .policy(OverflowPolicy::bounded(4))
        .open(&source)
        .unwrap();

    let (tx, mut rx) = mpsc::channel::<SampleBlock>(8);
    let consumer = tokio::spawn(async move {
        let mut levels = Vec::new();
        while let Some(block) = rx.recv().await {
            levels.push(block.levels());
            if levels.len() == 5 {
                break;
            }
        }
        // Dropping the receiver closes the renderer
        levels
    });

    let mut driver = RenderDriver::new(ChannelRenderer::new(tx));
    let summary = driver
        .run(session, Duration::from_millis(2))
        .await
        .unwrap();
    let levels = consumer.await.unwrap();

    assert_eq!(summary.reason, StopReason::DisplayClosed);
    assert_eq!(levels.len(), 5);
    assert!(levels.iter().all(|l| l.peak > 0.5 && l.peak <= 0.8));
    assert!(levels.iter().all(|l| l.clipped == 0));
}

#[test]
fn test_session_reopen_is_rejected() {
    let source = MockSource::new().unpaced();
    let mut session = Session::new(StreamConfig::default(), OverflowPolicy::LatestWins).unwrap();

    session.open(&source).unwrap();
    assert_eq!(session.open(&source), Err(StreamError::AlreadyOpen));
    session.close();
    assert_eq!(session.open(&source), Err(StreamError::StreamClosed));
    assert_eq!(source.opens(), 1);
}

#[tokio::test]
#[ignore = "requires audio hardware"]
async fn test_real_capture() {
    let source = CpalSource::new();
    for device in source.list_devices().unwrap() {
        println!("  {device}");
    }

    let session = LiveCapture::builder().open(&source).unwrap();
    let mut driver = RenderDriver::new(RecordingRenderer::closing_after(20));
    let summary = driver
        .run(session, Duration::from_millis(33))
        .await
        .unwrap();

    println!("Captured: {summary:?}");
    assert_eq!(summary.final_state, StreamState::Closed);
}
