use oplstream::testing::*;
use oplstream::*;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

fn expected_text(blocks: &[Block], scheme: EscapeScheme) -> String {
    let enc = OplEncoder::new(scheme);
    blocks.iter().map(|b| enc.encode_block(b).unwrap()).collect()
}

fn config(workers: usize, max_in_flight: usize) -> OplConfig {
    OplConfig {
        workers: Some(workers),
        max_in_flight,
        ..OplConfig::default()
    }
}

/// Holds every block until `release` is called.
#[derive(Default)]
struct HeldEncoder {
    released: Mutex<bool>,
    cond: Condvar,
}

impl HeldEncoder {
    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.cond.notify_all();
    }
}

impl BlockEncoder for HeldEncoder {
    fn encode_block(&self, block: &Block) -> Result<String> {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.cond.wait(released).unwrap();
        }
        drop(released);
        OplEncoder::default().encode_block(block)
    }
}

struct PanickingEncoder;

impl BlockEncoder for PanickingEncoder {
    fn encode_block(&self, _block: &Block) -> Result<String> {
        panic!("encoder bug");
    }
}

#[test]
fn output_follows_submission_order_despite_out_of_order_completion() -> Result<()> {
    let blocks = sample_blocks(16, 5);
    let slow_first = DelayedEncoder::reversed(OplEncoder::default(), 80, Duration::from_micros(300));
    let mut p = BlockPipeline::with_encoder(Vec::new(), &config(4, 10), Arc::new(slow_first))?;
    for b in blocks.clone() {
        p.submit(b)?;
    }
    let out = String::from_utf8(p.finish()?).unwrap();
    assert_eq!(out, expected_text(&blocks, EscapeScheme::Unicode));
    Ok(())
}

#[test]
fn random_delays_keep_order() -> Result<()> {
    let blocks = sample_blocks(40, 3);
    // pseudo-random but deterministic per block
    let jitter = DelayedEncoder::new(OplEncoder::default(), |block: &Block| {
        let id = block.records()[0].meta().map_or(0, |m| m.id);
        Duration::from_micros(((id * 7919) % 13) as u64 * 150)
    });
    let mut p = BlockPipeline::with_encoder(Vec::new(), &config(8, 4), Arc::new(jitter))?;
    for b in blocks.clone() {
        p.submit(b)?;
    }
    let stats_before = p.stats();
    assert_eq!(stats_before.submitted, 40);
    let out = p.finish()?;
    assert_eq!(String::from_utf8(out).unwrap(), expected_text(&blocks, EscapeScheme::Unicode));
    Ok(())
}

#[test]
fn strategies_are_byte_identical_with_the_same_scheme() -> Result<()> {
    let blocks = sample_blocks(9, 11);
    for scheme in [EscapeScheme::Unicode, EscapeScheme::Bytes] {
        let cfg = config(3, 10).with_escape(scheme);

        let mut direct = DirectWriter::with_config(Vec::new(), &cfg);
        for b in &blocks {
            direct.write_block(b)?;
        }
        let direct = direct.into_inner()?;

        let mut parallel = BlockPipeline::with_config(Vec::new(), &cfg)?;
        for b in blocks.clone() {
            parallel.submit(b)?;
        }
        assert_eq!(parallel.finish()?, direct, "{scheme:?}");
    }
    Ok(())
}

#[test]
fn in_flight_never_exceeds_the_threshold() -> Result<()> {
    let slow = DelayedEncoder::new(OplEncoder::default(), |_: &Block| Duration::from_millis(2));
    let mut p = BlockPipeline::with_encoder(SharedSink::new(), &config(4, 3), Arc::new(slow))?;
    for b in sample_blocks(30, 2) {
        p.submit(b)?;
        assert!(p.stats().in_flight <= 3);
    }
    p.close()?;
    let stats = p.stats();
    assert_eq!(stats.drained, 30);
    assert_eq!(stats.in_flight, 0);
    assert!(stats.peak_in_flight <= 3);
    assert!(stats.peak_in_flight >= 1);
    Ok(())
}

#[test]
fn submit_blocks_until_timeout_when_saturated() -> Result<()> {
    let held = Arc::new(HeldEncoder::default());
    let cfg = OplConfig {
        submit_timeout_ms: Some(50),
        ..config(2, 3)
    };
    let sink = SharedSink::new();
    let mut p = BlockPipeline::with_encoder(sink.clone(), &cfg, held.clone())?;
    let blocks = sample_blocks(4, 2);
    for b in blocks[..3].iter().cloned() {
        p.submit(b)?;
    }
    let err = p.submit(blocks[3].clone()).unwrap_err();
    assert!(matches!(err, OplError::BackpressureTimeout(d) if d == Duration::from_millis(50)));
    assert_eq!(p.stats().in_flight, 3);

    held.release();
    p.close()?;
    assert_eq!(sink.text(), expected_text(&blocks[..3], EscapeScheme::Unicode));
    assert_eq!(p.stats().peak_in_flight, 3);
    Ok(())
}

#[test]
fn saturated_submit_resumes_when_drain_catches_up() -> Result<()> {
    let held = Arc::new(HeldEncoder::default());
    let mut p = BlockPipeline::with_encoder(Vec::new(), &config(2, 1), held.clone())?;
    let blocks = sample_blocks(2, 2);
    p.submit(blocks[0].clone())?;

    let releaser = {
        let held = Arc::clone(&held);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            held.release();
        })
    };
    // blocks until the first block is written out
    p.submit(blocks[1].clone())?;
    releaser.join().unwrap();

    let out = p.finish()?;
    assert_eq!(String::from_utf8(out).unwrap(), expected_text(&blocks, EscapeScheme::Unicode));
    Ok(())
}

#[test]
fn cancel_unblocks_a_waiting_submit() -> Result<()> {
    let held = Arc::new(HeldEncoder::default());
    let sink = SharedSink::new();
    let mut p = BlockPipeline::with_encoder(sink.clone(), &config(1, 1), held.clone())?;
    let blocks = sample_blocks(2, 1);
    p.submit(blocks[0].clone())?;

    let handle = p.handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        handle.cancel();
    });
    assert!(matches!(p.submit(blocks[1].clone()), Err(OplError::Cancelled)));
    canceller.join().unwrap();
    assert!(p.handle().is_cancelled());

    held.release();
    p.close()?;
    assert_eq!(sink.text(), expected_text(&blocks[..1], EscapeScheme::Unicode));
    Ok(())
}

#[test]
fn failed_block_surfaces_at_close_and_stops_output() -> Result<()> {
    let bad = Point {
        meta: Meta::new(99).tag("k", vec![0xff, 0xfe]),
        location: None,
    };
    let good = sample_blocks(2, 3);
    let sink = SharedSink::new();
    let mut p = BlockPipeline::with_config(sink.clone(), &config(2, 10))?;
    p.submit(good[0].clone())?;
    p.submit(Block::new(vec![sample_point().into(), bad.into()]))?;
    // may already be rejected if the drain got there first
    let _ = p.submit(good[1].clone());

    let err = p.close().unwrap_err();
    assert!(err.is_encoding(), "{err}");
    assert!(matches!(err, OplError::Block { index: 1, .. }));
    assert_eq!(sink.text(), expected_text(&good[..1], EscapeScheme::Unicode));
    assert_eq!(p.state(), PipelineState::Closed);
    assert!(matches!(p.submit(good[1].clone()), Err(OplError::Closed)));
    Ok(())
}

#[test]
fn later_submits_fail_once_the_drain_has_failed() -> Result<()> {
    let bad = Point {
        meta: Meta::new(1).user(1, vec![0xc0]),
        location: None,
    };
    // a single slot: the next submit waits until the failed block is drained
    let mut p = BlockPipeline::with_config(SharedSink::new(), &config(2, 1))?;
    p.submit(Block::new(vec![bad.into()]))?;

    let rejected = p.submit(sample_blocks(1, 1).remove(0));
    assert!(matches!(rejected, Err(OplError::Failed(_))), "{rejected:?}");
    assert_eq!(p.stats().drained, 0);
    assert!(matches!(p.close(), Err(OplError::Block { index: 0, .. })));
    Ok(())
}

#[test]
fn panicking_worker_is_reported_not_hung() -> Result<()> {
    let mut p = BlockPipeline::with_encoder(Vec::new(), &config(2, 4), Arc::new(PanickingEncoder))?;
    p.submit(sample_blocks(1, 1).remove(0))?;
    assert!(matches!(p.close(), Err(OplError::WorkerLost)));
    Ok(())
}

#[test]
fn sink_failure_surfaces_at_close() -> Result<()> {
    let mut p = BlockPipeline::with_config(FailingSink::new(10, FailureMode::Error), &config(2, 4))?;
    p.submit(sample_blocks(1, 4).remove(0))?;
    assert!(matches!(p.close(), Err(OplError::SinkWrite(_))));
    Ok(())
}

#[test]
fn close_is_idempotent_and_rejects_later_submits() -> Result<()> {
    let blocks = sample_blocks(3, 4);
    let sink = SharedSink::new();
    let mut p = BlockPipeline::with_config(sink.clone(), &config(2, 10))?;
    for b in blocks.clone() {
        p.submit(b)?;
    }
    p.close()?;
    p.close()?;
    assert_eq!(p.state(), PipelineState::Closed);
    assert!(matches!(p.submit(Block::default()), Err(OplError::Closed)));
    assert_eq!(sink.text(), expected_text(&blocks, EscapeScheme::Unicode));
    // the sink was released by close
    assert!(matches!(p.finish(), Err(OplError::Closed)));
    Ok(())
}

#[test]
fn empty_pipeline_produces_empty_output() -> Result<()> {
    let p = BlockPipeline::new(Vec::new())?;
    assert_eq!(p.max_in_flight(), 10);
    assert!(p.finish()?.is_empty());
    Ok(())
}

#[test]
fn dropping_an_open_pipeline_drains_it() -> Result<()> {
    let sink = SharedSink::new();
    let blocks = sample_blocks(5, 5);
    {
        let mut p = BlockPipeline::with_config(sink.clone(), &config(3, 2))?;
        for b in blocks.clone() {
            p.submit(b)?;
        }
    }
    assert_eq!(sink.text(), expected_text(&blocks, EscapeScheme::Unicode));
    Ok(())
}

#[test]
fn stats_count_blocks_and_bytes() -> Result<()> {
    let blocks = sample_blocks(6, 6);
    let mut p = BlockPipeline::with_config(Vec::new(), &config(2, 10))?;
    for b in blocks.clone() {
        p.submit(b)?;
    }
    p.close()?;
    let stats = p.stats();
    let expected = expected_text(&blocks, EscapeScheme::Unicode);
    assert_eq!(stats.submitted, 6);
    assert_eq!(stats.drained, 6);
    assert_eq!(stats.bytes_written, expected.len() as u64);
    Ok(())
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = OplConfig {
        max_in_flight: 0,
        ..OplConfig::default()
    };
    assert!(matches!(BlockPipeline::with_config(Vec::new(), &cfg), Err(OplError::Config(_))));
}
