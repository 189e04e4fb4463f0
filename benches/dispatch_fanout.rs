//! Dispatch fan-out benchmark suite.
//!
//! Measures routing one inbound message through dispatchers of growing size:
//! - Handler counts: 1, 16, 128
//! - Filters: wildcard only, mixed feature sets
//! - Parse + dispatch of a raw frame
//!
//! Run with: cargo bench --bench dispatch_fanout
//! Results saved to: target/criterion/

use std::hint::black_box;

use consult_realtime::{FeatureFilter, InboundMessage, MessageDispatcher};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const HANDLER_COUNTS: &[usize] = &[1, 16, 128];

const FEATURES: &[&str] = &[
    "messaging",
    "typing_indicator",
    "read_receipt",
    "online_status",
    "notifications",
];

const FRAME: &str =
    r#"{"type":"new_message","feature":"messaging","content":"hello","senderId":"7"}"#;

// ============================================================================
// Setup
// ============================================================================

fn wildcard_dispatcher(count: usize) -> MessageDispatcher {
    let dispatcher = MessageDispatcher::new();
    for i in 0..count {
        dispatcher.register_handler(format!("page_{i}"), FeatureFilter::All, |msg| {
            black_box(msg.feature());
            Ok(true)
        });
    }
    dispatcher
}

fn mixed_dispatcher(count: usize) -> MessageDispatcher {
    let dispatcher = MessageDispatcher::new();
    for i in 0..count {
        let feature = FEATURES[i % FEATURES.len()];
        dispatcher.register_handler(format!("feature_{i}"), FeatureFilter::only([feature]), |msg| {
            black_box(msg.body().len());
            Ok(true)
        });
    }
    dispatcher
}

// ============================================================================
// Benchmark: Dispatch
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let message = InboundMessage::from_text(FRAME).unwrap();
    let mut group = c.benchmark_group("dispatch");

    for &count in HANDLER_COUNTS {
        let wildcard = wildcard_dispatcher(count);
        group.bench_with_input(BenchmarkId::new("wildcard", count), &count, |b, _| {
            b.iter(|| black_box(wildcard.dispatch(&message)));
        });

        let mixed = mixed_dispatcher(count);
        group.bench_with_input(BenchmarkId::new("mixed", count), &count, |b, _| {
            b.iter(|| black_box(mixed.dispatch(&message)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Parse + Dispatch
// ============================================================================

fn bench_parse_and_dispatch(c: &mut Criterion) {
    let dispatcher = mixed_dispatcher(16);

    c.bench_function("parse_and_dispatch", |b| {
        b.iter(|| {
            let message = InboundMessage::from_text(black_box(FRAME)).unwrap();
            black_box(dispatcher.dispatch(&message))
        });
    });
}

criterion_group!(benches, bench_dispatch, bench_parse_and_dispatch);
criterion_main!(benches);
