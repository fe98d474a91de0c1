//! Benchmarks for feed replay performance.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use itch_depth_reconstructor::{decode_line, Engine, EngineConfig, OrderBook, Price, Side};

/// Synthetic feed: Adds around 1.0000 on both sides, every third order
/// partially executed and every fifth cancelled.
fn create_test_feed(count: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(count * 2);

    for i in 0..count {
        let ref_no = i + 1;
        let is_bid = i % 2 == 0;
        let offset = (i % 10) as u64 * 100;
        let price = if is_bid { 10_000 - offset } else { 10_100 + offset };
        let side = if is_bid { 'B' } else { 'S' };
        let volume = (i % 100) + 10;

        lines.push(format!(
            "{:08}A{ref_no:09}{side}{volume:06}AAPL  {price:010}Y",
            i
        ));
        if i % 3 == 0 {
            lines.push(format!("{:08}E{ref_no:09}{:06}M{:08}", i, 5, i));
        }
        if i % 5 == 0 {
            lines.push(format!("{:08}X{ref_no:09}{:06}", i, 5));
        }
    }

    lines
}

fn bench_replay(c: &mut Criterion) {
    let feed = create_test_feed(10_000);

    let mut group = c.benchmark_group("replay");
    group.throughput(Throughput::Elements(feed.len() as u64));

    group.bench_function("decode_lines", |b| {
        b.iter(|| {
            for (n, line) in feed.iter().enumerate() {
                let _ = black_box(decode_line(line, n as u64));
            }
        })
    });

    group.bench_function("process_lines", |b| {
        b.iter(|| {
            let config = EngineConfig::new(10)
                .with_instruments(["AAPL"])
                .with_logging(false);
            let mut engine = Engine::new(config).unwrap();
            for (n, line) in feed.iter().enumerate() {
                let _ = black_box(engine.process_line(line, n as u64));
            }
            black_box(engine.finish())
        })
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut book = OrderBook::new("AAPL");
    for i in 0..100 {
        book.add(Side::Buy, Price::from_ticks(10_000 - i * 100), 100);
        book.add(Side::Sell, Price::from_ticks(10_100 + i * 100), 100);
    }

    let mut group = c.benchmark_group("snapshot");

    group.bench_function("peek_10", |b| b.iter(|| black_box(book.peek(10))));

    group.bench_function("peek_50", |b| b.iter(|| black_box(book.peek(50))));

    group.bench_function("to_columns_10", |b| {
        let snapshot = book.peek(10);
        let event = decode_line("09300000A000000001B000100AAPL  0000012500Y", 0)
            .unwrap()
            .unwrap();
        let row = itch_depth_reconstructor::SnapshotRow::new(snapshot, event, None);
        b.iter(|| black_box(row.to_columns()))
    });

    group.finish();
}

criterion_group!(benches, bench_replay, bench_snapshot);
criterion_main!(benches);
