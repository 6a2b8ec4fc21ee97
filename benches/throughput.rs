//! Throughput Benchmark for RippleKV
//!
//! Measures the storage engine and the RESP codec under various workloads.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use ripplekv::protocol::{RespParser, RespValue};
use ripplekv::storage::{ListEnd, PopOrWait, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set_string(key, Bytes::from("small_value"), None);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set_string(key, value.clone(), None);
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            engine.set_string(key, Bytes::from("value"), Some(Duration::from_secs(3600)));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set_string(key, value, None);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get_string(key.as_bytes()).ok());
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get_string(key.as_bytes()).ok());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark list push/pop/range
fn bench_lists(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("lists");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rpush_lpop", |b| {
        let key = Bytes::from("queue");
        b.iter(|| {
            engine
                .push_list(key.clone(), vec![Bytes::from("job")], ListEnd::Back)
                .ok();
            black_box(engine.pop_list(&key, ListEnd::Front, 1).ok());
        });
    });

    let key = Bytes::from("range");
    let values: Vec<Bytes> = (0..1_000).map(|i| Bytes::from(format!("item:{}", i))).collect();
    engine.push_list(key.clone(), values, ListEnd::Back).ok();

    group.bench_function("lrange_100", |b| {
        b.iter(|| black_box(engine.range_list(&key, 100, 199).ok()));
    });

    group.bench_function("blpop_ready", |b| {
        let key = Bytes::from("ready");
        b.iter(|| {
            engine
                .push_list(key.clone(), vec![Bytes::from("v")], ListEnd::Back)
                .ok();
            if let Ok(PopOrWait::Ready(value)) = engine.pop_or_wait(key.clone(), 1, None) {
                black_box(value);
            }
        });
    });

    group.finish();
}

/// Benchmark RESP decoding and encoding
fn bench_codec(c: &mut Criterion) {
    let parser = RespParser::new();
    let request = RespValue::bulk_array(["RPUSH", "queue", "a", "b", "c"]).serialize();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(request.len() as u64));

    group.bench_function("parse_rpush", |b| {
        b.iter(|| black_box(parser.parse(&request).ok()));
    });

    group.bench_function("serialize_array", |b| {
        let reply = RespValue::bulk_array(["mylist", "hello"]);
        b.iter(|| black_box(reply.serialize()));
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set_string(key.clone(), Bytes::from("value"), None);
                            let _ = engine.get_string(&key);
                            let _ = engine.push_list(
                                Bytes::from(format!("list:{}", i % 16)),
                                vec![Bytes::from("v")],
                                ListEnd::Back,
                            );
                        }
                    })
                })
                .collect();

            for handle in handles {
                let _ = handle.join();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_lists,
    bench_codec,
    bench_concurrent,
);

criterion_main!(benches);
