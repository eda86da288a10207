use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use kernel_io::sync::Queue;

/// Write then read back within one thread; never blocks.
fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_write_read");
    for chunk in [8usize, 64, 512] {
        let queue = Queue::new(chunk * 2).unwrap();
        let data = vec![0xA5u8; chunk];
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &data, |b, data| {
            b.iter(|| {
                queue.write(black_box(data.as_slice())).unwrap();
                black_box(queue.read(chunk).unwrap());
            })
        });
    }
    group.finish();
}

/// Stream 64 KiB through a small queue to a consumer thread.
fn bench_producer_consumer(c: &mut Criterion) {
    const TOTAL: usize = 64 * 1024;
    let data = vec![0x5Au8; TOTAL];

    let mut group = c.benchmark_group("queue_stream");
    group.throughput(Throughput::Bytes(TOTAL as u64));
    for capacity in [64usize, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let queue = Arc::new(Queue::new(capacity).unwrap());
                let consumer = {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut read = 0;
                        while read < TOTAL {
                            read += queue.read(capacity).unwrap().len();
                        }
                    })
                };
                queue.write(data.as_slice()).unwrap();
                consumer.join().unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(queue_benches, bench_write_read, bench_producer_consumer);
criterion_main!(queue_benches);
