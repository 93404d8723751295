use chunk_deque::ChunkDeque;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::VecDeque;

fn bench_push_back_chunk_size_8(c: &mut Criterion) {
    c.bench_function("chunk_deque_push_back_chunk_size_8", |b| {
        b.iter(|| {
            let mut deque: ChunkDeque<usize, 8> = ChunkDeque::new();
            for i in 0..1000 {
                deque.push_back(i);
            }
            black_box(deque.len());
        });
    });
}

fn bench_push_back_chunk_size_32(c: &mut Criterion) {
    c.bench_function("chunk_deque_push_back_chunk_size_32", |b| {
        b.iter(|| {
            let mut deque: ChunkDeque<usize, 32> = ChunkDeque::new();
            for i in 0..1000 {
                deque.push_back(i);
            }
            black_box(deque.len());
        });
    });
}

fn bench_push_back_chunk_size_128(c: &mut Criterion) {
    c.bench_function("chunk_deque_push_back_chunk_size_128", |b| {
        b.iter(|| {
            let mut deque: ChunkDeque<usize, 128> = ChunkDeque::new();
            for i in 0..1000 {
                deque.push_back(i);
            }
            black_box(deque.len());
        });
    });
}

fn bench_alternating_ends(c: &mut Criterion) {
    c.bench_function("chunk_deque_alternating_ends", |b| {
        b.iter(|| {
            let mut deque: ChunkDeque<usize, 32> = ChunkDeque::new();
            for i in 0..500 {
                deque.push_front(i);
                deque.push_back(i);
            }
            black_box(deque.len());
        });
    });
}

fn bench_indexed_sum(c: &mut Criterion) {
    let deque: ChunkDeque<usize, 32> = (0..1000).collect();
    c.bench_function("chunk_deque_indexed_sum", |b| {
        b.iter(|| {
            let mut sum = 0;
            for i in 0..deque.len() {
                sum += deque[i];
            }
            black_box(sum);
        });
    });
}

fn bench_iter_sum(c: &mut Criterion) {
    let deque: ChunkDeque<usize, 32> = (0..1000).collect();
    c.bench_function("chunk_deque_iter_sum", |b| {
        b.iter(|| {
            black_box(deque.iter().sum::<usize>());
        });
    });
}

fn bench_vec_deque_push_back_baseline(c: &mut Criterion) {
    c.bench_function("vec_deque_push_back_baseline", |b| {
        b.iter(|| {
            let mut deque: VecDeque<usize> = VecDeque::new();
            for i in 0..1000 {
                deque.push_back(i);
            }
            black_box(deque.len());
        });
    });
}

criterion_group!(
    benches,
    bench_push_back_chunk_size_8,
    bench_push_back_chunk_size_32,
    bench_push_back_chunk_size_128,
    bench_alternating_ends,
    bench_indexed_sum,
    bench_iter_sum,
    bench_vec_deque_push_back_baseline,
);
criterion_main!(benches);
