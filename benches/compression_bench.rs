use bz2io::file::{FileHandle, MemoryFile, Transfer};
use bz2io::{AccessMode, Bz2File};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn sample(len: usize) -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog\n".iter().copied().cycle().take(len).collect()
}

fn pack(data: &[u8], level: u32) -> Vec<u8> {
    let mem   = MemoryFile::new();
    let store = mem.store();
    let mut f = Box::new(Bz2File::new(Box::new(mem), AccessMode::Write, level));
    let mut off = 0;
    while off < data.len() {
        off += f.write(&data[off..], -1).unwrap();
    }
    f.close().unwrap();
    let packed = store.lock().unwrap().clone();
    packed
}

fn bench_write(c: &mut Criterion) {
    let data = sample(1024 * 1024);
    let mut group = c.benchmark_group("write_1mb");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for level in [1u32, 9] {
        group.bench_function(format!("level_{level}"), |b| {
            b.iter(|| pack(black_box(&data), level))
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let data   = sample(1024 * 1024);
    let packed = pack(&data, 9);
    let mut group = c.benchmark_group("read_1mb");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for chunk in [4096usize, 65536] {
        group.bench_function(format!("chunk_{chunk}"), |b| {
            b.iter(|| {
                let inner = MemoryFile::from_bytes(packed.clone());
                let mut f = Box::new(Bz2File::new(Box::new(inner), AccessMode::Read, 9));
                let mut buf   = vec![0u8; chunk];
                let mut total = 0usize;
                while let Transfer::Bytes(n) = f.read(&mut buf, -1).unwrap() {
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                f.close().unwrap();
                black_box(total)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
