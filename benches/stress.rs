use core::ptr::NonNull;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tlsf_ext::{BlockRef, Mode, Tlsf};

const EXTENT: usize = 1 << 20;
const SLOTS: usize = 256;

struct Xorshift32(u32);

impl Xorshift32 {
    fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");

    for &(min_size, mask) in &[(1usize, 63usize), (16, 127), (128, 1023)] {
        let size_range = min_size..min_size + mask + 1;

        group.bench_function(
            BenchmarkId::new("inline", format!("size {:?}", size_range)),
            |b| {
                let mut arena = vec![0usize; EXTENT / core::mem::size_of::<usize>()];
                let base = arena.as_mut_ptr() as usize;
                let mut tlsf = unsafe { Tlsf::new(base, EXTENT, Mode::Inline) }.unwrap();
                let mut rng = Xorshift32(0x12345689);
                let mut next_size = move || (rng.next() as usize & mask) + min_size;

                let mut slots: Vec<NonNull<u8>> =
                    (0..SLOTS).map(|_| tlsf.allocate(next_size()).unwrap()).collect();

                let mut i = 0usize;
                b.iter(|| {
                    let slot = i & (SLOTS - 1);
                    unsafe { tlsf.deallocate(slots[slot]) };
                    slots[slot] = tlsf.allocate(next_size()).unwrap();
                    i = i.wrapping_add(1);
                });
            },
        );

        group.bench_function(
            BenchmarkId::new("external", format!("size {:?}", size_range)),
            |b| {
                let mut tlsf = unsafe { Tlsf::new(0, EXTENT, Mode::External) }.unwrap();
                let mut rng = Xorshift32(0x12345689);
                let mut next_size = move || (rng.next() as usize & mask) + min_size;

                let mut slots: Vec<BlockRef> = (0..SLOTS)
                    .map(|_| tlsf.allocate_block(next_size()).unwrap())
                    .collect();

                let mut i = 0usize;
                b.iter(|| {
                    let slot = i & (SLOTS - 1);
                    unsafe { tlsf.deallocate_block(slots[slot]) };
                    slots[slot] = tlsf.allocate_block(next_size()).unwrap();
                    i = i.wrapping_add(1);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
