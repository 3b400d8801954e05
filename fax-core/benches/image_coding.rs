use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fax_core::image::{CodingScheme, Encoder};

fn bench_encode_all_white_page(c: &mut Criterion) {
    c.bench_function("encode_t6_all_white_row", |b| {
        let row = vec![0u8; 1728 / 8];
        b.iter(|| {
            let mut encoder = Encoder::new(CodingScheme::T6, 1728, 196, 0);
            black_box(encoder.encode_row(black_box(&row)).unwrap());
        });
    });

    c.bench_function("encode_t4_2d_mixed_row", |b| {
        let mut row = vec![0u8; 1728 / 8];
        for (i, byte) in row.iter_mut().enumerate() {
            *byte = if i % 3 == 0 { 0xAA } else { 0x00 };
        }
        b.iter(|| {
            let mut encoder = Encoder::new(CodingScheme::T4_2D, 1728, 196, 0);
            black_box(encoder.encode_row(black_box(&row)).unwrap());
        });
    });
}

criterion_group!(benches, bench_encode_all_white_page);
criterion_main!(benches);
