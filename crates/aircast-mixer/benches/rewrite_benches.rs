use aircast_core::{FieldMode, ImageTransform, PixelFormat, PixelFormatDesc, VideoFormat, VideoFormatDesc};
use aircast_mixer::{prepare_items, Item};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn make_items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|index| {
            let pix_desc = if index % 3 == 0 {
                PixelFormatDesc::packed(PixelFormat::Bgra, 720, 480) // NTSC DV path
            } else {
                PixelFormatDesc::packed(PixelFormat::Bgra, 1920, 1080)
            };
            let mut transform = ImageTransform::identity();
            transform.is_still = index % 4 == 0;
            Item {
                pix_desc,
                field_mode: match index % 3 {
                    0 => FieldMode::Lower,
                    1 => FieldMode::Upper,
                    _ => FieldMode::Progressive,
                },
                transform,
                textures: Vec::new(),
            }
        })
        .collect()
}

fn bench_field_rewrite(c: &mut Criterion) {
    let format_desc = VideoFormatDesc::get(VideoFormat::X1080i5000);
    let items = make_items(1000);

    let mut group = c.benchmark_group("field_rewrite");
    for pass in [FieldMode::Upper, FieldMode::Lower] {
        group.bench_function(format!("1000_items_{}", pass), |b| {
            b.iter_batched(
                || items.clone(),
                |items| prepare_items(items, &format_desc, pass),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_field_rewrite);
criterion_main!(benches);
