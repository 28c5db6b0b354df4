use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facegan::math::Matrix;
use facegan::models::{ConvDiscriminator, Discriminator, Generator, MlpGenerator};
use facegan::rng::{normal_noise, stream_rng};
use rand::Rng;

fn bench_discriminator(c: &mut Criterion) {
    let size = 32;
    let batch = 16;
    let mut rng = stream_rng(0, 0);
    let x_data: Vec<f32> = (0..batch * 3 * size * size).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let x = Matrix::from_vec(batch, 3 * size * size, x_data);
    let mut disc = ConvDiscriminator::new(size, 8, &mut rng);

    c.bench_function("discriminator_predict", |b| {
        b.iter(|| {
            let res = disc.predict(black_box(&x)).unwrap();
            black_box(res);
        });
    });

    c.bench_function("discriminator_forward_backward", |b| {
        b.iter(|| {
            let logits = disc.forward_train(black_box(&x)).unwrap();
            let grad = disc.backward(&Matrix::from_vec(logits.rows, 1, vec![1.0; logits.rows]));
            black_box(grad);
        });
    });
}

fn bench_generator(c: &mut Criterion) {
    let mut rng = stream_rng(1, 0);
    let generator = MlpGenerator::new(100, 256, 32, &mut rng);
    let z = normal_noise(&mut rng, 16, 100);
    c.bench_function("generator_generate", |b| {
        b.iter(|| {
            let res = generator.generate(black_box(&z)).unwrap();
            black_box(res);
        });
    });
}

criterion_group!(benches, bench_discriminator, bench_generator);
criterion_main!(benches);
