use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relume_capture::capture::{CameraDevice, Frame, MockDevice};
use relume_capture::preprocess::Preprocessor;

fn synthetic_frame(width: u32, height: u32) -> Frame {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            pixels.push(((x * 7 + y * 3) % 256) as u8);
            pixels.push(((x ^ y) % 256) as u8);
            pixels.push(((x * y) % 256) as u8);
        }
    }
    Frame::bgr(pixels, width, height, 0)
}

fn bench_pipeline(c: &mut Criterion) {
    let preprocessor = Preprocessor::default();
    let mut group = c.benchmark_group("preprocess");
    group.sample_size(10);

    for (width, height) in [(160, 120), (320, 240), (640, 480)] {
        let frame = synthetic_frame(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &frame,
            |b, frame| b.iter(|| preprocessor.process(black_box(frame)).unwrap()),
        );
    }
    group.finish();
}

fn bench_mock_read(c: &mut Criterion) {
    let mut device = MockDevice::new();
    device.open(0).unwrap();
    c.bench_function("mock_read_640x480", |b| {
        b.iter(|| black_box(device.read().unwrap()))
    });
}

criterion_group!(benches, bench_pipeline, bench_mock_read);
criterion_main!(benches);
