use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use unredact::calibrate::CalibrationConfig;
use unredact::collab::DEFAULT_SIZES_PT;
use unredact::halo::EdgeConfig;
use unredact::{
    calibrate_detailed, detect_boxes, extract_halo, find_matches, BoxDetectConfig, Candidate,
    FontDescriptor, FontLibrary, GlyphMetrics, KerningMode, PageRaster, RedactionBox,
    ReferenceObservation, WidthMatchConfig,
};

/// Advance widths derived from the code point, distinct per family.
struct CodeMetrics;

impl GlyphMetrics for CodeMetrics {
    fn measure_width(&self, text: &str, font: &FontDescriptor, kerning: KerningMode) -> f64 {
        let salt = font.family_id.len() as u32;
        let chars: Vec<char> = text.chars().collect();
        let mut w = 0.0;
        for (i, &c) in chars.iter().enumerate() {
            w += 4.0 + ((c as u32 * 7 + salt) % 6) as f64;
            if kerning == KerningMode::Metric && chars.get(i + 1).is_some_and(|n| *n == 'y') {
                w -= 0.5;
            }
        }
        w * font.point_size as f64 / 12.0
    }
}

const WORDS: [&str; 12] = [
    "Company",
    "agreement",
    "Director",
    "payment",
    "schedule",
    "witness",
    "Account",
    "transfer",
    "Plaintiff",
    "records",
    "exhibit",
    "counsel",
];

fn make_page(w: u32, h: u32, n_boxes: u32, seed: u64) -> (GrayImage, Vec<RedactionBox>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = GrayImage::new(w, h);
    for p in img.pixels_mut() {
        *p = Luma([rng.gen_range(225u8..=255)]);
    }
    // Scattered text-like specks.
    for _ in 0..20_000 {
        let x = rng.gen_range(0..w);
        let y = rng.gen_range(0..h);
        img.put_pixel(x, y, Luma([rng.gen_range(0u8..80)]));
    }
    let mut boxes = Vec::new();
    for i in 0..n_boxes {
        let bx = RedactionBox::new(
            rng.gen_range(100..w / 2),
            200 + i * (h - 400) / n_boxes,
            rng.gen_range(120..600),
            rng.gen_range(30..60),
        );
        for y in bx.y..bx.bottom().min(h) {
            for x in bx.x..bx.right().min(w) {
                img.put_pixel(x, y, Luma([rng.gen_range(0u8..8)]));
            }
        }
        boxes.push(bx);
    }
    (img, boxes)
}

fn bench_detect(c: &mut Criterion) {
    let cfg = BoxDetectConfig::default();
    let (letter, _) = make_page(2550, 3300, 12, 7);

    c.bench_function("detect_2550x3300_12boxes", |b| {
        b.iter(|| {
            let boxes = detect_boxes(black_box(&letter), black_box(&cfg));
            black_box(boxes.len())
        })
    });
}

fn bench_calibration(c: &mut Criterion) {
    let metrics = CodeMetrics;
    let truth = FontDescriptor::new("times", 12.0);
    let refs: Vec<ReferenceObservation> = WORDS
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let width = metrics.measure_width(w, &truth, KerningMode::Metric) * 4.1;
            ReferenceObservation::new(*w, 80, 80 + 50 * i as u32, width.round() as u32, 40, 95.0)
        })
        .collect();
    let page = PageRaster::new(GrayImage::new(2550, 3300), 300.0);
    let library = FontLibrary::from_families(["arial", "times", "courier"], &DEFAULT_SIZES_PT);
    let cfg = CalibrationConfig::default();

    c.bench_function("calibration_sweep_21fonts_16steps", |b| {
        b.iter(|| {
            let report = calibrate_detailed(
                black_box(&page),
                black_box(&refs),
                &library,
                &metrics,
                &cfg,
            );
            black_box(report.map(|r| r.tuples_evaluated).unwrap_or(0))
        })
    });
}

fn bench_width_match(c: &mut Criterion) {
    let metrics = CodeMetrics;
    let page = PageRaster::new(GrayImage::new(2550, 3300), 300.0);
    let refs: Vec<ReferenceObservation> = WORDS
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let font = FontDescriptor::new("times", 12.0);
            let width = metrics.measure_width(w, &font, KerningMode::Standard) * 4.0;
            ReferenceObservation::new(*w, 80, 80 + 50 * i as u32, width.round() as u32, 40, 95.0)
        })
        .collect();
    let library = FontLibrary::from_families(["times"], &[12.0]);
    let profile = match calibrate_detailed(
        &page,
        &refs,
        &library,
        &metrics,
        &CalibrationConfig::default(),
    ) {
        Ok(r) => r.profile,
        Err(e) => panic!("fixture calibration failed: {e}"),
    };

    let mut rng = StdRng::seed_from_u64(12345);
    let (_, boxes) = make_page(2550, 3300, 12, 11);
    let candidates: Vec<Candidate> = (0..200)
        .map(|_| {
            let first = WORDS[rng.gen_range(0..WORDS.len())];
            let last = WORDS[rng.gen_range(0..WORDS.len())];
            Candidate::new(format!("{first} {last}"), rng.gen_range(0.0..10.0))
        })
        .collect();
    let cfg = WidthMatchConfig::default();

    c.bench_function("width_match_12boxes_200candidates", |b| {
        b.iter(|| {
            let batch = find_matches(&profile, &metrics, black_box(&boxes), &candidates, &cfg);
            black_box(batch.units_evaluated)
        })
    });
}

fn bench_halo(c: &mut Criterion) {
    let (img, boxes) = make_page(1700, 2200, 6, 3);
    let page = PageRaster::new(img, 600.0);
    let edges = EdgeConfig::default();

    c.bench_function("halo_extract_edges_6boxes", |b| {
        b.iter(|| {
            let mut total = 0;
            for bx in &boxes {
                let halo = extract_halo(black_box(&page), bx, 6, 15);
                total += halo.edge_counts(&edges).total();
            }
            black_box(total)
        })
    });
}

criterion_group!(
    hotpaths,
    bench_detect,
    bench_calibration,
    bench_width_match,
    bench_halo
);
criterion_main!(hotpaths);
