use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use seg_ensemble::generator::{
    CartesianGridGenerator, LatinHypercubeGenerator, ParameterGenerator, RandomGenerator,
};
use seg_ensemble::{ParameterRange, Registry};

const RANGE: &str = "Beta\t0.1:10:log\nGamma\t0.01:1:log\nMaxIterations\t50:200\n\
    SvmC\t0.1:100:log\nSvmGamma\t0.01:1:log\nSvmChannels\t1:3\n\
    Weight\t0.2:0.6\nReducedDim\t1:4\nDist\tl1,l2,cos\n\
    Weight\t0.4:0.8\nReducedDim\t1:2\nDist\tjs,cs\n";

fn range() -> ParameterRange {
    ParameterRange::parse(RANGE, &Registry::standard()).unwrap()
}

fn bench_generators(c: &mut Criterion) {
    let range = range();
    let generators: Vec<(&str, Box<dyn ParameterGenerator>)> = vec![
        ("random", Box::new(RandomGenerator::with_seed(42))),
        ("latin_hypercube", Box::new(LatinHypercubeGenerator::with_seed(42))),
        ("grid", Box::new(CartesianGridGenerator::new())),
    ];

    for (name, generator) in &generators {
        let mut group = c.benchmark_group(*name);
        for count in [10, 100, 1000] {
            group.bench_with_input(BenchmarkId::new("count", count), &count, |b, &count| {
                b.iter(|| generator.generate(&range, count).unwrap());
            });
        }
        group.finish();
    }
}

fn bench_descriptors(c: &mut Criterion) {
    let range = range();
    let sets = RandomGenerator::with_seed(7).generate(&range, 100).unwrap();
    c.bench_function("descriptor_round_trip", |b| {
        b.iter(|| {
            for set in &sets {
                let line = set.to_descriptor(&range).unwrap();
                seg_ensemble::ParameterSet::from_descriptor(&line, &range).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_generators, bench_descriptors);
criterion_main!(benches);
