//! Benchmarks for fold-in and full-range scoring
//!
//! Run with: cargo bench --package pipeline
//!
//! Builds a synthetic 20k-item, 64-factor model in a temporary directory so
//! the numbers do not depend on a trained artifact set being present.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use data_loader::{Catalog, DataIndex, Genre, Movie, RatingStore, RawId, Rating};
use factor_store::{Availability, FactorStore, SvdModel, TrainedEntry};
use pipeline::fold_in::initial_factors;
use pipeline::{FoldInSolver, OptimizedScorer, RecommendationRequest, Scorer};
use std::sync::Arc;

const N_ITEMS: i64 = 20_000;
const N_FACTORS: usize = 64;

fn build_fixture(dir: &std::path::Path) -> (Arc<FactorStore>, Arc<DataIndex>) {
    let items = (0..N_ITEMS)
        .map(|id| TrainedEntry {
            id: RawId::Int(id),
            bias: (id % 7) as f64 * 0.05 - 0.15,
            factors: initial_factors(N_FACTORS, 0.1, id as u64).expect("valid std"),
        })
        .collect();
    SvdModel::new(3.5, N_FACTORS, vec![], items)
        .expect("valid model")
        .export_artifacts(dir)
        .expect("export artifacts");

    let store = match FactorStore::load(dir).expect("load store") {
        Availability::Ready(store) => Arc::new(store),
        Availability::Unavailable { missing } => panic!("missing {:?}", missing),
    };

    let mut index = DataIndex::new();
    for id in 0..N_ITEMS {
        index.insert_movie(Movie {
            id: RawId::Int(id),
            title: format!("Movie {}", id),
            year: None,
            genres: vec![Genre::ALL[id as usize % Genre::ALL.len()]],
        });
    }
    for id in (0..N_ITEMS).step_by(100) {
        index.insert_rating(Rating {
            user_id: RawId::Int(1),
            movie_id: RawId::Int(id),
            rating: 0.5 + (id % 10) as f64 * 0.5,
            timestamp: 0,
        });
    }
    (store, Arc::new(index))
}

fn bench_fold_in(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let (store, index) = build_fixture(dir.path());
    let solver = FoldInSolver::default();
    let ratings = index.get_user_ratings(&RawId::Int(1));

    c.bench_function("fold_in_200_ratings", |b| {
        b.iter(|| {
            let profile = solver.fold_in(black_box(&store), black_box(ratings)).unwrap();
            black_box(profile)
        })
    });
}

fn bench_recommend(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("temp dir");
    let (store, index) = build_fixture(dir.path());
    let catalog: Arc<dyn Catalog> = index.clone();
    let ratings: Arc<dyn RatingStore> = index.clone();
    let scorer = OptimizedScorer::new(store, catalog, ratings);

    let plain = RecommendationRequest::new(10);
    c.bench_function("recommend_top10", |b| {
        b.iter(|| black_box(scorer.score(&RawId::Int(1), black_box(&plain)).unwrap()))
    });

    let hybrid = RecommendationRequest::new(10)
        .with_genres([Genre::Comedy, Genre::Drama])
        .with_alpha(0.7);
    c.bench_function("recommend_top10_hybrid", |b| {
        b.iter(|| black_box(scorer.score(&RawId::Int(1), black_box(&hybrid)).unwrap()))
    });
}

criterion_group!(benches, bench_fold_in, bench_recommend);
criterion_main!(benches);
