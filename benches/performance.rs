// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{DMatrix, Matrix3, Vector1, Vector2, Vector3};
use polyframe_expr::{Datum, DeduplicationCache, Interval, ParametricExpression};
use std::f64::consts::PI;

fn squiggle() -> ParametricExpression<1, 1> {
    let t = ParametricExpression::<1, 1>::t();
    (&t * 5.0).sin() * (-t.squared()).exp() + &t * 0.25
}

fn helix() -> ParametricExpression<3, 1> {
    let datum = Datum::new(Vector3::zeros(), Matrix3::from_diagonal(&Vector3::new(1.5, 1.5, 0.5)));
    ParametricExpression::<3, 1>::helix(&datum, 3.0)
}

fn line_batch(columns: usize) -> DMatrix<f64> {
    DMatrix::from_fn(1, columns, |_, col| col as f64 / columns as f64)
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    let curve = helix();

    group.bench_function("helix_point", |b| {
        b.iter(|| curve.evaluate(black_box(&Vector1::new(0.37))).unwrap());
    });

    for columns in [64, 1024, 16384] {
        let parameters = line_batch(columns);
        group.bench_with_input(BenchmarkId::new("helix_batch", columns), &parameters, |b, parameters| {
            b.iter(|| curve.evaluate_batch(black_box(parameters)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("helix_parallel", columns), &parameters, |b, parameters| {
            b.iter(|| curve.evaluate_batch_parallel(black_box(parameters)).unwrap());
        });
    }

    let plan = squiggle().compiled();
    let parameters = line_batch(1024);
    group.bench_with_input(BenchmarkId::new("squiggle_compiled", 1024), &parameters, |b, parameters| {
        b.iter(|| plan.evaluate(black_box(parameters)).unwrap());
    });

    group.finish();
}

fn bench_bounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounds");
    let f = squiggle();
    let sphere = ParametricExpression::<3, 2>::sphere(&Vector3::zeros(), 1.0);

    group.bench_function("squiggle_box", |b| {
        b.iter(|| f.bounds_over(black_box(Interval::new(-2.0, 2.0))).unwrap());
    });

    let domain = Vector2::new(Interval::new(0.1, PI - 0.1), Interval::new(-PI, PI));
    group.bench_function("sphere_box", |b| {
        b.iter(|| sphere.bounds(black_box(&domain)).unwrap());
    });

    let boxes = DMatrix::from_fn(1, 1024, |_, col| Interval::new(col as f64 * 1e-3, (col + 1) as f64 * 1e-3));
    group.bench_with_input(BenchmarkId::new("squiggle_batch", 1024), &boxes, |b, boxes| {
        b.iter(|| f.bounds_batch(black_box(boxes)).unwrap());
    });

    group.finish();
}

fn bench_differentiation(c: &mut Criterion) {
    let mut group = c.benchmark_group("differentiation");
    let curve = helix();
    let sphere = ParametricExpression::<3, 2>::sphere(&Vector3::zeros(), 1.0);

    group.bench_function("helix_jacobian", |b| {
        b.iter(|| curve.jacobian(black_box(&Vector1::new(0.37))).unwrap());
    });

    let point = Vector2::new(0.4, 1.1);
    group.bench_function("sphere_jacobian", |b| {
        b.iter(|| sphere.jacobian(black_box(&point)).unwrap());
    });

    group.bench_function("helix_curvature", |b| {
        b.iter(|| black_box(&curve).curvature());
    });

    for order in [1, 2, 3] {
        group.bench_with_input(BenchmarkId::new("squiggle_derivative", order), &order, |b, &order| {
            let f = squiggle();
            b.iter(|| {
                let mut current = f.clone();
                for _ in 0..order {
                    current = current.derivative(0).unwrap();
                }
                current
            });
        });
    }

    group.finish();
}

fn bench_deduplication(c: &mut Criterion) {
    let mut group = c.benchmark_group("deduplication");
    let f = squiggle().derivative(0).unwrap().derivative(0).unwrap();
    let pair = ParametricExpression::<2, 1>::from_components([f.clone(), f.clone() * 2.0]);

    group.bench_function("second_derivative", |b| {
        b.iter(|| {
            let mut cache = DeduplicationCache::new();
            black_box(&pair).deduplicated(&mut cache)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_evaluation,
    bench_bounds,
    bench_differentiation,
    bench_deduplication
);
criterion_main!(benches);
