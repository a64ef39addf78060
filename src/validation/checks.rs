// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Consistency checks between the evaluation paths
//!
//! Every check samples points from a finite parameter box. Points where the
//! expression is undefined (a domain violation on either side of a comparison)
//! are skipped rather than failed. Interval bounds are the exception: a box
//! reported undefined while a point inside it evaluates is a failure.

use super::config::ValidationConfig;
use super::types::CheckOutcome;
use crate::error::Result;
use crate::expression::{DeduplicationCache, ExpressionNode, NodePtr};
use crate::numeric::Interval;
use crate::parametric::ParametricExpression;
use crate::utils::math::{central_difference, lerp, max_relative_error, relative_error};
use ahash::AHashMap;
use nalgebra::{DMatrix, DVector, SVector};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

/// Uniform random point inside `domain`
pub fn sample_point<const P: usize, R: Rng>(domain: &SVector<Interval, P>, rng: &mut R) -> SVector<f64, P> {
    SVector::from_fn(|i, _| lerp(domain[i].lower(), domain[i].upper(), rng.gen::<f64>()))
}

/// Random sub-box of `domain`
pub fn sample_box<const P: usize, R: Rng>(domain: &SVector<Interval, P>, rng: &mut R) -> SVector<Interval, P> {
    SVector::from_fn(|i, _| {
        let a = lerp(domain[i].lower(), domain[i].upper(), rng.gen::<f64>());
        let b = lerp(domain[i].lower(), domain[i].upper(), rng.gen::<f64>());
        Interval::hull(a, b)
    })
}

fn assert_finite_domain<const P: usize>(domain: &SVector<Interval, P>) {
    assert!(
        domain
            .iter()
            .all(|axis| !axis.is_empty() && axis.lower().is_finite() && axis.upper().is_finite()),
        "consistency checks need a finite, non-empty parameter box"
    );
}

/// Value of `result`, or `None` after recording a skip (domain violation) or failure
fn defined<T>(result: Result<T>, outcome: &mut CheckOutcome) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) if error.is_domain_error() => {
            outcome.skip();
            None
        }
        Err(error) => {
            outcome.fail(error.to_string());
            None
        }
    }
}

fn finished(mut outcome: CheckOutcome, start: Instant) -> CheckOutcome {
    outcome.duration = start.elapsed();
    tracing::debug!(
        check = %outcome.name,
        passed = outcome.passed,
        samples = outcome.samples,
        skipped = outcome.skipped,
        max_error = outcome.max_error,
        "check finished"
    );
    outcome
}

fn all_derivatives<const D: usize, const P: usize>(
    expression: &ParametricExpression<D, P>,
) -> Result<Vec<ParametricExpression<D, P>>> {
    (0..P).map(|index| expression.derivative(index)).collect()
}

fn derivative_pair<const D: usize, const P: usize>(
    expression: &ParametricExpression<D, P>,
    derivative: &ParametricExpression<D, P>,
    point: &SVector<f64, P>,
    index: usize,
    step: f64,
) -> Result<(SVector<f64, D>, SVector<f64, D>)> {
    let mut offset = SVector::<f64, P>::zeros();
    offset[index] = step;
    let backward = expression.evaluate(&(point - offset))?;
    let forward = expression.evaluate(&(point + offset))?;
    let symbolic = derivative.evaluate(point)?;
    Ok((symbolic, central_difference(&backward, &forward, step)))
}

/// Symbolic derivatives against central differences
pub fn check_derivatives<const D: usize, const P: usize, R: Rng>(
    expression: &ParametricExpression<D, P>,
    domain: &SVector<Interval, P>,
    config: &ValidationConfig,
    rng: &mut R,
) -> CheckOutcome {
    assert_finite_domain(domain);
    let start = Instant::now();
    let mut outcome = CheckOutcome::new("derivatives");
    let derivatives = match all_derivatives(expression) {
        Ok(derivatives) => derivatives,
        Err(error) => {
            outcome.fail(error.to_string());
            return finished(outcome, start);
        }
    };

    for _ in 0..config.samples {
        let point = sample_point(domain, rng);
        for (index, derivative) in derivatives.iter().enumerate() {
            let pair = derivative_pair(expression, derivative, &point, index, config.step);
            if let Some((symbolic, numeric)) = defined(pair, &mut outcome) {
                let error = max_relative_error(&symbolic, &numeric);
                outcome.record(error, config.derivative_tolerance, || {
                    format!(
                        "d/dp{} at {:?}: symbolic {:?}, central difference {:?}",
                        index,
                        point.as_slice(),
                        symbolic.as_slice(),
                        numeric.as_slice()
                    )
                });
            }
        }
    }
    finished(outcome, start)
}

/// Jacobian columns against evaluated symbolic derivatives
pub fn check_jacobian<const D: usize, const P: usize, R: Rng>(
    expression: &ParametricExpression<D, P>,
    domain: &SVector<Interval, P>,
    config: &ValidationConfig,
    rng: &mut R,
) -> CheckOutcome {
    assert_finite_domain(domain);
    let start = Instant::now();
    let mut outcome = CheckOutcome::new("jacobian");
    let derivatives = match all_derivatives(expression) {
        Ok(derivatives) => derivatives,
        Err(error) => {
            outcome.fail(error.to_string());
            return finished(outcome, start);
        }
    };

    for _ in 0..config.samples {
        let point = sample_point(domain, rng);
        let columns = expression.jacobian(&point).and_then(|jacobian| {
            derivatives
                .iter()
                .map(|derivative| derivative.evaluate(&point))
                .collect::<Result<Vec<_>>>()
                .map(|values| (jacobian, values))
        });
        if let Some((jacobian, values)) = defined(columns, &mut outcome) {
            for (index, value) in values.iter().enumerate() {
                let column: SVector<f64, D> = jacobian.column(index).into_owned();
                let error = max_relative_error(&column, value);
                outcome.record(error, config.jacobian_tolerance, || {
                    format!(
                        "column {} at {:?}: jacobian {:?}, derivative {:?}",
                        index,
                        point.as_slice(),
                        column.as_slice(),
                        value.as_slice()
                    )
                });
            }
        }
    }
    finished(outcome, start)
}

/// Pointwise values sampled in random sub-boxes must lie inside the sub-box bounds
pub fn check_interval_soundness<const D: usize, const P: usize, R: Rng>(
    expression: &ParametricExpression<D, P>,
    domain: &SVector<Interval, P>,
    config: &ValidationConfig,
    rng: &mut R,
) -> CheckOutcome {
    assert_finite_domain(domain);
    let start = Instant::now();
    let mut outcome = CheckOutcome::new("interval soundness");

    for _ in 0..config.interval_subdivisions.max(1) {
        let sub_box = sample_box(domain, rng);
        let points = DMatrix::from_fn(P, config.samples, |row, _| {
            lerp(sub_box[row].lower(), sub_box[row].upper(), rng.gen::<f64>())
        });
        let bounds = match expression.bounds(&sub_box) {
            Ok(bounds) => bounds,
            // An undefined box may not contain a defined point
            Err(error) if error.is_domain_error() => {
                let defined_point = points.column_iter().find_map(|column| {
                    let point = SVector::<f64, P>::from_fn(|row, _| column[row]);
                    expression.evaluate(&point).ok().map(|_| point)
                });
                match defined_point {
                    Some(point) => outcome.fail(format!(
                        "bounds over {:?} failed ({}) but {:?} evaluates",
                        sub_box.iter().map(|axis| axis.to_string()).collect::<Vec<_>>(),
                        error,
                        point.as_slice()
                    )),
                    None => outcome.skip(),
                }
                continue;
            }
            Err(error) => {
                outcome.fail(error.to_string());
                continue;
            }
        };

        let values: Vec<Option<DVector<f64>>> = match expression.evaluate_batch_parallel(&points) {
            Ok(values) => values.column_iter().map(|column| Some(column.into_owned())).collect(),
            // Some point is undefined; fall back to one column at a time
            Err(error) if error.is_domain_error() => points
                .column_iter()
                .map(|column| {
                    let point = SVector::<f64, P>::from_fn(|row, _| column[row]);
                    defined(
                        expression
                            .evaluate(&point)
                            .map(|value| DVector::from_column_slice(value.as_slice())),
                        &mut outcome,
                    )
                })
                .collect::<Vec<_>>(),
            Err(error) => {
                outcome.fail(error.to_string());
                continue;
            }
        };

        for (col, value) in values.iter().enumerate() {
            let Some(value) = value else { continue };
            for row in 0..D {
                let v = value[row];
                let enclosure = bounds[row];
                let excess = (enclosure.lower() - v).max(v - enclosure.upper()).max(0.0);
                let error = excess / v.abs().max(1.0);
                outcome.record(error, crate::numeric::ZERO_TOLERANCE, || {
                    format!(
                        "component {} at {:?}: value {} outside {} over box {:?}",
                        row,
                        points.column(col).as_slice(),
                        v,
                        enclosure,
                        sub_box.iter().map(|axis| axis.to_string()).collect::<Vec<_>>()
                    )
                });
            }
        }
    }
    finished(outcome, start)
}

/// `f.composed(identity)` is `f`, and `f.composed(2 * identity)` at `p / 2` is `f(p)`
pub fn check_composition_identity<const D: usize, const P: usize, R: Rng>(
    expression: &ParametricExpression<D, P>,
    domain: &SVector<Interval, P>,
    config: &ValidationConfig,
    rng: &mut R,
) -> CheckOutcome {
    assert_finite_domain(domain);
    let start = Instant::now();
    let mut outcome = CheckOutcome::new("composition identity");
    let identity = ParametricExpression::<P, P>::identity();
    let composed = expression.composed(&identity);
    if !composed.is_duplicate_of(expression) {
        outcome.fail("composing with the identity changed the expression".to_string());
    }
    let stretched = expression.composed(&(identity * 2.0));

    for _ in 0..config.samples {
        let point = sample_point(domain, rng);
        let pair = expression
            .evaluate(&point)
            .and_then(|direct| Ok((direct, composed.evaluate(&point)?, stretched.evaluate(&(point / 2.0))?)));
        if let Some((direct, through_identity, through_stretch)) = defined(pair, &mut outcome) {
            let error = max_relative_error(&through_identity, &direct).max(max_relative_error(&through_stretch, &direct));
            outcome.record(error, config.jacobian_tolerance, || {
                format!(
                    "at {:?}: direct {:?}, composed {:?}, stretched {:?}",
                    point.as_slice(),
                    direct.as_slice(),
                    through_identity.as_slice(),
                    through_stretch.as_slice()
                )
            });
        }
    }
    finished(outcome, start)
}

/// Fresh copy of the whole DAG, preserving its internal sharing but sharing no node with it
fn deep_copy(node: &NodePtr, copies: &mut AHashMap<usize, NodePtr>) -> NodePtr {
    let address = Arc::as_ptr(node) as usize;
    if let Some(copy) = copies.get(&address) {
        return Arc::clone(copy);
    }
    let operands = node.operands().into_iter().map(|operand| deep_copy(operand, copies)).collect();
    let copy = ExpressionNode::new(
        node.kind().with_operands(operands),
        node.num_dimensions(),
        node.num_parameters(),
    );
    copies.insert(address, Arc::clone(&copy));
    copy
}

/// Idempotence, structural sharing, and value preservation of deduplication
pub fn check_deduplication<const D: usize, const P: usize, R: Rng>(
    expression: &ParametricExpression<D, P>,
    domain: &SVector<Interval, P>,
    config: &ValidationConfig,
    rng: &mut R,
) -> CheckOutcome {
    assert_finite_domain(domain);
    let start = Instant::now();
    let mut outcome = CheckOutcome::new("deduplication");
    let mut cache = DeduplicationCache::new();
    let once = expression.deduplicated(&mut cache);
    let twice = once.deduplicated(&mut cache);

    if !Arc::ptr_eq(once.node(), twice.node()) {
        outcome.fail("deduplicating twice returned a different node".to_string());
    }
    if !once.is_duplicate_of(expression) {
        outcome.fail("deduplicated expression is not a duplicate of the original".to_string());
    }
    if once.node().node_count() > expression.node().node_count() {
        outcome.fail(format!(
            "deduplication grew the DAG from {} to {} nodes",
            expression.node().node_count(),
            once.node().node_count()
        ));
    }

    let copy = deep_copy(expression.node(), &mut AHashMap::new());
    if !expression.is_constant() {
        let pair = ExpressionNode::concatenated(expression.node(), &copy);
        let shared = ExpressionNode::deduplicated(&pair, &mut DeduplicationCache::new());
        let operands = shared.operands();
        if operands.len() != 2 || !Arc::ptr_eq(operands[0], operands[1]) {
            outcome.fail("independently built copies were not merged".to_string());
        }
    }

    for _ in 0..config.samples {
        let point = sample_point(domain, rng);
        let pair = expression
            .evaluate(&point)
            .and_then(|original| Ok((original, once.evaluate(&point)?)));
        if let Some((original, deduplicated)) = defined(pair, &mut outcome) {
            let error = original
                .iter()
                .zip(deduplicated.iter())
                .map(|(&a, &b)| relative_error(b, a))
                .fold(0.0, f64::max);
            outcome.record(error, config.jacobian_tolerance, || {
                format!(
                    "at {:?}: original {:?}, deduplicated {:?}",
                    point.as_slice(),
                    original.as_slice(),
                    deduplicated.as_slice()
                )
            });
        }
    }
    finished(outcome, start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector1, Vector2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ValidationConfig {
        ValidationConfig {
            samples: 16,
            seed: Some(3),
            ..ValidationConfig::default()
        }
    }

    fn squiggle() -> ParametricExpression<1, 1> {
        let t = ParametricExpression::<1, 1>::t();
        t.sin() * t.exp() + t.squared().cos()
    }

    #[test]
    fn test_samples_stay_in_domain() {
        let mut rng = StdRng::seed_from_u64(1);
        let domain = Vector2::new(Interval::new(-1.0, 2.0), Interval::new(5.0, 5.5));
        for _ in 0..100 {
            let point = sample_point(&domain, &mut rng);
            assert!(domain[0].contains(point[0]) && domain[1].contains(point[1]));
            let sub_box = sample_box(&domain, &mut rng);
            assert!(domain[0].contains_interval(&sub_box[0]));
        }
    }

    #[test]
    fn test_checks_pass_on_squiggle() {
        let mut rng = StdRng::seed_from_u64(5);
        let domain = Vector1::new(Interval::new(-1.0, 1.0));
        let f = squiggle();
        let config = config();
        assert!(check_derivatives(&f, &domain, &config, &mut rng).passed);
        assert!(check_jacobian(&f, &domain, &config, &mut rng).passed);
        assert!(check_interval_soundness(&f, &domain, &config, &mut rng).passed);
        assert!(check_composition_identity(&f, &domain, &config, &mut rng).passed);
        assert!(check_deduplication(&f, &domain, &config, &mut rng).passed);
    }

    #[test]
    fn test_soundness_at_domain_edges() {
        let mut rng = StdRng::seed_from_u64(13);
        let t = ParametricExpression::<1, 1>::t();
        let config = config();

        let root = Vector1::new(Interval::new(-1e-13, 0.0));
        let outcome = check_interval_soundness(&t.sqrt(), &root, &config, &mut rng);
        assert!(outcome.passed);
        assert_eq!(outcome.skipped, 0);

        let unit = Vector1::new(Interval::new(1.0, 1.0 + 1e-13));
        assert!(check_interval_soundness(&t.asin(), &unit, &config, &mut rng).passed);
        assert!(check_interval_soundness(&t.acos(), &unit, &config, &mut rng).passed);

        let outside = Vector1::new(Interval::new(-1.0, -0.5));
        let outcome = check_interval_soundness(&t.sqrt(), &outside, &config, &mut rng);
        assert!(outcome.passed);
        assert_eq!(outcome.skipped, config.interval_subdivisions);
    }

    #[test]
    fn test_undefined_points_are_skipped() {
        let mut rng = StdRng::seed_from_u64(9);
        let t = ParametricExpression::<1, 1>::t();
        let f = t.sqrt();
        let domain = Vector1::new(Interval::new(-1.0, -0.5));
        let outcome = check_jacobian(&f, &domain, &config(), &mut rng);
        assert!(outcome.passed);
        assert_eq!(outcome.samples, 0);
        assert_eq!(outcome.skipped, 16);
    }
}
