// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Typed facade over the expression DAG
//!
//! `ParametricExpression<D, P>` is a function from `P` parameters to a
//! `D`-dimensional value. Dimensions are checked at compile time wherever the
//! const generics allow it and asserted at construction otherwise.

mod functions;
mod geometry;
mod operators;

use crate::datum::Datum;
use crate::error::{Error, Result};
use crate::expression::{CompiledExpression, DeduplicationCache, Evaluator, ExpressionNode, NodePtr, ParallelEvaluator};
use crate::numeric::{EvalScalar, Interval};
use nalgebra::{DMatrix, DVector, SMatrix, SVector, Vector2};
use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Function from `P` real parameters to a `D`-dimensional vector
#[derive(Debug, Clone)]
pub struct ParametricExpression<const D: usize, const P: usize> {
    node: NodePtr,
}

/// One-parameter curve in `D` dimensions
pub type Curve<const D: usize> = ParametricExpression<D, 1>;

/// Two-parameter surface in `D` dimensions
pub type Surface<const D: usize> = ParametricExpression<D, 2>;

/// Canonicalize a freshly built node against an operation-local cache
pub(crate) fn canonical<const D: usize, const P: usize>(node: NodePtr) -> ParametricExpression<D, P> {
    let mut cache = DeduplicationCache::new();
    ParametricExpression::from_node(ExpressionNode::deduplicated(&node, &mut cache))
}

fn column<T: EvalScalar, const N: usize>(values: &SVector<T, N>) -> DMatrix<T> {
    DMatrix::from_column_slice(N, 1, values.as_slice())
}

fn dynamic_vector<const N: usize>(vector: &SVector<f64, N>) -> DVector<f64> {
    DVector::from_column_slice(vector.as_slice())
}

fn owned<T: EvalScalar>(shared: Rc<DMatrix<T>>) -> DMatrix<T> {
    Rc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone())
}

impl<const D: usize, const P: usize> ParametricExpression<D, P> {
    /// Wrap an existing node; its shape must match `D` and `P`
    pub fn from_node(node: NodePtr) -> Self {
        assert_eq!(
            node.num_dimensions(),
            D,
            "{} node has {} dimensions, expected {}",
            node.kind_name(),
            node.num_dimensions(),
            D
        );
        assert_eq!(
            node.num_parameters(),
            P,
            "{} node has {} parameters, expected {}",
            node.kind_name(),
            node.num_parameters(),
            P
        );
        Self { node }
    }

    pub fn constant(value: SVector<f64, D>) -> Self {
        Self::from_node(ExpressionNode::constant(dynamic_vector(&value), P))
    }

    pub fn zero() -> Self {
        Self::from_node(ExpressionNode::zero(D, P))
    }

    /// Stack `D` scalar expressions into one vector expression
    pub fn from_components(components: [ParametricExpression<1, P>; D]) -> Self {
        let mut iter = components.iter();
        let first = match iter.next() {
            Some(first) => Arc::clone(&first.node),
            None => panic!("from_components needs at least one component"),
        };
        let node = iter.fold(first, |stacked, component| {
            ExpressionNode::concatenated(&stacked, &component.node)
        });
        canonical(node)
    }

    /// Elliptical function over `datum` with every parameter using the cosine convention
    pub fn elliptical<const A: usize>(datum: &Datum<D, A>) -> Self {
        Self::elliptical_with_convention(datum, [true; P])
    }

    /// `origin + basis * local(t)` where each parameter contributes a sine/cosine
    /// pair; `convention[i]` picks cosine (`true`) or sine for parameter `i`'s own axis
    pub fn elliptical_with_convention<const A: usize>(datum: &Datum<D, A>, convention: [bool; P]) -> Self {
        assert_eq!(A, P + 1, "elliptical datum needs one more axis than there are parameters");
        Self::from_node(ExpressionNode::elliptical(
            datum.dynamic_origin(),
            datum.dynamic_basis(),
            convention.to_vec(),
        ))
    }

    /// `origin + basis * parameters` over a datum with one axis per parameter
    pub fn linear<const A: usize>(datum: &Datum<D, A>) -> Self {
        assert_eq!(A, P, "linear datum needs one axis per parameter");
        let node = ExpressionNode::translated(
            &ExpressionNode::transformed(&datum.dynamic_basis(), &ExpressionNode::identity(P)),
            &datum.dynamic_origin(),
        );
        canonical(node)
    }

    pub fn node(&self) -> &NodePtr {
        &self.node
    }

    pub fn num_dimensions(&self) -> usize {
        D
    }

    pub fn num_parameters(&self) -> usize {
        P
    }

    pub fn is_constant(&self) -> bool {
        self.node.is_constant()
    }

    pub fn is_duplicate_of(&self, other: &Self) -> bool {
        ExpressionNode::is_duplicate_of(&self.node, &other.node)
    }

    pub fn deduplicated(&self, cache: &mut DeduplicationCache) -> Self {
        Self::from_node(ExpressionNode::deduplicated(&self.node, cache))
    }

    /// Exact symbolic derivative with respect to parameter `index`
    pub fn derivative(&self, index: usize) -> Result<Self> {
        if index >= P {
            return Err(Error::ParameterIndexOutOfRange {
                index,
                num_parameters: P,
            });
        }
        Ok(canonical(ExpressionNode::derivative(&self.node, index)))
    }

    /// Substitute `inner` for this expression's parameters
    pub fn composed<const Q: usize>(&self, inner: &ParametricExpression<P, Q>) -> ParametricExpression<D, Q> {
        canonical(ExpressionNode::composed(&self.node, &inner.node))
    }

    pub fn evaluate(&self, parameters: &SVector<f64, P>) -> Result<SVector<f64, D>> {
        let values = self.evaluate_columns(column(parameters))?;
        Ok(SVector::from_fn(|row, _| values[(row, 0)]))
    }

    pub fn bounds(&self, parameters: &SVector<Interval, P>) -> Result<SVector<Interval, D>> {
        let values = self.evaluate_columns(column(parameters))?;
        Ok(SVector::from_fn(|row, _| values[(row, 0)]))
    }

    /// Evaluate every column of a `P x n` batch
    pub fn evaluate_batch(&self, parameters: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.evaluate_columns(parameters.clone())
    }

    /// Interval bounds for every column of a `P x n` batch of boxes
    pub fn bounds_batch(&self, parameters: &DMatrix<Interval>) -> Result<DMatrix<Interval>> {
        self.evaluate_columns(parameters.clone())
    }

    /// Same result as `evaluate_batch`, with column chunks spread over the rayon pool
    pub fn evaluate_batch_parallel(&self, parameters: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.evaluate_batch_with(&ParallelEvaluator::new(), parameters)
    }

    pub fn evaluate_batch_with(&self, evaluator: &ParallelEvaluator, parameters: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.check_batch(parameters.nrows());
        Ok(evaluator.evaluate(&self.node, parameters)?)
    }

    pub fn bounds_batch_parallel(&self, parameters: &DMatrix<Interval>) -> Result<DMatrix<Interval>> {
        self.check_batch(parameters.nrows());
        Ok(ParallelEvaluator::new().evaluate(&self.node, parameters)?)
    }

    /// Evaluation plan for replaying this expression over many batches
    pub fn compiled(&self) -> CompiledExpression {
        CompiledExpression::new(&self.node)
    }

    pub fn jacobian(&self, parameters: &SVector<f64, P>) -> Result<SMatrix<f64, D, P>> {
        let jacobian = self.jacobian_matrix(column(parameters))?;
        Ok(SMatrix::from_fn(|row, col| jacobian[(row, col)]))
    }

    /// Interval enclosure of the Jacobian over a parameter box
    pub fn jacobian_bounds(&self, parameters: &SVector<Interval, P>) -> Result<SMatrix<Interval, D, P>> {
        let jacobian = self.jacobian_matrix(column(parameters))?;
        Ok(SMatrix::from_fn(|row, col| jacobian[(row, col)]))
    }

    fn check_batch(&self, rows: usize) {
        assert_eq!(rows, P, "parameter batch has {} rows, expected {}", rows, P);
    }

    fn evaluate_columns<T: EvalScalar>(&self, parameters: DMatrix<T>) -> Result<DMatrix<T>> {
        self.check_batch(parameters.nrows());
        tracing::debug!(
            kind = self.node.kind_name(),
            dimensions = D,
            parameters = P,
            columns = parameters.ncols(),
            scalar = T::KIND,
            "evaluating expression"
        );
        let mut evaluator = Evaluator::new();
        let values = evaluator.evaluate(&self.node, &Rc::new(parameters))?;
        drop(evaluator);
        Ok(owned(values))
    }

    fn jacobian_matrix<T: EvalScalar>(&self, parameters: DMatrix<T>) -> Result<DMatrix<T>> {
        tracing::debug!(
            kind = self.node.kind_name(),
            dimensions = D,
            parameters = P,
            scalar = T::KIND,
            "evaluating jacobian"
        );
        let mut evaluator = Evaluator::new();
        let jacobian = evaluator.jacobian(&self.node, &Rc::new(parameters))?;
        drop(evaluator);
        Ok(owned(jacobian))
    }
}

impl<const D: usize> ParametricExpression<D, 1> {
    pub fn evaluate_at(&self, t: f64) -> Result<SVector<f64, D>> {
        self.evaluate(&SVector::from_element(t))
    }

    pub fn bounds_over(&self, domain: Interval) -> Result<SVector<Interval, D>> {
        self.bounds(&SVector::from_element(domain))
    }

    /// Evaluate at each of `values`, one column per value
    pub fn evaluate_at_all(&self, values: &[f64]) -> Result<DMatrix<f64>> {
        self.evaluate_batch(&DMatrix::from_row_slice(1, values.len(), values))
    }
}

impl<const P: usize> ParametricExpression<1, P> {
    pub fn scalar(value: f64) -> Self {
        Self::from_node(ExpressionNode::scalar_constant_node(value, P))
    }

    /// The parameter with the given index, as a scalar expression
    pub fn parameter(index: usize) -> Self {
        Self::from_node(ExpressionNode::parameter(index, P))
    }
}

impl ParametricExpression<1, 1> {
    /// The curve parameter `t` itself
    pub fn t() -> Self {
        Self::parameter(0)
    }

    pub fn value_at(&self, t: f64) -> Result<f64> {
        Ok(self.evaluate_at(t)?[0])
    }
}

impl ParametricExpression<1, 2> {
    pub fn u() -> Self {
        Self::parameter(0)
    }

    pub fn v() -> Self {
        Self::parameter(1)
    }
}

impl<const P: usize> ParametricExpression<P, P> {
    pub fn identity() -> Self {
        Self::from_node(ExpressionNode::identity(P))
    }
}

impl ParametricExpression<2, 1> {
    /// Counterclockwise circle starting at `center + (radius, 0)`, one turn over `[0, 2pi]`
    pub fn circle(center: &Vector2<f64>, radius: f64) -> Self {
        Self::elliptical(&Datum::new(*center, SMatrix::<f64, 2, 2>::identity() * radius))
    }
}

impl ParametricExpression<3, 1> {
    /// Helix around the datum's z axis, `turns` revolutions over `t` in `[0, 1]`
    ///
    /// The xy basis vectors set the radius and the z basis vector the rise per turn.
    pub fn helix(datum: &Datum<3, 3>, turns: f64) -> Self {
        let t = ParametricExpression::<1, 1>::t();
        let angle = &t * (2.0 * PI * turns);
        let rise = &t * turns;
        let circle = ParametricExpression::<3, 1>::elliptical(&datum.xy_plane()).composed(&angle);
        let axis = ParametricExpression::<3, 1>::linear(&datum.z_axis().translated_by(&-datum.origin())).composed(&rise);
        circle + axis
    }
}

impl ParametricExpression<3, 2> {
    /// Sphere of `radius` about `center`: `u` is the polar angle from the x axis and
    /// `v` the azimuth around it, so the poles sit at `u = 0` and `u = pi`
    pub fn sphere(center: &SVector<f64, 3>, radius: f64) -> Self {
        let datum = Datum::new(*center, SMatrix::<f64, 3, 3>::identity() * radius);
        Self::elliptical_with_convention(&datum, [true, true])
    }
}

impl<const D: usize, const P: usize> fmt::Display for ParametricExpression<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Vector1, Vector2, Vector3};

    #[test]
    fn test_parameter_evaluation() {
        let u = ParametricExpression::<1, 2>::u();
        let v = ParametricExpression::<1, 2>::v();
        let f = 2.0 + &u - &v;
        assert_relative_eq!(f.evaluate(&Vector2::new(1.0, 1.0)).unwrap()[0], 2.0);
        assert_relative_eq!(f.evaluate(&Vector2::new(0.0, 1.0)).unwrap()[0], 1.0);
    }

    #[test]
    fn test_derivative_out_of_range() {
        let t = ParametricExpression::<1, 1>::t();
        let error = t.derivative(1).unwrap_err();
        assert!(matches!(
            error,
            Error::ParameterIndexOutOfRange {
                index: 1,
                num_parameters: 1
            }
        ));
        assert!(!error.is_domain_error());
    }

    #[test]
    fn test_circle() {
        let circle = ParametricExpression::<2, 1>::circle(&Vector2::new(1.0, 1.0), 2.0);
        let point = circle.evaluate_at(PI / 2.0).unwrap();
        assert_relative_eq!(point, Vector2::new(1.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_helix() {
        let datum = Datum::new(Vector3::zeros(), SMatrix::<f64, 3, 3>::from_diagonal(&Vector3::new(1.0, 1.0, 0.5)));
        let helix = ParametricExpression::<3, 1>::helix(&datum, 2.0);
        assert_relative_eq!(helix.evaluate_at(0.0).unwrap(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(helix.evaluate_at(0.5).unwrap(), Vector3::new(1.0, 0.0, 0.5), epsilon = 1e-12);
        assert_relative_eq!(helix.evaluate_at(0.125).unwrap(), Vector3::new(0.0, 1.0, 0.125), epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_radius() {
        let center = Vector3::new(1.0, -1.0, 2.0);
        let sphere = ParametricExpression::<3, 2>::sphere(&center, 3.0);
        for &(u, v) in &[(0.0, 0.0), (1.0, 0.5), (-2.0, 1.2)] {
            let point = sphere.evaluate(&Vector2::new(u, v)).unwrap();
            assert_relative_eq!((point - center).norm(), 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear() {
        let datum = Datum::new(Vector3::new(1.0, 2.0, 3.0), SMatrix::<f64, 3, 2>::new(1.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        let plane = ParametricExpression::<3, 2>::linear(&datum);
        assert_relative_eq!(plane.evaluate(&Vector2::new(2.0, 3.0)).unwrap(), Vector3::new(3.0, 8.0, 3.0));
        let jacobian = plane.jacobian(&Vector2::new(0.0, 0.0)).unwrap();
        assert_relative_eq!(jacobian[(1, 1)], 2.0);
    }

    #[test]
    fn test_from_components() {
        let t = ParametricExpression::<1, 1>::t();
        let curve = ParametricExpression::<3, 1>::from_components([t.clone(), t.squared(), t.sin()]);
        let point = curve.evaluate_at(2.0).unwrap();
        assert_relative_eq!(point, Vector3::new(2.0, 4.0, 2.0f64.sin()));
    }

    #[test]
    fn test_batch_matches_pointwise() {
        let t = ParametricExpression::<1, 1>::t();
        let f = t.cos() * 3.0 + t.exp();
        let values: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let batch = f.evaluate_at_all(&values).unwrap();
        for (col, &value) in values.iter().enumerate() {
            assert_eq!(batch[(0, col)], f.value_at(value).unwrap());
        }
        let parallel = f.evaluate_batch_parallel(&DMatrix::from_row_slice(1, 20, &values)).unwrap();
        assert_eq!(parallel, batch);
    }

    #[test]
    fn test_bounds_contain_values() {
        let t = ParametricExpression::<1, 1>::t();
        let f = t.sin() * t.cos();
        let domain = Interval::new(0.5, 1.5);
        let bounds = f.bounds_over(domain).unwrap();
        for i in 0..=10 {
            let x = 0.5 + i as f64 * 0.1;
            assert!(bounds[0].contains(f.value_at(x).unwrap()));
        }
        let jacobian = f.jacobian_bounds(&Vector1::new(domain)).unwrap();
        assert!(jacobian[(0, 0)].contains((2.0 * 1.0f64).cos()));
    }

    #[test]
    fn test_display_dump() {
        let t = ParametricExpression::<1, 1>::t();
        assert_eq!(t.sin().to_string(), "R1 -> R1 | Sine\n  R1 -> R1 | Parameter 0\n");
    }
}
