// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Elementwise, linear-algebra and structural functions on expressions

use super::{canonical, dynamic_vector, ParametricExpression};
use crate::datum::Datum;
use crate::expression::ExpressionNode;
use nalgebra::{DMatrix, SMatrix, SVector};

impl<const P: usize> ParametricExpression<1, P> {
    pub fn sqrt(&self) -> Self {
        canonical(ExpressionNode::sqrt(&self.node))
    }

    pub fn sin(&self) -> Self {
        canonical(ExpressionNode::sin(&self.node))
    }

    pub fn cos(&self) -> Self {
        canonical(ExpressionNode::cos(&self.node))
    }

    pub fn tan(&self) -> Self {
        canonical(ExpressionNode::tan(&self.node))
    }

    pub fn asin(&self) -> Self {
        canonical(ExpressionNode::asin(&self.node))
    }

    pub fn acos(&self) -> Self {
        canonical(ExpressionNode::acos(&self.node))
    }

    pub fn exp(&self) -> Self {
        canonical(ExpressionNode::exp(&self.node))
    }

    /// Natural logarithm
    pub fn ln(&self) -> Self {
        canonical(ExpressionNode::ln(&self.node))
    }

    pub fn pow(&self, exponent: &Self) -> Self {
        canonical(ExpressionNode::power(&self.node, &exponent.node))
    }

    pub fn powf(&self, exponent: f64) -> Self {
        let exponent = ExpressionNode::scalar_constant_node(exponent, P);
        canonical(ExpressionNode::power(&self.node, &exponent))
    }

    pub fn squared(&self) -> Self {
        canonical(ExpressionNode::squared_norm(&self.node))
    }
}

impl<const D: usize, const P: usize> ParametricExpression<D, P> {
    pub fn norm(&self) -> ParametricExpression<1, P> {
        canonical(ExpressionNode::norm(&self.node))
    }

    pub fn squared_norm(&self) -> ParametricExpression<1, P> {
        canonical(ExpressionNode::squared_norm(&self.node))
    }

    /// Unit vector in the direction of this expression; a zero vector is a
    /// `DegenerateGeometry` error at evaluation
    pub fn normalized(&self) -> Self {
        canonical(ExpressionNode::normalized(&self.node))
    }

    pub fn dot(&self, other: &Self) -> ParametricExpression<1, P> {
        canonical(ExpressionNode::dot(&self.node, &other.node))
    }

    pub fn component(&self, index: usize) -> ParametricExpression<1, P> {
        canonical(ExpressionNode::components(&self.node, index, 1))
    }

    /// `N` consecutive components starting at `start`
    pub fn components<const N: usize>(&self, start: usize) -> ParametricExpression<N, P> {
        canonical(ExpressionNode::components(&self.node, start, N))
    }

    pub fn x(&self) -> ParametricExpression<1, P> {
        self.component(0)
    }

    pub fn y(&self) -> ParametricExpression<1, P> {
        self.component(1)
    }

    pub fn z(&self) -> ParametricExpression<1, P> {
        self.component(2)
    }

    /// Append the components of `other`; `N` must equal `D + M`
    pub fn concatenated<const M: usize, const N: usize>(
        &self,
        other: &ParametricExpression<M, P>,
    ) -> ParametricExpression<N, P> {
        assert_eq!(D + M, N, "concatenation of {} and {} dimensions cannot have {}", D, M, N);
        canonical(ExpressionNode::concatenated(&self.node, &other.node))
    }

    pub fn scaled(&self, scale: f64) -> Self {
        canonical(ExpressionNode::scaled(scale, &self.node))
    }

    pub fn translated(&self, vector: &SVector<f64, D>) -> Self {
        canonical(ExpressionNode::translated(&self.node, &dynamic_vector(vector)))
    }

    /// `matrix * self`
    pub fn transformed<const R: usize>(&self, matrix: &SMatrix<f64, R, D>) -> ParametricExpression<R, P> {
        let matrix = DMatrix::from_column_slice(R, D, matrix.as_slice());
        canonical(ExpressionNode::transformed(&matrix, &self.node))
    }

    /// Interpret this expression as local coordinates in `datum`
    pub fn placed_in<const N: usize>(&self, datum: &Datum<N, D>) -> ParametricExpression<N, P> {
        let node = ExpressionNode::translated(
            &ExpressionNode::transformed(&datum.dynamic_basis(), &self.node),
            &datum.dynamic_origin(),
        );
        canonical(node)
    }
}

impl<const P: usize> ParametricExpression<3, P> {
    pub fn cross(&self, other: &Self) -> Self {
        canonical(ExpressionNode::cross(&self.node, &other.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{EvaluationError, NodeKind};
    use crate::Error;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2x3, Vector2, Vector3};
    use std::f64::consts::PI;

    fn t() -> ParametricExpression<1, 1> {
        ParametricExpression::t()
    }

    #[test]
    fn test_elementwise_values() {
        let x: f64 = 0.3;
        let cases: Vec<(ParametricExpression<1, 1>, f64)> = vec![
            (t().sqrt(), x.sqrt()),
            (t().sin(), x.sin()),
            (t().cos(), x.cos()),
            (t().tan(), x.tan()),
            (t().asin(), x.asin()),
            (t().acos(), x.acos()),
            (t().exp(), x.exp()),
            (t().ln(), x.ln()),
            (t().powf(2.5), x.powf(2.5)),
            (t().pow(&t()), x.powf(x)),
            (t().squared(), x * x),
        ];
        for (expression, expected) in cases {
            assert_relative_eq!(expression.value_at(x).unwrap(), expected, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_domain_errors_are_typed() {
        let error = t().sqrt().value_at(-1.0).unwrap_err();
        assert!(error.is_domain_error());
        assert!(matches!(
            error,
            Error::Evaluation(EvaluationError::DomainViolation { kind: "SquareRoot", .. })
        ));
        assert!(t().ln().value_at(0.0).is_err());
        assert!(t().asin().value_at(1.5).is_err());
        assert!((1.0 / &t()).value_at(0.0).is_err());
    }

    #[test]
    fn test_vector_functions() {
        let a = ParametricExpression::<3, 1>::from_components([t(), t() * 2.0, ParametricExpression::scalar(2.0)]);
        let b = ParametricExpression::<3, 1>::constant(Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(a.norm().value_at(1.0).unwrap(), 3.0);
        assert_relative_eq!(a.squared_norm().value_at(1.0).unwrap(), 9.0);
        assert_relative_eq!(a.dot(&b).value_at(5.0).unwrap(), 2.0);
        assert_relative_eq!(a.cross(&b).evaluate_at(1.0).unwrap(), Vector3::new(2.0, -1.0, 0.0));
        assert_relative_eq!(
            a.normalized().evaluate_at(1.0).unwrap(),
            Vector3::new(1.0, 2.0, 2.0) / 3.0,
            epsilon = 1e-15
        );
        assert_relative_eq!(a.y().value_at(4.0).unwrap(), 8.0);
        assert_relative_eq!(a.components::<2>(1).evaluate_at(4.0).unwrap(), Vector2::new(8.0, 2.0));
    }

    #[test]
    fn test_zero_vector_normalization_fails() {
        let a = ParametricExpression::<2, 1>::from_components([t(), t()]);
        let error = a.normalized().evaluate_at(0.0).unwrap_err();
        assert!(matches!(error, Error::Evaluation(EvaluationError::DegenerateGeometry { .. })));
    }

    #[test]
    fn test_concatenation() {
        let xy = ParametricExpression::<2, 1>::circle(&Vector2::zeros(), 1.0);
        let helix = xy.concatenated::<1, 3>(&t());
        assert_relative_eq!(helix.evaluate_at(PI).unwrap(), Vector3::new(-1.0, 0.0, PI), epsilon = 1e-12);
        assert!(matches!(helix.x().node().kind(), NodeKind::Components { .. } | NodeKind::Elliptical { .. }));
    }

    #[test]
    #[should_panic]
    fn test_concatenation_dimension_mismatch() {
        let xy = ParametricExpression::<2, 1>::circle(&Vector2::zeros(), 1.0);
        let _ = xy.concatenated::<1, 4>(&t());
    }

    #[test]
    fn test_transformations() {
        let circle = ParametricExpression::<2, 1>::circle(&Vector2::zeros(), 1.0);
        let matrix = Matrix2x3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0).transpose();
        let lifted = circle.transformed(&matrix);
        assert_relative_eq!(lifted.evaluate_at(0.0).unwrap(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-15);
        assert!(matches!(lifted.node().kind(), NodeKind::Elliptical { .. }));

        let moved = circle.scaled(2.0).translated(&Vector2::new(1.0, 0.0));
        assert_relative_eq!(moved.evaluate_at(PI).unwrap(), Vector2::new(-1.0, 0.0), epsilon = 1e-12);

        let datum = Datum::new(Vector3::new(0.0, 0.0, 5.0), Matrix2x3::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0).transpose());
        let placed = circle.placed_in(&datum);
        assert_relative_eq!(placed.evaluate_at(0.0).unwrap(), Vector3::new(0.0, 1.0, 5.0), epsilon = 1e-15);
    }
}
