// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Elliptical closed form
//!
//! For parameters `t_0 .. t_{P-1}` the local coordinates are a column of `P + 1`
//! ones. Parameter `i` multiplies row `i` by `cos(t_i)` and every later row by
//! `sin(t_i)` when `convention[i]` is set, and the other way around when it is
//! not. With one parameter this traces an ellipse; with two, an ellipsoid.

use super::node::{ExpressionNode, NodePtr};
use crate::numeric::EvalScalar;
use nalgebra::{DMatrix, DVector};

/// Local coordinates for one parameter column
fn local_coordinates<T: EvalScalar>(convention: &[bool], parameters: &DMatrix<T>, col: usize) -> Vec<T> {
    let mut local = vec![T::one(); convention.len() + 1];
    for (i, &cosine_first) in convention.iter().enumerate() {
        let angle = parameters[(i, col)];
        let (own, rest) = if cosine_first {
            (angle.cos(), angle.sin())
        } else {
            (angle.sin(), angle.cos())
        };
        local[i] = local[i] * own;
        for value in local.iter_mut().skip(i + 1) {
            *value = *value * rest;
        }
    }
    local
}

pub(super) fn evaluate<T: EvalScalar>(
    origin: &DVector<f64>,
    basis: &DMatrix<f64>,
    convention: &[bool],
    parameters: &DMatrix<T>,
) -> DMatrix<T> {
    let mut result = DMatrix::from_element(origin.len(), parameters.ncols(), T::zero());
    for col in 0..parameters.ncols() {
        let local = local_coordinates(convention, parameters, col);
        for row in 0..origin.len() {
            result[(row, col)] = local
                .iter()
                .enumerate()
                .fold(T::from_f64(origin[row]), |acc, (k, &coordinate)| {
                    acc + T::from_f64(basis[(row, k)]) * coordinate
                });
        }
    }
    result
}

/// Partial derivative with respect to parameter `index`
///
/// Differentiating swaps sine and cosine for that parameter, so the result is
/// again elliptical with the convention bit flipped, the origin dropped, and
/// the basis columns that `t_index` does not touch zeroed.
pub(super) fn derivative(basis: &DMatrix<f64>, convention: &[bool], index: usize) -> NodePtr {
    let mut derivative_basis = basis.clone();
    let mut derivative_convention = convention.to_vec();
    derivative_convention[index] = !convention[index];

    for col in 0..index {
        derivative_basis.column_mut(col).fill(0.0);
    }
    if convention[index] {
        // d cos = -sin on the parameter's own row
        derivative_basis.column_mut(index).neg_mut();
    } else {
        // d cos = -sin on every later row
        for col in (index + 1)..basis.ncols() {
            derivative_basis.column_mut(col).neg_mut();
        }
    }

    ExpressionNode::elliptical(
        DVector::zeros(basis.nrows()),
        derivative_basis,
        derivative_convention,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Evaluator;
    use approx::assert_relative_eq;
    use std::rc::Rc;

    fn circle() -> NodePtr {
        ExpressionNode::elliptical(
            DVector::from_vec(vec![1.0, 2.0]),
            DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 0.0, 3.0]),
            vec![true],
        )
    }

    fn sphere() -> NodePtr {
        ExpressionNode::elliptical(DVector::zeros(3), DMatrix::identity(3, 3), vec![true, true])
    }

    fn evaluate_at(node: &NodePtr, values: &[f64]) -> DVector<f64> {
        let mut evaluator = Evaluator::new();
        let parameters = Rc::new(DMatrix::from_column_slice(values.len(), 1, values));
        evaluator.evaluate(node, &parameters).unwrap().column(0).into_owned()
    }

    #[test]
    fn test_circle_points() {
        let node = circle();
        let start = evaluate_at(&node, &[0.0]);
        assert_relative_eq!(start[0], 4.0);
        assert_relative_eq!(start[1], 2.0);
        let quarter = evaluate_at(&node, &[std::f64::consts::FRAC_PI_2]);
        assert_relative_eq!(quarter[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(quarter[1], 5.0);
    }

    #[test]
    fn test_sphere_points_have_unit_norm() {
        let node = sphere();
        for &(a, b) in &[(0.3, 1.2), (2.0, -0.4), (1.0, 3.0)] {
            assert_relative_eq!(evaluate_at(&node, &[a, b]).norm(), 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_derivatives_match_central_difference() {
        let node = sphere();
        let h = 1e-6;
        let (a, b) = (0.7, -1.1);
        for index in 0..2 {
            let derivative = ExpressionNode::derivative(&node, index);
            let mut forward = [a, b];
            let mut backward = [a, b];
            forward[index] += h;
            backward[index] -= h;
            let numeric = (evaluate_at(&node, &forward) - evaluate_at(&node, &backward)) / (2.0 * h);
            let symbolic = evaluate_at(&derivative, &[a, b]);
            assert!((numeric - symbolic).norm() < 1e-8, "parameter {}", index);
        }
    }

    #[test]
    fn test_mixed_convention_derivative() {
        let node = ExpressionNode::elliptical(DVector::zeros(3), DMatrix::identity(3, 3), vec![false, true]);
        let derivative = ExpressionNode::derivative(&node, 1);
        let h = 1e-6;
        let numeric = (evaluate_at(&node, &[0.4, 0.9 + h]) - evaluate_at(&node, &[0.4, 0.9 - h])) / (2.0 * h);
        assert!((numeric - evaluate_at(&derivative, &[0.4, 0.9])).norm() < 1e-8);
    }
}
