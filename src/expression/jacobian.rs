// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Jacobian evaluation
//!
//! Jacobians are evaluated at a single parameter column (a point, or a box for
//! interval scalars) and have shape `num_dimensions x num_parameters`. Each
//! kind combines its operands' values and Jacobians with the chain rule.

use super::error::{EvaluationError, EvaluationResult};
use super::evaluator::{constant_product, integer_exponent, matrix_product, squared_column_norm, Evaluator};
use super::node::{ExpressionNode, NodeKind, NodePtr};
use crate::numeric::EvalScalar;
use nalgebra::DMatrix;
use std::rc::Rc;

fn scaled_rows<T: EvalScalar>(jacobian: &DMatrix<T>, factor: T) -> DMatrix<T> {
    jacobian.map(|x| factor * x)
}

/// Outer product of a value column with a one-row Jacobian
fn outer<T: EvalScalar>(values: &DMatrix<T>, row: &DMatrix<T>) -> DMatrix<T> {
    DMatrix::from_fn(values.nrows(), row.ncols(), |i, j| values[(i, 0)] * row[(0, j)])
}

/// Row vector `values^T * jacobian`
fn transposed_product<T: EvalScalar>(values: &DMatrix<T>, jacobian: &DMatrix<T>) -> DMatrix<T> {
    DMatrix::from_fn(1, jacobian.ncols(), |_, j| {
        (0..values.nrows()).fold(T::zero(), |acc, k| acc + values[(k, 0)] * jacobian[(k, j)])
    })
}

fn cross_column<T: EvalScalar>(a: &DMatrix<T>, a_col: usize, b: &DMatrix<T>, b_col: usize, row: usize) -> T {
    let (i, j) = ((row + 1) % 3, (row + 2) % 3);
    a[(i, a_col)] * b[(j, b_col)] - a[(j, a_col)] * b[(i, b_col)]
}

impl<T: EvalScalar> Evaluator<T> {
    /// Jacobian of `node` at the single column `parameters` (`num_parameters x 1`)
    pub fn jacobian(
        &mut self,
        node: &NodePtr,
        parameters: &Rc<DMatrix<T>>,
    ) -> EvaluationResult<Rc<DMatrix<T>>> {
        assert_eq!(
            parameters.ncols(),
            1,
            "Jacobians are evaluated at a single parameter column"
        );
        assert_eq!(
            parameters.nrows(),
            node.num_parameters(),
            "{} expects {} parameter rows, got {}",
            node.kind_name(),
            node.num_parameters(),
            parameters.nrows()
        );
        if let Some(cached) = self.cached_jacobian(node, parameters) {
            return Ok(cached);
        }
        let result = Rc::new(self.jacobian_kind(node, parameters)?);
        self.store_jacobian(node, parameters, Rc::clone(&result));
        Ok(result)
    }

    fn jacobian_kind(&mut self, node: &NodePtr, parameters: &Rc<DMatrix<T>>) -> EvaluationResult<DMatrix<T>> {
        let kind_name = node.kind_name();
        let dimensions = node.num_dimensions();
        let num_parameters = node.num_parameters();

        match node.kind() {
            NodeKind::Constant(_) => Ok(DMatrix::from_element(dimensions, num_parameters, T::zero())),

            NodeKind::Identity => Ok(DMatrix::from_fn(num_parameters, num_parameters, |i, j| {
                if i == j {
                    T::one()
                } else {
                    T::zero()
                }
            })),

            NodeKind::Parameter(index) => Ok(DMatrix::from_fn(1, num_parameters, |_, j| {
                if j == *index {
                    T::one()
                } else {
                    T::zero()
                }
            })),

            NodeKind::Negated(operand) => {
                let j = self.jacobian(operand, parameters)?;
                Ok(j.map(|x| -x))
            }

            NodeKind::SquareRoot(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                if value.is_nonpositive() {
                    return Err(EvaluationError::domain(
                        kind_name,
                        "operand",
                        format!("derivative of square root at {}", value),
                    ));
                }
                let root = value
                    .checked_sqrt()
                    .ok_or_else(|| EvaluationError::domain(kind_name, "operand", "negative operand"))?;
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, T::from_f64(0.5) / root))
            }

            NodeKind::Sine(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, value.cos()))
            }

            NodeKind::Cosine(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, -value.sin()))
            }

            NodeKind::Tangent(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                let cosine = value.cos();
                if cosine.is_zero() {
                    return Err(EvaluationError::domain(
                        kind_name,
                        "operand",
                        format!("cosine of {} is zero", value),
                    ));
                }
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, T::one() / cosine.squared()))
            }

            NodeKind::Arcsine(operand) | NodeKind::Arccosine(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                if value.at_or_beyond_unit() {
                    return Err(EvaluationError::domain(
                        kind_name,
                        "operand",
                        format!("derivative at {} is unbounded", value),
                    ));
                }
                let root = (T::one() - value.squared())
                    .checked_sqrt()
                    .ok_or_else(|| EvaluationError::domain(kind_name, "operand", "magnitude above one"))?;
                let sign = if matches!(node.kind(), NodeKind::Arcsine(_)) {
                    T::one()
                } else {
                    -T::one()
                };
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, sign / root))
            }

            NodeKind::Exponential(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, value.exp()))
            }

            NodeKind::Logarithm(operand) => {
                let value = self.scalar_value(operand, parameters)?;
                if value.is_nonpositive() {
                    return Err(EvaluationError::domain(
                        kind_name,
                        "operand",
                        format!("derivative of logarithm at {}", value),
                    ));
                }
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, T::one() / value))
            }

            NodeKind::Sum(first, second) => {
                let a = self.jacobian(first, parameters)?;
                let b = self.jacobian(second, parameters)?;
                Ok(a.zip_map(&*b, |x, y| x + y))
            }

            NodeKind::Difference(first, second) => {
                let a = self.jacobian(first, parameters)?;
                let b = self.jacobian(second, parameters)?;
                Ok(a.zip_map(&*b, |x, y| x - y))
            }

            NodeKind::Product {
                multiplier,
                multiplicand,
            } => {
                let m = self.scalar_value(multiplier, parameters)?;
                let x = self.evaluate(multiplicand, parameters)?;
                let jm = self.jacobian(multiplier, parameters)?;
                let jx = self.jacobian(multiplicand, parameters)?;
                let left = scaled_rows(&jx, m);
                Ok(left.zip_map(&outer(&x, &jm), |a, b| a + b))
            }

            NodeKind::Quotient { dividend, divisor } => {
                let d = self.scalar_value(divisor, parameters)?;
                if d.is_zero() {
                    return Err(EvaluationError::division_by_zero(kind_name));
                }
                let x = self.evaluate(dividend, parameters)?;
                let jx = self.jacobian(dividend, parameters)?;
                let jd = self.jacobian(divisor, parameters)?;
                let numerator = scaled_rows(&jx, d).zip_map(&outer(&x, &jd), |a, b| a - b);
                let denominator = d.squared();
                Ok(numerator.map(|value| value / denominator))
            }

            NodeKind::Power { base, exponent } => {
                let b = self.scalar_value(base, parameters)?;
                let jb = self.jacobian(base, parameters)?;
                if let Some(n) = integer_exponent(exponent) {
                    if n - 1 < 0 && b.is_zero() {
                        return Err(EvaluationError::domain(
                            kind_name,
                            "base",
                            format!("derivative of power {} at zero", n),
                        ));
                    }
                    let factor = T::from_f64(f64::from(n)) * b.powi(n - 1);
                    return Ok(scaled_rows(&jb, factor));
                }
                if b.is_nonpositive() {
                    return Err(EvaluationError::domain(
                        kind_name,
                        "base",
                        format!("derivative of power with base {}", b),
                    ));
                }
                let e = self.scalar_value(exponent, parameters)?;
                let je = self.jacobian(exponent, parameters)?;
                let value = b
                    .checked_powf(e)
                    .ok_or_else(|| EvaluationError::domain(kind_name, "base", format!("{} raised to {}", b, e)))?;
                let log = b
                    .checked_ln()
                    .ok_or_else(|| EvaluationError::domain(kind_name, "base", format!("logarithm of {}", b)))?;
                let ratio = e / b;
                Ok(DMatrix::from_fn(1, num_parameters, |_, j| {
                    value * (je[(0, j)] * log + ratio * jb[(0, j)])
                }))
            }

            NodeKind::Norm(operand) => {
                let x = self.evaluate(operand, parameters)?;
                let norm = self.column_norm(kind_name, &x)?;
                if norm.is_zero() {
                    return Err(EvaluationError::degenerate(kind_name, "norm of a zero vector has no derivative"));
                }
                let j = self.jacobian(operand, parameters)?;
                Ok(transposed_product(&x, &j).map(|value| value / norm))
            }

            NodeKind::SquaredNorm(operand) => {
                let x = self.evaluate(operand, parameters)?;
                let j = self.jacobian(operand, parameters)?;
                let two = T::from_f64(2.0);
                Ok(transposed_product(&x, &j).map(|value| two * value))
            }

            NodeKind::Normalized(operand) => {
                let x = self.evaluate(operand, parameters)?;
                let norm = self.column_norm(kind_name, &x)?;
                if norm.is_zero() {
                    return Err(EvaluationError::degenerate(kind_name, "cannot normalize a zero vector"));
                }
                let unit = x.map(|value| value / norm);
                let j = self.jacobian(operand, parameters)?;
                let projection = outer(&unit, &transposed_product(&unit, &j));
                Ok(j.zip_map(&projection, |a, b| (a - b) / norm))
            }

            NodeKind::DotProduct(first, second) => {
                let a = self.evaluate(first, parameters)?;
                let b = self.evaluate(second, parameters)?;
                let ja = self.jacobian(first, parameters)?;
                let jb = self.jacobian(second, parameters)?;
                Ok(transposed_product(&b, &ja).zip_map(&transposed_product(&a, &jb), |x, y| x + y))
            }

            NodeKind::CrossProduct(first, second) => {
                let a = self.evaluate(first, parameters)?;
                let b = self.evaluate(second, parameters)?;
                let ja = self.jacobian(first, parameters)?;
                let jb = self.jacobian(second, parameters)?;
                Ok(DMatrix::from_fn(3, num_parameters, |row, j| {
                    cross_column(&ja, j, &b, 0, row) + cross_column(&a, 0, &jb, j, row)
                }))
            }

            NodeKind::ScalarMultiplication { scale, operand } => {
                let j = self.jacobian(operand, parameters)?;
                Ok(scaled_rows(&j, T::from_f64(*scale)))
            }

            NodeKind::VectorAddition { operand, .. } => {
                let j = self.jacobian(operand, parameters)?;
                Ok((*j).clone())
            }

            NodeKind::MatrixMultiplication { matrix, operand } => {
                let j = self.jacobian(operand, parameters)?;
                Ok(constant_product(matrix, &j))
            }

            NodeKind::Components { operand, start, .. } => {
                let j = self.jacobian(operand, parameters)?;
                Ok(DMatrix::from_fn(dimensions, num_parameters, |row, col| j[(start + row, col)]))
            }

            NodeKind::Concatenation(first, second) => {
                let a = self.jacobian(first, parameters)?;
                let b = self.jacobian(second, parameters)?;
                let split = a.nrows();
                Ok(DMatrix::from_fn(dimensions, num_parameters, |row, col| {
                    if row < split {
                        a[(row, col)]
                    } else {
                        b[(row - split, col)]
                    }
                }))
            }

            NodeKind::Composition { outer, inner } => {
                let inner_values = self.evaluate(inner, parameters)?;
                let outer_jacobian = self.jacobian(outer, &inner_values)?;
                let inner_jacobian = self.jacobian(inner, parameters)?;
                Ok(matrix_product(&outer_jacobian, &inner_jacobian))
            }

            NodeKind::Elliptical { .. } => {
                // No closed form: evaluate the symbolic partial derivatives column by column
                let mut result = DMatrix::from_element(dimensions, num_parameters, T::zero());
                for index in 0..num_parameters {
                    let derivative = ExpressionNode::derivative(node, index);
                    let values = self.evaluate(&derivative, parameters)?;
                    for row in 0..dimensions {
                        result[(row, index)] = values[(row, 0)];
                    }
                }
                Ok(result)
            }
        }
    }

    fn scalar_value(&mut self, node: &NodePtr, parameters: &Rc<DMatrix<T>>) -> EvaluationResult<T> {
        let values = self.evaluate(node, parameters)?;
        Ok(values[(0, 0)])
    }

    fn column_norm(&self, kind_name: &'static str, values: &DMatrix<T>) -> EvaluationResult<T> {
        squared_column_norm(values, 0)
            .checked_sqrt()
            .ok_or_else(|| EvaluationError::domain(kind_name, "operand", "negative squared norm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Interval;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::f64::consts::FRAC_PI_2;

    fn point(values: &[f64]) -> Rc<DMatrix<f64>> {
        Rc::new(DMatrix::from_column_slice(values.len(), 1, values))
    }

    #[test]
    fn test_plane_jacobian() {
        // 2 + u - v
        let u = ExpressionNode::parameter(0, 2);
        let v = ExpressionNode::parameter(1, 2);
        let node = ExpressionNode::sum(
            &ExpressionNode::scalar_constant_node(2.0, 2),
            &ExpressionNode::difference(&u, &v),
        );
        let mut evaluator = Evaluator::new();
        let jacobian = evaluator.jacobian(&node, &point(&[0.3, 0.7])).unwrap();
        assert_eq!(jacobian[(0, 0)], 1.0);
        assert_eq!(jacobian[(0, 1)], -1.0);
    }

    #[test]
    fn test_tangent_jacobian_at_pole_fails() {
        let t = ExpressionNode::parameter(0, 1);
        let node = ExpressionNode::tan(&t);
        let mut evaluator = Evaluator::new();
        let error = evaluator.jacobian(&node, &point(&[FRAC_PI_2])).unwrap_err();
        assert!(matches!(error, EvaluationError::DomainViolation { kind: "Tangent", .. }));
    }

    #[test]
    fn test_normalized_jacobian_is_tangent_to_sphere() {
        let x = ExpressionNode::identity(3);
        let node = ExpressionNode::normalized(&x);
        let mut evaluator = Evaluator::new();
        let jacobian = evaluator.jacobian(&node, &point(&[3.0, 0.0, 4.0])).unwrap();
        // Moving along the radial direction does not change the unit vector
        let radial = DVector::from_vec(vec![0.6, 0.0, 0.8]);
        let change = &*jacobian * radial;
        assert!(change.norm() < 1e-12);
    }

    #[test]
    fn test_composition_chain_rule() {
        // sin(2t) composed: d/dt = 2 cos(2t)
        let t = ExpressionNode::parameter(0, 1);
        let outer = ExpressionNode::sin(&t);
        let inner = ExpressionNode::scaled(2.0, &t);
        let node = ExpressionNode::new(
            NodeKind::Composition {
                outer: outer.clone(),
                inner: inner.clone(),
            },
            1,
            1,
        );
        let mut evaluator = Evaluator::new();
        let jacobian = evaluator.jacobian(&node, &point(&[0.4])).unwrap();
        assert_relative_eq!(jacobian[(0, 0)], 2.0 * 0.8f64.cos(), epsilon = 1e-14);
    }

    #[test]
    fn test_interval_jacobian_encloses_point_jacobian() {
        let t = ExpressionNode::parameter(0, 1);
        let node = ExpressionNode::product(&ExpressionNode::sin(&t), &ExpressionNode::exp(&t));
        let mut point_evaluator = Evaluator::new();
        let mut box_evaluator = Evaluator::<Interval>::new();
        let bounds = box_evaluator
            .jacobian(&node, &Rc::new(DMatrix::from_element(1, 1, Interval::new(0.0, 1.0))))
            .unwrap();
        for &x in &[0.0, 0.25, 0.5, 1.0] {
            let value = point_evaluator.jacobian(&node, &point(&[x])).unwrap();
            assert!(bounds[(0, 0)].contains(value[(0, 0)]));
        }
    }

    #[test]
    fn test_jacobian_cache() {
        let t = ExpressionNode::parameter(0, 1);
        let sine = ExpressionNode::sin(&t);
        let node = ExpressionNode::sum(&sine, &sine);
        let mut evaluator = Evaluator::new();
        let parameters = point(&[0.1]);
        evaluator.jacobian(&node, &parameters).unwrap();
        let hits = evaluator.stats().hits;
        evaluator.jacobian(&node, &parameters).unwrap();
        assert_eq!(evaluator.stats().hits, hits + 1);
    }
}
