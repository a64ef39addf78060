// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Simplifying node constructors
//!
//! Every builder checks dimensions (a mismatch is a programming error and panics),
//! then applies the algebraic shortcuts for its kind before falling back to a
//! plain node. Constant operands are folded whenever the folded value is in
//! domain; out-of-domain constants stay unfolded so the failure is reported by
//! evaluation.

use super::evaluator::Evaluator;
use super::node::{ExpressionNode, NodeKind, NodePtr};
use crate::numeric::ZERO_TOLERANCE;
use nalgebra::{DMatrix, DVector};
use std::rc::Rc;
use std::sync::Arc;

fn is_zero_vector(vector: &DVector<f64>) -> bool {
    vector.iter().all(|x| x.abs() <= ZERO_TOLERANCE)
}

fn is_identity_matrix(matrix: &DMatrix<f64>, sign: f64) -> bool {
    matrix.nrows() == matrix.ncols()
        && matrix.iter().enumerate().all(|(index, value)| {
            let (row, col) = (index % matrix.nrows(), index / matrix.nrows());
            let expected = if row == col { sign } else { 0.0 };
            (value - expected).abs() <= ZERO_TOLERANCE
        })
}

fn assert_same_parameters(kind: &str, first: &ExpressionNode, second: &ExpressionNode) {
    assert_eq!(
        first.num_parameters(),
        second.num_parameters(),
        "{}: operands have different parameter counts",
        kind
    );
}

fn assert_same_dimensions(kind: &str, first: &ExpressionNode, second: &ExpressionNode) {
    assert_eq!(
        first.num_dimensions(),
        second.num_dimensions(),
        "{}: operands have different dimensions",
        kind
    );
}

fn assert_scalar(kind: &str, node: &ExpressionNode) {
    assert_eq!(node.num_dimensions(), 1, "{}: operand must be one-dimensional", kind);
}

impl ExpressionNode {
    pub fn constant(value: DVector<f64>, num_parameters: usize) -> NodePtr {
        let num_dimensions = value.len();
        ExpressionNode::new(NodeKind::Constant(value), num_dimensions, num_parameters)
    }

    pub fn scalar_constant_node(value: f64, num_parameters: usize) -> NodePtr {
        ExpressionNode::constant(DVector::from_element(1, value), num_parameters)
    }

    pub fn zero(num_dimensions: usize, num_parameters: usize) -> NodePtr {
        ExpressionNode::constant(DVector::zeros(num_dimensions), num_parameters)
    }

    pub fn identity(num_parameters: usize) -> NodePtr {
        ExpressionNode::new(NodeKind::Identity, num_parameters, num_parameters)
    }

    pub fn parameter(index: usize, num_parameters: usize) -> NodePtr {
        assert!(
            index < num_parameters,
            "parameter index {} out of range for {} parameter(s)",
            index,
            num_parameters
        );
        ExpressionNode::new(NodeKind::Parameter(index), 1, num_parameters)
    }

    /// Replace an all-constant node by its value, when evaluation succeeds
    fn folded(node: NodePtr) -> NodePtr {
        if node.is_constant() || !node.operands().iter().all(|operand| operand.is_constant()) {
            return node;
        }
        let mut evaluator = Evaluator::<f64>::new();
        let parameters = Rc::new(DMatrix::zeros(node.num_parameters(), 1));
        match evaluator.evaluate(&node, &parameters) {
            Ok(values) if values.iter().all(|value| value.is_finite()) => {
                ExpressionNode::constant(values.column(0).into_owned(), node.num_parameters())
            }
            _ => node,
        }
    }

    pub fn negated(operand: &NodePtr) -> NodePtr {
        match operand.kind() {
            NodeKind::Constant(value) => ExpressionNode::constant(-value, operand.num_parameters()),
            NodeKind::Negated(inner) => Arc::clone(inner),
            NodeKind::ScalarMultiplication { scale, operand: inner } => {
                ExpressionNode::scaled(-scale, inner)
            }
            _ => ExpressionNode::new(
                NodeKind::Negated(Arc::clone(operand)),
                operand.num_dimensions(),
                operand.num_parameters(),
            ),
        }
    }

    fn elementwise(operand: &NodePtr, kind: NodeKind) -> NodePtr {
        assert_scalar(kind.name(), operand);
        ExpressionNode::folded(ExpressionNode::new(kind, 1, operand.num_parameters()))
    }

    pub fn sqrt(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::SquareRoot(Arc::clone(operand)))
    }

    pub fn sin(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Sine(Arc::clone(operand)))
    }

    pub fn cos(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Cosine(Arc::clone(operand)))
    }

    pub fn tan(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Tangent(Arc::clone(operand)))
    }

    pub fn asin(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Arcsine(Arc::clone(operand)))
    }

    pub fn acos(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Arccosine(Arc::clone(operand)))
    }

    pub fn exp(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Exponential(Arc::clone(operand)))
    }

    pub fn ln(operand: &NodePtr) -> NodePtr {
        ExpressionNode::elementwise(operand, NodeKind::Logarithm(Arc::clone(operand)))
    }

    pub fn sum(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_same_dimensions("Sum", first, second);
        assert_same_parameters("Sum", first, second);
        if let Some(value) = second.constant_value() {
            return ExpressionNode::translated(first, value);
        }
        if let Some(value) = first.constant_value() {
            return ExpressionNode::translated(second, value);
        }
        ExpressionNode::new(
            NodeKind::Sum(Arc::clone(first), Arc::clone(second)),
            first.num_dimensions(),
            first.num_parameters(),
        )
    }

    pub fn difference(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_same_dimensions("Difference", first, second);
        assert_same_parameters("Difference", first, second);
        if let Some(value) = second.constant_value() {
            return ExpressionNode::translated(first, &(-value));
        }
        if let Some(value) = first.constant_value() {
            return ExpressionNode::translated(&ExpressionNode::negated(second), value);
        }
        ExpressionNode::new(
            NodeKind::Difference(Arc::clone(first), Arc::clone(second)),
            first.num_dimensions(),
            first.num_parameters(),
        )
    }

    /// Product of two operands, at least one of them one-dimensional
    ///
    /// The scalar operand becomes the multiplier, preferring a constant one so
    /// that the result is a plain scaling.
    pub fn product(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_same_parameters("Product", first, second);
        let (multiplier, multiplicand) = match (first.num_dimensions(), second.num_dimensions()) {
            (1, 1) if !first.is_constant() && second.is_constant() => (second, first),
            (1, _) => (first, second),
            (_, 1) => (second, first),
            _ => panic!("Product: neither operand is one-dimensional"),
        };
        if let Some(scale) = multiplier.scalar_constant() {
            return ExpressionNode::scaled(scale, multiplicand);
        }
        if let Some(value) = multiplicand.constant_value() {
            if is_zero_vector(value) {
                return Arc::clone(multiplicand);
            }
            // Constant vector times scalar expression is a linear map of that expression
            let column = DMatrix::from_column_slice(value.len(), 1, value.as_slice());
            return ExpressionNode::transformed(&column, multiplier);
        }
        ExpressionNode::new(
            NodeKind::Product {
                multiplier: Arc::clone(multiplier),
                multiplicand: Arc::clone(multiplicand),
            },
            multiplicand.num_dimensions(),
            multiplicand.num_parameters(),
        )
    }

    pub fn quotient(dividend: &NodePtr, divisor: &NodePtr) -> NodePtr {
        assert_scalar("Quotient", divisor);
        assert_same_parameters("Quotient", dividend, divisor);
        if let Some(value) = divisor.scalar_constant() {
            if value.abs() > ZERO_TOLERANCE {
                return ExpressionNode::scaled(1.0 / value, dividend);
            }
        } else if dividend.is_zero_constant() {
            return Arc::clone(dividend);
        }
        ExpressionNode::new(
            NodeKind::Quotient {
                dividend: Arc::clone(dividend),
                divisor: Arc::clone(divisor),
            },
            dividend.num_dimensions(),
            dividend.num_parameters(),
        )
    }

    pub fn power(base: &NodePtr, exponent: &NodePtr) -> NodePtr {
        assert_scalar("Power", base);
        assert_scalar("Power", exponent);
        assert_same_parameters("Power", base, exponent);
        if let Some(value) = exponent.scalar_constant() {
            if value == 1.0 {
                return Arc::clone(base);
            }
            if value == 0.0 {
                return ExpressionNode::scalar_constant_node(1.0, base.num_parameters());
            }
        }
        ExpressionNode::folded(ExpressionNode::new(
            NodeKind::Power {
                base: Arc::clone(base),
                exponent: Arc::clone(exponent),
            },
            1,
            base.num_parameters(),
        ))
    }

    pub fn norm(operand: &NodePtr) -> NodePtr {
        match operand.kind() {
            NodeKind::Normalized(_) => ExpressionNode::scalar_constant_node(1.0, operand.num_parameters()),
            NodeKind::Negated(inner) => ExpressionNode::norm(inner),
            _ => ExpressionNode::folded(ExpressionNode::new(
                NodeKind::Norm(Arc::clone(operand)),
                1,
                operand.num_parameters(),
            )),
        }
    }

    pub fn squared_norm(operand: &NodePtr) -> NodePtr {
        match operand.kind() {
            NodeKind::SquareRoot(inner) => Arc::clone(inner),
            NodeKind::Negated(inner) => ExpressionNode::squared_norm(inner),
            NodeKind::Normalized(_) => ExpressionNode::scalar_constant_node(1.0, operand.num_parameters()),
            _ => ExpressionNode::folded(ExpressionNode::new(
                NodeKind::SquaredNorm(Arc::clone(operand)),
                1,
                operand.num_parameters(),
            )),
        }
    }

    pub fn normalized(operand: &NodePtr) -> NodePtr {
        match operand.kind() {
            NodeKind::Normalized(_) => Arc::clone(operand),
            NodeKind::Negated(inner) => ExpressionNode::negated(&ExpressionNode::normalized(inner)),
            _ => ExpressionNode::folded(ExpressionNode::new(
                NodeKind::Normalized(Arc::clone(operand)),
                operand.num_dimensions(),
                operand.num_parameters(),
            )),
        }
    }

    pub fn dot(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_same_dimensions("DotProduct", first, second);
        assert_same_parameters("DotProduct", first, second);
        if first.num_dimensions() == 1 {
            return ExpressionNode::product(first, second);
        }
        if first.is_zero_constant() || second.is_zero_constant() {
            return ExpressionNode::zero(1, first.num_parameters());
        }
        ExpressionNode::folded(ExpressionNode::new(
            NodeKind::DotProduct(Arc::clone(first), Arc::clone(second)),
            1,
            first.num_parameters(),
        ))
    }

    pub fn cross(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_eq!(first.num_dimensions(), 3, "CrossProduct: operands must be three-dimensional");
        assert_same_dimensions("CrossProduct", first, second);
        assert_same_parameters("CrossProduct", first, second);
        if first.is_zero_constant() || second.is_zero_constant() {
            return ExpressionNode::zero(3, first.num_parameters());
        }
        ExpressionNode::folded(ExpressionNode::new(
            NodeKind::CrossProduct(Arc::clone(first), Arc::clone(second)),
            3,
            first.num_parameters(),
        ))
    }

    pub fn scaled(scale: f64, operand: &NodePtr) -> NodePtr {
        if scale.abs() <= ZERO_TOLERANCE {
            return ExpressionNode::zero(operand.num_dimensions(), operand.num_parameters());
        }
        if (scale - 1.0).abs() <= ZERO_TOLERANCE {
            return Arc::clone(operand);
        }
        if (scale + 1.0).abs() <= ZERO_TOLERANCE {
            return ExpressionNode::negated(operand);
        }
        match operand.kind() {
            NodeKind::Constant(value) => ExpressionNode::constant(value * scale, operand.num_parameters()),
            NodeKind::ScalarMultiplication { scale: inner_scale, operand: inner } => {
                ExpressionNode::scaled(scale * inner_scale, inner)
            }
            NodeKind::Negated(inner) => ExpressionNode::scaled(-scale, inner),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => ExpressionNode::elliptical(origin * scale, basis * scale, convention.clone()),
            _ => ExpressionNode::new(
                NodeKind::ScalarMultiplication {
                    scale,
                    operand: Arc::clone(operand),
                },
                operand.num_dimensions(),
                operand.num_parameters(),
            ),
        }
    }

    pub fn translated(operand: &NodePtr, vector: &DVector<f64>) -> NodePtr {
        assert_eq!(
            operand.num_dimensions(),
            vector.len(),
            "VectorAddition: vector has wrong dimension"
        );
        if is_zero_vector(vector) {
            return Arc::clone(operand);
        }
        match operand.kind() {
            NodeKind::Constant(value) => ExpressionNode::constant(value + vector, operand.num_parameters()),
            NodeKind::VectorAddition {
                operand: inner,
                vector: inner_vector,
            } => ExpressionNode::translated(inner, &(inner_vector + vector)),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => ExpressionNode::elliptical(origin + vector, basis.clone(), convention.clone()),
            _ => ExpressionNode::new(
                NodeKind::VectorAddition {
                    operand: Arc::clone(operand),
                    vector: vector.clone(),
                },
                operand.num_dimensions(),
                operand.num_parameters(),
            ),
        }
    }

    /// Linear transformation `matrix * operand`; the output dimension is `matrix.nrows()`
    pub fn transformed(matrix: &DMatrix<f64>, operand: &NodePtr) -> NodePtr {
        assert_eq!(
            matrix.ncols(),
            operand.num_dimensions(),
            "MatrixMultiplication: matrix has {} columns but operand has {} dimensions",
            matrix.ncols(),
            operand.num_dimensions()
        );
        assert!(matrix.nrows() >= 1, "MatrixMultiplication: empty matrix");
        if matrix.iter().all(|x| x.abs() <= ZERO_TOLERANCE) {
            return ExpressionNode::zero(matrix.nrows(), operand.num_parameters());
        }
        if matrix.nrows() == 1 && matrix.ncols() == 1 {
            return ExpressionNode::scaled(matrix[(0, 0)], operand);
        }
        if is_identity_matrix(matrix, 1.0) {
            return Arc::clone(operand);
        }
        if is_identity_matrix(matrix, -1.0) {
            return ExpressionNode::negated(operand);
        }
        match operand.kind() {
            NodeKind::Constant(value) => ExpressionNode::constant(matrix * value, operand.num_parameters()),
            NodeKind::MatrixMultiplication {
                matrix: inner_matrix,
                operand: inner,
            } => ExpressionNode::transformed(&(matrix * inner_matrix), inner),
            NodeKind::ScalarMultiplication { scale, operand: inner } => {
                ExpressionNode::transformed(&(matrix * *scale), inner)
            }
            NodeKind::Negated(inner) => ExpressionNode::transformed(&(-matrix), inner),
            NodeKind::VectorAddition {
                operand: inner,
                vector,
            } => ExpressionNode::translated(&ExpressionNode::transformed(matrix, inner), &(matrix * vector)),
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            } => ExpressionNode::elliptical(matrix * origin, matrix * basis, convention.clone()),
            _ => ExpressionNode::new(
                NodeKind::MatrixMultiplication {
                    matrix: matrix.clone(),
                    operand: Arc::clone(operand),
                },
                matrix.nrows(),
                operand.num_parameters(),
            ),
        }
    }

    pub fn components(operand: &NodePtr, start: usize, count: usize) -> NodePtr {
        assert!(count >= 1, "Components: empty range");
        assert!(
            start + count <= operand.num_dimensions(),
            "Components: range {}..{} exceeds {} dimensions",
            start,
            start + count,
            operand.num_dimensions()
        );
        if start == 0 && count == operand.num_dimensions() {
            return Arc::clone(operand);
        }
        let num_parameters = operand.num_parameters();
        match operand.kind() {
            NodeKind::Constant(value) => {
                ExpressionNode::constant(value.rows(start, count).into_owned(), num_parameters)
            }
            NodeKind::Identity if count == 1 => ExpressionNode::parameter(start, num_parameters),
            NodeKind::Components {
                operand: inner,
                start: inner_start,
                ..
            } => ExpressionNode::components(inner, inner_start + start, count),
            NodeKind::Concatenation(first, second) => {
                let split = first.num_dimensions();
                if start + count <= split {
                    ExpressionNode::components(first, start, count)
                } else if start >= split {
                    ExpressionNode::components(second, start - split, count)
                } else {
                    ExpressionNode::new(
                        NodeKind::Components {
                            operand: Arc::clone(operand),
                            start,
                            count,
                        },
                        count,
                        num_parameters,
                    )
                }
            }
            NodeKind::Negated(inner) => {
                ExpressionNode::negated(&ExpressionNode::components(inner, start, count))
            }
            NodeKind::ScalarMultiplication { scale, operand: inner } => {
                ExpressionNode::scaled(*scale, &ExpressionNode::components(inner, start, count))
            }
            NodeKind::VectorAddition {
                operand: inner,
                vector,
            } => ExpressionNode::translated(
                &ExpressionNode::components(inner, start, count),
                &vector.rows(start, count).into_owned(),
            ),
            NodeKind::MatrixMultiplication {
                matrix,
                operand: inner,
            } => ExpressionNode::transformed(&matrix.rows(start, count).into_owned(), inner),
            _ => ExpressionNode::new(
                NodeKind::Components {
                    operand: Arc::clone(operand),
                    start,
                    count,
                },
                count,
                num_parameters,
            ),
        }
    }

    pub fn concatenated(first: &NodePtr, second: &NodePtr) -> NodePtr {
        assert_same_parameters("Concatenation", first, second);
        if let (Some(head), Some(tail)) = (first.constant_value(), second.constant_value()) {
            let value = DVector::from_iterator(
                head.len() + tail.len(),
                head.iter().chain(tail.iter()).copied(),
            );
            return ExpressionNode::constant(value, first.num_parameters());
        }
        ExpressionNode::new(
            NodeKind::Concatenation(Arc::clone(first), Arc::clone(second)),
            first.num_dimensions() + second.num_dimensions(),
            first.num_parameters(),
        )
    }

    /// Substitute `inner` for the parameters of `outer`
    pub fn composed(outer: &NodePtr, inner: &NodePtr) -> NodePtr {
        assert_eq!(
            inner.num_dimensions(),
            outer.num_parameters(),
            "Composition: inner expression has {} dimensions but outer expects {} parameters",
            inner.num_dimensions(),
            outer.num_parameters()
        );
        let num_parameters = inner.num_parameters();
        match outer.kind() {
            NodeKind::Constant(value) => return ExpressionNode::constant(value.clone(), num_parameters),
            NodeKind::Identity => return Arc::clone(inner),
            NodeKind::Parameter(index) => return ExpressionNode::components(inner, *index, 1),
            _ => {}
        }
        if let NodeKind::Identity = inner.kind() {
            return Arc::clone(outer);
        }
        if let Some(value) = inner.constant_value() {
            let mut evaluator = Evaluator::<f64>::new();
            let parameters = Rc::new(DMatrix::from_column_slice(value.len(), 1, value.as_slice()));
            if let Ok(result) = evaluator.evaluate(outer, &parameters) {
                if result.iter().all(|x| x.is_finite()) {
                    return ExpressionNode::constant(result.column(0).into_owned(), num_parameters);
                }
            }
        }
        match outer.kind() {
            NodeKind::Composition {
                outer: outermost,
                inner: middle,
            } => ExpressionNode::composed(outermost, &ExpressionNode::composed(middle, inner)),
            NodeKind::Negated(operand) => ExpressionNode::negated(&ExpressionNode::composed(operand, inner)),
            NodeKind::ScalarMultiplication { scale, operand } => {
                ExpressionNode::scaled(*scale, &ExpressionNode::composed(operand, inner))
            }
            NodeKind::VectorAddition { operand, vector } => {
                ExpressionNode::translated(&ExpressionNode::composed(operand, inner), vector)
            }
            NodeKind::MatrixMultiplication { matrix, operand } => {
                ExpressionNode::transformed(matrix, &ExpressionNode::composed(operand, inner))
            }
            NodeKind::Components { operand, start, count } => {
                ExpressionNode::components(&ExpressionNode::composed(operand, inner), *start, *count)
            }
            NodeKind::Concatenation(first, second) => ExpressionNode::concatenated(
                &ExpressionNode::composed(first, inner),
                &ExpressionNode::composed(second, inner),
            ),
            _ => ExpressionNode::new(
                NodeKind::Composition {
                    outer: Arc::clone(outer),
                    inner: Arc::clone(inner),
                },
                outer.num_dimensions(),
                num_parameters,
            ),
        }
    }

    /// Closed-form elliptical function `origin + basis * local(t)`
    ///
    /// `basis` has one more column than there are parameters; `convention[i]`
    /// selects whether parameter `i` contributes its cosine (`true`) or its sine
    /// to its own row.
    pub fn elliptical(origin: DVector<f64>, basis: DMatrix<f64>, convention: Vec<bool>) -> NodePtr {
        assert_eq!(origin.len(), basis.nrows(), "Elliptical: origin and basis dimensions differ");
        assert_eq!(
            basis.ncols(),
            convention.len() + 1,
            "Elliptical: basis needs one more column than there are parameters"
        );
        let num_dimensions = origin.len();
        let num_parameters = convention.len();
        ExpressionNode::new(
            NodeKind::Elliptical {
                origin,
                basis,
                convention,
            },
            num_dimensions,
            num_parameters,
        )
    }
}
