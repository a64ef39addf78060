// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Symbolic differentiation rules

use super::elliptical;
use super::node::{ExpressionNode, NodeKind, NodePtr};
use ahash::AHashMap;
use nalgebra::DVector;
use std::sync::Arc;

/// Node address -> (node kept alive, its derivative), scoped to one call
type DerivativeMemo = AHashMap<usize, (NodePtr, NodePtr)>;

impl ExpressionNode {
    /// Partial derivative of `node` with respect to parameter `index`
    ///
    /// The result is built with the simplifying constructors, so derivatives of
    /// constant subtrees collapse to zero constants, but it is not deduplicated;
    /// the facade deduplicates before handing it out. Each distinct node is
    /// differentiated once per call, so operands shared in the input stay
    /// shared in the result.
    pub fn derivative(node: &NodePtr, index: usize) -> NodePtr {
        assert!(
            index < node.num_parameters(),
            "derivative index {} out of range for {} parameter(s)",
            index,
            node.num_parameters()
        );
        let mut memo = DerivativeMemo::new();
        let result = ExpressionNode::memoized_derivative(node, index, &mut memo);
        tracing::trace!(kind = node.kind_name(), index, nodes = memo.len(), "differentiated");
        result
    }

    fn memoized_derivative(node: &NodePtr, index: usize, memo: &mut DerivativeMemo) -> NodePtr {
        let key = Arc::as_ptr(node) as usize;
        if let Some((_, derivative)) = memo.get(&key) {
            return Arc::clone(derivative);
        }
        let result = ExpressionNode::derivative_kind(node, index, memo);
        memo.insert(key, (Arc::clone(node), Arc::clone(&result)));
        result
    }

    fn derivative_kind(node: &NodePtr, index: usize, memo: &mut DerivativeMemo) -> NodePtr {
        let num_parameters = node.num_parameters();
        let mut d = |operand: &NodePtr| ExpressionNode::memoized_derivative(operand, index, memo);

        match node.kind() {
            NodeKind::Constant(value) => ExpressionNode::zero(value.len(), num_parameters),

            NodeKind::Identity => {
                let mut unit = DVector::zeros(num_parameters);
                unit[index] = 1.0;
                ExpressionNode::constant(unit, num_parameters)
            }

            NodeKind::Parameter(selected) => {
                let value = if *selected == index { 1.0 } else { 0.0 };
                ExpressionNode::scalar_constant_node(value, num_parameters)
            }

            NodeKind::Negated(operand) => ExpressionNode::negated(&d(operand)),

            // 0.5 f' / sqrt(f)
            NodeKind::SquareRoot(operand) => {
                ExpressionNode::quotient(&ExpressionNode::scaled(0.5, &d(operand)), node)
            }

            NodeKind::Sine(operand) => ExpressionNode::product(&ExpressionNode::cos(operand), &d(operand)),

            NodeKind::Cosine(operand) => ExpressionNode::negated(&ExpressionNode::product(
                &ExpressionNode::sin(operand),
                &d(operand),
            )),

            // f' / cos(f)^2
            NodeKind::Tangent(operand) => ExpressionNode::quotient(
                &d(operand),
                &ExpressionNode::squared_norm(&ExpressionNode::cos(operand)),
            ),

            // +-f' / sqrt(1 - f^2)
            NodeKind::Arcsine(operand) | NodeKind::Arccosine(operand) => {
                let one = ExpressionNode::scalar_constant_node(1.0, num_parameters);
                let root = ExpressionNode::sqrt(&ExpressionNode::difference(
                    &one,
                    &ExpressionNode::squared_norm(operand),
                ));
                let rate = ExpressionNode::quotient(&d(operand), &root);
                if matches!(node.kind(), NodeKind::Arcsine(_)) {
                    rate
                } else {
                    ExpressionNode::negated(&rate)
                }
            }

            NodeKind::Exponential(operand) => ExpressionNode::product(node, &d(operand)),

            NodeKind::Logarithm(operand) => ExpressionNode::quotient(&d(operand), operand),

            NodeKind::Sum(first, second) => ExpressionNode::sum(&d(first), &d(second)),

            NodeKind::Difference(first, second) => ExpressionNode::difference(&d(first), &d(second)),

            NodeKind::Product {
                multiplier,
                multiplicand,
            } => ExpressionNode::sum(
                &ExpressionNode::product(&d(multiplier), multiplicand),
                &ExpressionNode::product(multiplier, &d(multiplicand)),
            ),

            // (f' g - f g') / g^2
            NodeKind::Quotient { dividend, divisor } => ExpressionNode::quotient(
                &ExpressionNode::difference(
                    &ExpressionNode::product(divisor, &d(dividend)),
                    &ExpressionNode::product(&d(divisor), dividend),
                ),
                &ExpressionNode::squared_norm(divisor),
            ),

            NodeKind::Power { base, exponent } => match exponent.scalar_constant() {
                // c * f^(c - 1) * f'
                Some(value) => {
                    let reduced = ExpressionNode::power(
                        base,
                        &ExpressionNode::scalar_constant_node(value - 1.0, num_parameters),
                    );
                    ExpressionNode::scaled(value, &ExpressionNode::product(&reduced, &d(base)))
                }
                // (g' ln f + g f' / f) * f^g
                None => {
                    let log_term = ExpressionNode::product(&d(exponent), &ExpressionNode::ln(base));
                    let ratio_term = ExpressionNode::quotient(
                        &ExpressionNode::product(exponent, &d(base)),
                        base,
                    );
                    ExpressionNode::product(&ExpressionNode::sum(&log_term, &ratio_term), node)
                }
            },

            // f' . normalized(f)
            NodeKind::Norm(operand) => ExpressionNode::dot(&d(operand), &ExpressionNode::normalized(operand)),

            NodeKind::SquaredNorm(operand) => {
                ExpressionNode::scaled(2.0, &ExpressionNode::dot(operand, &d(operand)))
            }

            // (f' - (f' . n) n) / |f|
            NodeKind::Normalized(operand) => {
                let rate = d(operand);
                let radial = ExpressionNode::product(&ExpressionNode::dot(&rate, node), node);
                ExpressionNode::quotient(
                    &ExpressionNode::difference(&rate, &radial),
                    &ExpressionNode::norm(operand),
                )
            }

            NodeKind::DotProduct(first, second) => ExpressionNode::sum(
                &ExpressionNode::dot(&d(first), second),
                &ExpressionNode::dot(first, &d(second)),
            ),

            NodeKind::CrossProduct(first, second) => ExpressionNode::sum(
                &ExpressionNode::cross(&d(first), second),
                &ExpressionNode::cross(first, &d(second)),
            ),

            NodeKind::ScalarMultiplication { scale, operand } => ExpressionNode::scaled(*scale, &d(operand)),

            NodeKind::VectorAddition { operand, .. } => d(operand),

            NodeKind::MatrixMultiplication { matrix, operand } => ExpressionNode::transformed(matrix, &d(operand)),

            NodeKind::Components { operand, start, count } => {
                ExpressionNode::components(&d(operand), *start, *count)
            }

            NodeKind::Concatenation(first, second) => ExpressionNode::concatenated(&d(first), &d(second)),

            // sum_i (d outer / d p_i)(inner) * d inner_i / dt
            NodeKind::Composition { outer, inner } => {
                let inner_rate = d(inner);
                (0..outer.num_parameters())
                    .map(|i| {
                        let outer_rate = ExpressionNode::composed(&ExpressionNode::derivative(outer, i), inner);
                        ExpressionNode::product(&ExpressionNode::components(&inner_rate, i, 1), &outer_rate)
                    })
                    .reduce(|total, term| ExpressionNode::sum(&total, &term))
                    .unwrap_or_else(|| ExpressionNode::zero(node.num_dimensions(), num_parameters))
            }

            NodeKind::Elliptical {
                basis, convention, ..
            } => elliptical::derivative(basis, convention, index),
        }
    }

    /// Chain of derivatives `node`, `node'`, `node''`, ... with respect to one parameter
    pub fn derivatives(node: &NodePtr, index: usize, order: usize) -> Vec<NodePtr> {
        let mut result = vec![Arc::clone(node)];
        for _ in 0..order {
            let next = ExpressionNode::derivative(&result[result.len() - 1], index);
            result.push(next);
        }
        result
    }
}
