// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression node definitions

use nalgebra::{DMatrix, DVector};
use std::fmt;
use std::sync::Arc;

/// Shared reference to an immutable expression node
pub type NodePtr = Arc<ExpressionNode>;

/// One node of an expression DAG: a function from `R^num_parameters` to `R^num_dimensions`
#[derive(Debug)]
pub struct ExpressionNode {
    kind: NodeKind,
    num_dimensions: usize,
    num_parameters: usize,
}

/// Node kinds and their operands
#[derive(Debug, Clone)]
pub enum NodeKind {
    // Leaves
    Constant(DVector<f64>),
    Identity,
    Parameter(usize),

    // Elementwise scalar functions
    Negated(NodePtr),
    SquareRoot(NodePtr),
    Sine(NodePtr),
    Cosine(NodePtr),
    Tangent(NodePtr),
    Arcsine(NodePtr),
    Arccosine(NodePtr),
    Exponential(NodePtr),
    Logarithm(NodePtr),

    // Binary arithmetic
    Sum(NodePtr, NodePtr),
    Difference(NodePtr, NodePtr),
    /// Scalar multiplier times scalar or vector multiplicand
    Product {
        multiplier: NodePtr,
        multiplicand: NodePtr,
    },
    /// Scalar or vector dividend over scalar divisor
    Quotient {
        dividend: NodePtr,
        divisor: NodePtr,
    },
    Power {
        base: NodePtr,
        exponent: NodePtr,
    },

    // Linear algebra
    Norm(NodePtr),
    SquaredNorm(NodePtr),
    Normalized(NodePtr),
    DotProduct(NodePtr, NodePtr),
    CrossProduct(NodePtr, NodePtr),
    ScalarMultiplication {
        scale: f64,
        operand: NodePtr,
    },
    VectorAddition {
        operand: NodePtr,
        vector: DVector<f64>,
    },
    MatrixMultiplication {
        matrix: DMatrix<f64>,
        operand: NodePtr,
    },

    // Structure
    Components {
        operand: NodePtr,
        start: usize,
        count: usize,
    },
    Concatenation(NodePtr, NodePtr),
    Composition {
        outer: NodePtr,
        inner: NodePtr,
    },

    /// `origin + basis * local(t)`, where `local` is built from sines and cosines of
    /// the parameters according to `convention`
    Elliptical {
        origin: DVector<f64>,
        basis: DMatrix<f64>,
        convention: Vec<bool>,
    },
}

impl NodeKind {
    /// Variant name, used in debug output and error reports
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Constant(_) => "Constant",
            NodeKind::Identity => "Identity",
            NodeKind::Parameter(_) => "Parameter",
            NodeKind::Negated(_) => "Negated",
            NodeKind::SquareRoot(_) => "SquareRoot",
            NodeKind::Sine(_) => "Sine",
            NodeKind::Cosine(_) => "Cosine",
            NodeKind::Tangent(_) => "Tangent",
            NodeKind::Arcsine(_) => "Arcsine",
            NodeKind::Arccosine(_) => "Arccosine",
            NodeKind::Exponential(_) => "Exponential",
            NodeKind::Logarithm(_) => "Logarithm",
            NodeKind::Sum(..) => "Sum",
            NodeKind::Difference(..) => "Difference",
            NodeKind::Product { .. } => "Product",
            NodeKind::Quotient { .. } => "Quotient",
            NodeKind::Power { .. } => "Power",
            NodeKind::Norm(_) => "Norm",
            NodeKind::SquaredNorm(_) => "SquaredNorm",
            NodeKind::Normalized(_) => "Normalized",
            NodeKind::DotProduct(..) => "DotProduct",
            NodeKind::CrossProduct(..) => "CrossProduct",
            NodeKind::ScalarMultiplication { .. } => "ScalarMultiplication",
            NodeKind::VectorAddition { .. } => "VectorAddition",
            NodeKind::MatrixMultiplication { .. } => "MatrixMultiplication",
            NodeKind::Components { .. } => "Components",
            NodeKind::Concatenation(..) => "Concatenation",
            NodeKind::Composition { .. } => "Composition",
            NodeKind::Elliptical { .. } => "Elliptical",
        }
    }

    /// Operand nodes in a fixed order
    pub fn operands(&self) -> Vec<&NodePtr> {
        match self {
            NodeKind::Constant(_)
            | NodeKind::Identity
            | NodeKind::Parameter(_)
            | NodeKind::Elliptical { .. } => Vec::new(),

            NodeKind::Negated(operand)
            | NodeKind::SquareRoot(operand)
            | NodeKind::Sine(operand)
            | NodeKind::Cosine(operand)
            | NodeKind::Tangent(operand)
            | NodeKind::Arcsine(operand)
            | NodeKind::Arccosine(operand)
            | NodeKind::Exponential(operand)
            | NodeKind::Logarithm(operand)
            | NodeKind::Norm(operand)
            | NodeKind::SquaredNorm(operand)
            | NodeKind::Normalized(operand)
            | NodeKind::ScalarMultiplication { operand, .. }
            | NodeKind::VectorAddition { operand, .. }
            | NodeKind::MatrixMultiplication { operand, .. }
            | NodeKind::Components { operand, .. } => vec![operand],

            NodeKind::Sum(first, second)
            | NodeKind::Difference(first, second)
            | NodeKind::DotProduct(first, second)
            | NodeKind::CrossProduct(first, second)
            | NodeKind::Concatenation(first, second) => vec![first, second],

            NodeKind::Product {
                multiplier,
                multiplicand,
            } => vec![multiplier, multiplicand],
            NodeKind::Quotient { dividend, divisor } => vec![dividend, divisor],
            NodeKind::Power { base, exponent } => vec![base, exponent],
            NodeKind::Composition { outer, inner } => vec![outer, inner],
        }
    }

    /// Same kind and payload with the operands replaced, in `operands()` order
    pub(crate) fn with_operands(&self, operands: Vec<NodePtr>) -> NodeKind {
        let mut operands = operands.into_iter();
        let mut next = || {
            operands
                .next()
                .unwrap_or_else(|| panic!("missing operand while rebuilding {}", self.name()))
        };
        match self {
            NodeKind::Constant(_) | NodeKind::Identity | NodeKind::Parameter(_) | NodeKind::Elliptical { .. } => {
                self.clone()
            }
            NodeKind::Negated(_) => NodeKind::Negated(next()),
            NodeKind::SquareRoot(_) => NodeKind::SquareRoot(next()),
            NodeKind::Sine(_) => NodeKind::Sine(next()),
            NodeKind::Cosine(_) => NodeKind::Cosine(next()),
            NodeKind::Tangent(_) => NodeKind::Tangent(next()),
            NodeKind::Arcsine(_) => NodeKind::Arcsine(next()),
            NodeKind::Arccosine(_) => NodeKind::Arccosine(next()),
            NodeKind::Exponential(_) => NodeKind::Exponential(next()),
            NodeKind::Logarithm(_) => NodeKind::Logarithm(next()),
            NodeKind::Norm(_) => NodeKind::Norm(next()),
            NodeKind::SquaredNorm(_) => NodeKind::SquaredNorm(next()),
            NodeKind::Normalized(_) => NodeKind::Normalized(next()),
            NodeKind::ScalarMultiplication { scale, .. } => NodeKind::ScalarMultiplication {
                scale: *scale,
                operand: next(),
            },
            NodeKind::VectorAddition { vector, .. } => NodeKind::VectorAddition {
                operand: next(),
                vector: vector.clone(),
            },
            NodeKind::MatrixMultiplication { matrix, .. } => NodeKind::MatrixMultiplication {
                matrix: matrix.clone(),
                operand: next(),
            },
            NodeKind::Components { start, count, .. } => NodeKind::Components {
                operand: next(),
                start: *start,
                count: *count,
            },
            NodeKind::Sum(..) => NodeKind::Sum(next(), next()),
            NodeKind::Difference(..) => NodeKind::Difference(next(), next()),
            NodeKind::DotProduct(..) => NodeKind::DotProduct(next(), next()),
            NodeKind::CrossProduct(..) => NodeKind::CrossProduct(next(), next()),
            NodeKind::Concatenation(..) => NodeKind::Concatenation(next(), next()),
            NodeKind::Product { .. } => NodeKind::Product {
                multiplier: next(),
                multiplicand: next(),
            },
            NodeKind::Quotient { .. } => NodeKind::Quotient {
                dividend: next(),
                divisor: next(),
            },
            NodeKind::Power { .. } => NodeKind::Power {
                base: next(),
                exponent: next(),
            },
            NodeKind::Composition { .. } => NodeKind::Composition {
                outer: next(),
                inner: next(),
            },
        }
    }

    /// Operand order does not matter for these kinds
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            NodeKind::Sum(..) | NodeKind::Product { .. } | NodeKind::DotProduct(..)
        )
    }
}

impl ExpressionNode {
    /// Wrap a kind with its dimensions; callers are responsible for consistency
    pub(crate) fn new(kind: NodeKind, num_dimensions: usize, num_parameters: usize) -> NodePtr {
        assert!(num_dimensions >= 1, "{} must have at least one dimension", kind.name());
        assert!(num_parameters >= 1, "{} must have at least one parameter", kind.name());
        Arc::new(Self {
            kind,
            num_dimensions,
            num_parameters,
        })
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn num_parameters(&self) -> usize {
        self.num_parameters
    }

    pub fn operands(&self) -> Vec<&NodePtr> {
        self.kind.operands()
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, NodeKind::Constant(_))
    }

    pub fn constant_value(&self) -> Option<&DVector<f64>> {
        match &self.kind {
            NodeKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    /// Constant whose every component is within tolerance of zero
    pub fn is_zero_constant(&self) -> bool {
        self.constant_value()
            .map(|value| value.iter().all(|x| x.abs() <= crate::numeric::ZERO_TOLERANCE))
            .unwrap_or(false)
    }

    /// Single-component constant value
    pub fn scalar_constant(&self) -> Option<f64> {
        self.constant_value()
            .filter(|value| value.len() == 1)
            .map(|value| value[0])
    }

    /// Number of distinct nodes reachable from this one (shared nodes counted once)
    pub fn node_count(&self) -> usize {
        let mut visited = ahash::AHashSet::new();
        let mut stack: Vec<&ExpressionNode> = vec![self];
        while let Some(node) = stack.pop() {
            if visited.insert(node as *const ExpressionNode as usize) {
                stack.extend(node.operands().into_iter().map(|operand| operand.as_ref()));
            }
        }
        visited.len()
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        write!(
            f,
            "{:indent$}R{} -> R{} | {}",
            "",
            self.num_parameters,
            self.num_dimensions,
            self.kind.name(),
            indent = indent
        )?;
        match &self.kind {
            NodeKind::Constant(value) => write!(f, " {:?}", value.as_slice())?,
            NodeKind::Parameter(index) => write!(f, " {}", index)?,
            NodeKind::ScalarMultiplication { scale, .. } => write!(f, " {}", scale)?,
            NodeKind::VectorAddition { vector, .. } => write!(f, " {:?}", vector.as_slice())?,
            NodeKind::Components { start, count, .. } => write!(f, " {}..{}", start, start + count)?,
            NodeKind::Elliptical { convention, .. } => write!(f, " {:?}", convention)?,
            _ => {}
        }
        writeln!(f)?;
        for operand in self.operands() {
            operand.write_tree(f, indent + 2)?;
        }
        Ok(())
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, 0)
    }
}
