// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression evaluator with call-scoped caching
//!
//! An `Evaluator` is created for one top-level evaluation and dropped afterwards.
//! Results are cached by `(node address, parameter batch address)`; each cache
//! entry holds a reference to both so neither address can be reused while the
//! evaluator is alive.

use super::elliptical;
use super::error::{EvaluationError, EvaluationResult};
use super::node::{ExpressionNode, NodeKind, NodePtr};
use crate::numeric::EvalScalar;
use ahash::AHashMap;
use nalgebra::DMatrix;
use std::rc::Rc;
use std::sync::Arc;

type CacheKey = (usize, usize);

struct CacheEntry<T: EvalScalar> {
    _node: NodePtr,
    _parameters: Rc<DMatrix<T>>,
    result: Rc<DMatrix<T>>,
}

/// Cache statistics for one evaluator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorStats {
    pub hits: usize,
    pub misses: usize,
}

/// Evaluator over exact (`f64`) or interval scalars
pub struct Evaluator<T: EvalScalar> {
    values: AHashMap<CacheKey, CacheEntry<T>>,
    jacobians: AHashMap<CacheKey, CacheEntry<T>>,
    stats: EvaluatorStats,
}

fn cache_key<T: EvalScalar>(node: &NodePtr, parameters: &Rc<DMatrix<T>>) -> CacheKey {
    (Arc::as_ptr(node) as usize, Rc::as_ptr(parameters) as usize)
}

impl<T: EvalScalar> Evaluator<T> {
    pub fn new() -> Self {
        Self {
            values: AHashMap::new(),
            jacobians: AHashMap::new(),
            stats: EvaluatorStats::default(),
        }
    }

    pub fn stats(&self) -> EvaluatorStats {
        self.stats
    }

    /// Evaluate `node` for every column of `parameters` (`num_parameters x n`),
    /// returning a `num_dimensions x n` batch
    pub fn evaluate(
        &mut self,
        node: &NodePtr,
        parameters: &Rc<DMatrix<T>>,
    ) -> EvaluationResult<Rc<DMatrix<T>>> {
        assert_eq!(
            parameters.nrows(),
            node.num_parameters(),
            "{} expects {} parameter rows, got {}",
            node.kind_name(),
            node.num_parameters(),
            parameters.nrows()
        );
        if let NodeKind::Identity = node.kind() {
            return Ok(Rc::clone(parameters));
        }

        let key = cache_key(node, parameters);
        if let Some(entry) = self.values.get(&key) {
            self.stats.hits += 1;
            tracing::trace!(kind = node.kind_name(), scalar = T::KIND, "value cache hit");
            return Ok(Rc::clone(&entry.result));
        }
        self.stats.misses += 1;

        let result = Rc::new(self.evaluate_kind(node, parameters)?);
        self.values.insert(
            key,
            CacheEntry {
                _node: Arc::clone(node),
                _parameters: Rc::clone(parameters),
                result: Rc::clone(&result),
            },
        );
        Ok(result)
    }

    pub(super) fn cached_jacobian(
        &mut self,
        node: &NodePtr,
        parameters: &Rc<DMatrix<T>>,
    ) -> Option<Rc<DMatrix<T>>> {
        let key = cache_key(node, parameters);
        let found = self.jacobians.get(&key).map(|entry| Rc::clone(&entry.result));
        if found.is_some() {
            self.stats.hits += 1;
            tracing::trace!(kind = node.kind_name(), scalar = T::KIND, "jacobian cache hit");
        } else {
            self.stats.misses += 1;
        }
        found
    }

    pub(super) fn store_jacobian(
        &mut self,
        node: &NodePtr,
        parameters: &Rc<DMatrix<T>>,
        result: Rc<DMatrix<T>>,
    ) {
        self.jacobians.insert(
            cache_key(node, parameters),
            CacheEntry {
                _node: Arc::clone(node),
                _parameters: Rc::clone(parameters),
                result,
            },
        );
    }

    fn evaluate_kind(&mut self, node: &NodePtr, parameters: &Rc<DMatrix<T>>) -> EvaluationResult<DMatrix<T>> {
        match node.kind() {
            NodeKind::Composition { outer, inner } => {
                let inner_values = self.evaluate(inner, parameters)?;
                let outer_values = self.evaluate(outer, &inner_values)?;
                Ok((*outer_values).clone())
            }
            kind => {
                let operands = kind
                    .operands()
                    .into_iter()
                    .map(|operand| self.evaluate(operand, parameters))
                    .collect::<EvaluationResult<Vec<_>>>()?;
                let views: Vec<&DMatrix<T>> = operands.iter().map(|values| &**values).collect();
                apply_kind(node, &views, parameters)
            }
        }
    }
}

/// Value of `node` given the values of its operands, in `operands()` order,
/// for the same parameter batch
///
/// For a composition the inner operand is not used: `operands[0]` must already
/// hold the outer expression evaluated at the inner values.
pub(super) fn apply_kind<T: EvalScalar>(
    node: &ExpressionNode,
    operands: &[&DMatrix<T>],
    parameters: &DMatrix<T>,
) -> EvaluationResult<DMatrix<T>> {
    let kind_name = node.kind_name();
    let columns = parameters.ncols();
    let dimensions = node.num_dimensions();
    let first = || operands[0];
    let second = || operands[1];

    match node.kind() {
        NodeKind::Constant(value) => Ok(DMatrix::from_fn(dimensions, columns, |row, _| {
            T::from_f64(value[row])
        })),

        NodeKind::Identity => Ok(parameters.clone()),

        NodeKind::Parameter(index) => Ok(DMatrix::from_fn(1, columns, |_, col| parameters[(*index, col)])),

        NodeKind::Negated(_) => Ok(first().map(|x| -x)),

        NodeKind::SquareRoot(_) => map_checked(first(), |x| {
            x.checked_sqrt()
                .ok_or_else(|| EvaluationError::domain(kind_name, "operand", format!("square root of {}", x)))
        }),

        NodeKind::Sine(_) => Ok(first().map(|x| x.sin())),

        NodeKind::Cosine(_) => Ok(first().map(|x| x.cos())),

        NodeKind::Tangent(_) => Ok(first().map(|x| x.tan())),

        NodeKind::Arcsine(_) => map_checked(first(), |x| {
            x.checked_asin()
                .ok_or_else(|| EvaluationError::domain(kind_name, "operand", format!("arcsine of {}", x)))
        }),

        NodeKind::Arccosine(_) => map_checked(first(), |x| {
            x.checked_acos()
                .ok_or_else(|| EvaluationError::domain(kind_name, "operand", format!("arccosine of {}", x)))
        }),

        NodeKind::Exponential(_) => Ok(first().map(|x| x.exp())),

        NodeKind::Logarithm(_) => map_checked(first(), |x| {
            x.checked_ln()
                .ok_or_else(|| EvaluationError::domain(kind_name, "operand", format!("logarithm of {}", x)))
        }),

        NodeKind::Sum(..) => Ok(first().zip_map(second(), |x, y| x + y)),

        NodeKind::Difference(..) => Ok(first().zip_map(second(), |x, y| x - y)),

        NodeKind::Product { .. } => {
            let (m, x) = (first(), second());
            Ok(DMatrix::from_fn(dimensions, columns, |row, col| m[(0, col)] * x[(row, col)]))
        }

        NodeKind::Quotient { .. } => {
            let (x, d) = (first(), second());
            if let Some(col) = (0..columns).find(|&col| d[(0, col)].is_zero()) {
                tracing::debug!(column = col, "zero divisor");
                return Err(EvaluationError::division_by_zero(kind_name));
            }
            Ok(DMatrix::from_fn(dimensions, columns, |row, col| x[(row, col)] / d[(0, col)]))
        }

        NodeKind::Power { exponent, .. } => {
            let b = first();
            if let Some(n) = integer_exponent(exponent) {
                return map_checked(b, |x| {
                    if n < 0 && x.is_zero() {
                        Err(EvaluationError::domain(
                            kind_name,
                            "base",
                            format!("zero raised to negative power {}", n),
                        ))
                    } else {
                        Ok(x.powi(n))
                    }
                });
            }
            let e = second();
            let values = (0..columns)
                .map(|col| {
                    let (x, y) = (b[(0, col)], e[(0, col)]);
                    x.checked_powf(y)
                        .ok_or_else(|| EvaluationError::domain(kind_name, "base", format!("{} raised to {}", x, y)))
                })
                .collect::<EvaluationResult<Vec<T>>>()?;
            Ok(DMatrix::from_vec(1, columns, values))
        }

        NodeKind::Norm(_) => {
            let x = first();
            let values = (0..columns)
                .map(|col| {
                    squared_column_norm(x, col)
                        .checked_sqrt()
                        .ok_or_else(|| EvaluationError::domain(kind_name, "operand", "negative squared norm"))
                })
                .collect::<EvaluationResult<Vec<T>>>()?;
            Ok(DMatrix::from_vec(1, columns, values))
        }

        NodeKind::SquaredNorm(_) => {
            let x = first();
            Ok(DMatrix::from_fn(1, columns, |_, col| squared_column_norm(x, col)))
        }

        NodeKind::Normalized(_) => {
            let x = first();
            let mut result = x.clone();
            for col in 0..columns {
                let norm = squared_column_norm(x, col)
                    .checked_sqrt()
                    .ok_or_else(|| EvaluationError::domain(kind_name, "operand", "negative squared norm"))?;
                if norm.is_zero() {
                    return Err(EvaluationError::degenerate(kind_name, "cannot normalize a zero vector"));
                }
                for row in 0..dimensions {
                    result[(row, col)] = x[(row, col)] / norm;
                }
            }
            Ok(result)
        }

        NodeKind::DotProduct(..) => {
            let (a, b) = (first(), second());
            Ok(DMatrix::from_fn(1, columns, |_, col| {
                (0..a.nrows()).fold(T::zero(), |acc, row| acc + a[(row, col)] * b[(row, col)])
            }))
        }

        NodeKind::CrossProduct(..) => {
            let (a, b) = (first(), second());
            Ok(DMatrix::from_fn(3, columns, |row, col| {
                let (i, j) = ((row + 1) % 3, (row + 2) % 3);
                a[(i, col)] * b[(j, col)] - a[(j, col)] * b[(i, col)]
            }))
        }

        NodeKind::ScalarMultiplication { scale, .. } => {
            let scale = T::from_f64(*scale);
            Ok(first().map(|value| scale * value))
        }

        NodeKind::VectorAddition { vector, .. } => {
            let x = first();
            Ok(DMatrix::from_fn(dimensions, columns, |row, col| {
                x[(row, col)] + T::from_f64(vector[row])
            }))
        }

        NodeKind::MatrixMultiplication { matrix, .. } => Ok(constant_product(matrix, first())),

        NodeKind::Components { start, .. } => {
            let x = first();
            Ok(DMatrix::from_fn(dimensions, columns, |row, col| x[(start + row, col)]))
        }

        NodeKind::Concatenation(..) => {
            let (a, b) = (first(), second());
            let split = a.nrows();
            Ok(DMatrix::from_fn(dimensions, columns, |row, col| {
                if row < split {
                    a[(row, col)]
                } else {
                    b[(row - split, col)]
                }
            }))
        }

        NodeKind::Composition { .. } => Ok(first().clone()),

        NodeKind::Elliptical {
            origin,
            basis,
            convention,
        } => Ok(elliptical::evaluate(origin, basis, convention, parameters)),
    }
}

impl<T: EvalScalar> Default for Evaluator<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponent node holding an integer constant small enough for `powi`
pub(super) fn integer_exponent(exponent: &ExpressionNode) -> Option<i32> {
    let value = exponent.scalar_constant()?;
    (value.fract() == 0.0 && value.abs() <= f64::from(i32::MAX)).then_some(value as i32)
}

pub(super) fn map_checked<T, F>(values: &DMatrix<T>, function: F) -> EvaluationResult<DMatrix<T>>
where
    T: EvalScalar,
    F: Fn(T) -> EvaluationResult<T>,
{
    let mapped = values
        .iter()
        .map(|&value| function(value))
        .collect::<EvaluationResult<Vec<T>>>()?;
    Ok(DMatrix::from_vec(values.nrows(), values.ncols(), mapped))
}

/// Sum of squared components of one column
pub(super) fn squared_column_norm<T: EvalScalar>(values: &DMatrix<T>, col: usize) -> T {
    (0..values.nrows()).fold(T::zero(), |acc, row| acc + values[(row, col)].squared())
}

/// `matrix * values` for a constant matrix
pub(super) fn constant_product<T: EvalScalar>(matrix: &DMatrix<f64>, values: &DMatrix<T>) -> DMatrix<T> {
    DMatrix::from_fn(matrix.nrows(), values.ncols(), |row, col| {
        (0..matrix.ncols()).fold(T::zero(), |acc, k| {
            acc + T::from_f64(matrix[(row, k)]) * values[(k, col)]
        })
    })
}

/// General `a * b`
pub(super) fn matrix_product<T: EvalScalar>(a: &DMatrix<T>, b: &DMatrix<T>) -> DMatrix<T> {
    assert_eq!(a.ncols(), b.nrows(), "matrix product dimensions differ");
    DMatrix::from_fn(a.nrows(), b.ncols(), |row, col| {
        (0..a.ncols()).fold(T::zero(), |acc, k| acc + a[(row, k)] * b[(k, col)])
    })
}
