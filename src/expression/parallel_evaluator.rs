// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parallel batch evaluator using rayon

use super::compiled::CompiledExpression;
use super::error::EvaluationResult;
use super::node::NodePtr;
use crate::numeric::EvalScalar;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Default number of parameter columns handed to one worker
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Evaluates wide parameter batches by splitting them into column chunks
///
/// The expression is compiled once and the plan is replayed on every chunk;
/// plans are immutable, so workers share one without locking.
pub struct ParallelEvaluator {
    chunk_size: usize,
}

impl ParallelEvaluator {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Evaluate `node` for every column of `parameters`; identical to the serial result
    pub fn evaluate<T: EvalScalar>(&self, node: &NodePtr, parameters: &DMatrix<T>) -> EvaluationResult<DMatrix<T>> {
        self.evaluate_compiled(&CompiledExpression::new(node), parameters)
    }

    /// Replay an already compiled plan over the column chunks of `parameters`
    pub fn evaluate_compiled<T: EvalScalar>(
        &self,
        plan: &CompiledExpression,
        parameters: &DMatrix<T>,
    ) -> EvaluationResult<DMatrix<T>> {
        let columns = parameters.ncols();
        let rows = parameters.nrows();
        let starts: Vec<usize> = (0..columns).step_by(self.chunk_size).collect();
        tracing::debug!(
            kind = plan.node().kind_name(),
            columns,
            chunks = starts.len(),
            instructions = plan.len(),
            "parallel evaluation"
        );

        let chunks = starts
            .par_iter()
            .map(|&start| {
                let width = self.chunk_size.min(columns - start);
                let chunk = DMatrix::from_fn(rows, width, |row, col| parameters[(row, start + col)]);
                plan.evaluate(&chunk)
            })
            .collect::<EvaluationResult<Vec<DMatrix<T>>>>()?;

        let mut result = DMatrix::from_element(plan.node().num_dimensions(), columns, T::zero());
        for (start, chunk) in starts.iter().zip(&chunks) {
            for col in 0..chunk.ncols() {
                for row in 0..chunk.nrows() {
                    result[(row, start + col)] = chunk[(row, col)];
                }
            }
        }
        Ok(result)
    }
}

impl Default for ParallelEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Evaluator, ExpressionNode};
    use crate::numeric::Interval;
    use std::rc::Rc;

    #[test]
    fn test_parallel_matches_serial() {
        let t = ExpressionNode::parameter(0, 1);
        let node = ExpressionNode::sum(&ExpressionNode::sin(&t), &ExpressionNode::product(&t, &t));
        let parameters = DMatrix::from_fn(1, 1000, |_, col| col as f64 * 0.01);

        let parallel = ParallelEvaluator::with_chunk_size(64).evaluate(&node, &parameters).unwrap();
        let serial = Evaluator::new().evaluate(&node, &Rc::new(parameters)).unwrap();
        assert_eq!(parallel, *serial);
    }

    #[test]
    fn test_parallel_interval_batch() {
        let t = ExpressionNode::parameter(0, 1);
        let node = ExpressionNode::cos(&t);
        let parameters = DMatrix::from_fn(1, 10, |_, col| Interval::new(col as f64, col as f64 + 0.5));
        let bounds = ParallelEvaluator::with_chunk_size(3).evaluate(&node, &parameters).unwrap();
        assert_eq!(bounds.ncols(), 10);
        for col in 0..10 {
            assert!(bounds[(0, col)].contains((col as f64 + 0.25).cos()));
        }
    }

    #[test]
    fn test_parallel_propagates_errors() {
        let t = ExpressionNode::parameter(0, 1);
        let node = ExpressionNode::sqrt(&t);
        let parameters = DMatrix::from_fn(1, 100, |_, col| 50.0 - col as f64);
        assert!(ParallelEvaluator::new().evaluate(&node, &parameters).is_err());
    }
}
