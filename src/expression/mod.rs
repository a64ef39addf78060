// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Expression DAG module
//!
//! Immutable, reference-counted expression nodes together with their
//! simplifying constructors, exact and interval evaluation (directly or
//! through a compiled plan), Jacobians, symbolic derivatives and hash-consing.

mod compiled;
mod construction;
mod deduplication;
mod derivative;
mod elliptical;
mod error;
mod evaluator;
mod jacobian;
mod node;
mod parallel_evaluator;

pub use compiled::CompiledExpression;
pub use deduplication::{DeduplicationCache, DeduplicationStats};
pub use error::{EvaluationError, EvaluationResult};
pub use evaluator::{Evaluator, EvaluatorStats};
pub use node::{ExpressionNode, NodeKind, NodePtr};
pub use parallel_evaluator::{ParallelEvaluator, DEFAULT_CHUNK_SIZE};
