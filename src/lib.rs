// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Expression Core
//!
//! Parametric expressions for the Polyframe kernel: an immutable, shared
//! expression DAG with exact and interval evaluation, Jacobians, symbolic
//! derivatives and hash-consing, behind a dimension-typed facade.

pub mod datum;
pub mod error;
pub mod expression;
pub mod numeric;
pub mod parametric;
pub mod utils;
pub mod validation;

pub use datum::Datum;
pub use error::{Error, Result};
pub use expression::{
    CompiledExpression, DeduplicationCache, EvaluationError, Evaluator, ExpressionNode, NodeKind, NodePtr,
    ParallelEvaluator,
};
pub use numeric::{EvalScalar, Interval};
pub use parametric::{Curve, ParametricExpression, Surface};
