// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Node-level evaluation errors

use thiserror::Error;

/// Recoverable failure raised while evaluating an expression or its Jacobian
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("{kind}: {operand} outside domain ({message})")]
    DomainViolation {
        kind: &'static str,
        operand: &'static str,
        message: String,
    },

    #[error("{kind}: division by zero")]
    DivisionByZero { kind: &'static str },

    #[error("{kind}: degenerate geometry ({message})")]
    DegenerateGeometry {
        kind: &'static str,
        message: String,
    },
}

impl EvaluationError {
    pub(crate) fn domain(kind: &'static str, operand: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(kind, operand, %message, "domain violation");
        EvaluationError::DomainViolation {
            kind,
            operand,
            message,
        }
    }

    pub(crate) fn division_by_zero(kind: &'static str) -> Self {
        tracing::warn!(kind, "division by zero");
        EvaluationError::DivisionByZero { kind }
    }

    pub(crate) fn degenerate(kind: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!(kind, %message, "degenerate geometry");
        EvaluationError::DegenerateGeometry { kind, message }
    }

    /// Node kind that raised the error
    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationError::DomainViolation { kind, .. }
            | EvaluationError::DivisionByZero { kind }
            | EvaluationError::DegenerateGeometry { kind, .. } => *kind,
        }
    }
}

pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;
