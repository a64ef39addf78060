// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compiled evaluation plans
//!
//! A `CompiledExpression` flattens an expression DAG once into a topologically
//! ordered list of instructions over numbered value slots. Replaying the plan
//! skips the per-node cache lookups of [`Evaluator`](super::Evaluator), which
//! pays off when the same expression is evaluated over many batches.

use super::error::EvaluationResult;
use super::evaluator::apply_kind;
use super::node::{NodeKind, NodePtr};
use crate::numeric::EvalScalar;
use ahash::AHashMap;
use nalgebra::DMatrix;
use std::sync::Arc;

/// Slot holding the input parameter batch
const PARAMETER_SLOT: usize = 0;

#[derive(Debug, Clone)]
struct Instruction {
    node: NodePtr,
    /// Slots of the operand values, in `operands()` order
    operands: Vec<usize>,
    /// Slot of the parameter batch this node is evaluated against
    parameters: usize,
}

/// Linear evaluation plan for one expression
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    root: NodePtr,
    instructions: Vec<Instruction>,
    output: usize,
}

struct Compiler {
    instructions: Vec<Instruction>,
    /// (node address, parameter slot) -> value slot
    slots: AHashMap<(usize, usize), usize>,
}

impl Compiler {
    fn compile(&mut self, node: &NodePtr, parameters: usize) -> usize {
        let key = (Arc::as_ptr(node) as usize, parameters);
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }

        let slot = match node.kind() {
            NodeKind::Identity => parameters,
            NodeKind::Composition { outer, inner } => {
                let inner_slot = self.compile(inner, parameters);
                self.compile(outer, inner_slot)
            }
            kind => {
                let operands = kind
                    .operands()
                    .into_iter()
                    .map(|operand| self.compile(operand, parameters))
                    .collect();
                self.instructions.push(Instruction {
                    node: Arc::clone(node),
                    operands,
                    parameters,
                });
                self.instructions.len()
            }
        };
        self.slots.insert(key, slot);
        slot
    }
}

impl CompiledExpression {
    pub fn new(node: &NodePtr) -> Self {
        let mut compiler = Compiler {
            instructions: Vec::new(),
            slots: AHashMap::new(),
        };
        let output = compiler.compile(node, PARAMETER_SLOT);
        tracing::debug!(
            kind = node.kind_name(),
            instructions = compiler.instructions.len(),
            "compiled expression"
        );
        Self {
            root: Arc::clone(node),
            instructions: compiler.instructions,
            output,
        }
    }

    pub fn node(&self) -> &NodePtr {
        &self.root
    }

    /// Number of instructions replayed per evaluation
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Evaluate every column of `parameters`; same values and errors as [`Evaluator`](super::Evaluator)
    pub fn evaluate<T: EvalScalar>(&self, parameters: &DMatrix<T>) -> EvaluationResult<DMatrix<T>> {
        assert_eq!(
            parameters.nrows(),
            self.root.num_parameters(),
            "{} expects {} parameter rows, got {}",
            self.root.kind_name(),
            self.root.num_parameters(),
            parameters.nrows()
        );
        let mut slots: Vec<DMatrix<T>> = Vec::with_capacity(self.instructions.len() + 1);
        slots.push(parameters.clone());
        for instruction in &self.instructions {
            let value = {
                let operands: Vec<&DMatrix<T>> = instruction.operands.iter().map(|&slot| &slots[slot]).collect();
                apply_kind(&instruction.node, &operands, &slots[instruction.parameters])?
            };
            slots.push(value);
        }
        Ok(slots.swap_remove(self.output))
    }
}
