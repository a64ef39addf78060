// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Compiled plans replay exactly what the recursive evaluator computes

use ahash::AHashSet;
use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use polyframe_expr::{CompiledExpression, Evaluator, ExpressionNode, Interval, NodePtr, ParallelEvaluator, ParametricExpression};
use std::rc::Rc;
use std::sync::Arc;

/// One expression per node kind, over the parameters `(u, v)`
fn expressions() -> Vec<NodePtr> {
    let u = ExpressionNode::parameter(0, 2);
    let v = ExpressionNode::parameter(1, 2);
    let p = ExpressionNode::identity(2);
    let planar = ExpressionNode::concatenated(&ExpressionNode::sin(&u), &ExpressionNode::cos(&v));
    let spatial = ExpressionNode::concatenated(&p, &ExpressionNode::exp(&u));
    let cross = ExpressionNode::cross(&spatial, &ExpressionNode::concatenated(&ExpressionNode::cos(&v), &p));
    let t = ExpressionNode::parameter(0, 1);

    vec![
        ExpressionNode::constant(DVector::from_vec(vec![1.0, 2.0]), 2),
        Arc::clone(&p),
        Arc::clone(&u),
        ExpressionNode::negated(&ExpressionNode::sin(&u)),
        ExpressionNode::sqrt(&v),
        ExpressionNode::tan(&u),
        ExpressionNode::asin(&ExpressionNode::scaled(0.5, &u)),
        ExpressionNode::acos(&ExpressionNode::scaled(0.5, &v)),
        ExpressionNode::ln(&v),
        ExpressionNode::sum(&ExpressionNode::sin(&u), &ExpressionNode::cos(&v)),
        ExpressionNode::difference(&u, &ExpressionNode::squared_norm(&v)),
        ExpressionNode::product(&u, &planar),
        ExpressionNode::quotient(&planar, &v),
        ExpressionNode::power(&v, &u),
        ExpressionNode::power(&v, &ExpressionNode::scalar_constant_node(-2.0, 2)),
        ExpressionNode::norm(&planar),
        ExpressionNode::squared_norm(&planar),
        ExpressionNode::normalized(&planar),
        ExpressionNode::dot(&planar, &p),
        Arc::clone(&cross),
        ExpressionNode::translated(&planar, &DVector::from_vec(vec![1.0, -1.0])),
        ExpressionNode::transformed(&DMatrix::from_row_slice(2, 2, &[1.0, 2.0, -3.0, 0.5]), &planar),
        ExpressionNode::components(&cross, 1, 1),
        ExpressionNode::composed(&ExpressionNode::sin(&t), &ExpressionNode::product(&u, &v)),
        ExpressionNode::elliptical(
            DVector::from_vec(vec![1.0, 0.0, 0.0]),
            DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 3.0]),
            vec![true, false],
        ),
    ]
}

fn kinds(roots: &[NodePtr]) -> AHashSet<&'static str> {
    let mut seen = AHashSet::new();
    let mut visited = AHashSet::new();
    let mut stack: Vec<NodePtr> = roots.to_vec();
    while let Some(node) = stack.pop() {
        if visited.insert(Arc::as_ptr(&node) as usize) {
            seen.insert(node.kind_name());
            stack.extend(node.operands().into_iter().cloned());
        }
    }
    seen
}

#[test]
fn test_every_node_kind_is_covered() {
    assert_eq!(kinds(&expressions()).len(), 29);
}

#[test]
fn test_plan_matches_evaluator_exactly() -> Result<()> {
    let parameters = DMatrix::from_row_slice(2, 3, &[0.2, 0.7, 1.1, 0.5, 1.5, 0.9]);
    for node in expressions() {
        let expected = Evaluator::new().evaluate(&node, &Rc::new(parameters.clone()))?;
        let plan = CompiledExpression::new(&node);
        assert_eq!(plan.evaluate(&parameters)?, *expected, "{}", node.kind_name());
    }
    Ok(())
}

#[test]
fn test_plan_matches_evaluator_over_boxes() -> Result<()> {
    let boxes = DMatrix::from_row_slice(
        2,
        2,
        &[Interval::new(0.1, 0.3), Interval::new(0.6, 0.9), Interval::new(0.4, 0.9), Interval::new(1.2, 1.4)],
    );
    for node in expressions() {
        let expected = Evaluator::new().evaluate(&node, &Rc::new(boxes.clone()))?;
        let plan = CompiledExpression::new(&node);
        assert_eq!(plan.evaluate(&boxes)?, *expected, "{}", node.kind_name());
    }
    Ok(())
}

#[test]
fn test_plan_errors_match_evaluator() {
    let outside = DMatrix::from_row_slice(2, 1, &[0.5, -1.0]);
    for node in expressions() {
        let expected = Evaluator::new().evaluate(&node, &Rc::new(outside.clone())).map(|values| (*values).clone());
        let actual = CompiledExpression::new(&node).evaluate(&outside);
        assert_eq!(actual, expected, "{}", node.kind_name());
    }
}

#[test]
fn test_plan_replays_over_many_batches() -> Result<()> {
    let u = ParametricExpression::<1, 2>::u();
    let v = ParametricExpression::<1, 2>::v();
    let surface = ParametricExpression::<3, 2>::from_components([u.cos() * &v, u.sin() * &v, v.squared()]);
    let plan = surface.compiled();
    let parallel = ParallelEvaluator::with_chunk_size(16);
    for batch in 0..5 {
        let parameters = DMatrix::from_fn(2, 100, |row, col| (batch * 100 + col) as f64 * 0.01 + row as f64);
        let serial = plan.evaluate(&parameters)?;
        assert_eq!(serial, surface.evaluate_batch(&parameters)?);
        assert_eq!(parallel.evaluate_compiled(&plan, &parameters)?, serial);
    }
    Ok(())
}
