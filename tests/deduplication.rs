// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use anyhow::Result;
use nalgebra::Vector2;
use polyframe_expr::{DeduplicationCache, ExpressionNode, ParametricExpression};
use std::sync::Arc;

type Scalar2 = ParametricExpression<1, 2>;

#[test]
fn test_scaling_on_either_side_collapses() {
    let u = Scalar2::u();
    let left = 3.0 * &u;
    let right = &u * 3.0;
    assert!(left.is_duplicate_of(&right));

    let mut cache = DeduplicationCache::new();
    let left = left.deduplicated(&mut cache);
    let right = right.deduplicated(&mut cache);
    assert!(Arc::ptr_eq(left.node(), right.node()));
}

#[test]
fn test_commutative_operands_collapse() {
    let u = Scalar2::u();
    let v = Scalar2::v();
    let mut cache = DeduplicationCache::new();

    let first = (u.sin() * v.cos()).deduplicated(&mut cache);
    let second = (v.cos() * u.sin()).deduplicated(&mut cache);
    assert!(Arc::ptr_eq(first.node(), second.node()));

    let first = (u.exp() + v.exp()).deduplicated(&mut cache);
    let second = (v.exp() + u.exp()).deduplicated(&mut cache);
    assert!(Arc::ptr_eq(first.node(), second.node()));

    // difference is not commutative
    let first = u.exp() - v.exp();
    let second = v.exp() - u.exp();
    assert!(!first.is_duplicate_of(&second));
}

#[test]
fn test_deduplication_is_idempotent() {
    let u = Scalar2::u();
    let v = Scalar2::v();
    let f = (u.sin() * v.sin() + u.sin() * v.cos()).sqrt();
    let mut cache = DeduplicationCache::new();
    let once = f.deduplicated(&mut cache);
    let twice = once.deduplicated(&mut cache);
    assert!(Arc::ptr_eq(once.node(), twice.node()));
    assert!(once.is_duplicate_of(&f));
}

#[test]
fn test_independent_subtrees_become_shared() -> Result<()> {
    let u = ExpressionNode::parameter(0, 2);
    let v = ExpressionNode::parameter(1, 2);
    let first = ExpressionNode::product(&ExpressionNode::sin(&u), &ExpressionNode::cos(&v));
    let second = ExpressionNode::product(&ExpressionNode::sin(&u), &ExpressionNode::cos(&v));
    let pair = ExpressionNode::concatenated(&first, &second);
    assert!(!Arc::ptr_eq(&first, &second));

    let mut cache = DeduplicationCache::new();
    let shared = ExpressionNode::deduplicated(&pair, &mut cache);
    assert!(shared.node_count() < pair.node_count());
    let operands = shared.operands();
    assert!(Arc::ptr_eq(operands[0], operands[1]));
    assert!(cache.stats().hits > 0);

    let point = Vector2::new(0.3, 1.2);
    let original = ParametricExpression::<2, 2>::from_node(pair);
    let deduplicated = ParametricExpression::<2, 2>::from_node(shared);
    assert_eq!(original.evaluate(&point)?, deduplicated.evaluate(&point)?);
    Ok(())
}

#[test]
fn test_derivatives_are_already_canonical() -> Result<()> {
    let u = Scalar2::u();
    let v = Scalar2::v();
    let f = (u.sin() * v.exp()).squared();
    let du = f.derivative(0)?;

    let mut cache = DeduplicationCache::new();
    let canonical = du.deduplicated(&mut cache);
    assert!(Arc::ptr_eq(canonical.node(), du.node()));
    assert_eq!(canonical.node().node_count(), du.node().node_count());
    Ok(())
}

#[test]
fn test_constants_within_tolerance_match() {
    let a = Scalar2::scalar(1.0);
    let b = Scalar2::scalar(1.0 + 1e-14);
    let c = Scalar2::scalar(1.0 + 1e-6);
    assert!(a.is_duplicate_of(&b));
    assert!(!a.is_duplicate_of(&c));
}
