// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hash-consing of expression nodes
//!
//! A `DeduplicationCache` is owned by one construction session. Nodes are
//! canonicalized bottom-up: operands first, then the node itself is looked up
//! among previously seen nodes with the same structural fingerprint.

use super::node::{ExpressionNode, NodeKind, NodePtr};
use crate::numeric::ZERO_TOLERANCE;
use ahash::AHashMap;
use std::sync::Arc;

/// Hashable part of a node's structure; floating-point payloads are compared
/// with a tolerance instead, so they only contribute their shape
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    kind: &'static str,
    num_dimensions: usize,
    num_parameters: usize,
    operands: Vec<usize>,
    discrete: Vec<usize>,
}

fn address(node: &NodePtr) -> usize {
    Arc::as_ptr(node) as usize
}

fn fingerprint(node: &NodePtr) -> Fingerprint {
    let mut operands: Vec<usize> = node.operands().into_iter().map(address).collect();
    if node.kind().is_commutative() {
        operands.sort_unstable();
    }
    let discrete = match node.kind() {
        NodeKind::Parameter(index) => vec![*index],
        NodeKind::Components { start, count, .. } => vec![*start, *count],
        NodeKind::MatrixMultiplication { matrix, .. } => vec![matrix.nrows(), matrix.ncols()],
        NodeKind::Elliptical { convention, .. } => convention.iter().map(|&bit| bit as usize).collect(),
        _ => Vec::new(),
    };
    Fingerprint {
        kind: node.kind_name(),
        num_dimensions: node.num_dimensions(),
        num_parameters: node.num_parameters(),
        operands,
        discrete,
    }
}

fn close<'a>(first: impl IntoIterator<Item = &'a f64>, second: impl IntoIterator<Item = &'a f64>) -> bool {
    first
        .into_iter()
        .zip(second)
        .all(|(a, b)| (a - b).abs() <= ZERO_TOLERANCE)
}

fn same_operand(first: &NodePtr, second: &NodePtr) -> bool {
    Arc::ptr_eq(first, second) || ExpressionNode::is_duplicate_of(first, second)
}

fn same_operands(first: &[&NodePtr], second: &[&NodePtr], commutative: bool) -> bool {
    if first.len() != second.len() {
        return false;
    }
    let in_order = first.iter().zip(second).all(|(a, b)| same_operand(a, b));
    in_order || (commutative && first.len() == 2 && same_operand(first[0], second[1]) && same_operand(first[1], second[0]))
}

impl ExpressionNode {
    /// Structural equality: same kind, shape and payload (within tolerance), with
    /// operands that are the same node or themselves duplicates. Sums, products
    /// and dot products also match with their operands swapped.
    pub fn is_duplicate_of(first: &NodePtr, second: &NodePtr) -> bool {
        if Arc::ptr_eq(first, second) {
            return true;
        }
        if first.kind_name() != second.kind_name()
            || first.num_dimensions() != second.num_dimensions()
            || first.num_parameters() != second.num_parameters()
        {
            return false;
        }
        let payload_matches = match (first.kind(), second.kind()) {
            (NodeKind::Constant(a), NodeKind::Constant(b)) => close(a.iter(), b.iter()),
            (NodeKind::Parameter(a), NodeKind::Parameter(b)) => a == b,
            (NodeKind::ScalarMultiplication { scale: a, .. }, NodeKind::ScalarMultiplication { scale: b, .. }) => {
                (a - b).abs() <= ZERO_TOLERANCE
            }
            (NodeKind::VectorAddition { vector: a, .. }, NodeKind::VectorAddition { vector: b, .. }) => {
                close(a.iter(), b.iter())
            }
            (
                NodeKind::MatrixMultiplication { matrix: a, .. },
                NodeKind::MatrixMultiplication { matrix: b, .. },
            ) => a.shape() == b.shape() && close(a.iter(), b.iter()),
            (
                NodeKind::Components {
                    start: a_start,
                    count: a_count,
                    ..
                },
                NodeKind::Components {
                    start: b_start,
                    count: b_count,
                    ..
                },
            ) => a_start == b_start && a_count == b_count,
            (
                NodeKind::Elliptical {
                    origin: a_origin,
                    basis: a_basis,
                    convention: a_convention,
                },
                NodeKind::Elliptical {
                    origin: b_origin,
                    basis: b_basis,
                    convention: b_convention,
                },
            ) => {
                a_convention == b_convention
                    && a_basis.shape() == b_basis.shape()
                    && close(a_origin.iter(), b_origin.iter())
                    && close(a_basis.iter(), b_basis.iter())
            }
            _ => true,
        };
        payload_matches
            && same_operands(
                &first.operands(),
                &second.operands(),
                first.kind().is_commutative(),
            )
    }

    /// Canonical representative of `node` in `cache`
    pub fn deduplicated(node: &NodePtr, cache: &mut DeduplicationCache) -> NodePtr {
        cache.canonicalize(node)
    }
}

/// Counters reported by a deduplication session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeduplicationStats {
    /// Nodes that matched an existing canonical node
    pub hits: usize,
    /// Nodes that became canonical representatives
    pub inserted: usize,
}

/// Construction-session table of canonical nodes
#[derive(Default)]
pub struct DeduplicationCache {
    buckets: AHashMap<Fingerprint, Vec<NodePtr>>,
    /// Node address -> (node kept alive, canonical representative)
    resolved: AHashMap<usize, (NodePtr, NodePtr)>,
    stats: DeduplicationStats,
}

impl DeduplicationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of canonical nodes held
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn stats(&self) -> DeduplicationStats {
        self.stats
    }

    fn canonicalize(&mut self, node: &NodePtr) -> NodePtr {
        if let Some((_, canonical)) = self.resolved.get(&address(node)) {
            return Arc::clone(canonical);
        }

        let operands = node.operands();
        let canonical_operands: Vec<NodePtr> = operands.iter().map(|operand| self.canonicalize(operand)).collect();
        let unchanged = operands
            .iter()
            .zip(&canonical_operands)
            .all(|(original, canonical)| Arc::ptr_eq(original, canonical));
        let candidate = if unchanged {
            Arc::clone(node)
        } else {
            ExpressionNode::new(
                node.kind().with_operands(canonical_operands),
                node.num_dimensions(),
                node.num_parameters(),
            )
        };

        let bucket = self.buckets.entry(fingerprint(&candidate)).or_default();
        let canonical = match bucket
            .iter()
            .find(|existing| ExpressionNode::is_duplicate_of(existing, &candidate))
        {
            Some(existing) => {
                self.stats.hits += 1;
                tracing::trace!(kind = candidate.kind_name(), "deduplication hit");
                Arc::clone(existing)
            }
            None => {
                self.stats.inserted += 1;
                bucket.push(Arc::clone(&candidate));
                candidate
            }
        };

        self.resolved
            .insert(address(node), (Arc::clone(node), Arc::clone(&canonical)));
        self.resolved
            .insert(address(&canonical), (Arc::clone(&canonical), Arc::clone(&canonical)));
        canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    fn plane() -> NodePtr {
        let u = ExpressionNode::parameter(0, 2);
        let v = ExpressionNode::parameter(1, 2);
        ExpressionNode::sum(&ExpressionNode::sin(&u), &ExpressionNode::cos(&v))
    }

    #[test]
    fn test_independent_builds_collapse() {
        let mut cache = DeduplicationCache::new();
        let first = ExpressionNode::deduplicated(&plane(), &mut cache);
        let second = ExpressionNode::deduplicated(&plane(), &mut cache);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.stats().hits > 0);
    }

    #[test]
    fn test_idempotent() {
        let mut cache = DeduplicationCache::new();
        let once = ExpressionNode::deduplicated(&plane(), &mut cache);
        let twice = ExpressionNode::deduplicated(&once, &mut cache);
        assert!(Arc::ptr_eq(&once, &twice));
    }

    #[test]
    fn test_shared_subexpressions_become_shared() {
        let u = ExpressionNode::parameter(0, 1);
        let left = ExpressionNode::sin(&u);
        let right = ExpressionNode::sin(&ExpressionNode::parameter(0, 1));
        let sum = ExpressionNode::sum(&left, &right);
        assert_eq!(sum.node_count(), 5);

        let mut cache = DeduplicationCache::new();
        let deduplicated = ExpressionNode::deduplicated(&sum, &mut cache);
        assert_eq!(deduplicated.node_count(), 3);
        let operands = deduplicated.operands();
        assert!(Arc::ptr_eq(operands[0], operands[1]));
    }

    #[test]
    fn test_commutative_operands() {
        let u = ExpressionNode::parameter(0, 2);
        let v = ExpressionNode::parameter(1, 2);
        let uv = ExpressionNode::sum(&ExpressionNode::sin(&u), &ExpressionNode::sin(&v));
        let vu = ExpressionNode::sum(&ExpressionNode::sin(&v), &ExpressionNode::sin(&u));
        assert!(ExpressionNode::is_duplicate_of(&uv, &vu));

        let difference = ExpressionNode::difference(&u, &v);
        let reversed = ExpressionNode::difference(&v, &u);
        assert!(!ExpressionNode::is_duplicate_of(&difference, &reversed));
    }

    #[test]
    fn test_constants_compare_with_tolerance() {
        let a = ExpressionNode::constant(DVector::from_vec(vec![1.0, 2.0]), 1);
        let b = ExpressionNode::constant(DVector::from_vec(vec![1.0, 2.0 + 1e-14]), 1);
        let c = ExpressionNode::constant(DVector::from_vec(vec![1.0, 2.1]), 1);
        assert!(ExpressionNode::is_duplicate_of(&a, &b));
        assert!(!ExpressionNode::is_duplicate_of(&a, &c));
    }

    #[test]
    fn test_parameter_counts_distinguish() {
        let a = ExpressionNode::parameter(0, 1);
        let b = ExpressionNode::parameter(0, 2);
        assert!(!ExpressionNode::is_duplicate_of(&a, &b));
    }
}
