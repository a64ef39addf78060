// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Arithmetic operators
//!
//! The borrowed forms do the work; owned forms forward to them.

use super::{canonical, dynamic_vector, ParametricExpression};
use crate::expression::ExpressionNode;
use nalgebra::SVector;
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! forward_binop {
    ([$($gen:tt)*] $imp:ident, $method:ident, $lhs:ty, $rhs:ty => $out:ty) => {
        impl<$($gen)*> $imp<$rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                $imp::$method(&self, &rhs)
            }
        }

        impl<'a, $($gen)*> $imp<&'a $rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: &'a $rhs) -> $out {
                $imp::$method(&self, rhs)
            }
        }

        impl<'a, $($gen)*> $imp<$rhs> for &'a $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                $imp::$method(self, &rhs)
            }
        }
    };
}

/// Owned expression on the left, copyable operand on the right
macro_rules! forward_owned_lhs {
    ([$($gen:tt)*] $imp:ident, $method:ident, $lhs:ty, $rhs:ty => $out:ty) => {
        impl<$($gen)*> $imp<$rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                $imp::$method(&self, rhs)
            }
        }
    };
}

/// Copyable operand on the left, owned expression on the right
macro_rules! forward_owned_rhs {
    ([$($gen:tt)*] $imp:ident, $method:ident, $lhs:ty, $rhs:ty => $out:ty) => {
        impl<$($gen)*> $imp<$rhs> for $lhs {
            type Output = $out;
            fn $method(self, rhs: $rhs) -> $out {
                $imp::$method(self, &rhs)
            }
        }
    };
}

impl<'a, const D: usize, const P: usize> Neg for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn neg(self) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::negated(&self.node))
    }
}

impl<const D: usize, const P: usize> Neg for ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn neg(self) -> ParametricExpression<D, P> {
        -&self
    }
}

// Expression with expression

impl<'a, 'b, const D: usize, const P: usize> Add<&'b ParametricExpression<D, P>> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn add(self, rhs: &'b ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::sum(&self.node, &rhs.node))
    }
}

impl<'a, 'b, const D: usize, const P: usize> Sub<&'b ParametricExpression<D, P>> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn sub(self, rhs: &'b ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::difference(&self.node, &rhs.node))
    }
}

/// Scalar expression times any expression
impl<'a, 'b, const D: usize, const P: usize> Mul<&'b ParametricExpression<D, P>> for &'a ParametricExpression<1, P> {
    type Output = ParametricExpression<D, P>;

    fn mul(self, rhs: &'b ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::product(&self.node, &rhs.node))
    }
}

/// Any expression over a scalar expression
impl<'a, 'b, const D: usize, const P: usize> Div<&'b ParametricExpression<1, P>> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn div(self, rhs: &'b ParametricExpression<1, P>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::quotient(&self.node, &rhs.node))
    }
}

forward_binop!([const D: usize, const P: usize] Add, add, ParametricExpression<D, P>, ParametricExpression<D, P> => ParametricExpression<D, P>);
forward_binop!([const D: usize, const P: usize] Sub, sub, ParametricExpression<D, P>, ParametricExpression<D, P> => ParametricExpression<D, P>);
forward_binop!([const D: usize, const P: usize] Mul, mul, ParametricExpression<1, P>, ParametricExpression<D, P> => ParametricExpression<D, P>);
forward_binop!([const D: usize, const P: usize] Div, div, ParametricExpression<D, P>, ParametricExpression<1, P> => ParametricExpression<D, P>);

// Expression with constant vector

impl<'a, const D: usize, const P: usize> Add<SVector<f64, D>> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn add(self, rhs: SVector<f64, D>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::translated(&self.node, &dynamic_vector(&rhs)))
    }
}

impl<'a, const D: usize, const P: usize> Sub<SVector<f64, D>> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn sub(self, rhs: SVector<f64, D>) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::translated(&self.node, &dynamic_vector(&-rhs)))
    }
}

impl<'a, const D: usize, const P: usize> Add<&'a ParametricExpression<D, P>> for SVector<f64, D> {
    type Output = ParametricExpression<D, P>;

    fn add(self, rhs: &'a ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        rhs + self
    }
}

impl<'a, const D: usize, const P: usize> Sub<&'a ParametricExpression<D, P>> for SVector<f64, D> {
    type Output = ParametricExpression<D, P>;

    fn sub(self, rhs: &'a ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        &(-rhs) + self
    }
}

/// Scalar expression times a constant vector
impl<'a, const D: usize, const P: usize> Mul<SVector<f64, D>> for &'a ParametricExpression<1, P> {
    type Output = ParametricExpression<D, P>;

    fn mul(self, rhs: SVector<f64, D>) -> ParametricExpression<D, P> {
        let vector = ExpressionNode::constant(dynamic_vector(&rhs), P);
        canonical(ExpressionNode::product(&self.node, &vector))
    }
}

forward_owned_lhs!([const D: usize, const P: usize] Add, add, ParametricExpression<D, P>, SVector<f64, D> => ParametricExpression<D, P>);
forward_owned_lhs!([const D: usize, const P: usize] Sub, sub, ParametricExpression<D, P>, SVector<f64, D> => ParametricExpression<D, P>);
forward_owned_lhs!([const D: usize, const P: usize] Mul, mul, ParametricExpression<1, P>, SVector<f64, D> => ParametricExpression<D, P>);
forward_owned_rhs!([const D: usize, const P: usize] Add, add, SVector<f64, D>, ParametricExpression<D, P> => ParametricExpression<D, P>);
forward_owned_rhs!([const D: usize, const P: usize] Sub, sub, SVector<f64, D>, ParametricExpression<D, P> => ParametricExpression<D, P>);

// Expression with constant scalar

impl<'a, const P: usize> Add<f64> for &'a ParametricExpression<1, P> {
    type Output = ParametricExpression<1, P>;

    fn add(self, rhs: f64) -> ParametricExpression<1, P> {
        canonical(ExpressionNode::translated(&self.node, &nalgebra::DVector::from_element(1, rhs)))
    }
}

impl<'a, const P: usize> Sub<f64> for &'a ParametricExpression<1, P> {
    type Output = ParametricExpression<1, P>;

    fn sub(self, rhs: f64) -> ParametricExpression<1, P> {
        self + (-rhs)
    }
}

impl<'a, const D: usize, const P: usize> Mul<f64> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn mul(self, rhs: f64) -> ParametricExpression<D, P> {
        canonical(ExpressionNode::scaled(rhs, &self.node))
    }
}

impl<'a, const D: usize, const P: usize> Div<f64> for &'a ParametricExpression<D, P> {
    type Output = ParametricExpression<D, P>;

    fn div(self, rhs: f64) -> ParametricExpression<D, P> {
        let divisor = ExpressionNode::scalar_constant_node(rhs, P);
        canonical(ExpressionNode::quotient(&self.node, &divisor))
    }
}

impl<'a, const P: usize> Add<&'a ParametricExpression<1, P>> for f64 {
    type Output = ParametricExpression<1, P>;

    fn add(self, rhs: &'a ParametricExpression<1, P>) -> ParametricExpression<1, P> {
        rhs + self
    }
}

impl<'a, const P: usize> Sub<&'a ParametricExpression<1, P>> for f64 {
    type Output = ParametricExpression<1, P>;

    fn sub(self, rhs: &'a ParametricExpression<1, P>) -> ParametricExpression<1, P> {
        &(-rhs) + self
    }
}

impl<'a, const D: usize, const P: usize> Mul<&'a ParametricExpression<D, P>> for f64 {
    type Output = ParametricExpression<D, P>;

    fn mul(self, rhs: &'a ParametricExpression<D, P>) -> ParametricExpression<D, P> {
        rhs * self
    }
}

impl<'a, const P: usize> Div<&'a ParametricExpression<1, P>> for f64 {
    type Output = ParametricExpression<1, P>;

    fn div(self, rhs: &'a ParametricExpression<1, P>) -> ParametricExpression<1, P> {
        let dividend = ExpressionNode::scalar_constant_node(self, P);
        canonical(ExpressionNode::quotient(&dividend, &rhs.node))
    }
}

forward_owned_lhs!([const P: usize] Add, add, ParametricExpression<1, P>, f64 => ParametricExpression<1, P>);
forward_owned_lhs!([const P: usize] Sub, sub, ParametricExpression<1, P>, f64 => ParametricExpression<1, P>);
forward_owned_lhs!([const D: usize, const P: usize] Mul, mul, ParametricExpression<D, P>, f64 => ParametricExpression<D, P>);
forward_owned_lhs!([const D: usize, const P: usize] Div, div, ParametricExpression<D, P>, f64 => ParametricExpression<D, P>);
forward_owned_rhs!([const P: usize] Add, add, f64, ParametricExpression<1, P> => ParametricExpression<1, P>);
forward_owned_rhs!([const P: usize] Sub, sub, f64, ParametricExpression<1, P> => ParametricExpression<1, P>);
forward_owned_rhs!([const D: usize, const P: usize] Mul, mul, f64, ParametricExpression<D, P> => ParametricExpression<D, P>);
forward_owned_rhs!([const P: usize] Div, div, f64, ParametricExpression<1, P> => ParametricExpression<1, P>);
