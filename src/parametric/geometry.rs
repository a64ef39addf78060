// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Differential geometry of curves and surfaces
//!
//! Everything here is built symbolically; degenerate points (zero tangent,
//! straight segments for the normal) surface as `DegenerateGeometry` when the
//! result is evaluated.

use super::{canonical, ParametricExpression};
use crate::expression::ExpressionNode;

impl<const D: usize> ParametricExpression<D, 1> {
    fn first_derivative(&self) -> Self {
        canonical(ExpressionNode::derivative(&self.node, 0))
    }

    /// Unit tangent
    pub fn tangent_vector(&self) -> Self {
        self.first_derivative().normalized()
    }

    /// `|dT/dt| / |dC/dt|`
    pub fn curvature(&self) -> ParametricExpression<1, 1> {
        let turning = self.tangent_vector().first_derivative().norm();
        let speed = self.first_derivative().norm();
        turning / speed
    }

    /// Unit principal normal
    pub fn normal_vector(&self) -> Self {
        self.tangent_vector().first_derivative().normalized()
    }
}

impl ParametricExpression<3, 1> {
    pub fn binormal_vector(&self) -> Self {
        self.tangent_vector().cross(&self.normal_vector())
    }
}

impl ParametricExpression<3, 2> {
    /// Unit normal `normalize(dS/du x dS/dv)`
    pub fn normal_vector(&self) -> Self {
        let du: Self = canonical(ExpressionNode::derivative(&self.node, 0));
        let dv: Self = canonical(ExpressionNode::derivative(&self.node, 1));
        du.cross(&dv).normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::Datum;
    use crate::expression::EvaluationError;
    use crate::Error;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Vector2, Vector3};

    #[test]
    fn test_circle_frame() {
        let circle = ParametricExpression::<2, 1>::circle(&Vector2::new(3.0, 0.0), 2.0);
        assert_relative_eq!(circle.tangent_vector().evaluate_at(0.0).unwrap(), Vector2::new(0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(circle.normal_vector().evaluate_at(0.0).unwrap(), Vector2::new(-1.0, 0.0), epsilon = 1e-12);
        for &t in &[0.0, 0.7, 2.5] {
            assert_relative_eq!(circle.curvature().value_at(t).unwrap(), 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_line_has_no_normal() {
        let t = ParametricExpression::<1, 1>::t();
        let line = &t * Vector3::new(1.0, 1.0, 0.0);
        assert_relative_eq!(line.curvature().value_at(0.3).unwrap(), 0.0);
        let error = line.normal_vector().evaluate_at(0.3).unwrap_err();
        assert!(matches!(error, Error::Evaluation(EvaluationError::DegenerateGeometry { .. })));
    }

    #[test]
    fn test_helix_binormal() {
        let datum = Datum::new(Vector3::zeros(), Matrix3::identity());
        let helix = ParametricExpression::<3, 1>::helix(&datum, 1.0);
        for &t in &[0.1, 0.4, 0.8] {
            let tangent = helix.tangent_vector().evaluate_at(t).unwrap();
            let normal = helix.normal_vector().evaluate_at(t).unwrap();
            let binormal = helix.binormal_vector().evaluate_at(t).unwrap();
            assert_relative_eq!(tangent.dot(&normal), 0.0, epsilon = 1e-12);
            assert_relative_eq!(binormal.norm(), 1.0, epsilon = 1e-12);
            // the helix binormal keeps a constant angle with the axis
            assert_relative_eq!(binormal.z, 2.0 * std::f64::consts::PI / (1.0 + 4.0 * std::f64::consts::PI.powi(2)).sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sphere_normal_is_radial() {
        let center = Vector3::new(1.0, 2.0, 3.0);
        let sphere = ParametricExpression::<3, 2>::sphere(&center, 2.0);
        let normal = sphere.normal_vector();
        for &(u, v) in &[(0.5, 0.5), (1.2, -2.0), (2.5, 3.0)] {
            let parameters = Vector2::new(u, v);
            let radial = (sphere.evaluate(&parameters).unwrap() - center) / 2.0;
            let n = normal.evaluate(&parameters).unwrap();
            assert_relative_eq!(n.dot(&radial).abs(), 1.0, epsilon = 1e-12);
        }
    }
}
