// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Coordinate datums used by closed-form expression constructors

use nalgebra::{DMatrix, DVector, SMatrix, SVector};

/// Origin point plus `A` basis vectors in `N`-dimensional space
#[derive(Debug, Clone, PartialEq)]
pub struct Datum<const N: usize, const A: usize> {
    origin: SVector<f64, N>,
    basis: SMatrix<f64, N, A>,
}

impl<const N: usize, const A: usize> Datum<N, A> {
    pub fn new(origin: SVector<f64, N>, basis: SMatrix<f64, N, A>) -> Self {
        Self { origin, basis }
    }

    pub fn origin(&self) -> &SVector<f64, N> {
        &self.origin
    }

    pub fn basis(&self) -> &SMatrix<f64, N, A> {
        &self.basis
    }

    pub fn basis_vector(&self, index: usize) -> SVector<f64, N> {
        assert!(index < A, "basis index {} out of range for {} axes", index, A);
        self.basis.column(index).into_owned()
    }

    pub fn translated_by(&self, vector: &SVector<f64, N>) -> Self {
        Self {
            origin: self.origin + vector,
            basis: self.basis,
        }
    }

    /// Scale about the global origin (moves the datum origin and scales the basis)
    pub fn scaled_about_origin(&self, scale: f64) -> Self {
        Self {
            origin: self.origin * scale,
            basis: self.basis * scale,
        }
    }

    /// Datum with its first basis vector reversed
    pub fn x_reversed(&self) -> Self {
        let mut basis = self.basis;
        basis.column_mut(0).neg_mut();
        Self {
            origin: self.origin,
            basis,
        }
    }

    pub(crate) fn dynamic_origin(&self) -> DVector<f64> {
        DVector::from_iterator(N, self.origin.iter().copied())
    }

    pub(crate) fn dynamic_basis(&self) -> DMatrix<f64> {
        DMatrix::from_fn(N, A, |row, col| self.basis[(row, col)])
    }
}

impl<const N: usize> Datum<N, N> {
    /// Global datum: origin at zero, identity basis
    pub fn global() -> Self {
        Self {
            origin: SVector::zeros(),
            basis: SMatrix::identity(),
        }
    }
}

impl Datum<3, 3> {
    pub fn xy_plane(&self) -> Datum<3, 2> {
        Datum::new(self.origin, SMatrix::<f64, 3, 2>::from_fn(|row, col| self.basis[(row, col)]))
    }

    pub fn z_axis(&self) -> Datum<3, 1> {
        Datum::new(self.origin, SMatrix::<f64, 3, 1>::from_fn(|row, _| self.basis[(row, 2)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_global_datum() {
        let datum = Datum::<3, 3>::global();
        assert_eq!(datum.origin(), &Vector3::zeros());
        assert_eq!(datum.basis_vector(2), Vector3::z());
    }

    #[test]
    fn test_transformations() {
        let datum = Datum::<3, 3>::global()
            .translated_by(&Vector3::new(1.0, 2.0, 3.0))
            .scaled_about_origin(2.0);
        assert_eq!(datum.origin(), &Vector3::new(2.0, 4.0, 6.0));
        assert_eq!(datum.basis_vector(0), Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(datum.x_reversed().basis_vector(0), Vector3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn test_sub_datums() {
        let datum = Datum::<3, 3>::global();
        assert_eq!(datum.xy_plane().basis_vector(1), Vector3::y());
        assert_eq!(datum.z_axis().basis_vector(0), Vector3::z());
    }
}
