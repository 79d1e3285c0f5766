//! Boundary tolerance evaluation for track-to-surface intersection tests.
//!
//! A track hypothesis carries uncertainties, so an intersection test often
//! needs to accept points that are not strictly inside a surface boundary
//! but within some tolerance of it. [`BoundaryTolerance`] captures the
//! different parameterizations of that tolerance behind one copyable value
//! type; the surface code asks it whether a residual (the displacement from
//! a candidate point to the closest boundary point, in local bound
//! coordinates) is tolerated.
//!
//! Supported parameterizations:
//! - `Infinite`: every point is tolerated, the boundary check is disabled.
//! - `None`: zero tolerance, exact containment is required.
//! - `AbsoluteBound`: per-axis absolute tolerance in bound coordinates.
//! - `AbsoluteCartesian`: per-axis absolute tolerance in Cartesian
//!   coordinates, transported into bound coordinates via a caller-supplied
//!   Jacobian when one is available.
//! - `AbsoluteEuclidean`: a single bound on the Euclidean length of the
//!   residual.
//! - `Chi2Bound`: a Mahalanobis-style bound `r^T W r <= max_chi2` with a
//!   weight matrix `W` (the inverse of the bound covariance).

use anyhow::{bail, Result};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Per-axis absolute tolerance in the surface's local bound coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteBoundParams {
    pub tolerance0: f64,
    pub tolerance1: f64,
}

/// Per-axis absolute tolerance in ambient Cartesian coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteCartesianParams {
    pub tolerance0: f64,
    pub tolerance1: f64,
}

/// Absolute bound on the Euclidean length of the residual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteEuclideanParams {
    pub tolerance: f64,
}

/// Chi2 tolerance: a maximum chi2 value and a symmetric 2x2 weight matrix
/// (the inverse bound covariance), stored row-major to keep the record
/// trivially copyable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chi2BoundParams {
    pub max_chi2: f64,
    pub weight: [f64; 4],
}

impl Chi2BoundParams {
    /// The weight matrix reassembled from its row-major storage.
    pub fn weight_matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.weight[0], self.weight[1], self.weight[2], self.weight[3])
    }
}

/// Whether a tolerance configuration extends, leaves unchanged, or shrinks
/// the nominal boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToleranceMode {
    /// The accepted region is enlarged beyond the nominal boundary.
    Extend,
    /// Exact containment; callers may skip the residual computation and use
    /// an exact containment test instead.
    None,
    /// The accepted region is tightened inside the nominal boundary.
    /// Reachable through a negative Euclidean radius or a negative maximum
    /// chi2; the absolute-bound factories reject negative tolerances.
    Shrink,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Variant {
    Infinite,
    None,
    AbsoluteBound(AbsoluteBoundParams),
    AbsoluteCartesian(AbsoluteCartesianParams),
    AbsoluteEuclidean(AbsoluteEuclideanParams),
    Chi2Bound(Chi2BoundParams),
}

/// Closed sum type over the supported boundary tolerance parameterizations.
///
/// Constructed once per tolerance policy through the factory functions,
/// then evaluated many times per intersection test via [`is_tolerated`].
/// The type is `Copy` and never mutated after construction, so copies may
/// be handed to worker threads and evaluated concurrently without
/// synchronization. The wrapped variant is private: the factories are the
/// only construction path, which keeps invalid parameter combinations
/// unconstructible.
///
/// [`is_tolerated`]: BoundaryTolerance::is_tolerated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryTolerance {
    variant: Variant,
}

impl BoundaryTolerance {
    /// Infinite tolerance, i.e. no boundary check.
    pub fn infinite() -> Self {
        Self {
            variant: Variant::Infinite,
        }
    }

    /// No tolerance, i.e. exact boundary check.
    pub fn none() -> Self {
        Self {
            variant: Variant::None,
        }
    }

    /// Absolute per-axis tolerance in bound coordinates.
    pub fn absolute_bound(tolerance0: f64, tolerance1: f64) -> Result<Self> {
        if tolerance0 < 0.0 || tolerance1 < 0.0 {
            bail!(
                "AbsoluteBound: tolerance must be non-negative, got ({}, {})",
                tolerance0,
                tolerance1
            );
        }
        Ok(Self {
            variant: Variant::AbsoluteBound(AbsoluteBoundParams {
                tolerance0,
                tolerance1,
            }),
        })
    }

    /// Absolute per-axis tolerance in Cartesian coordinates.
    ///
    /// Both tolerances must be zero or both non-zero, so the transported
    /// tolerance ellipse is either a point or non-degenerate on both axes.
    pub fn absolute_cartesian(tolerance0: f64, tolerance1: f64) -> Result<Self> {
        if tolerance0 < 0.0 || tolerance1 < 0.0 {
            bail!(
                "AbsoluteCartesian: tolerance must be non-negative, got ({}, {})",
                tolerance0,
                tolerance1
            );
        }
        if (tolerance0 == 0.0) != (tolerance1 == 0.0) {
            bail!("AbsoluteCartesian: both tolerances must be zero or non-zero");
        }
        Ok(Self {
            variant: Variant::AbsoluteCartesian(AbsoluteCartesianParams {
                tolerance0,
                tolerance1,
            }),
        })
    }

    /// Absolute tolerance on the Euclidean length of the residual.
    ///
    /// The sign is unconstrained: a negative radius classifies as
    /// [`ToleranceMode::Shrink`].
    pub fn absolute_euclidean(tolerance: f64) -> Self {
        Self {
            variant: Variant::AbsoluteEuclidean(AbsoluteEuclideanParams { tolerance }),
        }
    }

    /// Chi2 tolerance from a weight matrix (inverse bound covariance) and a
    /// maximum chi2 value.
    pub fn chi2_bound(weight: &Matrix2<f64>, max_chi2: f64) -> Self {
        Self {
            variant: Variant::Chi2Bound(Chi2BoundParams {
                max_chi2,
                weight: [
                    weight[(0, 0)],
                    weight[(0, 1)],
                    weight[(1, 0)],
                    weight[(1, 1)],
                ],
            }),
        }
    }

    /// Check if the tolerance is infinite.
    pub fn is_infinite(&self) -> bool {
        matches!(self.variant, Variant::Infinite)
    }

    /// Check if there is no tolerance.
    pub fn is_none(&self) -> bool {
        matches!(self.variant, Variant::None)
    }

    /// Check if the tolerance is absolute in bound coordinates.
    ///
    /// With `is_cartesian` set, an absolute Cartesian tolerance also counts:
    /// callers that want a uniform "two independent axis bounds" view opt in
    /// to treating the Cartesian pair as bound-shaped.
    pub fn has_absolute_bound(&self, is_cartesian: bool) -> bool {
        match self.variant {
            Variant::AbsoluteBound(_) => true,
            Variant::AbsoluteCartesian(_) => is_cartesian,
            _ => false,
        }
    }

    /// Check if the tolerance is absolute in Cartesian coordinates.
    pub fn has_absolute_cartesian(&self) -> bool {
        matches!(self.variant, Variant::AbsoluteCartesian(_))
    }

    /// Check if the tolerance is absolute in Euclidean distance.
    pub fn has_absolute_euclidean(&self) -> bool {
        matches!(self.variant, Variant::AbsoluteEuclidean(_))
    }

    /// Check if the tolerance is a chi2 bound.
    pub fn has_chi2_bound(&self) -> bool {
        matches!(self.variant, Variant::Chi2Bound(_))
    }

    /// Classify whether this tolerance extends, leaves unchanged, or shrinks
    /// the nominal boundary.
    ///
    /// Callers seeing [`ToleranceMode::None`] may run an exact containment
    /// test and skip the residual computation entirely.
    pub fn tolerance_mode(&self) -> ToleranceMode {
        match &self.variant {
            Variant::Infinite => ToleranceMode::Extend,
            Variant::None => ToleranceMode::None,
            Variant::AbsoluteBound(p) => {
                if p.tolerance0 == 0.0 && p.tolerance1 == 0.0 {
                    ToleranceMode::None
                } else {
                    ToleranceMode::Extend
                }
            }
            Variant::AbsoluteCartesian(p) => {
                if p.tolerance0 == 0.0 && p.tolerance1 == 0.0 {
                    ToleranceMode::None
                } else {
                    ToleranceMode::Extend
                }
            }
            Variant::AbsoluteEuclidean(p) => signed_mode(p.tolerance),
            Variant::Chi2Bound(p) => signed_mode(p.max_chi2),
        }
    }

    /// Get the tolerance as an absolute bound.
    ///
    /// # Panics
    /// If the tolerance is neither absolute bound nor, with `is_cartesian`
    /// set, absolute Cartesian. Callers are expected to have branched on the
    /// classification queries first.
    pub fn as_absolute_bound(&self, is_cartesian: bool) -> AbsoluteBoundParams {
        self.as_absolute_bound_opt(is_cartesian)
            .expect("boundary tolerance is not an absolute bound")
    }

    /// Get the tolerance as an absolute bound if possible.
    ///
    /// Non-panicking counterpart of [`as_absolute_bound`] for call sites
    /// probing without a prior classification check.
    ///
    /// [`as_absolute_bound`]: BoundaryTolerance::as_absolute_bound
    pub fn as_absolute_bound_opt(&self, is_cartesian: bool) -> Option<AbsoluteBoundParams> {
        match self.variant {
            Variant::AbsoluteBound(p) => Some(p),
            Variant::AbsoluteCartesian(p) if is_cartesian => Some(AbsoluteBoundParams {
                tolerance0: p.tolerance0,
                tolerance1: p.tolerance1,
            }),
            _ => None,
        }
    }

    /// Get the tolerance as absolute Cartesian.
    ///
    /// # Panics
    /// If the active variant is not absolute Cartesian.
    pub fn as_absolute_cartesian(&self) -> &AbsoluteCartesianParams {
        match &self.variant {
            Variant::AbsoluteCartesian(p) => p,
            _ => panic!("boundary tolerance is not absolute Cartesian"),
        }
    }

    /// Get the tolerance as absolute Euclidean.
    ///
    /// # Panics
    /// If the active variant is not absolute Euclidean.
    pub fn as_absolute_euclidean(&self) -> &AbsoluteEuclideanParams {
        match &self.variant {
            Variant::AbsoluteEuclidean(p) => p,
            _ => panic!("boundary tolerance is not absolute Euclidean"),
        }
    }

    /// Get the tolerance as a chi2 bound.
    ///
    /// # Panics
    /// If the active variant is not a chi2 bound.
    pub fn as_chi2_bound(&self) -> &Chi2BoundParams {
        match &self.variant {
            Variant::Chi2Bound(p) => p,
            _ => panic!("boundary tolerance is not a chi2 bound"),
        }
    }

    /// Check if a metric is assigned to this tolerance.
    ///
    /// Euclidean and chi2 tolerances always carry a metric; a Cartesian
    /// tolerance only has one when a Jacobian is available to project it
    /// into bound coordinates. The remaining variants compare axis-wise and
    /// expose no metric.
    pub fn has_metric(&self, has_jacobian: bool) -> bool {
        match self.variant {
            Variant::AbsoluteEuclidean(_) | Variant::Chi2Bound(_) => true,
            Variant::AbsoluteCartesian(_) => has_jacobian,
            _ => false,
        }
    }

    /// Get the 2x2 weight matrix `W` of the tolerance metric.
    ///
    /// For the absolute variants the acceptance test is `r^T W r <= 1`. The
    /// chi2 weight matrix is returned un-normalized, so there the comparison
    /// constant is `max_chi2` rather than 1; [`is_tolerated`] accounts for
    /// this asymmetry.
    ///
    /// # Panics
    /// If [`has_metric`] is false for this variant and Jacobian
    /// availability.
    ///
    /// [`is_tolerated`]: BoundaryTolerance::is_tolerated
    /// [`has_metric`]: BoundaryTolerance::has_metric
    pub fn get_metric(&self, jacobian: Option<&Matrix2<f64>>) -> Matrix2<f64> {
        match (&self.variant, jacobian) {
            (Variant::Chi2Bound(p), _) => p.weight_matrix(),
            (Variant::AbsoluteEuclidean(p), _) => {
                Matrix2::identity() / (p.tolerance * p.tolerance)
            }
            (Variant::AbsoluteCartesian(p), Some(j)) => {
                let inverse_square = Matrix2::from_diagonal(&Vector2::new(
                    1.0 / (p.tolerance0 * p.tolerance0),
                    1.0 / (p.tolerance1 * p.tolerance1),
                ));
                j.transpose() * inverse_square * j
            }
            _ => panic!("boundary tolerance has no metric for this variant and Jacobian"),
        }
    }

    /// Check if a residual is within tolerance.
    ///
    /// `distance` is the displacement from the candidate point to the
    /// closest point on the boundary, in bound coordinates. `jacobian`, when
    /// available, is the local linearization between bound and Cartesian
    /// displacements; without it a Cartesian tolerance degrades to an
    /// axis-wise check on the uncorrected residual.
    pub fn is_tolerated(
        &self,
        distance: &Vector2<f64>,
        jacobian: Option<&Matrix2<f64>>,
    ) -> bool {
        match &self.variant {
            Variant::Infinite => true,
            Variant::None => is_exact_zero(distance),
            Variant::AbsoluteBound(p) => {
                within_axis_bounds(distance, p.tolerance0, p.tolerance1)
            }
            Variant::AbsoluteCartesian(p) => match jacobian {
                Some(j) => {
                    // Zero tolerance makes the reciprocal weight singular;
                    // degrade to an exact match instead of propagating NaN.
                    // Construction guarantees the tolerances are jointly zero.
                    if p.tolerance0 == 0.0 {
                        is_exact_zero(distance)
                    } else {
                        quadratic_form(&self.get_metric(Some(j)), distance) <= 1.0
                    }
                }
                None => within_axis_bounds(distance, p.tolerance0, p.tolerance1),
            },
            Variant::AbsoluteEuclidean(p) => {
                if p.tolerance == 0.0 {
                    is_exact_zero(distance)
                } else {
                    quadratic_form(&self.get_metric(jacobian), distance) <= 1.0
                }
            }
            // Un-normalized metric: the comparison constant is max_chi2, not 1.
            Variant::Chi2Bound(p) => {
                quadratic_form(&p.weight_matrix(), distance) <= p.max_chi2
            }
        }
    }
}

fn signed_mode(tolerance: f64) -> ToleranceMode {
    if tolerance > 0.0 {
        ToleranceMode::Extend
    } else if tolerance < 0.0 {
        ToleranceMode::Shrink
    } else {
        ToleranceMode::None
    }
}

fn is_exact_zero(distance: &Vector2<f64>) -> bool {
    distance.x == 0.0 && distance.y == 0.0
}

fn within_axis_bounds(distance: &Vector2<f64>, tolerance0: f64, tolerance1: f64) -> bool {
    distance.x.abs() <= tolerance0 && distance.y.abs() <= tolerance1
}

fn quadratic_form(weight: &Matrix2<f64>, distance: &Vector2<f64>) -> f64 {
    distance.dot(&(weight * distance))
}
