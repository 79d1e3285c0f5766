/// The `tracer_core` crate provides the boundary tolerance primitive used by
/// track-to-surface intersection tests.
///
/// Key components:
/// - **BoundaryTolerance**: a copyable closed sum type over the supported
///   tolerance parameterizations (infinite, none, absolute bound, absolute
///   Cartesian, absolute Euclidean, chi2 bound), each with its own distance
///   metric and evaluation rule.
/// - **ToleranceMode**: classification of whether a configuration extends,
///   leaves unchanged, or shrinks the nominal boundary, driving fast-path
///   containment checks in callers.
pub mod boundary_tolerance;

pub use boundary_tolerance::{
    AbsoluteBoundParams, AbsoluteCartesianParams, AbsoluteEuclideanParams, BoundaryTolerance,
    Chi2BoundParams, ToleranceMode,
};
