//! Boundary fields: the volume a morphology has to stay inside.
//!
//! Sign convention used throughout the crate: `distance_to_border` is
//! **positive inside** the volume, zero on the surface and **negative
//! outside**.

use crate::morphology::MorphologyTree;
use glam::DVec3;

/// Geometric oracle reporting inside/outside status and signed distance to
/// the border for batches of points.
pub trait BoundaryField {
    /// Signed distance to the border for each point (positive inside).
    fn distance_to_border(&self, points: &[DVec3]) -> Vec<f64>;

    /// Inside flag for each point.
    ///
    /// Defaults to `distance_to_border(p) >= 0`; mesh-backed fields with
    /// their own containment test should override it.
    fn is_inside(&self, points: &[DVec3]) -> Vec<bool> {
        self.distance_to_border(points)
            .into_iter()
            .map(|d| d >= 0.0)
            .collect()
    }
}

impl<B: BoundaryField + ?Sized> BoundaryField for &B {
    fn distance_to_border(&self, points: &[DVec3]) -> Vec<f64> {
        (**self).distance_to_border(points)
    }

    fn is_inside(&self, points: &[DVec3]) -> Vec<bool> {
        (**self).is_inside(points)
    }
}

/// Solid ball.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereBoundary {
    pub center: DVec3,
    pub radius: f64,
}

impl SphereBoundary {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }
}

impl BoundaryField for SphereBoundary {
    fn distance_to_border(&self, points: &[DVec3]) -> Vec<f64> {
        points
            .iter()
            .map(|p| self.radius - p.distance(self.center))
            .collect()
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxBoundary {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoxBoundary {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    fn signed_distance(&self, p: DVec3) -> f64 {
        let below = self.min - p;
        let above = p - self.max;
        let excess = below.max(above);
        if excess.max_element() <= 0.0 {
            // Inside: distance to the nearest face.
            -excess.max_element()
        } else {
            -excess.max(DVec3::ZERO).length()
        }
    }
}

impl BoundaryField for BoxBoundary {
    fn distance_to_border(&self, points: &[DVec3]) -> Vec<f64> {
        points.iter().map(|&p| self.signed_distance(p)).collect()
    }
}

/// Field backed by a per-point closure.
pub struct FnBoundary<F>(pub F);

impl<F> std::fmt::Debug for FnBoundary<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnBoundary")
    }
}

impl<F: Fn(DVec3) -> f64> BoundaryField for FnBoundary<F> {
    fn distance_to_border(&self, points: &[DVec3]) -> Vec<f64> {
        points.iter().map(|&p| (self.0)(p)).collect()
    }
}

/// Inside flag for every point of `tree`, in geometry-buffer order.
pub fn check_if_inside<B: BoundaryField + ?Sized>(boundary: &B, tree: &MorphologyTree) -> Vec<bool> {
    boundary.is_inside(&tree.geometry)
}

/// Number of `points` outside `boundary`.
pub fn count_outside<B: BoundaryField + ?Sized>(boundary: &B, points: &[DVec3]) -> usize {
    boundary.is_inside(points).iter().filter(|inside| !**inside).count()
}
