use crate::boundary::BoundaryField;
use glam::DVec3;
use std::collections::HashMap;

/// A scratch memo of distance-to-border queries for one bend.
///
/// For each queried point (keyed by the exact bit pattern of its
/// coordinates), this cache stores the signed distance reported by the
/// boundary field. It lives only as long as one
/// [`crate::bend::BendEngine::bend_morphology`] call, so a boundary that
/// changes between calls is never served stale values.
///
/// Lookups that miss are forwarded to the field in a single batch call.
#[derive(Debug, Default)]
pub struct DistanceCache {
    /// Cached signed distances.
    entries: HashMap<[u64; 3], f64>,
    /// Number of lookups answered from the cache.
    pub hits: usize,
    /// Number of lookups forwarded to the boundary field.
    pub misses: usize,
}

#[inline]
fn key(p: DVec3) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

impl DistanceCache {
    /// Creates an empty cache with room for `capacity` points.
    ///
    /// ### Parameters
    /// - `capacity` - Expected number of distinct points.
    ///
    /// ### Returns
    /// A new, empty [`DistanceCache`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Queries `boundary` for all of `points` in one batch and stores the
    /// answers, without touching the hit/miss counters.
    ///
    /// ### Parameters
    /// - `boundary` - Field to query.
    /// - `points` - Points expected to be looked up later.
    pub fn prefetch<B: BoundaryField + ?Sized>(&mut self, boundary: &B, points: &[DVec3]) {
        let distances = boundary.distance_to_border(points);
        for (&p, d) in points.iter().zip(distances) {
            self.entries.insert(key(p), d);
        }
    }

    /// Returns the signed distance of a single point.
    ///
    /// ### Parameters
    /// - `boundary` - Field to query on a miss.
    /// - `point` - Point to look up.
    ///
    /// ### Returns
    /// The cached or freshly computed distance. A field that returns no
    /// value for the point yields `f64::NAN`.
    pub fn distance<B: BoundaryField + ?Sized>(&mut self, boundary: &B, point: DVec3) -> f64 {
        self.distances(boundary, &[point])[0]
    }

    /// Returns the signed distances of `points`, in order.
    ///
    /// Points not yet cached are sent to `boundary` together in one call.
    ///
    /// ### Parameters
    /// - `boundary` - Field to query on misses.
    /// - `points` - Points to look up.
    ///
    /// ### Returns
    /// One distance per input point. Missing answers from a misbehaving
    /// field are reported as `f64::NAN` so callers can reject them.
    pub fn distances<B: BoundaryField + ?Sized>(&mut self, boundary: &B, points: &[DVec3]) -> Vec<f64> {
        let missing: Vec<DVec3> = points
            .iter()
            .copied()
            .filter(|&p| !self.entries.contains_key(&key(p)))
            .collect();

        if !missing.is_empty() {
            let fresh = boundary.distance_to_border(&missing);
            for (i, &p) in missing.iter().enumerate() {
                self.entries
                    .insert(key(p), fresh.get(i).copied().unwrap_or(f64::NAN));
            }
        }

        self.misses += missing.len();
        self.hits += points.len() - missing.len();

        points
            .iter()
            .map(|&p| self.entries.get(&key(p)).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Number of cached points.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{FnBoundary, SphereBoundary};
    use std::cell::Cell;

    #[test]
    fn with_capacity_starts_empty() {
        let cache = DistanceCache::with_capacity(8);

        assert!(cache.is_empty());
        assert_eq!(cache.hits, 0);
        assert_eq!(cache.misses, 0);
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let calls = Cell::new(0u32);
        let field = FnBoundary(|p: DVec3| {
            calls.set(calls.get() + 1);
            10.0 - p.length()
        });
        let mut cache = DistanceCache::with_capacity(4);

        let p = DVec3::new(3.0, 4.0, 0.0);
        assert_eq!(cache.distance(&field, p), 5.0);
        assert_eq!(cache.distance(&field, p), 5.0);

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.hits, 1);
        assert_eq!(cache.misses, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn batch_lookup_only_forwards_misses() {
        let sphere = SphereBoundary::new(DVec3::ZERO, 10.0);
        let mut cache = DistanceCache::with_capacity(4);
        cache.prefetch(&sphere, &[DVec3::ZERO]);

        let d = cache.distances(&sphere, &[DVec3::ZERO, DVec3::new(0.0, 0.0, 12.0)]);

        assert_eq!(d, vec![10.0, -2.0]);
        assert_eq!(cache.hits, 1);
        assert_eq!(cache.misses, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn negative_zero_is_a_distinct_key() {
        let field = FnBoundary(|p: DVec3| if p.x.is_sign_negative() { -1.0 } else { 1.0 });
        let mut cache = DistanceCache::default();

        assert_eq!(cache.distance(&field, DVec3::ZERO), 1.0);
        assert_eq!(cache.distance(&field, DVec3::new(-0.0, 0.0, 0.0)), -1.0);
    }
}
