//! Batch driver around the bend engine.
//!
//! This module defines [`Runner`], which owns the run state (morphologies,
//! boundary, configuration and seed) and performs the bend and retarget
//! passes.

use crate::synthetic::{self, Shape};
use anyhow::Context;
use bend_core::{
    bend::{self, BendReport},
    boundary::{self, SphereBoundary},
    codec,
    config::BendConfig,
    morphology::MorphologyTree,
    rotation,
};
use glam::DVec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

/// Main state of a run.
///
/// [`Runner`] glues together:
/// - The morphologies to bend, all placed inside one spherical volume.
/// - The [`BendConfig`] and the batch seed.
///
/// ### Fields
/// - `trees` - Morphologies, bent in place by [`Runner::bend_all`].
/// - `boundary` - The tissue volume.
/// - `cfg` - Bending parameters.
/// - `seed` - Seed of the whole run; tree `i` bends with stream `i`.
pub struct Runner {
    trees: Vec<MorphologyTree>,
    boundary: SphereBoundary,
    cfg: BendConfig,
    seed: u64,
}

/// Totals over one [`Runner::bend_all`] pass.
#[derive(Debug, Default)]
pub struct Summary {
    pub bent: usize,
    pub failed: usize,
    pub corrected: usize,
    pub outside_before: usize,
    pub outside_after: usize,
}

impl Runner {
    /// Creates a run with `count` random morphologies.
    ///
    /// Somata are placed in the outer shell of the sphere (between 60% and
    /// 90% of the radius) so that arbors reach the border.
    pub fn new(count: usize, radius: f64, shape: Shape, cfg: BendConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let boundary = SphereBoundary::new(DVec3::ZERO, radius);

        let trees = (0..count)
            .map(|_| {
                let soma = synthetic::random_direction(&mut rng)
                    * radius
                    * (0.6 + 0.3 * rng.random::<f64>());
                synthetic::random_morphology(soma, shape, &mut rng)
            })
            .collect();

        Self {
            trees,
            boundary,
            cfg,
            seed,
        }
    }

    #[inline]
    pub fn trees(&self) -> &[MorphologyTree] {
        &self.trees
    }

    /// Bends every morphology in parallel and logs one line per tree.
    pub fn bend_all(&mut self) -> anyhow::Result<Summary> {
        let results = bend::bend_batch(&mut self.trees, &self.boundary, self.cfg, self.seed)
            .context("invalid bend configuration")?;

        let mut summary = Summary::default();
        for (i, result) in results.into_iter().enumerate() {
            match result {
                Ok(BendReport {
                    points_corrected,
                    outside_before,
                    outside_after,
                    ..
                }) => {
                    info!(tree = i, points_corrected, outside_before, outside_after, "bent");
                    summary.bent += 1;
                    summary.corrected += points_corrected;
                    summary.outside_before += outside_before;
                    summary.outside_after += outside_after;
                }
                Err(err) => {
                    warn!(tree = i, %err, "bend failed, morphology left unchanged");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Captures tree `index` as rotation chains and replays it with the soma
    /// moved to `position` and the whole arbor turned by `angles` (intrinsic
    /// X-Y-Z Euler angles).
    ///
    /// ### Returns
    /// The replayed geometry and how many of its points lie outside the
    /// boundary.
    pub fn retarget(
        &self,
        index: usize,
        position: DVec3,
        angles: DVec3,
    ) -> anyhow::Result<(Vec<DVec3>, usize)> {
        let tree = self
            .trees
            .get(index)
            .with_context(|| format!("no morphology with index {index}"))?;

        let repr = codec::encode_tree(tree)?;
        let coords = codec::retarget(tree, &repr, position, rotation::from_euler_xyz(angles))?;

        let outside = boundary::count_outside(&self.boundary, &coords);
        Ok((coords, outside))
    }

    /// Largest Euler angle (in radians, any axis) among the chain links of
    /// tree `index`.
    pub fn largest_turn(&self, index: usize) -> anyhow::Result<f64> {
        let tree = self
            .trees
            .get(index)
            .with_context(|| format!("no morphology with index {index}"))?;
        let repr = codec::encode_tree(tree)?;

        Ok(repr
            .chains
            .values()
            .flat_map(|chain| chain.euler_angles())
            .map(|a| a.abs().max_element())
            .fold(0.0, f64::max))
    }

    /// Largest deviation between tree `index` and its own chain encoding
    /// replayed in place.
    pub fn round_trip_error(&self, index: usize) -> anyhow::Result<f64> {
        let tree = self
            .trees
            .get(index)
            .with_context(|| format!("no morphology with index {index}"))?;
        let repr = codec::encode_tree(tree)?;
        let coords = codec::retarget(tree, &repr, repr.root_point, glam::DMat3::IDENTITY)?;

        Ok(coords
            .iter()
            .zip(&tree.geometry)
            .map(|(a, b)| a.distance(*b))
            .fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_run() -> Runner {
        let shape = Shape {
            branches: 2,
            depth: 3,
            points_per_section: 4,
            segment_length: 15.0,
        };
        Runner::new(4, 150.0, shape, BendConfig::default(), 5)
    }

    #[test]
    fn bend_all_bends_every_tree() {
        let mut run = small_run();
        let summary = run.bend_all().expect("valid config");

        assert_eq!(summary.bent, 4);
        assert_eq!(summary.failed, 0);
        assert!(summary.outside_before > 0, "arbors should reach the border");
        assert!(summary.corrected > 0);
    }

    #[test]
    fn round_trip_is_exact_after_bending() {
        let mut run = small_run();
        run.bend_all().expect("valid config");

        for i in 0..run.trees().len() {
            let err = run.round_trip_error(i).expect("valid tree");
            assert!(err < 1e-9, "tree {i} drifted by {err}");
        }
    }

    #[test]
    fn largest_turn_is_a_valid_angle() {
        let run = small_run();
        let turn = run.largest_turn(0).expect("valid tree");

        assert!(turn > 0.0 && turn <= std::f64::consts::PI, "turn {turn}");
        assert!(run.largest_turn(99).is_err());
    }

    #[test]
    fn retarget_moves_soma() {
        let run = small_run();
        let (coords, _) = run
            .retarget(0, DVec3::new(1.0, 2.0, 3.0), DVec3::new(0.0, 0.0, 1.0))
            .expect("valid tree");

        assert!(coords[0].abs_diff_eq(DVec3::new(1.0, 2.0, 3.0), 1e-12));
        assert!(run.retarget(99, DVec3::ZERO, DVec3::ZERO).is_err());
    }
}
