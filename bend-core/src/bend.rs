//! Bending morphologies away from a boundary.
//!
//! [`BendEngine::bend_morphology`] walks the tree parent-before-child. For
//! each point it:
//! 1. Moves the point along with every correction already applied
//!    upstream (the running rotation of its section).
//! 2. Turns its distance to the border into a bend probability.
//! 3. If a bend is drawn, tries `n_candidates` small random rotations of
//!    the incoming segment and picks one, preferring candidates deeper
//!    inside the volume.
//!
//! The running rotation at the end of a section is what its children
//! start from, so a bend near the soma carries every distal branch with
//! it.

use crate::boundary::{BoundaryField, count_outside};
use crate::config::BendConfig;
use crate::distance_cache::DistanceCache;
use crate::error::{BendError, TopologyError};
use crate::morphology::{MorphologyTree, Section};
use crate::rotation;
use crate::sampling;
use crate::types::{PointIdx, SectionId};
use glam::{DMat3, DVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Cumulative rotation of each finished section, keyed by section id.
///
/// Written once per section when it finishes; read by its children.
#[derive(Debug, Default)]
pub struct RotationStates {
    states: HashMap<SectionId, DMat3>,
}

impl RotationStates {
    /// Rotation a section starts from: its parent's final rotation, or
    /// identity for the root.
    pub fn inherited(&self, parent: Option<SectionId>) -> DMat3 {
        parent
            .and_then(|p| self.states.get(&p))
            .copied()
            .unwrap_or(DMat3::IDENTITY)
    }

    /// Stores the final rotation of `section`.
    ///
    /// ### Errors
    /// A second write for the same section is a
    /// [`TopologyError::DuplicateSection`].
    pub fn record(&mut self, section: SectionId, rotation: DMat3) -> Result<(), TopologyError> {
        if self.states.insert(section, rotation).is_some() {
            return Err(TopologyError::DuplicateSection(section));
        }
        Ok(())
    }

    pub fn get(&self, section: SectionId) -> Option<DMat3> {
        self.states.get(&section).copied()
    }
}

/// Summary of one bend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BendReport {
    pub sections: usize,
    pub points_visited: usize,
    /// Points replaced by a sampled candidate.
    pub points_corrected: usize,
    /// Bends drawn on zero-length segments, which have no direction to turn.
    pub degenerate_segments: usize,
    /// Corrections where every candidate score underflowed to zero and the
    /// candidate was drawn uniformly.
    pub uniform_picks: usize,
    pub outside_before: usize,
    pub outside_after: usize,
}

/// Bends morphologies inside one boundary field.
#[derive(Debug)]
pub struct BendEngine<'a, B: ?Sized> {
    boundary: &'a B,
    config: BendConfig,
}

/// Mutable state threaded through one bend.
struct Pass<'t> {
    original: &'t [DVec3],
    bent: Vec<DVec3>,
    states: RotationStates,
    cache: DistanceCache,
    report: BendReport,
}

impl<'a, B: BoundaryField + ?Sized> BendEngine<'a, B> {
    /// Creates an engine after validating `config`.
    pub fn new(boundary: &'a B, config: BendConfig) -> Result<Self, BendError> {
        config.validate()?;
        Ok(Self { boundary, config })
    }

    #[inline]
    pub fn config(&self) -> &BendConfig {
        &self.config
    }

    /// Probability of attempting a correction at signed distance `dist`:
    /// `1 / (1 + exp(k * dist))`.
    ///
    /// Non-increasing in `dist`: the closer to (or further outside) the
    /// border, the more likely a bend.
    #[inline]
    pub fn bend_probability(&self, dist: f64) -> f64 {
        sampling::logistic(-self.config.decay_constant * dist)
    }

    /// Unnormalized preference for a candidate at signed distance `dist`:
    /// `1 / (1 + exp(-k * dist))`. Candidates further outside score lower.
    #[inline]
    pub fn candidate_score(&self, dist: f64) -> f64 {
        sampling::logistic(self.config.decay_constant * dist)
    }

    /// Bends `tree` in place.
    ///
    /// The bend runs on a scratch copy of the geometry which replaces the
    /// tree's geometry only on success; on error the tree is untouched.
    /// Topology is never modified.
    ///
    /// Random draws per visited point, in order: one `U[0, 1)` draw, then,
    /// if a correction is attempted, `3 * n_candidates` angle draws and one
    /// weighted draw. The same tree, boundary, config and generator state
    /// therefore always give the same result.
    ///
    /// ### Parameters
    /// - `tree` - Morphology to bend.
    /// - `rng` - Random source; advanced as described above.
    ///
    /// ### Returns
    /// A [`BendReport`] with counts of visited and corrected points and of
    /// points outside the boundary before and after.
    pub fn bend_morphology(
        &self,
        tree: &mut MorphologyTree,
        rng: &mut impl Rng,
    ) -> Result<BendReport, BendError> {
        let (bent, _states, report) = self.bend_geometry(tree, rng)?;
        tree.geometry = bent;

        info!(
            sections = report.sections,
            visited = report.points_visited,
            corrected = report.points_corrected,
            outside_before = report.outside_before,
            outside_after = report.outside_after,
            "bent morphology"
        );
        Ok(report)
    }

    /// Computes the bent geometry without touching `tree`.
    ///
    /// Also returns the final rotation of every section.
    pub fn bend_geometry(
        &self,
        tree: &MorphologyTree,
        rng: &mut impl Rng,
    ) -> Result<(Vec<DVec3>, RotationStates, BendReport), BendError> {
        let order = tree.section_order()?;

        let mut pass = Pass {
            original: &tree.geometry,
            bent: tree.geometry.clone(),
            states: RotationStates::default(),
            cache: DistanceCache::with_capacity(tree.geometry.len() * 2),
            report: BendReport {
                sections: order.len(),
                outside_before: count_outside(self.boundary, &tree.geometry),
                ..BendReport::default()
            },
        };
        // Untouched points keep their original coordinates, so one batch
        // query answers most lookups.
        pass.cache.prefetch(self.boundary, &tree.geometry);

        for section in order {
            self.bend_section(section, &mut pass, rng)?;
        }

        pass.report.outside_after = count_outside(self.boundary, &pass.bent);
        debug!(
            cached = pass.cache.len(),
            hits = pass.cache.hits,
            misses = pass.cache.misses,
            "distance cache"
        );
        Ok((pass.bent, pass.states, pass.report))
    }

    fn bend_section(
        &self,
        section: &Section,
        pass: &mut Pass<'_>,
        rng: &mut impl Rng,
    ) -> Result<(), BendError> {
        let mut rotation = pass.states.inherited(section.parent);

        // The first point is the root origin or the parent's (already
        // final) last point.
        let first = section.point_idx[0];
        let mut prev_original = pass.original[first];
        let mut prev = pass.bent[first];

        for &idx in &section.point_idx[1..] {
            pass.report.points_visited += 1;

            let original = pass.original[idx];
            let segment = rotation * (original - prev_original);
            prev_original = original;

            let natural = prev + segment;
            if !natural.is_finite() {
                return Err(BendError::NonFiniteRotation {
                    section: section.id,
                    point: idx,
                });
            }

            let dist = self.distance(pass, natural, section.id, idx)?;
            let p_bend = self.bend_probability(dist);
            let u = sampling::uniform_unit(rng);

            let mut corrected = false;
            if u < p_bend {
                if segment.length_squared() > 0.0 {
                    let (point, turn) =
                        self.pick_candidate(prev, segment, section.id, idx, pass, rng)?;
                    pass.bent[idx] = point;
                    rotation = turn * rotation;
                    corrected = true;
                    pass.report.points_corrected += 1;
                    debug!(section = section.id, point = idx, dist, "corrected point");
                } else {
                    pass.report.degenerate_segments += 1;
                    debug!(section = section.id, point = idx, "zero-length segment, not bent");
                }
            }
            if !corrected {
                pass.bent[idx] = natural;
            }
            prev = pass.bent[idx];
        }

        pass.states.record(section.id, rotation)?;
        Ok(())
    }

    /// Samples candidate rotations of `segment` about `anchor` and draws
    /// one weighted by [`Self::candidate_score`].
    ///
    /// ### Returns
    /// The chosen position and the rotation that produced it.
    fn pick_candidate(
        &self,
        anchor: DVec3,
        segment: DVec3,
        section: SectionId,
        point: PointIdx,
        pass: &mut Pass<'_>,
        rng: &mut impl Rng,
    ) -> Result<(DVec3, DMat3), BendError> {
        let turns: Vec<DMat3> = sampling::random_euler_angles(
            rng,
            self.config.n_candidates,
            self.config.angle_limit,
        )
        .into_iter()
        .map(rotation::from_euler_xyz)
        .collect();

        let candidates: Vec<DVec3> = turns.iter().map(|t| anchor + *t * segment).collect();
        if candidates.iter().any(|c| !c.is_finite()) {
            return Err(BendError::NonFiniteRotation { section, point });
        }

        let distances = pass.cache.distances(self.boundary, &candidates);
        if distances.iter().any(|d| !d.is_finite()) {
            return Err(BendError::NonFiniteDistance { section, point });
        }

        let scores: Vec<f64> = distances.iter().map(|&d| self.candidate_score(d)).collect();
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            warn!(section, point, "all candidate scores underflowed, picking uniformly");
            pass.report.uniform_picks += 1;
        }
        let picked = sampling::weighted_choice(rng, &scores).ok_or_else(|| {
            BendError::InvalidConfig("n_candidates must be at least 1".to_owned())
        })?;

        Ok((candidates[picked], turns[picked]))
    }

    fn distance(
        &self,
        pass: &mut Pass<'_>,
        p: DVec3,
        section: SectionId,
        point: PointIdx,
    ) -> Result<f64, BendError> {
        let d = pass.cache.distance(self.boundary, p);
        if d.is_finite() {
            Ok(d)
        } else {
            Err(BendError::NonFiniteDistance { section, point })
        }
    }
}

/// Generator for morphology `stream` of a batch seeded with `seed`.
///
/// Streams of the same seed are independent, so a batch gives the same
/// result however it is scheduled.
pub fn stream_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Bends independent morphologies in parallel.
///
/// Tree `i` is bent with [`stream_rng`]`(seed, i)`. Each tree succeeds or
/// fails on its own; a failed tree keeps its original geometry.
pub fn bend_batch<B: BoundaryField + Sync + ?Sized>(
    trees: &mut [MorphologyTree],
    boundary: &B,
    config: BendConfig,
    seed: u64,
) -> Result<Vec<Result<BendReport, BendError>>, BendError> {
    let engine = BendEngine::new(boundary, config)?;

    Ok(trees
        .par_iter_mut()
        .enumerate()
        .map(|(i, tree)| {
            let mut rng = stream_rng(seed, i as u64);
            engine.bend_morphology(tree, &mut rng)
        })
        .collect())
}
