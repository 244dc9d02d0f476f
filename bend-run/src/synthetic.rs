//! Random branching morphologies for driving the bend engine without a
//! morphology file.

use bend_core::morphology::MorphologyTree;
use bend_core::types::{SectionId, SectionType};
use glam::DVec3;
use rand::Rng;

/// Shape parameters of [`random_morphology`].
#[derive(Clone, Copy, Debug)]
pub struct Shape {
    pub branches: usize,
    pub depth: usize,
    pub points_per_section: usize,
    pub segment_length: f64,
}

/// Uniform random unit vector.
pub fn random_direction(rng: &mut impl Rng) -> DVec3 {
    loop {
        let v = DVec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        let len2 = v.length_squared();
        if len2 > 1e-6 && len2 <= 1.0 {
            return v / len2.sqrt();
        }
    }
}

/// Grows a dendrite-like tree from `soma`.
///
/// Every tip splits into `shape.branches` sections for `shape.depth`
/// levels. Each section wanders away from its parent's heading.
pub fn random_morphology(soma: DVec3, shape: Shape, rng: &mut impl Rng) -> MorphologyTree {
    let heading = random_direction(rng);
    let root_tip = soma + heading * shape.segment_length * 0.5;
    let mut tree = MorphologyTree::new(SectionType::Soma, &[soma, root_tip]);

    // (section, heading at its tip, tip position)
    let mut tips: Vec<(SectionId, DVec3, DVec3)> = vec![(0, heading, root_tip)];
    for _ in 0..shape.depth {
        let mut next = Vec::with_capacity(tips.len() * shape.branches);
        for &(parent, parent_heading, anchor) in &tips {
            for _ in 0..shape.branches {
                let mut dir =
                    (parent_heading + random_direction(rng) * 0.6).normalize_or(parent_heading);
                let mut p = anchor;
                let mut points = Vec::with_capacity(shape.points_per_section);
                for _ in 0..shape.points_per_section {
                    dir = (dir + random_direction(rng) * 0.2).normalize_or(dir);
                    p += dir * shape.segment_length;
                    points.push(p);
                }
                let id = tree.add_section(parent, SectionType::BasalDendrite, &points);
                next.push((id, dir, p));
            }
        }
        tips = next;
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn random_morphology_has_expected_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let shape = Shape {
            branches: 2,
            depth: 3,
            points_per_section: 4,
            segment_length: 10.0,
        };
        let tree = random_morphology(DVec3::ZERO, shape, &mut rng);

        // 1 root + 2 + 4 + 8 sections.
        assert_eq!(tree.sections.len(), 15);
        assert_eq!(tree.point_count(), 2 + 14 * 4);
        assert!(tree.section_order().is_ok());
    }
}
