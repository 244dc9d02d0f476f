//! Parent-relative rotation chains.
//!
//! A section with points `x0..xn` is stored as `n` links, each holding the
//! rotation from the previous segment direction to the next one and the
//! length of that segment. The first link is relative to the direction the
//! section inherits from its parent (or [`DEFAULT_PARENT_DIRECTION`] for
//! the root). Because nothing in a chain refers to absolute coordinates, a
//! shape captured once can be replayed under any root position and
//! orientation with [`retarget`].

use crate::error::BendError;
use crate::morphology::MorphologyTree;
use crate::rotation;
use crate::types::SectionId;
use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Direction the root section is encoded against.
pub const DEFAULT_PARENT_DIRECTION: DVec3 = DVec3::X;

/// Segments shorter than this have no usable direction.
pub const DEGENERATE_LENGTH: f64 = 1e-12;

/// One segment of a [`RotationChain`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub rotation: DMat3,
    pub length: f64,
    /// Zero-length segment, stored as identity rotation and zero length.
    pub degenerate: bool,
}

impl ChainLink {
    fn degenerate() -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            length: 0.0,
            degenerate: true,
        }
    }
}

/// Rotation/length encoding of one section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationChain {
    pub links: Vec<ChainLink>,
    /// Direction of the last non-degenerate segment, handed to children.
    pub exit_direction: DVec3,
}

impl RotationChain {
    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn degenerate_count(&self) -> usize {
        self.links.iter().filter(|l| l.degenerate).count()
    }

    /// Link rotations as intrinsic X-Y-Z Euler angles, for export to
    /// formats that store orientations as angle triples.
    pub fn euler_angles(&self) -> Vec<DVec3> {
        self.links
            .iter()
            .map(|l| rotation::to_euler_xyz(l.rotation))
            .collect()
    }
}

/// Absolute coordinates recovered from a chain.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedSection {
    /// `chain.len() + 1` points; the first one is the start point.
    pub points: Vec<DVec3>,
    pub exit_direction: DVec3,
}

/// Chains for a whole morphology plus the root frame they were encoded in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationRepresentation {
    pub chains: BTreeMap<SectionId, RotationChain>,
    pub root_direction: DVec3,
    pub root_point: DVec3,
}

fn unit(direction: DVec3) -> Result<DVec3, BendError> {
    direction.try_normalize().ok_or(BendError::InvalidDirection)
}

/// Encodes consecutive `points` against `parent_direction`.
///
/// Zero-length segments become identity links flagged `degenerate` and do
/// not change the carried direction.
pub fn encode(points: &[DVec3], parent_direction: DVec3) -> Result<RotationChain, BendError> {
    let mut direction = unit(parent_direction)?;
    let mut links = Vec::with_capacity(points.len().saturating_sub(1));

    for (segment, pair) in points.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        let length = delta.length();
        if !length.is_finite() {
            return Err(BendError::NonFiniteGeometry { segment });
        }
        if length <= DEGENERATE_LENGTH {
            debug!(segment, "zero-length segment encoded as identity");
            links.push(ChainLink::degenerate());
            continue;
        }

        let segment_direction = delta / length;
        links.push(ChainLink {
            rotation: rotation::rotation_between(direction, segment_direction),
            length,
            degenerate: false,
        });
        direction = segment_direction;
    }

    Ok(RotationChain {
        links,
        exit_direction: direction,
    })
}

/// Rebuilds absolute coordinates from `chain`, starting at `parent_point`
/// heading along `parent_direction`.
pub fn decode(
    chain: &RotationChain,
    parent_direction: DVec3,
    parent_point: DVec3,
) -> Result<DecodedSection, BendError> {
    decode_in_frame(chain, DMat3::IDENTITY, parent_direction, parent_point)
}

/// Like [`decode`], with every link rotation expressed in `frame`
/// (`frame * R * frame^T`). Decoding with `frame = M` and
/// `parent_direction = M * d` yields `M` applied to the shape encoded
/// against `d`.
fn decode_in_frame(
    chain: &RotationChain,
    frame: DMat3,
    parent_direction: DVec3,
    parent_point: DVec3,
) -> Result<DecodedSection, BendError> {
    let frame_t = frame.transpose();
    let mut direction = unit(parent_direction)?;
    let mut current = parent_point;

    let mut points = Vec::with_capacity(chain.links.len() + 1);
    points.push(current);

    for (segment, link) in chain.links.iter().enumerate() {
        if !link.degenerate {
            direction = (frame * link.rotation * frame_t * direction).normalize();
        }
        current += direction * link.length;
        if !current.is_finite() {
            return Err(BendError::NonFiniteGeometry { segment });
        }
        points.push(current);
    }

    Ok(DecodedSection {
        points,
        exit_direction: direction,
    })
}

/// Encodes every section of `tree`, children against their parent's exit
/// direction.
pub fn encode_tree(tree: &MorphologyTree) -> Result<RotationRepresentation, BendError> {
    let order = tree.section_order()?;

    let mut chains = BTreeMap::new();
    let mut exits: HashMap<SectionId, DVec3> = HashMap::with_capacity(order.len());
    let mut root_point = DVec3::ZERO;

    for section in order {
        let direction = match section.parent {
            Some(parent) => exits
                .get(&parent)
                .copied()
                .ok_or(BendError::MissingChain(parent))?,
            None => {
                root_point = tree.geometry[section.point_idx[0]];
                DEFAULT_PARENT_DIRECTION
            }
        };

        let chain = encode(&tree.section_points(section), direction)?;
        exits.insert(section.id, chain.exit_direction);
        chains.insert(section.id, chain);
    }

    Ok(RotationRepresentation {
        chains,
        root_direction: DEFAULT_PARENT_DIRECTION,
        root_point,
    })
}

/// Decodes `repr` onto `tree`'s topology with the root placed at
/// `root_point` and turned by `root_rotation`.
///
/// The result is the encoded geometry moved rigidly:
/// `root_point + root_rotation * (x - repr.root_point)`. Points of `tree`
/// not covered by any section keep their current coordinates.
pub fn retarget(
    tree: &MorphologyTree,
    repr: &RotationRepresentation,
    root_point: DVec3,
    root_rotation: DMat3,
) -> Result<Vec<DVec3>, BendError> {
    if !rotation::is_orthonormal(root_rotation, 1e-9) {
        return Err(BendError::InvalidRotation);
    }

    let order = tree.section_order()?;
    let mut coords = tree.geometry.clone();
    let mut frames: HashMap<SectionId, (DVec3, DVec3)> = HashMap::with_capacity(order.len());
    let root_direction = root_rotation * unit(repr.root_direction)?;

    for section in order {
        let chain = repr
            .chains
            .get(&section.id)
            .ok_or(BendError::MissingChain(section.id))?;
        if chain.len() + 1 != section.point_idx.len() {
            return Err(BendError::ChainLength {
                section: section.id,
                expected: section.point_idx.len().saturating_sub(1),
                got: chain.len(),
            });
        }

        let (direction, start) = match section.parent {
            Some(parent) => frames
                .get(&parent)
                .copied()
                .ok_or(BendError::MissingChain(parent))?,
            None => (root_direction, root_point),
        };

        let decoded = decode_in_frame(chain, root_rotation, direction, start)?;
        for (&idx, &p) in section.point_idx.iter().zip(&decoded.points) {
            coords[idx] = p;
        }
        let last = decoded.points.last().copied().unwrap_or(start);
        frames.insert(section.id, (decoded.exit_direction, last));
    }

    Ok(coords)
}

/// [`retarget`] and write the result back into `tree`.
pub fn apply_representation(
    tree: &mut MorphologyTree,
    repr: &RotationRepresentation,
    root_point: DVec3,
    root_rotation: DMat3,
) -> Result<(), BendError> {
    tree.geometry = retarget(tree, repr, root_point, root_rotation)?;
    Ok(())
}
