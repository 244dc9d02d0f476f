//! Error types for tree validation, bending and chain decoding.

use crate::types::{PointIdx, SectionId};

/// Structural problems in a [`crate::morphology::MorphologyTree`].
///
/// Any of these aborts the whole operation; nothing computed from a tree
/// that fails validation is kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("tree has no root section")]
    NoRoot,

    #[error("tree has more than one root section: {first} and {second}")]
    MultipleRoots { first: SectionId, second: SectionId },

    #[error("section {section} refers to missing parent {parent}")]
    MissingParent { section: SectionId, parent: SectionId },

    #[error("section id {0} is used more than once")]
    DuplicateSection(SectionId),

    #[error("section {0} is part of a cycle or unreachable from the root")]
    Cycle(SectionId),

    #[error("section {0} has no points")]
    EmptySection(SectionId),

    /// The first point of a child does not share the parent's last point.
    #[error("section {section} does not start at the last point of parent {parent}")]
    DetachedSection { section: SectionId, parent: SectionId },

    #[error("child list of section {parent} disagrees with parent link of section {child}")]
    ChildMismatch { parent: SectionId, child: SectionId },

    #[error("section {section} refers to point {point} outside the geometry buffer")]
    PointOutOfRange { section: SectionId, point: PointIdx },
}

/// Errors produced by [`crate::bend::BendEngine`] and [`crate::codec`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BendError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// The boundary field returned NaN or an infinity.
    #[error("non-finite distance to border at section {section}, point {point}")]
    NonFiniteDistance { section: SectionId, point: PointIdx },

    #[error("non-finite rotation result at section {section}, point {point}")]
    NonFiniteRotation { section: SectionId, point: PointIdx },

    #[error("invalid bend configuration: {0}")]
    InvalidConfig(String),

    #[error("direction vector must be finite and non-zero")]
    InvalidDirection,

    #[error("root rotation is not orthonormal with determinant +1")]
    InvalidRotation,

    /// A point or chain link produced a non-finite coordinate.
    #[error("non-finite geometry at segment {segment}")]
    NonFiniteGeometry { segment: usize },

    #[error("rotation representation has no chain for section {0}")]
    MissingChain(SectionId),

    #[error("chain for section {section} has {got} links, expected {expected}")]
    ChainLength {
        section: SectionId,
        expected: usize,
        got: usize,
    },
}

impl BendError {
    /// Returns `true` for errors caused by the tree structure rather than
    /// by numerics or configuration.
    #[inline]
    pub fn is_topology(&self) -> bool {
        matches!(self, Self::Topology(_))
    }
}
