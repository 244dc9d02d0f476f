use serde::{Deserialize, Serialize};

/// Identifier for a section in a [`crate::morphology::MorphologyTree`].
///
/// This is an index into `MorphologyTree::sections`, and is only meaningful
/// within the lifetime of a given tree.
pub type SectionId = usize;

/// Index into the shared geometry buffer of a
/// [`crate::morphology::MorphologyTree`].
pub type PointIdx = usize;

/// Neurite category of a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionType {
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
}
