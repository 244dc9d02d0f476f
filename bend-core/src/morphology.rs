use crate::error::TopologyError;
use crate::types::{PointIdx, SectionId, SectionType};
use glam::DVec3;
use std::collections::{HashMap, HashSet};

/// One unbranched piece of a neuron: an ordered run of points.
///
/// For non-root sections, `point_idx[0]` is the same geometry index as the
/// parent's last point (the parent anchor). The root's first point is the
/// attachment origin of the whole morphology.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub id: SectionId,
    pub section_type: SectionType,
    pub parent: Option<SectionId>,
    pub point_idx: Vec<PointIdx>,
    pub children: Vec<SectionId>,
}

/// A morphology: sections plus the geometry buffer they index into.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphologyTree {
    pub sections: Vec<Section>,
    pub geometry: Vec<DVec3>,
}

impl Section {
    pub fn new_root(id: SectionId, section_type: SectionType, point_idx: Vec<PointIdx>) -> Self {
        Self {
            id,
            section_type,
            parent: None,
            point_idx,
            children: Vec::with_capacity(2),
        }
    }

    pub fn new_child(
        id: SectionId,
        section_type: SectionType,
        parent: SectionId,
        point_idx: Vec<PointIdx>,
    ) -> Self {
        Self {
            id,
            section_type,
            parent: Some(parent),
            point_idx,
            children: Vec::with_capacity(2),
        }
    }

    /// Index of the section's first point: the anchor for non-root sections.
    #[inline]
    pub fn first_point(&self) -> Option<PointIdx> {
        self.point_idx.first().copied()
    }

    /// Index of the section's last point, where children attach.
    #[inline]
    pub fn last_point(&self) -> Option<PointIdx> {
        self.point_idx.last().copied()
    }
}

impl MorphologyTree {
    /// Creates a tree with a single root section made of `points`.
    pub fn new(section_type: SectionType, points: &[DVec3]) -> Self {
        let geometry = points.to_vec();
        let point_idx = (0..geometry.len()).collect();
        Self {
            sections: vec![Section::new_root(0, section_type, point_idx)],
            geometry,
        }
    }

    /// Appends a child section to `parent`.
    ///
    /// `points` are the child's own points, excluding the anchor: the new
    /// section starts at the parent's last point, which is shared rather
    /// than duplicated in the geometry buffer.
    ///
    /// ### Panics
    /// Panics if `parent` is not a valid index into `sections`, or if the
    /// parent section has no points.
    pub fn add_section(
        &mut self,
        parent: SectionId,
        section_type: SectionType,
        points: &[DVec3],
    ) -> SectionId {
        let id = self.sections.len();
        let parent_points = &self.sections[parent].point_idx;
        let anchor = parent_points[parent_points.len() - 1];

        let mut point_idx = Vec::with_capacity(points.len() + 1);
        point_idx.push(anchor);
        for &p in points {
            point_idx.push(self.geometry.len());
            self.geometry.push(p);
        }

        self.sections
            .push(Section::new_child(id, section_type, parent, point_idx));
        self.sections[parent].children.push(id);
        id
    }

    /// Looks up a section by id.
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections
            .get(id)
            .filter(|s| s.id == id)
            .or_else(|| self.sections.iter().find(|s| s.id == id))
    }

    /// Coordinates of a section's points, in order.
    pub fn section_points(&self, section: &Section) -> Vec<DVec3> {
        section
            .point_idx
            .iter()
            .map(|&i| self.geometry[i])
            .collect()
    }

    /// Total number of points in the geometry buffer.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.geometry.len()
    }

    /// Validates the topology and returns the sections in pre-order
    /// (every parent before any of its children, siblings in child-list
    /// order).
    ///
    /// Checks, in order:
    /// 1. Section ids are unique, sections are non-empty and every point
    ///    index is inside the geometry buffer.
    /// 2. There is exactly one root.
    /// 3. Parent links and child lists agree, and every child starts at
    ///    its parent's last point.
    /// 4. Every section is reachable from the root exactly once.
    pub fn section_order(&self) -> Result<Vec<&Section>, TopologyError> {
        let n = self.sections.len();
        let mut by_id: HashMap<SectionId, &Section> = HashMap::with_capacity(n);

        for s in &self.sections {
            if by_id.insert(s.id, s).is_some() {
                return Err(TopologyError::DuplicateSection(s.id));
            }
            if s.point_idx.is_empty() {
                return Err(TopologyError::EmptySection(s.id));
            }
            if let Some(&point) = s.point_idx.iter().find(|&&p| p >= self.geometry.len()) {
                return Err(TopologyError::PointOutOfRange {
                    section: s.id,
                    point,
                });
            }
        }

        let mut root = None;
        for s in &self.sections {
            match s.parent {
                None => {
                    if let Some(first) = root {
                        return Err(TopologyError::MultipleRoots {
                            first,
                            second: s.id,
                        });
                    }
                    root = Some(s.id);
                }
                Some(parent_id) => {
                    let parent = by_id.get(&parent_id).ok_or(TopologyError::MissingParent {
                        section: s.id,
                        parent: parent_id,
                    })?;
                    if !parent.children.contains(&s.id) {
                        return Err(TopologyError::ChildMismatch {
                            parent: parent_id,
                            child: s.id,
                        });
                    }
                    if parent.last_point() != s.first_point() {
                        return Err(TopologyError::DetachedSection {
                            section: s.id,
                            parent: parent_id,
                        });
                    }
                }
            }

            for &child_id in &s.children {
                let linked = by_id
                    .get(&child_id)
                    .is_some_and(|child| child.parent == Some(s.id));
                if !linked {
                    return Err(TopologyError::ChildMismatch {
                        parent: s.id,
                        child: child_id,
                    });
                }
            }
        }

        let root = root.ok_or(TopologyError::NoRoot)?;

        let mut order = Vec::with_capacity(n);
        let mut visited = HashSet::with_capacity(n);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                return Err(TopologyError::Cycle(id));
            }
            let s = by_id.get(&id).ok_or(TopologyError::Cycle(id))?;
            order.push(*s);
            // Reverse so the first child is popped first.
            stack.extend(s.children.iter().rev());
        }

        if order.len() != n {
            let unreached = self
                .sections
                .iter()
                .find(|s| !visited.contains(&s.id))
                .map_or(root, |s| s.id);
            return Err(TopologyError::Cycle(unreached));
        }

        Ok(order)
    }

    /// Iterates sections parent-before-child after validating the tree.
    pub fn section_iterator(
        &self,
    ) -> Result<impl Iterator<Item = &Section> + '_, TopologyError> {
        Ok(self.section_order()?.into_iter())
    }

    /// Returns `true` if both trees have the same sections (ids, types and
    /// links), regardless of coordinates.
    pub fn same_topology(&self, other: &MorphologyTree) -> bool {
        self.sections == other.sections && self.geometry.len() == other.geometry.len()
    }
}
