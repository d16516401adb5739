use log::debug;
use slotmap::SlotMap;

use crate::errors::{PipelineError, Result};
use crate::pipeline::classify::PassSet;
use crate::scene::group::SpatialGroup;
use crate::scene::object::VolumeObject;
use crate::scene::{GroupKey, ObjectKey};

/// Arena of volume objects and spatial groups.
///
/// The scene always has a root group. Objects are filed into exactly one
/// group; group hierarchy changes and removals keep membership, bounds
/// dirtiness and draw lists consistent.
pub struct VolumeScene {
    pub(crate) objects: SlotMap<ObjectKey, VolumeObject>,
    pub(crate) groups: SlotMap<GroupKey, SpatialGroup>,
    root: GroupKey,
}

impl Default for VolumeScene {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeScene {
    #[must_use]
    pub fn new() -> Self {
        let mut groups = SlotMap::with_key();
        let root = groups.insert(SpatialGroup::new(None));
        Self {
            objects: SlotMap::with_key(),
            groups,
            root,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> GroupKey {
        self.root
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Adds an empty group under `parent`.
    pub fn add_group(&mut self, parent: GroupKey) -> Result<GroupKey> {
        if !self.groups.contains_key(parent) {
            return Err(PipelineError::ObjectNotFound(format!("group {parent:?}")));
        }
        let key = self.groups.insert(SpatialGroup::new(Some(parent)));
        if let Some(p) = self.groups.get_mut(parent) {
            p.children.push(key);
        }
        self.mark_bounds_dirty(parent);
        Ok(key)
    }

    #[inline]
    #[must_use]
    pub fn group(&self, key: GroupKey) -> Option<&SpatialGroup> {
        self.groups.get(key)
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &SpatialGroup)> {
        self.groups.iter()
    }

    /// Flags `group` and all its ancestors for a bounds refresh.
    pub fn mark_bounds_dirty(&mut self, group: GroupKey) {
        let mut cursor = Some(group);
        while let Some(key) = cursor {
            let Some(g) = self.groups.get_mut(key) else {
                break;
            };
            g.bounds_dirty = true;
            cursor = g.parent;
        }
    }

    pub fn mark_passes_dirty(&mut self, group: GroupKey, passes: PassSet) {
        if let Some(g) = self.groups.get_mut(group) {
            g.dirty_passes.extend(passes);
        }
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Adds an object to the root group.
    pub fn add_object(&mut self, object: VolumeObject) -> ObjectKey {
        let root = self.root;
        self.insert_into(root, object)
    }

    /// Adds an object to `group`.
    pub fn add_object_to(&mut self, group: GroupKey, object: VolumeObject) -> Result<ObjectKey> {
        if !self.groups.contains_key(group) {
            return Err(PipelineError::ObjectNotFound(format!("group {group:?}")));
        }
        Ok(self.insert_into(group, object))
    }

    fn insert_into(&mut self, group: GroupKey, mut object: VolumeObject) -> ObjectKey {
        object.group = Some(group);
        let key = self.objects.insert(object);
        if let Some(g) = self.groups.get_mut(group) {
            g.members.push(key);
            g.dirty_passes = PassSet::ALL;
        }
        self.mark_bounds_dirty(group);
        key
    }

    /// Removes an object and retracts its batches immediately.
    ///
    /// After this returns no draw list references the object, even before
    /// the next rebuild. Passes that lost batches are marked for rebuild.
    pub fn remove_object(&mut self, key: ObjectKey) -> Result<VolumeObject> {
        let object = self
            .objects
            .remove(key)
            .ok_or_else(|| PipelineError::ObjectNotFound(format!("object {key:?}")))?;

        if let Some(group) = object.group {
            if let Some(g) = self.groups.get_mut(group) {
                g.members.retain(|k| *k != key);
                let touched = g.draw_info.retract_object(key);
                g.dirty_passes.extend(touched);
                debug!(
                    "Removed object {key:?}; retracted batches from {} pass(es)",
                    touched.iter().count()
                );
            }
            self.mark_bounds_dirty(group);
        }
        Ok(object)
    }

    /// Re-files an object into another group.
    pub fn move_object(&mut self, key: ObjectKey, to: GroupKey) -> Result<()> {
        if !self.groups.contains_key(to) {
            return Err(PipelineError::ObjectNotFound(format!("group {to:?}")));
        }
        let object = self
            .objects
            .get_mut(key)
            .ok_or_else(|| PipelineError::ObjectNotFound(format!("object {key:?}")))?;
        let from = object.group.replace(to);
        object.bump_generation();

        if let Some(from) = from {
            if let Some(g) = self.groups.get_mut(from) {
                g.members.retain(|k| *k != key);
                let touched = g.draw_info.retract_object(key);
                g.dirty_passes.extend(touched);
            }
            self.mark_bounds_dirty(from);
        }
        if let Some(g) = self.groups.get_mut(to) {
            g.members.push(key);
            g.dirty_passes = PassSet::ALL;
        }
        self.mark_bounds_dirty(to);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn get(&self, key: ObjectKey) -> Option<&VolumeObject> {
        self.objects.get(key)
    }

    #[inline]
    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut VolumeObject> {
        self.objects.get_mut(key)
    }

    pub fn object(&self, key: ObjectKey) -> Result<&VolumeObject> {
        self.objects
            .get(key)
            .ok_or_else(|| PipelineError::ObjectNotFound(format!("object {key:?}")))
    }

    pub fn object_mut(&mut self, key: ObjectKey) -> Result<&mut VolumeObject> {
        self.objects
            .get_mut(key)
            .ok_or_else(|| PipelineError::ObjectNotFound(format!("object {key:?}")))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &VolumeObject)> {
        self.objects.iter()
    }

    #[inline]
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Batches across every group.
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.groups.values().map(|g| g.draw_info.batch_count()).sum()
    }

    /// Whether any group's draw list still references `key`.
    #[must_use]
    pub fn is_referenced(&self, key: ObjectKey) -> bool {
        self.groups.values().any(|g| g.draw_info.references(key))
    }
}
