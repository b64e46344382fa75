//! The scene document: collections, objects, materials, and specs.
//!
//! Object and collection names are unique scene-wide; inserting a
//! duplicate auto-suffixes `.001`, `.002`, … the way the host does.
//! Collections form a tree rooted at the scene collection; an object may
//! be linked into several collections at once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use relmesh_model::SpecRegistry;
use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::dedupe_name;

use crate::id::{CollectionId, ObjectId};
use crate::object::Object;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub children: Vec<CollectionId>,
    pub objects: Vec<ObjectId>,
    /// Excluded from the view layer; setup unhides before editing.
    pub excluded: bool,
    pub hidden: bool,
}

impl Collection {
    fn new(name: String) -> Self {
        Collection {
            name,
            children: Vec::new(),
            objects: Vec::new(),
            excluded: false,
            hidden: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub specs: SpecRegistry,
    materials: BTreeSet<String>,
    collections: BTreeMap<CollectionId, Collection>,
    objects: BTreeMap<ObjectId, Object>,
    root: CollectionId,
    next_id: u32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root = CollectionId(0);
        let mut collections = BTreeMap::new();
        collections.insert(root, Collection::new("Scene Collection".to_string()));
        Scene {
            specs: SpecRegistry::new(),
            materials: BTreeSet::new(),
            collections,
            objects: BTreeMap::new(),
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> CollectionId {
        self.root
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- lookups ----------------------------------------------------------

    pub fn collection(&self, id: CollectionId) -> Option<&Collection> {
        self.collections.get(&id)
    }

    pub fn expect_collection(&self, id: CollectionId) -> Result<&Collection> {
        self.collection(id)
            .ok_or_else(|| SetupError::structure(format!("unknown {id}")))
    }

    pub fn expect_collection_mut(&mut self, id: CollectionId) -> Result<&mut Collection> {
        self.collections
            .get_mut(&id)
            .ok_or_else(|| SetupError::structure(format!("unknown {id}")))
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    pub fn expect_object(&self, id: ObjectId) -> Result<&Object> {
        self.object(id)
            .ok_or_else(|| SetupError::structure(format!("unknown {id}")))
    }

    pub fn expect_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| SetupError::structure(format!("unknown {id}")))
    }

    pub fn collection_named(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .find(|(_, collection)| collection.name == name)
            .map(|(&id, _)| id)
    }

    pub fn object_named(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(&id, _)| id)
    }

    /// The first collection holding `child` as a direct sub-collection.
    pub fn parent_collection(&self, child: CollectionId) -> Option<CollectionId> {
        self.collections
            .iter()
            .find(|(_, collection)| collection.children.contains(&child))
            .map(|(&id, _)| id)
    }

    /// Every collection directly owning `object`, in id order.
    pub fn collections_owning_object(&self, object: ObjectId) -> Vec<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, collection)| collection.objects.contains(&object))
            .map(|(&id, _)| id)
            .collect()
    }

    // --- materials ----------------------------------------------------------

    /// Register a material, deduplicating its name. Returns the name used.
    pub fn add_material(&mut self, name: &str) -> String {
        let assigned = dedupe_name(name, |candidate| self.materials.contains(candidate));
        self.materials.insert(assigned.clone());
        assigned
    }

    pub fn has_material(&self, name: &str) -> bool {
        self.materials.contains(name)
    }

    // --- creation / naming --------------------------------------------------

    fn collection_name_taken(&self, name: &str) -> bool {
        self.collections
            .values()
            .any(|collection| collection.name == name)
    }

    fn object_name_taken(&self, name: &str) -> bool {
        self.objects.values().any(|object| object.name == name)
    }

    /// Create a collection under `parent`; the name is deduplicated.
    pub fn create_collection(&mut self, parent: CollectionId, name: &str) -> Result<CollectionId> {
        self.expect_collection(parent)?;
        let assigned = dedupe_name(name, |candidate| self.collection_name_taken(candidate));
        let id = CollectionId(self.next_id());
        self.collections.insert(id, Collection::new(assigned));
        if let Some(collection) = self.collections.get_mut(&parent) {
            collection.children.push(id);
        }
        Ok(id)
    }

    /// Insert an object into `collection`; its name is deduplicated.
    pub fn create_object(&mut self, collection: CollectionId, mut object: Object) -> Result<ObjectId> {
        self.expect_collection(collection)?;
        object.name = dedupe_name(&object.name, |candidate| self.object_name_taken(candidate));
        let id = ObjectId(self.next_id());
        self.objects.insert(id, object);
        if let Some(owner) = self.collections.get_mut(&collection) {
            owner.objects.push(id);
        }
        Ok(id)
    }

    /// Clone an object (mesh, modifiers, commands) into a collection.
    pub fn duplicate_object(&mut self, source: ObjectId, into: CollectionId) -> Result<ObjectId> {
        let copy = self.expect_object(source)?.clone();
        self.create_object(into, copy)
    }

    pub fn rename_object(&mut self, id: ObjectId, name: &str) -> Result<String> {
        self.expect_object(id)?;
        let taken = |candidate: &str| {
            self.objects
                .iter()
                .any(|(&other, object)| other != id && object.name == candidate)
        };
        let assigned = dedupe_name(name, taken);
        if let Some(object) = self.objects.get_mut(&id) {
            object.name = assigned.clone();
        }
        Ok(assigned)
    }

    // --- linking ------------------------------------------------------------

    pub fn link_object(&mut self, object: ObjectId, collection: CollectionId) -> Result<()> {
        self.expect_object(object)?;
        let owner = self.expect_collection_mut(collection)?;
        if !owner.objects.contains(&object) {
            owner.objects.push(object);
        }
        Ok(())
    }

    pub fn unlink_object(&mut self, object: ObjectId, collection: CollectionId) -> Result<()> {
        let owner = self.expect_collection_mut(collection)?;
        owner.objects.retain(|&member| member != object);
        Ok(())
    }

    pub fn set_excluded(&mut self, id: CollectionId, excluded: bool) -> Result<()> {
        self.expect_collection_mut(id)?.excluded = excluded;
        Ok(())
    }

    pub fn set_hidden(&mut self, id: CollectionId, hidden: bool) -> Result<()> {
        self.expect_collection_mut(id)?.hidden = hidden;
        Ok(())
    }

    // --- removal ------------------------------------------------------------

    /// Drop an object from the scene, unlinking it everywhere.
    pub fn remove_object(&mut self, id: ObjectId) {
        for collection in self.collections.values_mut() {
            collection.objects.retain(|&member| member != id);
        }
        self.objects.remove(&id);
    }

    /// Drop a collection along with its member objects. Child collections
    /// are relinked to the removed collection's parent (the root if none).
    pub fn remove_collection(&mut self, id: CollectionId) {
        if id == self.root {
            return;
        }
        let Some(removed) = self.collections.get(&id) else {
            return;
        };
        let members = removed.objects.clone();
        let children = removed.children.clone();
        let new_parent = self.parent_collection(id).unwrap_or(self.root);
        debug!(collection = %removed.name, objects = members.len(), "removing collection");
        for member in members {
            self.remove_object(member);
        }
        for collection in self.collections.values_mut() {
            collection.children.retain(|&child| child != id);
        }
        self.collections.remove(&id);
        for child in children {
            if let Some(parent) = self.collections.get_mut(&new_parent)
                && !parent.children.contains(&child)
            {
                parent.children.push(child);
            }
        }
    }

    // --- joins ----------------------------------------------------------------

    /// Destructively merge every source object's mesh into `dest`, then
    /// drop the sources from the scene.
    pub fn join_objects(&mut self, dest: ObjectId, sources: &[ObjectId]) -> Result<()> {
        for &source in sources {
            if source == dest {
                continue;
            }
            let source_object = self.expect_object(source)?;
            let source_mesh = source_object.expect_mesh()?.clone();
            let source_name = source_object.name.clone();
            let dest_object = self.expect_object_mut(dest)?;
            dest_object.expect_mesh_mut()?.merge_from(&source_mesh);
            debug!(source = %source_name, "joined object");
            self.remove_object(source);
        }
        Ok(())
    }

    /// Snapshot `source`'s current positions as a new shape key on `dest`,
    /// named after the source object. Vertex counts must match.
    pub fn join_shapes(&mut self, dest: ObjectId, source: ObjectId) -> Result<String> {
        let source_object = self.expect_object(source)?;
        let positions = source_object.expect_mesh()?.positions.clone();
        let key_name = source_object.name.clone();
        let dest_object = self.expect_object_mut(dest)?;
        let dest_name = dest_object.name.clone();
        let mesh = dest_object.expect_mesh_mut()?;
        if positions.len() != mesh.positions.len() {
            return Err(SetupError::structure(format!(
                "cannot join shape '{key_name}' into '{dest_name}': \
                 {} vertices against {}",
                positions.len(),
                mesh.positions.len()
            )));
        }
        mesh.add_shape_key_from(&key_name, 0.0, &positions)
    }
}
