//! Read-only classification layer over the collection tree.
//!
//! Every query here is a pure function of the scene: roles come from name
//! pattern matching, freshness from release-object placement. Nothing in
//! this module mutates the scene.

use std::collections::BTreeSet;

use tracing::warn;

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::{self, CollectionRole};
use relmesh_scene::{CollectionId, ObjectId, Scene};

/// Classified view of one Source or SubSource collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStatus {
    pub id: CollectionId,
    pub role: CollectionRole,
}

impl CollectionStatus {
    pub fn character(&self) -> &str {
        self.role.character().unwrap_or_default()
    }

    /// Expected name of this collection's release object.
    pub fn release_name(&self) -> String {
        let postfix = self
            .role
            .release_postfix()
            .unwrap_or(names::RELEASE_POSTFIX);
        names::release_object_name(self.character(), postfix)
    }

    /// Name of the release collection for this collection's tree root.
    pub fn release_collection_name(&self) -> String {
        names::release_collection_name(self.character())
    }
}

/// Placement of a collection's release object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePlacement {
    /// No object with the expected name exists anywhere.
    Missing,
    /// The object exists inside its designated container.
    Placed,
    /// The object exists but outside its designated container.
    Misplaced,
}

pub fn classify(scene: &Scene, id: CollectionId) -> Result<CollectionRole> {
    let collection = scene.expect_collection(id)?;
    names::classify_collection(&collection.name)
}

/// Status entry when the collection is Source or SubSource.
pub fn setup_status(scene: &Scene, id: CollectionId) -> Result<Option<CollectionStatus>> {
    let role = classify(scene, id)?;
    Ok(role.is_setup().then_some(CollectionStatus { id, role }))
}

pub fn expect_setup_status(scene: &Scene, id: CollectionId) -> Result<CollectionStatus> {
    setup_status(scene, id)?.ok_or_else(|| {
        let name = scene
            .collection(id)
            .map(|collection| collection.name.clone())
            .unwrap_or_else(|| id.to_string());
        SetupError::structure(format!("'{name}' is not a source collection"))
    })
}

/// Direct SubSource children of a collection.
pub fn subsource_children(scene: &Scene, id: CollectionId) -> Result<Vec<CollectionId>> {
    let collection = scene.expect_collection(id)?;
    let mut children = Vec::new();
    for &child in &collection.children {
        if matches!(classify(scene, child)?, CollectionRole::SubSource { .. }) {
            children.push(child);
        }
    }
    Ok(children)
}

fn descendant_collections(scene: &Scene, id: CollectionId) -> Result<Vec<CollectionId>> {
    let mut seen = Vec::new();
    let mut stack = scene.expect_collection(id)?.children.clone();
    while let Some(current) = stack.pop() {
        seen.push(current);
        stack.extend(scene.expect_collection(current)?.children.iter().copied());
    }
    Ok(seen)
}

/// Objects directly owned by this collection, minus objects any
/// descendant collection also owns (prevents double counting).
pub fn member_objects(scene: &Scene, id: CollectionId) -> Result<Vec<ObjectId>> {
    let collection = scene.expect_collection(id)?;
    let mut shadowed: BTreeSet<ObjectId> = BTreeSet::new();
    for descendant in descendant_collections(scene, id)? {
        shadowed.extend(scene.expect_collection(descendant)?.objects.iter().copied());
    }
    Ok(collection
        .objects
        .iter()
        .copied()
        .filter(|object| !shadowed.contains(object))
        .collect())
}

/// Members eligible for setup: mesh-typed and not carrying a reserved
/// (disabled, internal, or release) name.
pub fn source_objects(scene: &Scene, id: CollectionId) -> Result<Vec<ObjectId>> {
    let mut sources = Vec::new();
    for member in member_objects(scene, id)? {
        let object = scene.expect_object(member)?;
        if object.is_mesh() && !names::is_reserved_object_name(&object.name) {
            sources.push(member);
        }
    }
    Ok(sources)
}

/// The collection's release object, if one exists anywhere in the scene.
pub fn release_object(scene: &Scene, status: &CollectionStatus) -> Option<ObjectId> {
    scene.object_named(&status.release_name())
}

/// The release collection of this collection's tree root, if created.
pub fn release_collection(scene: &Scene, status: &CollectionStatus) -> Option<CollectionId> {
    scene.collection_named(&status.release_collection_name())
}

/// Designated home of the release object: the root release collection for
/// a Source, the SubSource collection itself for a SubSource.
pub fn expected_release_home(scene: &Scene, status: &CollectionStatus) -> Option<CollectionId> {
    match status.role {
        CollectionRole::Source { .. } => release_collection(scene, status),
        CollectionRole::SubSource { .. } => Some(status.id),
        _ => None,
    }
}

pub fn release_placement(scene: &Scene, status: &CollectionStatus) -> ReleasePlacement {
    let Some(object) = release_object(scene, status) else {
        return ReleasePlacement::Missing;
    };
    let owners = scene.collections_owning_object(object);
    match expected_release_home(scene, status) {
        Some(home) if owners.contains(&home) => ReleasePlacement::Placed,
        _ => ReleasePlacement::Misplaced,
    }
}

/// Freshness: the release object exists and sits in its designated home.
pub fn is_fresh(scene: &Scene, status: &CollectionStatus) -> bool {
    release_placement(scene, status) == ReleasePlacement::Placed
}

/// Release objects of the direct SubSource children that already exist.
pub fn child_release_objects(scene: &Scene, id: CollectionId) -> Result<Vec<ObjectId>> {
    let mut releases = Vec::new();
    for child in subsource_children(scene, id)? {
        let status = expect_setup_status(scene, child)?;
        if let Some(object) = release_object(scene, &status) {
            releases.push(object);
        }
    }
    Ok(releases)
}

/// The single setup collection owning an object.
pub fn users_source_collection(scene: &Scene, object: ObjectId) -> Result<CollectionId> {
    let name = scene.expect_object(object)?.name.clone();
    let mut owners = Vec::new();
    for owner in scene.collections_owning_object(object) {
        if classify(scene, owner)?.is_setup() {
            owners.push(owner);
        }
    }
    match owners.as_slice() {
        [] => Err(SetupError::structure(format!(
            "object '{name}' is not inside any source collection"
        ))),
        [single] => Ok(*single),
        many => {
            let names: Vec<String> = many
                .iter()
                .filter_map(|&id| scene.collection(id).map(|c| c.name.clone()))
                .collect();
            Err(SetupError::structure(format!(
                "object '{name}' is owned by several source collections: {}",
                names.join(", ")
            )))
        }
    }
}

/// Nearest ancestor collection classified Source or SubSource.
pub fn parent_setup_collection(scene: &Scene, id: CollectionId) -> Result<Option<CollectionId>> {
    let Some(parent) = scene.parent_collection(id) else {
        return Ok(None);
    };
    Ok(classify(scene, parent)?.is_setup().then_some(parent))
}

/// Walk up to the Source collection rooting this tree. A SubSource with
/// no setup parent is a structure error.
pub fn root_source_collection(scene: &Scene, id: CollectionId) -> Result<CollectionId> {
    let mut current = id;
    while let Some(parent) = parent_setup_collection(scene, current)? {
        current = parent;
    }
    match classify(scene, current)? {
        CollectionRole::Source { .. } => Ok(current),
        _ => {
            let name = scene.expect_collection(current)?.name.clone();
            Err(SetupError::structure(format!(
                "'{name}' has no source collection above it"
            )))
        }
    }
}

/// Best-effort closure: the start collection, its SubSource descendants,
/// and its Source/SubSource ancestors. Errors on the upward walk are
/// logged and swallowed; downward errors propagate.
pub fn reachable_collections(scene: &Scene, start: CollectionId) -> Result<Vec<CollectionId>> {
    let mut ordered = Vec::new();
    let mut seen: BTreeSet<CollectionId> = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        if seen.insert(current) {
            ordered.push(current);
            stack.extend(subsource_children(scene, current)?);
        }
    }
    let mut current = start;
    loop {
        match parent_setup_collection(scene, current) {
            Ok(Some(parent)) => {
                if seen.insert(parent) {
                    ordered.push(parent);
                }
                current = parent;
            }
            Ok(None) => break,
            Err(error) => {
                warn!(%error, "ancestor walk stopped early");
                break;
            }
        }
    }
    Ok(ordered)
}
