//! Setup execution: the merge/cleanup state machine per collection.
//!
//! The queue hands over collections in execution order (children before
//! parents). For each one: unhide, copy child releases and source objects
//! into a scratch collection, delete the stale release, run the strategy
//! pipeline on every copy, join everything into a fresh release object,
//! rename, clean up, and link it into its home. The scratch collection is
//! torn down whether the build succeeded or not; already-finished
//! collections in the same run are never rolled back.

use tracing::{debug, info};

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::{SCRATCH_COLLECTION, SCRATCH_RELEASE_OBJECT};
use relmesh_scene::{CollectionId, Mesh, Object, ObjectId, Scene};

use crate::cleanup::release_cleanup;
use crate::status::{self, CollectionStatus};
use crate::strategy::{StrategyContext, build_default_pipeline};

/// Rebuild every collection in the given order. Returns the release
/// object of the last (outermost) collection built.
pub fn execute(scene: &mut Scene, order: &[CollectionId]) -> Result<ObjectId> {
    let mut last = None;
    for &collection in order {
        last = Some(execute_collection(scene, collection)?);
    }
    last.ok_or_else(|| SetupError::structure("nothing to set up".to_string()))
}

/// Rebuild one collection's release object.
pub fn execute_collection(scene: &mut Scene, id: CollectionId) -> Result<ObjectId> {
    let entry = status::expect_setup_status(scene, id)?;
    let (was_excluded, was_hidden) = {
        let collection = scene.expect_collection(id)?;
        (collection.excluded, collection.hidden)
    };
    scene.set_excluded(id, false)?;
    scene.set_hidden(id, false)?;

    let root = scene.root();
    let scratch = scene.create_collection(root, SCRATCH_COLLECTION)?;
    let result = build_release(scene, &entry, scratch);
    // teardown runs on both the success and the error path
    scene.remove_collection(scratch);
    scene.set_excluded(id, was_excluded)?;
    scene.set_hidden(id, was_hidden)?;
    result
}

fn build_release(
    scene: &mut Scene,
    entry: &CollectionStatus,
    scratch: CollectionId,
) -> Result<ObjectId> {
    let sources = status::source_objects(scene, entry.id)?;
    let child_releases = status::child_release_objects(scene, entry.id)?;

    let mut copies: Vec<(ObjectId, String)> = Vec::new();
    for &source in &sources {
        let original = scene.expect_object(source)?.name.clone();
        let copy = scene.duplicate_object(source, scratch)?;
        copies.push((copy, original));
    }
    let mut joined: Vec<ObjectId> = Vec::new();
    for &child in &child_releases {
        joined.push(scene.duplicate_object(child, scratch)?);
    }

    // the stale release goes away wherever it ended up
    if let Some(stale) = scene.object_named(&entry.release_name()) {
        scene.remove_object(stale);
    }

    let release = scene.create_object(
        scratch,
        Object::new_mesh(SCRATCH_RELEASE_OBJECT, Mesh::default()),
    )?;

    let pipeline = build_default_pipeline();
    debug!(steps = ?pipeline.step_names(), copies = copies.len(), "running strategy pipeline");
    for (copy, original) in &copies {
        let ctx = StrategyContext {
            original_name: original.clone(),
        };
        pipeline.execute(scene, *copy, &ctx)?;
    }

    let mut to_join: Vec<ObjectId> = copies.iter().map(|(copy, _)| *copy).collect();
    to_join.append(&mut joined);
    scene.join_objects(release, &to_join)?;

    let assigned = scene.rename_object(release, &entry.release_name())?;
    release_cleanup(scene, release)?;

    let home = match status::expected_release_home(scene, entry) {
        Some(home) => home,
        // first successful setup creates the release collection lazily
        None => {
            let root = scene.root();
            scene.create_collection(root, &entry.release_collection_name())?
        }
    };
    scene.link_object(release, home)?;
    scene.unlink_object(release, scratch)?;
    info!(release = %assigned, sources = copies.len(), children = child_releases.len(), "release built");
    Ok(release)
}
