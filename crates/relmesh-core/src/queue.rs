//! Setup queue: decides which collections get rebuilt, and in what order.
//!
//! Traversal is parent-first; the returned order is the execution order,
//! so it is reversed before returning and children always precede their
//! parents. A parent release merges its children's releases, which is why
//! children must be rebuilt first.

use tracing::debug;

use relmesh_model::error::Result;
use relmesh_scene::{CollectionId, ObjectId, Scene};

use crate::status;

/// What triggered the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Rebuild only the trigger's own collection subtree, skipping fresh
    /// branches.
    Single,
    /// Rebuild every Source/SubSource collection in the trigger's tree,
    /// unconditionally.
    All,
}

/// Compute the ordered rebuild list for the collection owning `trigger`.
///
/// The result is in execution order: every SubSource collection appears
/// before its parent.
pub fn schedule(scene: &Scene, trigger: ObjectId, mode: ScheduleMode) -> Result<Vec<CollectionId>> {
    let owner = status::users_source_collection(scene, trigger)?;
    let mut order = Vec::new();
    match mode {
        ScheduleMode::Single => {
            visit_single(scene, owner, 0, &mut order)?;
        }
        ScheduleMode::All => {
            let root = status::root_source_collection(scene, owner)?;
            visit_all(scene, root, &mut order)?;
        }
    }
    order.reverse();
    debug!(collections = order.len(), ?mode, "scheduled");
    Ok(order)
}

/// Parent-first walk over SubSource children. A collection is included
/// when its own release is missing or misplaced, when anything in its
/// subtree is, or when it is the scheduling root (depth 0). The whole
/// subtree is always visited; no rule short-circuits another.
fn visit_single(
    scene: &Scene,
    id: CollectionId,
    depth: usize,
    order: &mut Vec<CollectionId>,
) -> Result<bool> {
    let entry = status::expect_setup_status(scene, id)?;
    let mut subtree_stale = !status::is_fresh(scene, &entry);
    let position = order.len();
    order.push(id);
    for child in status::subsource_children(scene, id)? {
        subtree_stale |= visit_single(scene, child, depth + 1, order)?;
    }
    if !(subtree_stale || depth == 0) {
        order.remove(position);
    }
    Ok(subtree_stale)
}

/// Parent-first walk including every setup collection unconditionally.
fn visit_all(scene: &Scene, id: CollectionId, order: &mut Vec<CollectionId>) -> Result<()> {
    status::expect_setup_status(scene, id)?;
    order.push(id);
    for child in status::subsource_children(scene, id)? {
        visit_all(scene, child, order)?;
    }
    Ok(())
}
