//! Shape-key-preserving modifier application.
//!
//! Applying a modifier collapses the key stack in the host, so the object
//! is duplicated once per key into a strategy scratch collection, the
//! modifier is applied to each clone from that key's coordinates, and the
//! clone results are joined back as shape keys on the applied basis clone.
//! Every per-key application must land on the same vertex count;
//! coordinate-dependent modifiers (welds) can legitimately diverge, which
//! aborts with the offending key names.

use tracing::debug;

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::SCRATCH_STRATEGY_COLLECTION;
use relmesh_scene::{CollectionId, ObjectId, Scene, ShapeKey};

/// Apply the named modifier on `object`, preserving its shape keys.
/// Returns the vertex indices the application introduced.
pub fn apply_modifier_preserving_keys(
    scene: &mut Scene,
    object: ObjectId,
    modifier_name: &str,
) -> Result<Vec<u32>> {
    let key_count = scene.expect_object(object)?.expect_mesh()?.shape_keys.len();
    if key_count <= 1 {
        let target = scene.expect_object_mut(object)?;
        target.expect_mesh_mut()?.shape_keys.clear();
        return target.apply_named_modifier(modifier_name);
    }

    let root = scene.root();
    let scratch = scene.create_collection(root, SCRATCH_STRATEGY_COLLECTION)?;
    let result = rebuild_with_keys(scene, object, modifier_name, scratch);
    // teardown runs on both the success and the error path
    scene.remove_collection(scratch);
    result
}

/// One applied clone of `object` per shape key, rejoined onto the applied
/// basis clone, then transplanted back onto `object`.
fn rebuild_with_keys(
    scene: &mut Scene,
    object: ObjectId,
    modifier_name: &str,
    scratch: CollectionId,
) -> Result<Vec<u32>> {
    let (object_name, keys) = {
        let handle = scene.expect_object(object)?;
        (handle.name.clone(), handle.expect_mesh()?.shape_keys.clone())
    };

    let (base, created) = applied_clone(scene, object, &keys[0], modifier_name, scratch)?;
    let base_count = scene.expect_object(base)?.expect_mesh()?.vertex_count();

    let mut mismatched = Vec::new();
    for key in keys.iter().skip(1) {
        let (clone, _) = applied_clone(scene, object, key, modifier_name, scratch)?;
        let clone_count = scene.expect_object(clone)?.expect_mesh()?.vertex_count();
        if clone_count != base_count {
            mismatched.push(key.name.clone());
            scene.remove_object(clone);
            continue;
        }
        // the clone carries a deduplicated name, so rename the joined key
        // back to the original
        let assigned = scene.join_shapes(base, clone)?;
        scene.remove_object(clone);
        let mesh = scene.expect_object_mut(base)?.expect_mesh_mut()?;
        if let Some(index) = mesh.shape_key_index(&assigned) {
            mesh.shape_keys[index].name = key.name.clone();
            mesh.shape_keys[index].value = key.value;
        }
    }
    if !mismatched.is_empty() {
        return Err(SetupError::structure(format!(
            "vertex count diverged applying modifier '{modifier_name}' on '{object_name}': \
             shape keys {}",
            mismatched.join(", ")
        )));
    }

    let mesh = scene.expect_object_mut(base)?.expect_mesh_mut()?;
    mesh.ensure_basis();
    mesh.shape_keys[0].name = keys[0].name.clone();
    mesh.shape_keys[0].value = keys[0].value;
    let rebuilt = mesh.clone();

    let target = scene.expect_object_mut(object)?;
    target.remove_modifier(modifier_name);
    *target.expect_mesh_mut()? = rebuilt;
    debug!(
        object = %object_name,
        modifier = %modifier_name,
        keys = keys.len(),
        "rebuilt shape keys through scratch clones"
    );
    Ok(created)
}

fn applied_clone(
    scene: &mut Scene,
    object: ObjectId,
    key: &ShapeKey,
    modifier_name: &str,
    scratch: CollectionId,
) -> Result<(ObjectId, Vec<u32>)> {
    let clone = scene.duplicate_object(object, scratch)?;
    let handle = scene.expect_object_mut(clone)?;
    let mesh = handle.expect_mesh_mut()?;
    mesh.positions = key.data.clone();
    mesh.shape_keys.clear();
    let created = handle.apply_named_modifier(modifier_name)?;
    Ok((clone, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmesh_scene::{Mesh, Modifier, ModifierKind, Object};

    fn scene_with(mesh: Mesh, modifier: Modifier) -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut object = Object::new_mesh("hero", mesh);
        object.modifiers.push(modifier);
        let id = scene.create_object(root, object).unwrap();
        (scene, id)
    }

    fn keyed_line() -> Mesh {
        let mut mesh = Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        };
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("stretch", 1.0);
        mesh.shape_keys[1].data[1] = [2.0, 0.0, 0.0];
        mesh
    }

    #[test]
    fn keys_survive_subdivision() {
        let modifier = Modifier {
            name: "subd".to_string(),
            kind: ModifierKind::Subdivide { levels: 1 },
        };
        let (mut scene, object) = scene_with(keyed_line(), modifier);
        let created = apply_modifier_preserving_keys(&mut scene, object, "subd").unwrap();
        assert_eq!(created, vec![2]);
        let mesh = scene.object(object).unwrap().mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.shape_keys[0].name, "Basis");
        let stretch = mesh.shape_key("stretch").unwrap();
        assert_eq!(stretch.data.len(), 3);
        // midpoint of the stretched key, not of the basis
        assert_eq!(stretch.data[2], [1.0, 0.0, 0.0]);
        assert!(scene.object(object).unwrap().modifiers.is_empty());
        assert!(scene.collection_named("rmk_temporary_strategy").is_none());
    }

    #[test]
    fn coordinate_dependent_weld_mismatch_names_the_key() {
        // basis has two coincident vertices, the key separates them: the
        // weld collapses the basis clone but not the key clone.
        let mut mesh = Mesh {
            positions: vec![[0.0; 3], [0.0; 3], [1.0, 0.0, 0.0]],
            edges: vec![[0, 2], [1, 2]],
            ..Mesh::default()
        };
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("open", 1.0);
        mesh.shape_keys[1].data[1] = [0.0, 5.0, 0.0];
        let modifier = Modifier {
            name: "weld".to_string(),
            kind: ModifierKind::Weld { distance: 1e-3 },
        };
        let (mut scene, object) = scene_with(mesh, modifier);
        let error = apply_modifier_preserving_keys(&mut scene, object, "weld").unwrap_err();
        assert!(error.to_string().contains("open"));
        assert!(matches!(error, relmesh_model::SetupError::Structure(_)));
        assert!(scene.collection_named("rmk_temporary_strategy").is_none());
    }
}
