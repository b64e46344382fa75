//! Pre-flight validation of a setup tree.
//!
//! Runs before any mutation: structural rules first (role placement,
//! object naming, single ownership), then every command on every source
//! object is resolved against the live candidate set for its scope.
//! Validation either returns the root source collection of the trigger's
//! tree or the first error found, with the offending name in the message.

use std::collections::BTreeSet;

use tracing::debug;

use relmesh_core::status;
use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::{self, CollectionRole};
use relmesh_model::{Command, CommandArgs, ScopeKind};
use relmesh_scene::{CollectionId, ObjectId, Scene};

/// Validate the tree rooted at the trigger object's root source
/// collection. Returns that root on success.
pub fn validate(scene: &Scene, trigger: ObjectId) -> Result<CollectionId> {
    let owner = status::users_source_collection(scene, trigger)?;
    let root = status::root_source_collection(scene, owner)?;
    validate_structure(scene, root)?;
    for collection in setup_collections(scene, root)? {
        for object in status::source_objects(scene, collection)? {
            validate_object_commands(scene, collection, object)?;
        }
    }
    let name = scene.expect_collection(root)?.name.clone();
    debug!(root = %name, "tree validated");
    Ok(root)
}

/// The root and every setup collection below it.
fn setup_collections(scene: &Scene, root: CollectionId) -> Result<Vec<CollectionId>> {
    let mut found = vec![root];
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        for &child in &scene.expect_collection(current)?.children {
            if status::classify(scene, child)?.is_setup() {
                found.push(child);
            }
            stack.push(child);
        }
    }
    Ok(found)
}

fn validate_structure(scene: &Scene, root: CollectionId) -> Result<()> {
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        let collection = scene.expect_collection(current)?;
        let role = status::classify(scene, current)?;
        // a Source collection only roots a tree; nested ones are illegal
        if current != root && matches!(role, CollectionRole::Source { .. }) {
            return Err(SetupError::structure(format!(
                "source collection '{}' is nested inside another source tree",
                collection.name
            )));
        }
        if matches!(role, CollectionRole::Release { .. }) {
            for &child in &collection.children {
                if status::classify(scene, child)?.is_setup() {
                    let child_name = scene.expect_collection(child)?.name.clone();
                    return Err(SetupError::structure(format!(
                        "release collection '{}' contains source collection '{child_name}'",
                        collection.name
                    )));
                }
            }
        }
        if role.is_setup() {
            for object in status::source_objects(scene, current)? {
                let name = scene.expect_object(object)?.name.clone();
                if name.contains(names::UNDER) {
                    return Err(SetupError::structure(format!(
                        "object name '{name}' contains the reserved '{}' delimiter",
                        names::UNDER
                    )));
                }
                // raises when several setup collections claim the object
                status::users_source_collection(scene, object)?;
            }
        }
        stack.extend(collection.children.iter().copied());
    }
    Ok(())
}

fn validate_object_commands(
    scene: &Scene,
    collection: CollectionId,
    object: ObjectId,
) -> Result<()> {
    let handle = scene.expect_object(object)?;
    let mesh = handle.expect_mesh()?;
    let bones = handle.armature_bones();

    // candidate sets mirror what the UI offers for each scope
    let vertex_groups: BTreeSet<&str> = mesh
        .vertex_groups
        .iter()
        .map(|group| group.name.as_str())
        .filter(|name| !bones.contains(*name) && !names::is_internal_subelement(name))
        .collect();
    let shape_keys: BTreeSet<&str> = mesh
        .shape_keys
        .iter()
        .skip(1)
        .map(|key| key.name.as_str())
        .collect();
    let all_keys: BTreeSet<&str> = mesh
        .shape_keys
        .iter()
        .map(|key| key.name.as_str())
        .collect();
    let uv_layers: BTreeSet<&str> = mesh
        .uv_layers
        .iter()
        .map(|layer| layer.name.as_str())
        .collect();
    let modifiers: BTreeSet<&str> = handle
        .modifiers
        .iter()
        .map(|modifier| modifier.name.as_str())
        .collect();
    let materials: BTreeSet<&str> = mesh
        .material_slots
        .iter()
        .map(String::as_str)
        .collect();

    let mut used: BTreeSet<(ScopeKind, &str, &str)> = BTreeSet::new();
    for command in &handle.commands {
        if !scene.specs.contains(&command.spec) {
            return Err(SetupError::syntax(format!(
                "command on '{}' references unknown spec '{}'",
                handle.name, command.spec
            )));
        }
        if !used.insert((command.scope(), command.spec.as_str(), command.source.as_str())) {
            return Err(SetupError::syntax(format!(
                "'{}' is used twice by {} commands under spec '{}'",
                command.source,
                command.scope(),
                command.spec
            )));
        }
        let candidates = match command.scope() {
            ScopeKind::VertexGroup => &vertex_groups,
            ScopeKind::ShapeKey => &shape_keys,
            ScopeKind::Uv => &uv_layers,
            ScopeKind::Modifier => &modifiers,
            ScopeKind::Material => &materials,
        };
        if !candidates.contains(command.source.as_str()) {
            return Err(SetupError::syntax(format!(
                "{} command on '{}' names {} '{}' which does not exist",
                command.args.kind_name(),
                handle.name,
                command.scope(),
                command.source
            )));
        }
        validate_command_args(scene, collection, handle, command, &all_keys)?;
    }
    Ok(())
}

fn validate_command_args(
    scene: &Scene,
    collection: CollectionId,
    handle: &relmesh_scene::Object,
    command: &Command,
    shape_keys: &BTreeSet<&str>,
) -> Result<()> {
    let object_name = handle.name.as_str();
    match &command.args {
        CommandArgs::ShapeKeyApplySingle { destination } => {
            // a blank destination bakes onto the base shape
            if !destination.is_empty() && !shape_keys.contains(destination.as_str()) {
                return Err(SetupError::syntax(format!(
                    "bake destination '{destination}' is not a shape key of '{object_name}'"
                )));
            }
        }
        CommandArgs::MaterialReplace { destination } => {
            if destination.is_empty() {
                return Err(SetupError::syntax(format!(
                    "material command on '{object_name}' has a blank destination"
                )));
            }
        }
        CommandArgs::VgNonDecimate {
            destination_modifier,
        } => {
            let subdivide = handle
                .modifier(destination_modifier)
                .is_some_and(relmesh_scene::Modifier::is_subdivide);
            if !subdivide {
                return Err(SetupError::syntax(format!(
                    "'{destination_modifier}' is not a subdivision modifier on '{object_name}'"
                )));
            }
        }
        CommandArgs::VgMergeVertexSource { merge_distance } => {
            if !merge_distance.is_finite() || *merge_distance <= 0.0 {
                return Err(SetupError::syntax(format!(
                    "merge distance {merge_distance} on '{object_name}' must be a positive number"
                )));
            }
        }
        CommandArgs::VgMergeVertexDestination {
            destination_object,
            destination_vertex_group,
        } => {
            let target = find_reachable_object(scene, collection, destination_object)?
                .ok_or_else(|| {
                    SetupError::syntax(format!(
                        "merge destination object '{destination_object}' is not reachable \
                         from '{object_name}'"
                    ))
                })?;
            let target_mesh = scene.expect_object(target)?.expect_mesh()?;
            if target_mesh.vertex_group(destination_vertex_group).is_none() {
                return Err(SetupError::syntax(format!(
                    "'{destination_object}' has no vertex group '{destination_vertex_group}'"
                )));
            }
        }
        CommandArgs::VgDeleteLoop
        | CommandArgs::VgDeleteVertex
        | CommandArgs::ModifierDelete
        | CommandArgs::ModifierUndivide
        | CommandArgs::UvSelect => {}
    }
    Ok(())
}

/// Resolve an object name among the source objects of every collection
/// reachable from the given one.
fn find_reachable_object(
    scene: &Scene,
    collection: CollectionId,
    name: &str,
) -> Result<Option<ObjectId>> {
    for reachable in status::reachable_collections(scene, collection)? {
        for object in status::source_objects(scene, reachable)? {
            if scene.expect_object(object)?.name == name {
                return Ok(Some(object));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmesh_model::add_command;
    use relmesh_scene::{Mesh, Modifier, ModifierKind, Object};

    fn simple_mesh() -> Mesh {
        Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        }
    }

    fn basic_scene() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let source = scene.create_collection(root, "src_Hero").unwrap();
        let mut mesh = simple_mesh();
        mesh.add_vertex_group("seam");
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("brow", 0.0);
        mesh.material_slots.push("skin".to_string());
        let hero = scene
            .create_object(source, Object::new_mesh("hero", mesh))
            .unwrap();
        scene.add_material("skin");
        (scene, hero)
    }

    #[test]
    fn well_formed_tree_passes() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "brow",
            "Default",
            CommandArgs::ShapeKeyApplySingle {
                destination: String::new(),
            },
        );
        let root = validate(&scene, hero).unwrap();
        assert_eq!(scene.collection(root).unwrap().name, "src_Hero");
    }

    #[test]
    fn deeply_nested_source_collection_is_named_in_the_error() {
        let (mut scene, hero) = basic_scene();
        let owner = scene.collection_named("src_Hero").unwrap();
        let middle = scene.create_collection(owner, "subsrc_Hero.Hat").unwrap();
        scene.create_collection(middle, "src_Villain").unwrap();
        let error = validate(&scene, hero).unwrap_err();
        assert!(matches!(error, SetupError::Structure(_)));
        assert!(error.to_string().contains("src_Villain"));
    }

    #[test]
    fn release_collection_must_not_hold_source_collections() {
        let (mut scene, hero) = basic_scene();
        let owner = scene.collection_named("src_Hero").unwrap();
        let release = scene.create_collection(owner, "Hero_Release").unwrap();
        scene.create_collection(release, "subsrc_Hero.Hat").unwrap();
        assert!(validate(&scene, hero).is_err());
    }

    #[test]
    fn delimiter_in_an_object_name_is_a_structure_error() {
        let (mut scene, hero) = basic_scene();
        let owner = scene.collection_named("src_Hero").unwrap();
        scene
            .create_object(owner, Object::new_mesh("hero_extra", simple_mesh()))
            .unwrap();
        let error = validate(&scene, hero).unwrap_err();
        assert!(error.to_string().contains("hero_extra"));
    }

    #[test]
    fn unknown_spec_is_a_syntax_error() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "NoSuchSpec",
            CommandArgs::VgDeleteVertex,
        );
        let error = validate(&scene, hero).unwrap_err();
        assert!(matches!(error, SetupError::Syntax(_)));
        assert!(error.to_string().contains("NoSuchSpec"));
    }

    #[test]
    fn unresolved_source_is_a_syntax_error() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "no_such_group",
            "Default",
            CommandArgs::VgDeleteVertex,
        );
        assert!(validate(&scene, hero).is_err());
    }

    #[test]
    fn duplicate_source_within_a_spec_is_rejected() {
        let (mut scene, hero) = basic_scene();
        let commands = &mut scene.object_mut(hero).unwrap().commands;
        add_command(commands, "seam", "Default", CommandArgs::VgDeleteVertex);
        add_command(commands, "seam", "Default", CommandArgs::VgDeleteLoop);
        let error = validate(&scene, hero).unwrap_err();
        assert!(error.to_string().contains("seam"));
    }

    #[test]
    fn blank_material_destination_is_rejected() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "skin",
            "Default",
            CommandArgs::MaterialReplace {
                destination: String::new(),
            },
        );
        assert!(validate(&scene, hero).is_err());
    }

    #[test]
    fn non_decimate_must_target_a_subdivision_modifier() {
        let (mut scene, hero) = basic_scene();
        scene.object_mut(hero).unwrap().modifiers.push(Modifier {
            name: "Weld".to_string(),
            kind: ModifierKind::Weld { distance: 0.01 },
        });
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "Default",
            CommandArgs::VgNonDecimate {
                destination_modifier: "Weld".to_string(),
            },
        );
        assert!(validate(&scene, hero).is_err());

        scene.object_mut(hero).unwrap().modifiers.push(Modifier {
            name: "Subdiv".to_string(),
            kind: ModifierKind::Subdivide { levels: 1 },
        });
        scene.object_mut(hero).unwrap().commands.clear();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "Default",
            CommandArgs::VgNonDecimate {
                destination_modifier: "Subdiv".to_string(),
            },
        );
        assert!(validate(&scene, hero).is_ok());
    }

    #[test]
    fn merge_destination_must_be_reachable_and_carry_the_group() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "Default",
            CommandArgs::VgMergeVertexDestination {
                destination_object: "nowhere".to_string(),
                destination_vertex_group: "attach".to_string(),
            },
        );
        let error = validate(&scene, hero).unwrap_err();
        assert!(error.to_string().contains("nowhere"));

        let owner = scene.collection_named("src_Hero").unwrap();
        let mut hat_mesh = simple_mesh();
        hat_mesh.add_vertex_group("attach");
        scene
            .create_object(owner, Object::new_mesh("hat", hat_mesh))
            .unwrap();
        scene.object_mut(hero).unwrap().commands.clear();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "Default",
            CommandArgs::VgMergeVertexDestination {
                destination_object: "hat".to_string(),
                destination_vertex_group: "attach".to_string(),
            },
        );
        assert!(validate(&scene, hero).is_ok());
    }

    #[test]
    fn nonpositive_merge_distance_is_rejected() {
        let (mut scene, hero) = basic_scene();
        add_command(
            &mut scene.object_mut(hero).unwrap().commands,
            "seam",
            "Default",
            CommandArgs::VgMergeVertexSource {
                merge_distance: 0.0,
            },
        );
        assert!(validate(&scene, hero).is_err());
    }
}
