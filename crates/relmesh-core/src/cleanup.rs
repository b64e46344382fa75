//! Release-level cleanup: resolve merge provenance tags, then strip
//! generated sub-elements.
//!
//! By the time this runs, every source copy has been joined into the
//! release object, so both sides of each merge pair live on one mesh.
//! Source tags carry the original object name, the group name, and the
//! merge distance; destination groups carry a matching prefix.

use tracing::debug;

use relmesh_model::error::Result;
use relmesh_model::names::{is_internal_subelement, merge_dest_prefix, parse_merge_source};
use relmesh_scene::{ObjectId, Scene};

/// Run the full cleanup pass on a freshly merged release object.
pub fn release_cleanup(scene: &mut Scene, release: ObjectId) -> Result<()> {
    resolve_merge_tags(scene, release)?;
    strip_internal_subelements(scene, release)
}

/// Re-parse every source-side merge tag and merge the tagged selections
/// by distance. A tag that carries the prefix but decodes badly is a
/// syntax error naming the group.
fn resolve_merge_tags(scene: &mut Scene, release: ObjectId) -> Result<()> {
    let mesh = scene.expect_object(release)?.expect_mesh()?;
    let mut pairs = Vec::new();
    for group in &mesh.vertex_groups {
        if let Some(tag) = parse_merge_source(&group.name)? {
            pairs.push((group.name.clone(), tag));
        }
    }

    for (group_name, tag) in pairs {
        let mesh = scene.expect_object_mut(release)?.expect_mesh_mut()?;
        let mut selection = mesh.group_selection(&group_name);
        let prefix = merge_dest_prefix(&tag.object, &tag.source);
        let destinations: Vec<String> = mesh
            .vertex_groups
            .iter()
            .filter(|group| group.name.starts_with(&prefix))
            .map(|group| group.name.clone())
            .collect();
        for destination in &destinations {
            selection.extend(mesh.group_selection(destination));
        }
        let removed = mesh.merge_by_distance(&selection, tag.distance);
        debug!(
            source = %group_name,
            destinations = destinations.len(),
            removed,
            "resolved merge tag"
        );
    }
    Ok(())
}

/// Drop every shape key and vertex group carrying a generated name.
fn strip_internal_subelements(scene: &mut Scene, release: ObjectId) -> Result<()> {
    let mesh = scene.expect_object_mut(release)?.expect_mesh_mut()?;
    mesh.shape_keys
        .retain(|key| !is_internal_subelement(&key.name));
    mesh.vertex_groups
        .retain(|group| !is_internal_subelement(&group.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmesh_model::names::{encode_merge_dest, encode_merge_source};
    use relmesh_scene::{Mesh, Object};

    #[test]
    fn merge_tags_pull_both_sides_together_and_vanish() {
        let mut scene = Scene::new();
        let root = scene.root();
        // two coincident vertices from formerly separate objects
        let mut mesh = Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        };
        let source_group = encode_merge_source("hero", "seam", 0.01);
        let dest_group = encode_merge_dest("hero", "seam");
        mesh.add_vertex_group(&source_group);
        mesh.vertex_group_mut(&source_group)
            .unwrap()
            .weights
            .insert(1, 1.0);
        mesh.add_vertex_group(&dest_group);
        mesh.vertex_group_mut(&dest_group)
            .unwrap()
            .weights
            .insert(2, 1.0);
        let release = scene
            .create_object(root, Object::new_mesh("Hero_Release", mesh))
            .unwrap();

        release_cleanup(&mut scene, release).unwrap();
        let mesh = scene.object(release).unwrap().mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 2);
        assert!(mesh.vertex_groups.is_empty());
    }

    #[test]
    fn malformed_source_tag_is_a_syntax_error() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut mesh = Mesh {
            positions: vec![[0.0; 3]],
            ..Mesh::default()
        };
        mesh.add_vertex_group("rmk_mergevsrc_hero_seam_nope");
        let release = scene
            .create_object(root, Object::new_mesh("Hero_Release", mesh))
            .unwrap();
        let error = release_cleanup(&mut scene, release).unwrap_err();
        assert!(error.to_string().contains("rmk_mergevsrc_hero_seam_nope"));
    }

    #[test]
    fn disabled_internal_names_are_stripped_too() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut mesh = Mesh {
            positions: vec![[0.0; 3]],
            ..Mesh::default()
        };
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("#rmk_draft", 0.0);
        mesh.add_vertex_group("seam");
        let release = scene
            .create_object(root, Object::new_mesh("Hero_Release", mesh))
            .unwrap();
        release_cleanup(&mut scene, release).unwrap();
        let mesh = scene.object(release).unwrap().mesh().unwrap();
        assert_eq!(mesh.shape_keys.len(), 1);
        assert_eq!(mesh.vertex_groups.len(), 1);
    }
}
