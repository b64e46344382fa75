//! Scheduler ordering and inclusion properties.

use proptest::prelude::*;

use relmesh_core::{ScheduleMode, execute, schedule};
use relmesh_scene::{CollectionId, Mesh, Object, ObjectId, Scene};

fn simple_mesh() -> Mesh {
    Mesh {
        positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
        edges: vec![[0, 1]],
        ..Mesh::default()
    }
}

/// src_Hero { hero, subsrc_Hero.Hat { hat, subsrc_Hero.Hat.Bow { bow } } }
fn nested_scene() -> (Scene, ObjectId, [CollectionId; 3]) {
    let mut scene = Scene::new();
    let root = scene.root();
    let source = scene.create_collection(root, "src_Hero").unwrap();
    let hat = scene.create_collection(source, "subsrc_Hero.Hat").unwrap();
    let bow = scene.create_collection(hat, "subsrc_Hero.Hat.Bow").unwrap();
    let hero = scene
        .create_object(source, Object::new_mesh("hero", simple_mesh()))
        .unwrap();
    scene
        .create_object(hat, Object::new_mesh("hat", simple_mesh()))
        .unwrap();
    scene
        .create_object(bow, Object::new_mesh("bow", simple_mesh()))
        .unwrap();
    (scene, hero, [source, hat, bow])
}

#[test]
fn all_mode_lists_children_before_parents() {
    let (scene, hero, [source, hat, bow]) = nested_scene();
    let order = schedule(&scene, hero, ScheduleMode::All).unwrap();
    assert_eq!(order.len(), 3);
    let position =
        |id: CollectionId| order.iter().position(|&entry| entry == id).unwrap();
    assert!(position(bow) < position(hat));
    assert!(position(hat) < position(source));
}

#[test]
fn single_mode_includes_stale_subtrees() {
    let (scene, hero, [source, hat, bow]) = nested_scene();
    // nothing has a release yet, so the whole subtree is stale
    let order = schedule(&scene, hero, ScheduleMode::Single).unwrap();
    assert_eq!(order, vec![bow, hat, source]);
}

#[test]
fn single_mode_skips_fresh_branches_but_keeps_the_trigger() {
    let (mut scene, hero, [source, _, _]) = nested_scene();
    let order = schedule(&scene, hero, ScheduleMode::All).unwrap();
    execute(&mut scene, &order).unwrap();
    // everything fresh: only the depth-0 collection is included
    let order = schedule(&scene, hero, ScheduleMode::Single).unwrap();
    assert_eq!(order, vec![source]);
}

#[test]
fn misplaced_release_forces_a_rebuild() {
    let (mut scene, hero, [source, hat, _]) = nested_scene();
    let order = schedule(&scene, hero, ScheduleMode::All).unwrap();
    execute(&mut scene, &order).unwrap();
    // drag the hat sub-release out of its collection
    let sub_release = scene.object_named("Hero.Hat_SubRelease").unwrap();
    scene.unlink_object(sub_release, hat).unwrap();
    let root = scene.root();
    scene.link_object(sub_release, root).unwrap();
    let order = schedule(&scene, hero, ScheduleMode::Single).unwrap();
    assert!(order.contains(&hat));
    assert!(order.contains(&source));
}

#[test]
fn trigger_outside_any_source_collection_is_an_error() {
    let mut scene = Scene::new();
    let root = scene.root();
    let stray = scene
        .create_object(root, Object::new_mesh("stray", simple_mesh()))
        .unwrap();
    assert!(schedule(&scene, stray, ScheduleMode::Single).is_err());
}

/// Grow a random tree of setup collections, one object each. Returns the
/// parent of every collection and an object inside the deepest one.
fn grow_tree(
    scene: &mut Scene,
    branching: &[usize],
) -> (Vec<(CollectionId, CollectionId)>, ObjectId) {
    let root = scene.root();
    let source = scene.create_collection(root, "src_C").unwrap();
    let mut trigger = scene
        .create_object(source, Object::new_mesh("obj", simple_mesh()))
        .unwrap();
    let mut edges = Vec::new();
    let mut frontier = vec![(source, "C".to_string())];
    let mut serial = 0usize;
    for &children in branching {
        let Some((parent, character)) = frontier.pop() else {
            break;
        };
        for child in 0..children {
            serial += 1;
            let name = format!("subsrc_{character}.{child}");
            let collection = scene.create_collection(parent, &name).unwrap();
            edges.push((collection, parent));
            trigger = scene
                .create_object(
                    collection,
                    Object::new_mesh(&format!("obj{serial}"), simple_mesh()),
                )
                .unwrap();
            frontier.push((collection, format!("{character}.{child}")));
        }
    }
    (edges, trigger)
}

proptest! {
    #[test]
    fn all_mode_orders_every_child_before_its_parent(
        branching in prop::collection::vec(0usize..3, 1..6)
    ) {
        let mut scene = Scene::new();
        let (edges, trigger) = grow_tree(&mut scene, &branching);
        let order = schedule(&scene, trigger, ScheduleMode::All).unwrap();
        // every setup collection is present exactly once
        prop_assert_eq!(order.len(), edges.len() + 1);
        for (child, parent) in &edges {
            let child_at = order.iter().position(|entry| entry == child).unwrap();
            let parent_at = order.iter().position(|entry| entry == parent).unwrap();
            prop_assert!(child_at < parent_at);
        }
    }

    #[test]
    fn single_mode_always_includes_the_owning_collection(
        branching in prop::collection::vec(0usize..3, 1..6)
    ) {
        let mut scene = Scene::new();
        let (_, trigger) = grow_tree(&mut scene, &branching);
        let owner = scene.collections_owning_object(trigger)[0];
        let order = schedule(&scene, trigger, ScheduleMode::Single).unwrap();
        prop_assert!(order.contains(&owner));
    }
}
