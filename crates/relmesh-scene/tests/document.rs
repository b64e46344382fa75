//! Scene documents are plain data and must survive a JSON round trip.

use relmesh_scene::{Mesh, Modifier, ModifierKind, Object, Scene};

#[test]
fn scene_round_trips_through_json() {
    let mut scene = Scene::new();
    let root = scene.root();
    let sources = scene.create_collection(root, "src_Hero").unwrap();
    let mesh = Mesh {
        positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
        edges: vec![[0, 1], [1, 2]],
        ..Mesh::default()
    };
    let mut object = Object::new_mesh("hero", mesh);
    object.modifiers.push(Modifier {
        name: "subd".to_string(),
        kind: ModifierKind::Subdivide { levels: 2 },
    });
    scene.create_object(sources, object).unwrap();
    scene.add_material("skin");
    scene.specs.add("Winter");

    let json = serde_json::to_string_pretty(&scene).expect("serialize scene");
    let restored: Scene = serde_json::from_str(&json).expect("deserialize scene");
    assert_eq!(restored, scene);
}
