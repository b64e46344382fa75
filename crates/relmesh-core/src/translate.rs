//! Translate pass: rename a release object's sub-elements toward an
//! external target convention.
//!
//! Bone-group profiles merge deform weights additively and then apply
//! substring renames; shape-key profiles rename or delete keys with an
//! optional trailing-dot prefix match; materials are cloned under the
//! target mode's postfix.

use tracing::{debug, info};

use relmesh_model::error::Result;
use relmesh_model::names::{DOT, MODE_GAME_ENGINE, MODE_MIKUMIKUDANCE, MODE_SUBSTANCE_PAINTER};
use relmesh_model::{BoneGroupProfile, ShapeKeyProfile};
use relmesh_scene::{Modifier, ModifierKind, ObjectId, Scene, apply_modifier};

/// Export target convention. Each mode contributes a material postfix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateMode {
    SubstancePainter,
    MikuMikuDance,
    GameEngine,
    Custom(String),
}

impl TranslateMode {
    pub fn postfix(&self) -> &str {
        match self {
            TranslateMode::SubstancePainter => MODE_SUBSTANCE_PAINTER,
            TranslateMode::MikuMikuDance => MODE_MIKUMIKUDANCE,
            TranslateMode::GameEngine => MODE_GAME_ENGINE,
            TranslateMode::Custom(postfix) => postfix,
        }
    }
}

/// Run every requested translation against one release object.
pub fn translate(
    scene: &mut Scene,
    object: ObjectId,
    mode: &TranslateMode,
    bonegroup: Option<&BoneGroupProfile>,
    shapekey: Option<&ShapeKeyProfile>,
) -> Result<()> {
    if let Some(profile) = bonegroup {
        translate_bonegroup(scene, object, profile)?;
    }
    if let Some(profile) = shapekey {
        translate_shapekey(scene, object, profile)?;
    }
    translate_materials(scene, object, mode)?;
    let name = scene.expect_object(object)?.name.clone();
    info!(object = %name, postfix = mode.postfix(), "translated");
    Ok(())
}

/// Merge rows add the source group's weights onto the destination (capped
/// at 1.0) and delete the source; rename rows then substring-rewrite
/// every remaining group name.
pub fn translate_bonegroup(
    scene: &mut Scene,
    object: ObjectId,
    profile: &BoneGroupProfile,
) -> Result<()> {
    let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
    for (source, destination) in &profile.merges {
        if mesh.vertex_group(source).is_none() {
            continue;
        }
        let mix = Modifier {
            name: "translate_mix".to_string(),
            kind: ModifierKind::VertexWeightMix {
                target: destination.clone(),
                other: source.clone(),
            },
        };
        apply_modifier(mesh, &mix);
        mesh.remove_vertex_group(source);
        debug!(source, destination, "merged bone group");
    }
    for (find, replace) in &profile.renames {
        let renames: Vec<(String, String)> = mesh
            .vertex_groups
            .iter()
            .filter(|group| group.name.contains(find.as_str()))
            .map(|group| (group.name.clone(), group.name.replace(find.as_str(), replace)))
            .collect();
        for (old, new) in renames {
            mesh.rename_vertex_group(&old, &new);
        }
    }
    Ok(())
}

/// Rename or delete shape keys per profile row. A row whose original name
/// ends with the dot delimiter matches every key carrying that prefix.
/// The basis key is never touched.
pub fn translate_shapekey(
    scene: &mut Scene,
    object: ObjectId,
    profile: &ShapeKeyProfile,
) -> Result<()> {
    let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
    for row in &profile.rows {
        let prefix_match = row.original.ends_with(DOT);
        let matched: Vec<String> = mesh
            .shape_keys
            .iter()
            .skip(1)
            .filter(|key| {
                if prefix_match {
                    key.name.starts_with(&row.original)
                } else {
                    key.name == row.original
                }
            })
            .map(|key| key.name.clone())
            .collect();
        for name in matched {
            match &row.replacement {
                None => {
                    mesh.remove_shape_key(&name);
                }
                Some(replacement) => {
                    let new = if prefix_match {
                        name.replacen(&row.original, replacement, 1)
                    } else {
                        replacement.clone()
                    };
                    if let Some(index) = mesh.shape_key_index(&name) {
                        mesh.shape_keys[index].name = new;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Clone every slot material under the mode postfix and point the slot at
/// the clone. An already-registered clone is reused.
pub fn translate_materials(
    scene: &mut Scene,
    object: ObjectId,
    mode: &TranslateMode,
) -> Result<()> {
    let slots: Vec<String> = scene
        .expect_object(object)?
        .expect_mesh()?
        .material_slots
        .clone();
    for slot in slots {
        let target = format!("{slot}{}", mode.postfix());
        if !scene.has_material(&target) {
            scene.add_material(&target);
        }
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        for entry in &mut mesh.material_slots {
            if *entry == slot {
                *entry = target.clone();
            }
        }
    }
    Ok(())
}
