//! Per-object strategy pipeline with ordered step execution.
//!
//! Each strategy implements the `ObjectStrategy` trait and runs in a
//! fixed total order over one copied source object. A strategy walks the
//! object's live sub-elements of its scope and looks each one up in the
//! command list: a found command whose spec is enabled takes the
//! processing path, anything else takes the not-processing path (a no-op
//! for every strategy except UV selection, which still queues unmatched
//! layers for removal).
//!
//! # Standard order
//!
//! 1. **ShapeKeyApplyStep** - bake single shape keys
//! 2. **EdgeLoopDeleteStep** - dissolve group-selected edge loops
//! 3. **ModifierDeleteStep** - drop named modifiers unapplied
//! 4. **UndivisionStep** - apply the modifier stack, preserving keys
//!    through matched subdivision modifiers, with the non-decimate range
//!    exclusion sub-pass
//! 5. **MergeDestinationTagStep** / **MergeSourceTagStep** - rename merge
//!    groups into their provenance encoding
//! 6. **VertexDeleteStep** - delete group-selected vertices
//! 7. **UvSelectStep** - keep exactly one layer under the canonical name
//! 8. **MaterialReplaceStep** - swap or clone-and-rename slot materials
//! 9. **SourceCleanupStep** - strip authored keys/groups the commands name

use std::collections::BTreeSet;

use tracing::debug;

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::{
    self, CANONICAL_UV_LAYER, encode_merge_dest, encode_merge_source,
};
use relmesh_model::{Command, CommandArgs, ScopeKind, SpecRegistry};
use relmesh_scene::{ObjectId, Scene};

use crate::apply::apply_modifier_preserving_keys;

/// Per-object facts the strategies need beyond the scene itself.
pub struct StrategyContext {
    /// Name of the source object this copy was duplicated from. Merge
    /// provenance tags embed it so the release cleanup can pair sides
    /// across objects after the copies are renamed and joined.
    pub original_name: String,
}

/// Mutable state shared across pipeline steps.
#[derive(Default)]
pub struct StrategyState {
    /// Step execution log for debugging.
    pub executed: Vec<String>,
}

/// A single step of the per-object pipeline.
pub trait ObjectStrategy: Send + Sync {
    /// Execute this step against the object (modified in place).
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        ctx: &StrategyContext,
        state: &mut StrategyState,
    ) -> Result<()>;

    /// Human-readable name for this step (for logging/debugging).
    fn strategy_name(&self) -> &str;
}

/// An ordered pipeline of object strategies.
pub struct StrategyPipeline {
    steps: Vec<Box<dyn ObjectStrategy>>,
}

impl Default for StrategyPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyPipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: Box<dyn ObjectStrategy>) -> Self {
        self.steps.push(step);
        self
    }

    /// Execute all steps in order.
    pub fn execute(&self, scene: &mut Scene, object: ObjectId, ctx: &StrategyContext) -> Result<()> {
        let mut state = StrategyState::default();
        for step in &self.steps {
            debug!(strategy = step.strategy_name(), object = %ctx.original_name, "running");
            step.execute(scene, object, ctx, &mut state)?;
            state.executed.push(step.strategy_name().to_string());
        }
        debug!(object = %ctx.original_name, executed = ?state.executed, "pipeline finished");
        Ok(())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.strategy_name()).collect()
    }
}

/// Build the standard pipeline in its fixed total order.
pub fn build_default_pipeline() -> StrategyPipeline {
    StrategyPipeline::new()
        .add_step(Box::new(ShapeKeyApplyStep))
        .add_step(Box::new(EdgeLoopDeleteStep))
        .add_step(Box::new(ModifierDeleteStep))
        .add_step(Box::new(UndivisionStep))
        .add_step(Box::new(MergeDestinationTagStep))
        .add_step(Box::new(MergeSourceTagStep))
        .add_step(Box::new(VertexDeleteStep))
        .add_step(Box::new(UvSelectStep))
        .add_step(Box::new(MaterialReplaceStep))
        .add_step(Box::new(SourceCleanupStep))
}

/// First command (by index) keyed by `source` whose payload satisfies
/// `kind`. Found-ness and spec enablement are separate concerns: the
/// caller decides the not-processing path explicitly.
fn find_command<'a, F>(commands: &'a [Command], source: &str, kind: F) -> Option<&'a Command>
where
    F: Fn(&CommandArgs) -> bool,
{
    commands
        .iter()
        .filter(|command| command.source == source && kind(&command.args))
        .min_by_key(|command| command.index)
}

fn is_processing(command: Option<&Command>, specs: &SpecRegistry) -> bool {
    command.is_some_and(|command| specs.is_enabled(&command.spec))
}

fn snapshot(scene: &Scene, object: ObjectId) -> Result<(Vec<Command>, SpecRegistry)> {
    let commands = scene.expect_object(object)?.commands.clone();
    Ok((commands, scene.specs.clone()))
}

/// Step 1: bake single shape keys onto their destinations.
pub struct ShapeKeyApplyStep;

impl ObjectStrategy for ShapeKeyApplyStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let key_names: Vec<String> = mesh
            .shape_keys
            .iter()
            .skip(1)
            .map(|key| key.name.clone())
            .collect();
        for name in key_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::ShapeKeyApplySingle { .. })
            });
            if !is_processing(command, &specs) {
                continue;
            }
            let destination = command
                .and_then(Command::destination)
                .unwrap_or_default();
            mesh.bake_shape_key(&name, destination)?;
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "shape_key_apply"
    }
}

/// Step 2: dissolve the edge loops selected by matched vertex groups.
pub struct EdgeLoopDeleteStep;

impl ObjectStrategy for EdgeLoopDeleteStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let group_names: Vec<String> = mesh
            .vertex_groups
            .iter()
            .map(|group| group.name.clone())
            .collect();
        for name in group_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::VgDeleteLoop)
            });
            if is_processing(command, &specs) {
                let selection = mesh.group_selection(&name);
                mesh.dissolve_vertices(&selection);
            }
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "edge_loop_delete"
    }
}

/// Step 3: drop matched modifiers without applying them.
pub struct ModifierDeleteStep;

impl ObjectStrategy for ModifierDeleteStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let target = scene.expect_object_mut(object)?;
        let modifier_names: Vec<String> = target
            .modifiers
            .iter()
            .map(|modifier| modifier.name.clone())
            .collect();
        for name in modifier_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::ModifierDelete)
            });
            if is_processing(command, &specs) {
                target.remove_modifier(&name);
            }
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "modifier_delete"
    }
}

/// Step 4: apply the remaining modifier stack. Modifiers matched by an
/// enabled undivide command form the middle bucket and are applied with
/// key preservation; everything before the first matched modifier is
/// applied first, everything after last. After each key-preserving
/// application, matched non-decimate commands strip the newly introduced
/// vertices from their named group.
pub struct UndivisionStep;

impl ObjectStrategy for UndivisionStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let stack: Vec<String> = scene
            .expect_object(object)?
            .modifiers
            .iter()
            .map(|modifier| modifier.name.clone())
            .collect();

        let matched: Vec<String> = stack
            .iter()
            .filter(|name| {
                let command = find_command(&commands, name, |args| {
                    matches!(args, CommandArgs::ModifierUndivide)
                });
                is_processing(command, &specs)
            })
            .cloned()
            .collect();

        let first_matched = stack.iter().position(|name| matched.contains(name));
        let mut before = Vec::new();
        let mut after = Vec::new();
        for (position, name) in stack.iter().enumerate() {
            if matched.contains(name) {
                continue;
            }
            match first_matched {
                Some(boundary) if position > boundary => after.push(name.clone()),
                Some(_) => before.push(name.clone()),
                None => before.push(name.clone()),
            }
        }

        for name in before {
            scene.expect_object_mut(object)?.apply_named_modifier(&name)?;
        }
        for name in &matched {
            let created = apply_modifier_preserving_keys(scene, object, name)?;
            let created: BTreeSet<u32> = created.into_iter().collect();
            for command in &commands {
                let CommandArgs::VgNonDecimate {
                    destination_modifier,
                } = &command.args
                else {
                    continue;
                };
                if destination_modifier != name || !specs.is_enabled(&command.spec) {
                    continue;
                }
                let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
                if let Some(group) = mesh.vertex_group_mut(&command.source) {
                    group.weights.retain(|vertex, _| !created.contains(vertex));
                }
            }
        }
        for name in after {
            scene.expect_object_mut(object)?.apply_named_modifier(&name)?;
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "undivision"
    }
}

/// Step 5a: rename destination-side merge groups into their encoding.
pub struct MergeDestinationTagStep;

impl ObjectStrategy for MergeDestinationTagStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let group_names: Vec<String> = mesh
            .vertex_groups
            .iter()
            .map(|group| group.name.clone())
            .collect();
        for name in group_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::VgMergeVertexDestination { .. })
            });
            if !is_processing(command, &specs) {
                continue;
            }
            let Some(command) = command else { continue };
            let (Some(source_object), Some(source_group)) = (
                command.destination_object(),
                command.destination_vertex_group(),
            ) else {
                continue;
            };
            let encoded = encode_merge_dest(source_object, source_group);
            let unique = names::dedupe_name(&encoded, |candidate| {
                mesh.vertex_group_index(candidate).is_some()
            });
            mesh.rename_vertex_group(&name, &unique);
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "merge_destination_tag"
    }
}

/// Step 5b: rename source-side merge groups into their encoding, keyed by
/// the object's pre-copy name.
pub struct MergeSourceTagStep;

impl ObjectStrategy for MergeSourceTagStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let group_names: Vec<String> = mesh
            .vertex_groups
            .iter()
            .map(|group| group.name.clone())
            .collect();
        for name in group_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::VgMergeVertexSource { .. })
            });
            if !is_processing(command, &specs) {
                continue;
            }
            let Some(distance) = command.and_then(Command::merge_distance) else {
                continue;
            };
            let encoded = encode_merge_source(&ctx.original_name, &name, distance);
            mesh.rename_vertex_group(&name, &encoded);
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "merge_source_tag"
    }
}

/// Step 6: delete the vertices selected by matched vertex groups.
pub struct VertexDeleteStep;

impl ObjectStrategy for VertexDeleteStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let group_names: Vec<String> = mesh
            .vertex_groups
            .iter()
            .map(|group| group.name.clone())
            .collect();
        for name in group_names {
            let command = find_command(&commands, &name, |args| {
                matches!(args, CommandArgs::VgDeleteVertex)
            });
            if is_processing(command, &specs) {
                let selection = mesh.group_selection(&name);
                mesh.delete_vertices(&selection);
            }
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "vertex_delete"
    }
}

/// Step 7: keep exactly one UV layer under the canonical slot name.
///
/// Not-processing is meaningful here: every layer without an enabled
/// command is queued for removal, and if nothing matched the first layer
/// survives so the mesh never ends up without texture coordinates.
pub struct UvSelectStep;

impl ObjectStrategy for UvSelectStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        let layer_names: Vec<String> = mesh
            .uv_layers
            .iter()
            .map(|layer| layer.name.clone())
            .collect();
        if layer_names.is_empty() {
            return Ok(());
        }
        let mut survivor: Option<String> = None;
        for name in &layer_names {
            let command = find_command(&commands, name, |args| {
                matches!(args, CommandArgs::UvSelect)
            });
            if is_processing(command, &specs) && survivor.is_none() {
                survivor = Some(name.clone());
            }
        }
        let survivor = survivor.unwrap_or_else(|| layer_names[0].clone());
        for name in &layer_names {
            if *name != survivor {
                mesh.remove_uv_layer(name);
            }
        }
        mesh.rename_uv_layer(&survivor, CANONICAL_UV_LAYER);
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "uv_select"
    }
}

/// Step 8: swap or clone-and-rename slot materials.
pub struct MaterialReplaceStep;

impl ObjectStrategy for MaterialReplaceStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let (commands, specs) = snapshot(scene, object)?;
        let slot_names: Vec<String> = scene
            .expect_object(object)?
            .expect_mesh()?
            .material_slots
            .clone();

        // resolve every replacement before touching anything, so a blank
        // destination aborts with zero slot mutation
        let mut replacements: Vec<(String, String)> = Vec::new();
        for name in &slot_names {
            let command = find_command(&commands, name, |args| {
                matches!(args, CommandArgs::MaterialReplace { .. })
            });
            if !is_processing(command, &specs) {
                continue;
            }
            let destination = command
                .and_then(Command::destination)
                .unwrap_or_default();
            if destination.is_empty() {
                return Err(SetupError::syntax(format!(
                    "material command for slot '{name}' has a blank destination"
                )));
            }
            replacements.push((name.clone(), destination.to_string()));
        }

        for (old, new) in replacements {
            if !scene.has_material(&new) {
                // clone-and-rename: register the destination material
                scene.add_material(&new);
            }
            let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
            for slot in &mut mesh.material_slots {
                if *slot == old {
                    *slot = new.clone();
                }
            }
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "material_replace"
    }
}

/// Step 9: strip every shape key and vertex group an authored command of
/// that scope names, regardless of gating. This removes the authoring
/// artifacts once all strategies have run; merge-tagged groups were
/// renamed in step 5 and are therefore left for the release cleanup.
pub struct SourceCleanupStep;

impl ObjectStrategy for SourceCleanupStep {
    fn execute(
        &self,
        scene: &mut Scene,
        object: ObjectId,
        _ctx: &StrategyContext,
        _state: &mut StrategyState,
    ) -> Result<()> {
        let commands = scene.expect_object(object)?.commands.clone();
        let mesh = scene.expect_object_mut(object)?.expect_mesh_mut()?;
        for command in &commands {
            match command.scope() {
                ScopeKind::ShapeKey => {
                    mesh.remove_shape_key(&command.source);
                }
                ScopeKind::VertexGroup => {
                    mesh.remove_vertex_group(&command.source);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn strategy_name(&self) -> &str {
        "source_cleanup"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relmesh_model::add_command;
    use relmesh_scene::{Mesh, Modifier, ModifierKind, Object};

    #[test]
    fn undivision_buckets_the_stack_and_strips_created_vertices() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut mesh = Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        };
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("stretch", 1.0);
        mesh.shape_keys[1].data[1] = [2.0, 0.0, 0.0];
        mesh.add_vertex_group("keepme");
        mesh.vertex_group_mut("keepme")
            .unwrap()
            .weights
            .extend([(0, 1.0), (1, 1.0)]);
        let mut object = Object::new_mesh("hero", mesh);
        object.modifiers.extend([
            Modifier {
                name: "skin_wrap".to_string(),
                kind: ModifierKind::Generic,
            },
            Modifier {
                name: "subd".to_string(),
                kind: ModifierKind::Subdivide { levels: 1 },
            },
            Modifier {
                name: "polish".to_string(),
                kind: ModifierKind::Generic,
            },
        ]);
        add_command(
            &mut object.commands,
            "subd",
            "Default",
            CommandArgs::ModifierUndivide,
        );
        add_command(
            &mut object.commands,
            "keepme",
            "Default",
            CommandArgs::VgNonDecimate {
                destination_modifier: "subd".to_string(),
            },
        );
        let id = scene.create_object(root, object).unwrap();

        let ctx = StrategyContext {
            original_name: "hero".to_string(),
        };
        let mut state = StrategyState::default();
        UndivisionStep.execute(&mut scene, id, &ctx, &mut state).unwrap();

        // whole stack consumed: unmatched modifiers applied around the
        // key-preserving middle bucket
        let handle = scene.object(id).unwrap();
        assert!(handle.modifiers.is_empty());
        let mesh = handle.mesh().unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        // midpoint of the stretched key, not of the basis
        let stretch = mesh.shape_key("stretch").unwrap();
        assert_eq!(stretch.data[2], [1.0, 0.0, 0.0]);
        // the subdivision-introduced vertex is excluded from the group
        let keepme = mesh.vertex_group("keepme").unwrap();
        assert!(!keepme.weights.contains_key(&2));
        assert_eq!(keepme.weights.len(), 2);
    }
}
