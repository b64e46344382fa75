//! Declarative per-element transformation commands.
//!
//! A command binds one named mesh sub-element (its `source`) to one
//! strategy of the setup pipeline, gated by a named spec. The variant
//! payload carries only the fields that strategy needs, so an invalid
//! field combination is unrepresentable.

use serde::{Deserialize, Serialize};

/// Sub-element kind a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    VertexGroup,
    ShapeKey,
    Uv,
    Modifier,
    Material,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::VertexGroup => "vertex group",
            ScopeKind::ShapeKey => "shape key",
            ScopeKind::Uv => "uv layer",
            ScopeKind::Modifier => "modifier",
            ScopeKind::Material => "material",
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strategy-specific command payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommandArgs {
    /// Bake one shape key's deltas onto `destination` (or the base shape).
    ShapeKeyApplySingle { destination: String },
    /// Dissolve the edge loops selected by the source vertex group.
    VgDeleteLoop,
    /// Remove the named modifier without applying it.
    ModifierDelete,
    /// Flatten a Subdivide modifier while preserving shape keys.
    ModifierUndivide,
    /// Exclude subdivision-introduced vertices of a group from decimation.
    VgNonDecimate { destination_modifier: String },
    /// Tag the source side of a cross-object vertex merge.
    VgMergeVertexSource { merge_distance: f32 },
    /// Tag the destination side of a cross-object vertex merge.
    VgMergeVertexDestination {
        destination_object: String,
        destination_vertex_group: String,
    },
    /// Delete the vertices selected by the source vertex group.
    VgDeleteVertex,
    /// Keep this UV layer as the canonical slot, dropping all others.
    UvSelect,
    /// Swap or clone-and-rename the slot's material.
    MaterialReplace { destination: String },
}

impl CommandArgs {
    pub fn scope(&self) -> ScopeKind {
        match self {
            CommandArgs::ShapeKeyApplySingle { .. } => ScopeKind::ShapeKey,
            CommandArgs::VgDeleteLoop
            | CommandArgs::VgNonDecimate { .. }
            | CommandArgs::VgMergeVertexSource { .. }
            | CommandArgs::VgMergeVertexDestination { .. }
            | CommandArgs::VgDeleteVertex => ScopeKind::VertexGroup,
            CommandArgs::ModifierDelete | CommandArgs::ModifierUndivide => ScopeKind::Modifier,
            CommandArgs::UvSelect => ScopeKind::Uv,
            CommandArgs::MaterialReplace { .. } => ScopeKind::Material,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CommandArgs::ShapeKeyApplySingle { .. } => "ShapeKeyApplySingle",
            CommandArgs::VgDeleteLoop => "VgDeleteLoop",
            CommandArgs::ModifierDelete => "ModifierDelete",
            CommandArgs::ModifierUndivide => "ModifierUndivide",
            CommandArgs::VgNonDecimate { .. } => "VgNonDecimate",
            CommandArgs::VgMergeVertexSource { .. } => "VgMergeVertexSource",
            CommandArgs::VgMergeVertexDestination { .. } => "VgMergeVertexDestination",
            CommandArgs::VgDeleteVertex => "VgDeleteVertex",
            CommandArgs::UvSelect => "UvSelect",
            CommandArgs::MaterialReplace { .. } => "MaterialReplace",
        }
    }
}

/// One user-authored transformation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Dense global ordering index, reassigned after every add/remove.
    pub index: u32,
    /// Name of the live sub-element this command is keyed by.
    pub source: String,
    /// Enable/disable group gating this command.
    pub spec: String,
    #[serde(flatten)]
    pub args: CommandArgs,
}

impl Command {
    pub fn scope(&self) -> ScopeKind {
        self.args.scope()
    }

    pub fn destination(&self) -> Option<&str> {
        match &self.args {
            CommandArgs::ShapeKeyApplySingle { destination }
            | CommandArgs::MaterialReplace { destination } => Some(destination),
            _ => None,
        }
    }

    pub fn destination_modifier(&self) -> Option<&str> {
        match &self.args {
            CommandArgs::VgNonDecimate {
                destination_modifier,
            } => Some(destination_modifier),
            _ => None,
        }
    }

    pub fn destination_object(&self) -> Option<&str> {
        match &self.args {
            CommandArgs::VgMergeVertexDestination {
                destination_object, ..
            } => Some(destination_object),
            _ => None,
        }
    }

    pub fn destination_vertex_group(&self) -> Option<&str> {
        match &self.args {
            CommandArgs::VgMergeVertexDestination {
                destination_vertex_group,
                ..
            } => Some(destination_vertex_group),
            _ => None,
        }
    }

    pub fn merge_distance(&self) -> Option<f32> {
        match &self.args {
            CommandArgs::VgMergeVertexSource { merge_distance } => Some(*merge_distance),
            _ => None,
        }
    }
}

/// Append a command, assigning the next global index.
pub fn add_command(commands: &mut Vec<Command>, source: &str, spec: &str, args: CommandArgs) {
    let index = commands.len() as u32;
    commands.push(Command {
        index,
        source: source.to_string(),
        spec: spec.to_string(),
        args,
    });
    renumber(commands);
}

/// Remove the command carrying the given global index.
pub fn remove_command(commands: &mut Vec<Command>, index: u32) {
    commands.retain(|command| command.index != index);
    renumber(commands);
}

/// Reassign indices densely (0..N-1) preserving the current order.
pub fn renumber(commands: &mut [Command]) {
    commands.sort_by_key(|command| command.index);
    for (position, command) in commands.iter_mut().enumerate() {
        command.index = position as u32;
    }
}

/// Commands of one scope, in global index order.
pub fn commands_in_scope(commands: &[Command], scope: ScopeKind) -> Vec<&Command> {
    let mut selected: Vec<&Command> = commands
        .iter()
        .filter(|command| command.scope() == scope)
        .collect();
    selected.sort_by_key(|command| command.index);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Command> {
        let mut commands = Vec::new();
        add_command(
            &mut commands,
            "brow_up",
            "Default",
            CommandArgs::ShapeKeyApplySingle {
                destination: "Basis".to_string(),
            },
        );
        add_command(&mut commands, "seam", "Default", CommandArgs::VgDeleteLoop);
        add_command(
            &mut commands,
            "skin",
            "Default",
            CommandArgs::MaterialReplace {
                destination: "skin_final".to_string(),
            },
        );
        commands
    }

    #[test]
    fn indices_stay_dense_after_removal() {
        let mut commands = sample();
        remove_command(&mut commands, 1);
        let indices: Vec<u32> = commands.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(commands[1].source, "skin");
    }

    #[test]
    fn scope_filtering_orders_by_index() {
        let commands = sample();
        let vg = commands_in_scope(&commands, ScopeKind::VertexGroup);
        assert_eq!(vg.len(), 1);
        assert_eq!(vg[0].source, "seam");
    }

    #[test]
    fn serializes_with_flattened_kind() {
        let commands = sample();
        let json = serde_json::to_string(&commands[0]).expect("serialize command");
        assert!(json.contains("\"kind\":\"ShapeKeyApplySingle\""));
        let round: Command = serde_json::from_str(&json).expect("deserialize command");
        assert_eq!(round, commands[0]);
    }
}
