//! Scene objects: a name, an optional mesh payload, a modifier stack,
//! and the authored command list.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use relmesh_model::Command;
use relmesh_model::error::{Result, SetupError};

use crate::mesh::Mesh;
use crate::modifier::{Modifier, ModifierKind, apply_modifier};

/// Payload of an object. Only mesh objects participate in setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectData {
    Mesh(Mesh),
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub name: String,
    pub data: ObjectData,
    pub modifiers: Vec<Modifier>,
    pub commands: Vec<Command>,
}

impl Object {
    pub fn new_mesh(name: &str, mesh: Mesh) -> Self {
        Object {
            name: name.to_string(),
            data: ObjectData::Mesh(mesh),
            modifiers: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn new_empty(name: &str) -> Self {
        Object {
            name: name.to_string(),
            data: ObjectData::Empty,
            modifiers: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.data, ObjectData::Mesh(_))
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            ObjectData::Empty => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            ObjectData::Empty => None,
        }
    }

    pub fn expect_mesh(&self) -> Result<&Mesh> {
        self.mesh().ok_or_else(|| {
            SetupError::structure(format!("object '{}' carries no mesh", self.name))
        })
    }

    pub fn expect_mesh_mut(&mut self) -> Result<&mut Mesh> {
        let name = self.name.clone();
        self.mesh_mut()
            .ok_or_else(|| SetupError::structure(format!("object '{name}' carries no mesh")))
    }

    pub fn modifier_index(&self, name: &str) -> Option<usize> {
        self.modifiers.iter().position(|modifier| modifier.name == name)
    }

    pub fn modifier(&self, name: &str) -> Option<&Modifier> {
        self.modifiers.iter().find(|modifier| modifier.name == name)
    }

    /// Drop a modifier from the stack without applying it.
    pub fn remove_modifier(&mut self, name: &str) -> Option<Modifier> {
        self.modifier_index(name)
            .map(|index| self.modifiers.remove(index))
    }

    /// Apply the named modifier to the mesh and drop it from the stack.
    /// Returns the vertex indices the application introduced.
    pub fn apply_named_modifier(&mut self, name: &str) -> Result<Vec<u32>> {
        let Some(index) = self.modifier_index(name) else {
            return Err(SetupError::structure(format!(
                "object '{}' has no modifier '{name}'",
                self.name
            )));
        };
        let modifier = self.modifiers.remove(index);
        let mesh = self.expect_mesh_mut()?;
        Ok(apply_modifier(mesh, &modifier))
    }

    /// Bone names of every armature modifier on the stack. These exclude
    /// deform weight groups from command candidate sets.
    pub fn armature_bones(&self) -> BTreeSet<String> {
        self.modifiers
            .iter()
            .filter_map(|modifier| match &modifier.kind {
                ModifierKind::Armature { bones } => Some(bones.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_named_modifier_consumes_the_stack_entry() {
        let mesh = Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        };
        let mut object = Object::new_mesh("hero", mesh);
        object.modifiers.push(Modifier {
            name: "subd".to_string(),
            kind: ModifierKind::Subdivide { levels: 1 },
        });
        let created = object.apply_named_modifier("subd").unwrap();
        assert_eq!(created, vec![2]);
        assert!(object.modifiers.is_empty());
        assert!(object.apply_named_modifier("subd").is_err());
    }

    #[test]
    fn armature_bones_union_across_modifiers() {
        let mut object = Object::new_empty("rig");
        object.modifiers.push(Modifier {
            name: "arm".to_string(),
            kind: ModifierKind::Armature {
                bones: vec!["spine".to_string(), "head".to_string()],
            },
        });
        let bones = object.armature_bones();
        assert!(bones.contains("spine"));
        assert!(bones.contains("head"));
    }
}
