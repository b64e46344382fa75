//! Modifier stack entries and their geometric effect on application.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;

/// Geometric behavior of a modifier when applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ModifierKind {
    /// Deformation rig binding. Applying it changes no geometry; its bone
    /// names exclude matching vertex groups from command candidates.
    Armature { bones: Vec<String> },
    /// Edge-midpoint subdivision, the undivision target.
    Subdivide { levels: u32 },
    /// Whole-mesh merge-by-distance. Vertex count after application
    /// depends on the current coordinates.
    Weld { distance: f32 },
    /// Adds group `other`'s weights onto group `target`, capped at 1.0.
    VertexWeightMix { target: String, other: String },
    /// Anything the pipeline only ever deletes or ignores.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn is_subdivide(&self) -> bool {
        matches!(self.kind, ModifierKind::Subdivide { .. })
    }
}

/// Apply one modifier's effect to a mesh. Returns the indices of vertices
/// the application introduced (non-empty only for Subdivide).
pub fn apply_modifier(mesh: &mut Mesh, modifier: &Modifier) -> Vec<u32> {
    match &modifier.kind {
        ModifierKind::Armature { .. } | ModifierKind::Generic => Vec::new(),
        ModifierKind::Subdivide { levels } => {
            let mut created = Vec::new();
            for _ in 0..*levels {
                created.extend(mesh.subdivide_once());
            }
            created
        }
        ModifierKind::Weld { distance } => {
            let all: BTreeSet<u32> = (0..mesh.vertex_count() as u32).collect();
            mesh.merge_by_distance(&all, *distance);
            Vec::new()
        }
        ModifierKind::VertexWeightMix { target, other } => {
            let added: Vec<(u32, f32)> = mesh
                .vertex_group(other)
                .map(|group| {
                    group
                        .weights
                        .iter()
                        .map(|(&vertex, &weight)| (vertex, weight))
                        .collect()
                })
                .unwrap_or_default();
            if mesh.vertex_group(target).is_none() {
                mesh.add_vertex_group(target);
            }
            if let Some(group) = mesh.vertex_group_mut(target) {
                for (vertex, weight) in added {
                    let slot = group.weights.entry(vertex).or_insert(0.0);
                    *slot = (*slot + weight).min(1.0);
                }
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_mix_sums_and_caps() {
        let mut mesh = Mesh {
            positions: vec![[0.0; 3]; 3],
            ..Mesh::default()
        };
        mesh.add_vertex_group("thigh.L");
        mesh.add_vertex_group("thigh.L.001");
        mesh.vertex_group_mut("thigh.L")
            .unwrap()
            .weights
            .extend([(0, 0.6), (1, 0.9)]);
        mesh.vertex_group_mut("thigh.L.001")
            .unwrap()
            .weights
            .extend([(1, 0.5), (2, 0.3)]);
        let modifier = Modifier {
            name: "mix".to_string(),
            kind: ModifierKind::VertexWeightMix {
                target: "thigh.L".to_string(),
                other: "thigh.L.001".to_string(),
            },
        };
        apply_modifier(&mut mesh, &modifier);
        let target = mesh.vertex_group("thigh.L").unwrap();
        assert_eq!(target.weights.get(&0), Some(&0.6));
        assert_eq!(target.weights.get(&1), Some(&1.0));
        assert_eq!(target.weights.get(&2), Some(&0.3));
    }

    #[test]
    fn weld_merges_coincident_vertices_across_the_whole_mesh() {
        let mut mesh = Mesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0; 3]],
            edges: vec![[0, 1], [1, 2]],
            ..Mesh::default()
        };
        let modifier = Modifier {
            name: "weld".to_string(),
            kind: ModifierKind::Weld { distance: 1e-4 },
        };
        apply_modifier(&mut mesh, &modifier);
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.edges, vec![[0, 1]]);
    }
}
