//! Mesh payload and the edit primitives the setup pipeline drives.
//!
//! Geometry is vertices plus edges; faces are irrelevant to the
//! orchestration and are not modeled. Shape keys store absolute
//! per-vertex coordinates with the first key acting as the basis, the
//! host convention this pipeline was written against. Vertex groups are
//! sparse weight maps. Every destructive primitive keeps shape keys,
//! groups, and UV rows index-consistent with the vertex list.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::dedupe_name;

/// One shape key: absolute coordinates plus the authoring value slider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeKey {
    pub name: String,
    pub value: f32,
    pub data: Vec<[f32; 3]>,
}

/// Sparse per-vertex weight map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexGroup {
    pub name: String,
    pub weights: BTreeMap<u32, f32>,
}

/// Per-vertex texture coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    pub data: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub edges: Vec<[u32; 2]>,
    pub shape_keys: Vec<ShapeKey>,
    pub vertex_groups: Vec<VertexGroup>,
    pub uv_layers: Vec<UvLayer>,
    pub material_slots: Vec<String>,
}

fn midpoint3(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        (a[0] + b[0]) / 2.0,
        (a[1] + b[1]) / 2.0,
        (a[2] + b[2]) / 2.0,
    ]
}

fn midpoint2(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0]
}

fn distance3(a: [f32; 3], b: [f32; 3]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

fn filter_rows<T: Copy>(data: &[T], doomed: &BTreeSet<u32>) -> Vec<T> {
    data.iter()
        .enumerate()
        .filter(|(index, _)| !doomed.contains(&(*index as u32)))
        .map(|(_, row)| *row)
        .collect()
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    // --- shape keys -----------------------------------------------------

    pub fn shape_key_index(&self, name: &str) -> Option<usize> {
        self.shape_keys.iter().position(|key| key.name == name)
    }

    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|key| key.name == name)
    }

    /// Create the basis key from the current positions if no keys exist.
    pub fn ensure_basis(&mut self) {
        if self.shape_keys.is_empty() {
            self.shape_keys.push(ShapeKey {
                name: "Basis".to_string(),
                value: 0.0,
                data: self.positions.clone(),
            });
        }
    }

    /// Add a key snapshotting the current positions; returns the name
    /// actually assigned after deduplication.
    pub fn add_shape_key_from_positions(&mut self, name: &str, value: f32) -> String {
        self.ensure_basis();
        let assigned = dedupe_name(name, |candidate| self.shape_key_index(candidate).is_some());
        self.shape_keys.push(ShapeKey {
            name: assigned.clone(),
            value,
            data: self.positions.clone(),
        });
        assigned
    }

    pub fn remove_shape_key(&mut self, name: &str) -> bool {
        match self.shape_key_index(name) {
            Some(index) => {
                self.shape_keys.remove(index);
                true
            }
            None => false,
        }
    }

    /// Bake `source`'s deltas, scaled by its current value, onto
    /// `destination` (the basis and the live positions when `destination`
    /// is empty or names the basis), then remove `source`.
    pub fn bake_shape_key(&mut self, source: &str, destination: &str) -> Result<()> {
        let Some(source_index) = self.shape_key_index(source) else {
            return Err(SetupError::structure(format!(
                "shape key '{source}' not found"
            )));
        };
        if source_index == 0 {
            return Err(SetupError::structure(format!(
                "shape key '{source}' is the basis and cannot be baked"
            )));
        }
        let value = self.shape_keys[source_index].value;
        let deltas: Vec<[f32; 3]> = self.shape_keys[source_index]
            .data
            .iter()
            .zip(&self.shape_keys[0].data)
            .map(|(key, basis)| {
                [
                    (key[0] - basis[0]) * value,
                    (key[1] - basis[1]) * value,
                    (key[2] - basis[2]) * value,
                ]
            })
            .collect();

        let basis_name = self.shape_keys[0].name.clone();
        if destination.is_empty() || destination == basis_name {
            for (position, delta) in self.positions.iter_mut().zip(&deltas) {
                position[0] += delta[0];
                position[1] += delta[1];
                position[2] += delta[2];
            }
            for (row, delta) in self.shape_keys[0].data.iter_mut().zip(&deltas) {
                row[0] += delta[0];
                row[1] += delta[1];
                row[2] += delta[2];
            }
        } else {
            let Some(dest_index) = self.shape_key_index(destination) else {
                return Err(SetupError::structure(format!(
                    "bake destination shape key '{destination}' not found"
                )));
            };
            if dest_index == source_index {
                return Err(SetupError::structure(format!(
                    "shape key '{source}' cannot be baked onto itself"
                )));
            }
            for (row, delta) in self.shape_keys[dest_index].data.iter_mut().zip(&deltas) {
                row[0] += delta[0];
                row[1] += delta[1];
                row[2] += delta[2];
            }
        }
        self.shape_keys.remove(source_index);
        Ok(())
    }

    // --- vertex groups --------------------------------------------------

    pub fn vertex_group_index(&self, name: &str) -> Option<usize> {
        self.vertex_groups.iter().position(|group| group.name == name)
    }

    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|group| group.name == name)
    }

    pub fn vertex_group_mut(&mut self, name: &str) -> Option<&mut VertexGroup> {
        self.vertex_groups.iter_mut().find(|group| group.name == name)
    }

    /// Add an empty group; returns the name actually assigned.
    pub fn add_vertex_group(&mut self, name: &str) -> String {
        let assigned = dedupe_name(name, |candidate| {
            self.vertex_group_index(candidate).is_some()
        });
        self.vertex_groups.push(VertexGroup {
            name: assigned.clone(),
            weights: BTreeMap::new(),
        });
        assigned
    }

    pub fn remove_vertex_group(&mut self, name: &str) -> bool {
        match self.vertex_group_index(name) {
            Some(index) => {
                self.vertex_groups.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn rename_vertex_group(&mut self, old: &str, new: &str) -> bool {
        if let Some(group) = self.vertex_group_mut(old) {
            group.name = new.to_string();
            true
        } else {
            false
        }
    }

    /// Vertices carrying any weight in the named group.
    pub fn group_selection(&self, name: &str) -> BTreeSet<u32> {
        self.vertex_group(name)
            .map(|group| {
                group
                    .weights
                    .iter()
                    .filter(|&(_, &weight)| weight > 0.0)
                    .map(|(&vertex, _)| vertex)
                    .collect()
            })
            .unwrap_or_default()
    }

    // --- uv layers --------------------------------------------------------

    pub fn uv_layer_index(&self, name: &str) -> Option<usize> {
        self.uv_layers.iter().position(|layer| layer.name == name)
    }

    pub fn remove_uv_layer(&mut self, name: &str) -> bool {
        match self.uv_layer_index(name) {
            Some(index) => {
                self.uv_layers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn rename_uv_layer(&mut self, old: &str, new: &str) -> bool {
        if let Some(index) = self.uv_layer_index(old) {
            self.uv_layers[index].name = new.to_string();
            true
        } else {
            false
        }
    }

    /// Add a key carrying explicit coordinates, enforcing that the row
    /// count matches the current vertex count.
    pub fn add_shape_key_from(
        &mut self,
        name: &str,
        value: f32,
        data: &[[f32; 3]],
    ) -> Result<String> {
        if data.len() != self.positions.len() {
            return Err(SetupError::structure(format!(
                "shape key '{name}' carries {} vertices, mesh has {}",
                data.len(),
                self.positions.len()
            )));
        }
        self.ensure_basis();
        let assigned = dedupe_name(name, |candidate| self.shape_key_index(candidate).is_some());
        self.shape_keys.push(ShapeKey {
            name: assigned.clone(),
            value,
            data: data.to_vec(),
        });
        Ok(assigned)
    }

    /// Append another mesh's geometry and sub-elements onto this one.
    ///
    /// Shape keys and UV layers merge by name; rows missing on either side
    /// are filled from that side's basis (keys) or zeroed (UVs). Vertex
    /// groups merge by name with offset indices. Material slots union.
    pub fn merge_from(&mut self, source: &Mesh) {
        let offset = self.positions.len() as u32;
        let old_len = self.positions.len();
        let source_len = source.positions.len();

        if !source.shape_keys.is_empty() || !self.shape_keys.is_empty() {
            self.ensure_basis();
            let source_basis: &[[f32; 3]] = source
                .shape_keys
                .first()
                .map(|key| key.data.as_slice())
                .unwrap_or(source.positions.as_slice());
            let basis_old = self.shape_keys[0].data.clone();
            for key in &mut self.shape_keys {
                let rows = source
                    .shape_keys
                    .iter()
                    .find(|candidate| candidate.name == key.name)
                    .map(|candidate| candidate.data.as_slice())
                    .unwrap_or(source_basis);
                key.data.extend_from_slice(rows);
            }
            let mut incoming = Vec::new();
            for key in &source.shape_keys {
                if self.shape_key_index(&key.name).is_none() {
                    let mut data = basis_old.clone();
                    data.extend_from_slice(&key.data);
                    incoming.push(ShapeKey {
                        name: key.name.clone(),
                        value: key.value,
                        data,
                    });
                }
            }
            self.shape_keys.extend(incoming);
        }

        self.positions.extend_from_slice(&source.positions);
        self.edges
            .extend(source.edges.iter().map(|&[a, b]| [a + offset, b + offset]));

        for source_group in &source.vertex_groups {
            if self.vertex_group_index(&source_group.name).is_none() {
                self.add_vertex_group(&source_group.name);
            }
            if let Some(group) = self.vertex_group_mut(&source_group.name) {
                for (&vertex, &weight) in &source_group.weights {
                    group.weights.insert(vertex + offset, weight);
                }
            }
        }

        for layer in &mut self.uv_layers {
            let rows: Vec<[f32; 2]> = source
                .uv_layers
                .iter()
                .find(|candidate| candidate.name == layer.name)
                .map(|candidate| candidate.data.clone())
                .unwrap_or_else(|| vec![[0.0, 0.0]; source_len]);
            layer.data.extend_from_slice(&rows);
        }
        let mut incoming_layers = Vec::new();
        for layer in &source.uv_layers {
            if self.uv_layer_index(&layer.name).is_none() {
                let mut data = vec![[0.0, 0.0]; old_len];
                data.extend_from_slice(&layer.data);
                incoming_layers.push(UvLayer {
                    name: layer.name.clone(),
                    data,
                });
            }
        }
        self.uv_layers.extend(incoming_layers);

        for slot in &source.material_slots {
            if !self.material_slots.contains(slot) {
                self.material_slots.push(slot.clone());
            }
        }
    }

    // --- destructive primitives -------------------------------------------

    /// Merge selected vertices lying within `distance` of each other,
    /// keeping the lowest-index vertex of each cluster. Returns the number
    /// of vertices removed.
    pub fn merge_by_distance(&mut self, selection: &BTreeSet<u32>, distance: f32) -> usize {
        let selected: Vec<u32> = selection
            .iter()
            .copied()
            .filter(|&vertex| (vertex as usize) < self.positions.len())
            .collect();
        let mut redirect: BTreeMap<u32, u32> = BTreeMap::new();
        let mut absorbed: BTreeSet<u32> = BTreeSet::new();
        for (rank, &survivor) in selected.iter().enumerate() {
            if absorbed.contains(&survivor) {
                continue;
            }
            for &candidate in &selected[rank + 1..] {
                if absorbed.contains(&candidate) {
                    continue;
                }
                let gap = distance3(
                    self.positions[survivor as usize],
                    self.positions[candidate as usize],
                );
                if gap <= distance {
                    redirect.insert(candidate, survivor);
                    absorbed.insert(candidate);
                }
            }
        }
        let removed = absorbed.len();
        self.remove_vertices(&absorbed, &redirect);
        removed
    }

    /// Delete selected vertices and every edge touching them.
    pub fn delete_vertices(&mut self, selection: &BTreeSet<u32>) {
        self.remove_vertices(selection, &BTreeMap::new());
    }

    /// Dissolve selected vertices, bridging each one's surviving
    /// neighbors with new edges. Approximates an edge-loop delete when the
    /// selection is a loop of valence-two crossings.
    pub fn dissolve_vertices(&mut self, selection: &BTreeSet<u32>) {
        let mut bridges: Vec<[u32; 2]> = Vec::new();
        for &doomed in selection {
            let neighbors: Vec<u32> = self
                .edges
                .iter()
                .filter_map(|&[a, b]| {
                    if a == doomed && !selection.contains(&b) {
                        Some(b)
                    } else if b == doomed && !selection.contains(&a) {
                        Some(a)
                    } else {
                        None
                    }
                })
                .collect();
            for (rank, &first) in neighbors.iter().enumerate() {
                for &second in &neighbors[rank + 1..] {
                    bridges.push([first, second]);
                }
            }
        }
        self.edges.extend(bridges);
        self.remove_vertices(selection, &BTreeMap::new());
    }

    /// Split every edge at its midpoint. Returns the indices of the newly
    /// created vertices.
    pub fn subdivide_once(&mut self) -> Vec<u32> {
        let old_edges = std::mem::take(&mut self.edges);
        let mut new_vertices = Vec::with_capacity(old_edges.len());
        let mut edges = Vec::with_capacity(old_edges.len() * 2);
        for [a, b] in old_edges {
            let mid_index = self.positions.len() as u32;
            let mid = midpoint3(self.positions[a as usize], self.positions[b as usize]);
            self.positions.push(mid);
            for key in &mut self.shape_keys {
                let mid = midpoint3(key.data[a as usize], key.data[b as usize]);
                key.data.push(mid);
            }
            for layer in &mut self.uv_layers {
                let mid = midpoint2(layer.data[a as usize], layer.data[b as usize]);
                layer.data.push(mid);
            }
            for group in &mut self.vertex_groups {
                let weight_a = group.weights.get(&a).copied().unwrap_or(0.0);
                let weight_b = group.weights.get(&b).copied().unwrap_or(0.0);
                let weight = (weight_a + weight_b) / 2.0;
                if weight > 0.0 {
                    group.weights.insert(mid_index, weight);
                }
            }
            edges.push([a, mid_index]);
            edges.push([mid_index, b]);
            new_vertices.push(mid_index);
        }
        self.edges = edges;
        new_vertices
    }

    /// Remove `doomed` vertices, routing weights and edge endpoints through
    /// `redirect` first (merge semantics). An endpoint that resolves to a
    /// removed vertex drops its edge.
    fn remove_vertices(&mut self, doomed: &BTreeSet<u32>, redirect: &BTreeMap<u32, u32>) {
        if doomed.is_empty() {
            return;
        }
        let count = self.positions.len();
        let mut old_to_new: Vec<Option<u32>> = vec![None; count];
        let mut next = 0u32;
        for old in 0..count as u32 {
            if !doomed.contains(&old) {
                old_to_new[old as usize] = Some(next);
                next += 1;
            }
        }

        self.positions = filter_rows(&self.positions, doomed);
        for key in &mut self.shape_keys {
            key.data = filter_rows(&key.data, doomed);
        }
        for layer in &mut self.uv_layers {
            layer.data = filter_rows(&layer.data, doomed);
        }

        for group in &mut self.vertex_groups {
            let mut weights: BTreeMap<u32, f32> = BTreeMap::new();
            for (&vertex, &weight) in &group.weights {
                let routed = redirect.get(&vertex).copied().unwrap_or(vertex);
                let Some(Some(new_index)) = old_to_new.get(routed as usize) else {
                    continue;
                };
                let slot = weights.entry(*new_index).or_insert(0.0);
                *slot = slot.max(weight);
            }
            group.weights = weights;
        }

        let mut seen: BTreeSet<[u32; 2]> = BTreeSet::new();
        let mut edges = Vec::with_capacity(self.edges.len());
        for &[a, b] in &self.edges {
            let routed_a = redirect.get(&a).copied().unwrap_or(a);
            let routed_b = redirect.get(&b).copied().unwrap_or(b);
            let (Some(Some(new_a)), Some(Some(new_b))) = (
                old_to_new.get(routed_a as usize),
                old_to_new.get(routed_b as usize),
            ) else {
                continue;
            };
            if new_a == new_b {
                continue;
            }
            let normalized = if new_a < new_b {
                [*new_a, *new_b]
            } else {
                [*new_b, *new_a]
            };
            if seen.insert(normalized) {
                edges.push(normalized);
            }
        }
        self.edges = edges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Mesh {
        Mesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            edges: vec![[0, 1], [1, 2], [2, 3], [3, 0]],
            ..Mesh::default()
        }
    }

    #[test]
    fn subdivide_doubles_edges_and_reports_new_vertices() {
        let mut mesh = square();
        let created = mesh.subdivide_once();
        assert_eq!(created, vec![4, 5, 6, 7]);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.edges.len(), 8);
        assert_eq!(mesh.positions[4], [0.5, 0.0, 0.0]);
    }

    #[test]
    fn subdivide_extends_keys_groups_and_uvs() {
        let mut mesh = square();
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("smile", 0.5);
        mesh.uv_layers.push(UvLayer {
            name: "UVMap".to_string(),
            data: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        });
        mesh.add_vertex_group("seam");
        mesh.vertex_group_mut("seam")
            .unwrap()
            .weights
            .extend([(0, 1.0), (1, 1.0)]);
        mesh.subdivide_once();
        assert_eq!(mesh.shape_keys[0].data.len(), 8);
        assert_eq!(mesh.uv_layers[0].data.len(), 8);
        // midpoint of the weighted edge picks up the averaged weight
        let seam = mesh.vertex_group("seam").unwrap();
        assert_eq!(seam.weights.get(&4), Some(&1.0));
    }

    #[test]
    fn group_selection_skips_zero_weights() {
        let mut mesh = square();
        mesh.add_vertex_group("seam");
        mesh.vertex_group_mut("seam")
            .unwrap()
            .weights
            .extend([(0, 0.0), (1, 0.5), (3, 1.0)]);
        let selection = mesh.group_selection("seam");
        let expected: BTreeSet<u32> = [1, 3].into_iter().collect();
        assert_eq!(selection, expected);
        assert!(mesh.group_selection("ghost").is_empty());
    }

    #[test]
    fn merge_by_distance_collapses_coincident_vertices() {
        let mut mesh = square();
        mesh.positions.push([0.0, 0.0, 0.0]);
        mesh.edges.push([2, 4]);
        let all: BTreeSet<u32> = (0..5).collect();
        let removed = mesh.merge_by_distance(&all, 1e-4);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 4);
        // the dangling edge now lands on the survivor at index 0
        assert!(mesh.edges.contains(&[0, 2]));
    }

    #[test]
    fn dissolve_bridges_across_removed_vertex() {
        let mut mesh = Mesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            edges: vec![[0, 1], [1, 2]],
            ..Mesh::default()
        };
        let selection: BTreeSet<u32> = [1].into_iter().collect();
        mesh.dissolve_vertices(&selection);
        assert_eq!(mesh.vertex_count(), 2);
        assert_eq!(mesh.edges, vec![[0, 1]]);
    }

    #[test]
    fn delete_drops_incident_edges() {
        let mut mesh = square();
        let selection: BTreeSet<u32> = [0].into_iter().collect();
        mesh.delete_vertices(&selection);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.edges, vec![[0, 1], [1, 2]]);
    }

    #[test]
    fn bake_onto_basis_moves_positions_scaled_by_value() {
        let mut mesh = square();
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("brow_up", 0.0);
        mesh.shape_keys[1].value = 0.5;
        mesh.shape_keys[1].data[0] = [0.0, 0.0, 2.0];
        mesh.bake_shape_key("brow_up", "Basis").unwrap();
        assert!(mesh.shape_key("brow_up").is_none());
        assert_eq!(mesh.positions[0], [0.0, 0.0, 1.0]);
        assert_eq!(mesh.shape_keys[0].data[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn merge_unions_keys_groups_and_slots() {
        let mut dest = square();
        dest.ensure_basis();
        dest.add_shape_key_from_positions("smile", 1.0);
        dest.material_slots.push("skin".to_string());
        let mut source = Mesh {
            positions: vec![[5.0, 0.0, 0.0], [6.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            ..Mesh::default()
        };
        source.ensure_basis();
        source.add_shape_key_from_positions("frown", 0.3);
        source.add_vertex_group("seam");
        source
            .vertex_group_mut("seam")
            .unwrap()
            .weights
            .insert(1, 0.7);
        source.material_slots.push("cloth".to_string());

        dest.merge_from(&source);
        assert_eq!(dest.vertex_count(), 6);
        assert_eq!(dest.edges.last(), Some(&[4, 5]));
        // every key spans the merged vertex list
        for key in &dest.shape_keys {
            assert_eq!(key.data.len(), 6);
        }
        assert!(dest.shape_key("smile").is_some());
        assert!(dest.shape_key("frown").is_some());
        // offset group index survives
        assert_eq!(
            dest.vertex_group("seam").unwrap().weights.get(&5),
            Some(&0.7)
        );
        assert_eq!(dest.material_slots, vec!["skin", "cloth"]);
    }

    #[test]
    fn add_shape_key_from_rejects_row_count_mismatch() {
        let mut mesh = square();
        let result = mesh.add_shape_key_from("bad", 1.0, &[[0.0; 3]; 2]);
        assert!(result.is_err());
    }

    #[test]
    fn bake_onto_missing_destination_is_an_error() {
        let mut mesh = square();
        mesh.ensure_basis();
        mesh.add_shape_key_from_positions("brow_up", 1.0);
        let result = mesh.bake_shape_key("brow_up", "ghost");
        assert!(result.is_err());
        assert!(mesh.shape_key("brow_up").is_some());
    }
}
