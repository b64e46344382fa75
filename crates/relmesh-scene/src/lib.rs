//! In-memory scene document standing in for the modeling host.
//!
//! The setup pipeline in `relmesh-core` only ever touches the scene
//! through the operations exposed here: collection/object bookkeeping,
//! destructive joins, modifier application, merge-by-distance, edge-loop
//! dissolve, vertex deletion, and shape-key baking. Everything is plain
//! serializable data, so scenes round-trip through JSON files.

pub mod id;
pub mod mesh;
pub mod modifier;
pub mod object;
pub mod scene;

pub use id::{CollectionId, ObjectId};
pub use mesh::{Mesh, ShapeKey, UvLayer, VertexGroup};
pub use modifier::{Modifier, ModifierKind, apply_modifier};
pub use object::{Object, ObjectData};
pub use scene::{Collection, Scene};
