//! Parsed translation profiles.
//!
//! Profiles arrive as CSV files (parsed by `relmesh-profile`) and are
//! consumed by the translate pass. Only the parsed shape lives here.

use serde::{Deserialize, Serialize};

/// Bone-group translation: additive weight merges followed by
/// substring renames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneGroupProfile {
    /// `(source group, destination group)` pairs. The source group's
    /// weights are added onto the destination, then the source is removed.
    pub merges: Vec<(String, String)>,
    /// `(find, replace)` substring pairs applied to every group name.
    pub renames: Vec<(String, String)>,
}

/// One shape-key translation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeKeyRow {
    /// Key name to match; a trailing `.` makes it a prefix match.
    pub original: String,
    /// Replacement name, or `None` to delete the matched keys.
    pub replacement: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeKeyProfile {
    pub rows: Vec<ShapeKeyRow>,
}

/// A parsed profile file of either type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profile {
    BoneGroup(BoneGroupProfile),
    ShapeKey(ShapeKeyProfile),
}
