//! Structured-name grammar for collections, objects, and generated markers.
//!
//! Every role the pipeline understands is derived purely from name
//! pattern matching: `src_`/`subsrc_` prefixes for setup collections, the
//! `_Release` suffix for release containers, and `rmk_`-prefixed tokens
//! for everything the pipeline generates itself. The merge-vertex tags
//! written onto vertex-group names during setup are also encoded and
//! re-parsed here, so this module is the single source of truth for the
//! string grammar.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SetupError};

/// Primary token delimiter inside structured names.
pub const UNDER: char = '_';
/// Secondary delimiter separating a character name from its variants.
pub const DOT: char = '.';

/// Header prefix (`rmk_`) marking every name the pipeline generates:
/// internal objects, scratch collections, and provenance vertex groups.
pub const HEADER_PREFIX: &str = "rmk_";

/// User-authored collection prefixes.
pub const COLLECTION_SOURCE_PREFIX: &str = "src_";
pub const COLLECTION_SUBSOURCE_PREFIX: &str = "subsrc_";

/// Auto-generated release suffixes. Release collections and release
/// objects share the `_Release` postfix; sub-release objects feed their
/// parent's merge instead of the release collection.
pub const RELEASE_POSTFIX: &str = "_Release";
pub const SUBRELEASE_POSTFIX: &str = "_SubRelease";

/// Transient names owned by a single setup run.
pub const SCRATCH_COLLECTION: &str = "rmk_temporary";
pub const SCRATCH_STRATEGY_COLLECTION: &str = "rmk_temporary_strategy";
pub const SCRATCH_RELEASE_OBJECT: &str = "rmk_tmprelease";

/// Leading marker excluding an object from setup.
pub const DISABLED_MARKER: &str = "#";

/// Canonical UV slot name the surviving layer is renamed to.
pub const CANONICAL_UV_LAYER: &str = "UVMap";

/// Merge-vertex provenance prefixes written onto vertex-group names.
pub const MERGE_SOURCE_PREFIX: &str = "rmk_mergevsrc_";
pub const MERGE_DEST_PREFIX: &str = "rmk_mergevdst_";

/// CSV profile tokens.
pub const PROFILE_HEADER: &str = "RMK_PROFILE";
pub const PROFILE_BONEGROUP: &str = "BONEGROUP";
pub const PROFILE_SHAPEKEY: &str = "SHAPEKEY";
pub const PROFILE_PROCESS: &str = "PROCESS";
pub const PROFILE_MERGE: &str = "MERGE";
pub const PROFILE_RENAME: &str = "RENAME";

/// Translation target postfixes.
pub const MODE_SUBSTANCE_PAINTER: &str = "_SP";
pub const MODE_MIKUMIKUDANCE: &str = "_MMD";
pub const MODE_GAME_ENGINE: &str = "_GE";

/// Role of a collection, derived from its name alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionRole {
    /// `src_<character>`: root container of raw meshes.
    Source { character: String },
    /// `subsrc_<character>`: nested container whose release feeds the parent.
    SubSource { character: String },
    /// `<character>_Release`: auto-created holder of release objects.
    Release { character: String },
    /// Anything else; invisible to the pipeline.
    Normal,
}

impl CollectionRole {
    /// Character name carried by the role, if any.
    pub fn character(&self) -> Option<&str> {
        match self {
            CollectionRole::Source { character }
            | CollectionRole::SubSource { character }
            | CollectionRole::Release { character } => Some(character),
            CollectionRole::Normal => None,
        }
    }

    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            CollectionRole::Source { .. } | CollectionRole::SubSource { .. }
        )
    }

    /// Release-object postfix expected for this role.
    pub fn release_postfix(&self) -> Option<&'static str> {
        match self {
            CollectionRole::Source { .. } => Some(RELEASE_POSTFIX),
            CollectionRole::SubSource { .. } => Some(SUBRELEASE_POSTFIX),
            _ => None,
        }
    }
}

/// Classify a collection name into its role.
///
/// Names carrying none of the role markers classify as `Normal` and never
/// error. A role prefix followed by a malformed argument list (wrong
/// segment count, empty segment) is a syntax error.
pub fn classify_collection(name: &str) -> Result<CollectionRole> {
    if let Some(rest) = name.strip_prefix(COLLECTION_SOURCE_PREFIX) {
        let character = single_argument(COLLECTION_SOURCE_PREFIX, name, rest)?;
        return Ok(CollectionRole::Source { character });
    }
    if let Some(rest) = name.strip_prefix(COLLECTION_SUBSOURCE_PREFIX) {
        let character = single_argument(COLLECTION_SUBSOURCE_PREFIX, name, rest)?;
        return Ok(CollectionRole::SubSource { character });
    }
    if name.ends_with(RELEASE_POSTFIX) {
        let character = name
            .split(UNDER)
            .next()
            .unwrap_or_default()
            .to_string();
        return Ok(CollectionRole::Release { character });
    }
    Ok(CollectionRole::Normal)
}

/// Validate and extract the single character-name argument after a prefix.
fn single_argument(prefix: &str, full: &str, rest: &str) -> Result<String> {
    let segments: Vec<&str> = rest.split(UNDER).collect();
    if segments.len() != 1 {
        return Err(SetupError::syntax(format!(
            "prefix '{prefix}' expects exactly one argument, got {} in '{full}'",
            segments.len()
        )));
    }
    if segments[0].is_empty() {
        return Err(SetupError::syntax(format!(
            "empty argument after prefix '{prefix}' in '{full}'"
        )));
    }
    Ok(segments[0].to_string())
}

/// First DOT-separated segment of a character name.
///
/// `Hero.Winter` and `Hero` both root at `Hero`; the release collection
/// for the whole tree is named after this root.
pub fn root_name(character: &str) -> &str {
    character.split(DOT).next().unwrap_or(character)
}

/// Expected release-object name for a character and role postfix.
pub fn release_object_name(character: &str, postfix: &str) -> String {
    format!("{character}{postfix}")
}

/// Release-collection name for a character's tree root.
pub fn release_collection_name(character: &str) -> String {
    format!("{}{RELEASE_POSTFIX}", root_name(character))
}

/// True when an object name marks an object the pipeline must skip:
/// disabled by the user, internal, or an already-released output.
pub fn is_reserved_object_name(name: &str) -> bool {
    name.starts_with(DISABLED_MARKER)
        || name.starts_with(HEADER_PREFIX)
        || name.ends_with(RELEASE_POSTFIX)
        || name.ends_with(SUBRELEASE_POSTFIX)
}

/// True for generated sub-element names the release cleanup strips:
/// `rmk_`-prefixed, or disabled-and-internal (`#rmk_`).
pub fn is_internal_subelement(name: &str) -> bool {
    name.starts_with(HEADER_PREFIX)
        || name
            .strip_prefix(DISABLED_MARKER)
            .is_some_and(|rest| rest.starts_with(HEADER_PREFIX))
}

/// Parsed source-side merge tag (`rmk_mergevsrc_<obj>_<group>_<dist>`).
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSourceTag {
    pub object: String,
    pub source: String,
    pub distance: f32,
}

/// Encode the source side of a merge-vertex pair onto a group name.
pub fn encode_merge_source(object: &str, source: &str, distance: f32) -> String {
    format!("{MERGE_SOURCE_PREFIX}{object}{UNDER}{source}{UNDER}{distance}")
}

/// Encode the destination side of a merge-vertex pair onto a group name.
pub fn encode_merge_dest(object: &str, group: &str) -> String {
    format!("{MERGE_DEST_PREFIX}{object}{UNDER}{group}")
}

/// Destination-name prefix matching the given source tag.
pub fn merge_dest_prefix(source_object: &str, source_name: &str) -> String {
    format!("{MERGE_DEST_PREFIX}{source_object}{UNDER}{source_name}")
}

/// Re-parse a source-side merge tag from a vertex-group name.
///
/// Returns `Ok(None)` for names that do not carry the prefix; a name that
/// carries the prefix but decodes badly is a syntax error naming the group.
pub fn parse_merge_source(name: &str) -> Result<Option<MergeSourceTag>> {
    if !name.starts_with(MERGE_SOURCE_PREFIX) {
        return Ok(None);
    }
    let segments: Vec<&str> = name.split(UNDER).collect();
    if segments.len() != 5 {
        return Err(SetupError::syntax(format!(
            "invalid merge-source tag '{name}': expected 5 segments, got {}",
            segments.len()
        )));
    }
    let object = segments[2];
    let source = segments[3];
    if object.is_empty() {
        return Err(SetupError::syntax(format!(
            "invalid merge-source tag '{name}': empty object name"
        )));
    }
    if source.is_empty() {
        return Err(SetupError::syntax(format!(
            "invalid merge-source tag '{name}': empty source name"
        )));
    }
    let distance: f32 = segments[4].parse().map_err(|_| {
        SetupError::syntax(format!(
            "invalid merge-source tag '{name}': '{}' is not a number",
            segments[4]
        ))
    })?;
    Ok(Some(MergeSourceTag {
        object: object.to_string(),
        source: source.to_string(),
        distance,
    }))
}

/// Host-style name deduplication: `Name`, `Name.001`, `Name.002`, …
pub fn dedupe_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{base}{DOT}{counter:03}");
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_roles() {
        assert_eq!(
            classify_collection("src_Hero").unwrap(),
            CollectionRole::Source {
                character: "Hero".to_string()
            }
        );
        assert_eq!(
            classify_collection("subsrc_Hero.Hat").unwrap(),
            CollectionRole::SubSource {
                character: "Hero.Hat".to_string()
            }
        );
        assert_eq!(
            classify_collection("Hero_Release").unwrap(),
            CollectionRole::Release {
                character: "Hero".to_string()
            }
        );
        assert_eq!(
            classify_collection("Props").unwrap(),
            CollectionRole::Normal
        );
    }

    #[test]
    fn classify_rejects_malformed_arguments() {
        assert!(classify_collection("src_Hero_x").is_err());
        assert!(classify_collection("src_").is_err());
        assert!(classify_collection("subsrc_a_b").is_err());
    }

    #[test]
    fn merge_source_tag_roundtrip() {
        let encoded = encode_merge_source("hero", "seam", 0.001);
        let tag = parse_merge_source(&encoded).unwrap().unwrap();
        assert_eq!(tag.object, "hero");
        assert_eq!(tag.source, "seam");
        assert!((tag.distance - 0.001).abs() < f32::EPSILON);
    }

    #[test]
    fn merge_source_tag_errors() {
        assert!(parse_merge_source("plain_group").unwrap().is_none());
        assert!(parse_merge_source("rmk_mergevsrc_hero_seam").is_err());
        assert!(parse_merge_source("rmk_mergevsrc_hero_seam_abc").is_err());
        assert!(parse_merge_source("rmk_mergevsrc__seam_0.1").is_err());
    }

    #[test]
    fn release_names() {
        assert_eq!(release_object_name("Hero", RELEASE_POSTFIX), "Hero_Release");
        assert_eq!(release_collection_name("Hero.Hat"), "Hero_Release");
        assert_eq!(root_name("Hero.Hat.Red"), "Hero");
    }

    #[test]
    fn reserved_object_names() {
        assert!(is_reserved_object_name("#hero"));
        assert!(is_reserved_object_name("rmk_tmprelease"));
        assert!(is_reserved_object_name("Hero_Release"));
        assert!(is_reserved_object_name("Hero.Hat_SubRelease"));
        assert!(!is_reserved_object_name("hero"));
    }

    #[test]
    fn dedupe_appends_numeric_suffix() {
        let taken = |name: &str| name == "Custom" || name == "Custom.001";
        assert_eq!(dedupe_name("Custom", taken), "Custom.002");
        assert_eq!(dedupe_name("Fresh", taken), "Fresh");
    }
}
