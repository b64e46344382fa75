//! CSV translation-profile loader.
//!
//! A profile file opens with a header row `[RMK_PROFILE, <type>]` where
//! the type is `BONEGROUP` or `SHAPEKEY`. Bone-group profiles carry two
//! mandatory `[PROCESS, MERGE]` / `[PROCESS, RENAME]` marker rows (in
//! either order) dividing the data rows into a merge block and a rename
//! block. Shape-key profiles list `[originalKey, newKeyOrEmpty]` rows,
//! where an empty replacement deletes the key. Anything else is a
//! profile error with a reason.

use std::path::Path;

use tracing::debug;

use relmesh_model::error::{Result, SetupError};
use relmesh_model::names::{
    PROFILE_BONEGROUP, PROFILE_HEADER, PROFILE_MERGE, PROFILE_PROCESS, PROFILE_RENAME,
    PROFILE_SHAPEKEY,
};
use relmesh_model::{BoneGroupProfile, Profile, ShapeKeyProfile, ShapeKeyRow};

/// Load and parse one profile file.
pub fn load_profile(path: &Path) -> Result<Profile> {
    let is_csv = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(SetupError::profile(format!(
            "{} does not have a .csv extension",
            path.display()
        )));
    }
    let rows = read_rows(path)?;
    let profile = parse_profile(&rows)?;
    debug!(path = %path.display(), "profile loaded");
    Ok(profile)
}

/// Parse already-read rows. Split out so tests can feed rows directly.
pub fn parse_profile(rows: &[Vec<String>]) -> Result<Profile> {
    let Some((header, body)) = rows.split_first() else {
        return Err(SetupError::profile("profile file is empty".to_string()));
    };
    if header.first().map(String::as_str) != Some(PROFILE_HEADER) {
        return Err(SetupError::profile(format!(
            "first row must start with {PROFILE_HEADER}"
        )));
    }
    match header.get(1).map(String::as_str) {
        Some(PROFILE_BONEGROUP) => parse_bonegroup(body).map(Profile::BoneGroup),
        Some(PROFILE_SHAPEKEY) => parse_shapekey(body).map(Profile::ShapeKey),
        other => Err(SetupError::profile(format!(
            "unknown profile type {:?}, expected {PROFILE_BONEGROUP} or {PROFILE_SHAPEKEY}",
            other.unwrap_or("")
        ))),
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|error| {
            SetupError::profile(format!("cannot read {}: {error}", path.display()))
        })?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| {
            SetupError::profile(format!("malformed csv in {}: {error}", path.display()))
        })?;
        let cells: Vec<String> = record
            .iter()
            .map(|cell| cell.trim_matches('\u{feff}').trim().to_string())
            .collect();
        // skip fully blank lines
        if cells.iter().all(String::is_empty) {
            continue;
        }
        rows.push(cells);
    }
    Ok(rows)
}

/// A data row: exactly one or two cells, the first never empty.
fn data_pair(row: &[String], line: usize) -> Result<(String, Option<String>)> {
    let filled = row.iter().filter(|cell| !cell.is_empty()).count();
    if row.first().is_none_or(String::is_empty) {
        return Err(SetupError::profile(format!(
            "row {line}: first column must not be empty"
        )));
    }
    if row.len() > 2 && row[2..].iter().any(|cell| !cell.is_empty()) || filled > 2 {
        return Err(SetupError::profile(format!(
            "row {line}: expected 1 or 2 columns, found {filled}"
        )));
    }
    let second = row.get(1).filter(|cell| !cell.is_empty()).cloned();
    Ok((row[0].clone(), second))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoneGroupBlock {
    None,
    Merge,
    Rename,
}

fn parse_bonegroup(body: &[Vec<String>]) -> Result<BoneGroupProfile> {
    let mut profile = BoneGroupProfile::default();
    let mut block = BoneGroupBlock::None;
    let mut seen_merge = false;
    let mut seen_rename = false;
    for (offset, row) in body.iter().enumerate() {
        // header row is line 1, the body starts at line 2
        let line = offset + 2;
        if row.first().map(String::as_str) == Some(PROFILE_PROCESS) {
            match row.get(1).map(String::as_str) {
                Some(PROFILE_MERGE) if !seen_merge => {
                    seen_merge = true;
                    block = BoneGroupBlock::Merge;
                }
                Some(PROFILE_RENAME) if !seen_rename => {
                    seen_rename = true;
                    block = BoneGroupBlock::Rename;
                }
                Some(PROFILE_MERGE | PROFILE_RENAME) => {
                    return Err(SetupError::profile(format!(
                        "row {line}: duplicate {PROFILE_PROCESS} marker"
                    )));
                }
                other => {
                    return Err(SetupError::profile(format!(
                        "row {line}: unknown {PROFILE_PROCESS} marker {:?}",
                        other.unwrap_or("")
                    )));
                }
            }
            continue;
        }
        let (first, second) = data_pair(row, line)?;
        let Some(second) = second else {
            return Err(SetupError::profile(format!(
                "row {line}: bone-group rows need two columns"
            )));
        };
        match block {
            BoneGroupBlock::None => {
                return Err(SetupError::profile(format!(
                    "row {line}: data before any {PROFILE_PROCESS} marker"
                )));
            }
            BoneGroupBlock::Merge => profile.merges.push((first, second)),
            BoneGroupBlock::Rename => profile.renames.push((first, second)),
        }
    }
    if !seen_merge || !seen_rename {
        return Err(SetupError::profile(format!(
            "bone-group profiles need both [{PROFILE_PROCESS}, {PROFILE_MERGE}] and \
             [{PROFILE_PROCESS}, {PROFILE_RENAME}] marker rows"
        )));
    }
    Ok(profile)
}

fn parse_shapekey(body: &[Vec<String>]) -> Result<ShapeKeyProfile> {
    let mut profile = ShapeKeyProfile::default();
    for (offset, row) in body.iter().enumerate() {
        let line = offset + 2;
        // a repeated header row may precede the data
        if row.first().map(String::as_str) == Some(PROFILE_HEADER) {
            if row.get(1).map(String::as_str) == Some(PROFILE_SHAPEKEY) {
                continue;
            }
            return Err(SetupError::profile(format!(
                "row {line}: repeated header must be [{PROFILE_HEADER}, {PROFILE_SHAPEKEY}]"
            )));
        }
        let (original, replacement) = data_pair(row, line)?;
        profile.rows.push(ShapeKeyRow {
            original,
            replacement,
        });
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_profile(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn bonegroup_profile_splits_merge_and_rename_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(
            &dir,
            "bones.csv",
            "RMK_PROFILE,BONEGROUP\n\
             PROCESS,MERGE\n\
             thigh.L.001,thigh.L\n\
             PROCESS,RENAME\n\
             thigh,leg\n",
        );
        let profile = load_profile(&path).unwrap();
        let Profile::BoneGroup(profile) = profile else {
            panic!("expected a bone-group profile");
        };
        assert_eq!(
            profile.merges,
            vec![("thigh.L.001".to_string(), "thigh.L".to_string())]
        );
        assert_eq!(profile.renames, vec![("thigh".to_string(), "leg".to_string())]);
    }

    #[test]
    fn bonegroup_markers_work_in_either_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(
            &dir,
            "bones.csv",
            "RMK_PROFILE,BONEGROUP\n\
             PROCESS,RENAME\n\
             thigh,leg\n\
             PROCESS,MERGE\n\
             thigh.L.001,thigh.L\n",
        );
        let profile = load_profile(&path).unwrap();
        let Profile::BoneGroup(profile) = profile else {
            panic!("expected a bone-group profile");
        };
        assert_eq!(profile.merges.len(), 1);
        assert_eq!(profile.renames.len(), 1);
    }

    #[test]
    fn bonegroup_without_both_markers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(
            &dir,
            "bones.csv",
            "RMK_PROFILE,BONEGROUP\nPROCESS,MERGE\na,b\n",
        );
        let error = load_profile(&path).unwrap_err();
        assert!(matches!(error, SetupError::Profile(_)));
    }

    #[test]
    fn bonegroup_data_before_any_marker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(&dir, "bones.csv", "RMK_PROFILE,BONEGROUP\na,b\n");
        assert!(load_profile(&path).is_err());
    }

    #[test]
    fn shapekey_profile_reads_renames_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(
            &dir,
            "keys.csv",
            "RMK_PROFILE,SHAPEKEY\n\
             RMK_PROFILE,SHAPEKEY\n\
             mouth.,Mouth.\n\
             wink,\n",
        );
        let profile = load_profile(&path).unwrap();
        let Profile::ShapeKey(profile) = profile else {
            panic!("expected a shape-key profile");
        };
        assert_eq!(
            profile.rows,
            vec![
                ShapeKeyRow {
                    original: "mouth.".to_string(),
                    replacement: Some("Mouth.".to_string()),
                },
                ShapeKeyRow {
                    original: "wink".to_string(),
                    replacement: None,
                },
            ]
        );
    }

    #[test]
    fn wrong_extension_fails_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(&dir, "keys.txt", "RMK_PROFILE,SHAPEKEY\n");
        let error = load_profile(&path).unwrap_err();
        assert!(error.to_string().contains(".csv"));
    }

    #[test]
    fn unknown_profile_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_profile(&dir, "odd.csv", "RMK_PROFILE,MATERIAL\na,b\n");
        assert!(load_profile(&path).is_err());
    }

    #[test]
    fn empty_first_column_is_rejected() {
        let rows = vec![
            vec!["RMK_PROFILE".to_string(), "SHAPEKEY".to_string()],
            vec![String::new(), "Mouth".to_string()],
        ];
        assert!(parse_profile(&rows).is_err());
    }

    #[test]
    fn three_filled_columns_are_rejected() {
        let rows = vec![
            vec!["RMK_PROFILE".to_string(), "SHAPEKEY".to_string()],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        ];
        assert!(parse_profile(&rows).is_err());
    }
}
