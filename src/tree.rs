//! Host-side description of the directory tree to encode.
//!
//! The description is accepted in its loose form ([`NodeDesc`]), as written by
//! hand in JSON or YAML, and validated into the typed [`File`] tree that the
//! encoder consumes.

use std::{collections::HashSet, fs, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NodeDesc {
    #[serde(rename = "type")]
    pub ty: String,

    #[serde(default)]
    pub opened: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_id: Option<String>,

    #[serde(default)]
    pub entries: Vec<EntryDesc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EntryDesc {
    pub name: String,
    pub file: NodeDesc,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum File {
    RegularFile(RegularFile),
    Directory(Directory),
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct RegularFile {}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Directory {
    /// Name of the fd opened on this directory, if any.
    pub opened:  Option<String>,
    pub entries: Vec<DirEntry>,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct DirEntry {
    pub name: String,
    pub file: File,
}

impl File {
    /// Root directory opened as `root` holding a regular file `f` and an empty
    /// directory `d` opened as `root/d`.
    pub fn example() -> Self {
        File::Directory(Directory {
            opened:  Some("root".to_owned()),
            entries: vec![
                DirEntry {
                    name: "f".to_owned(),
                    file: File::RegularFile(RegularFile {}),
                },
                DirEntry {
                    name: "d".to_owned(),
                    file: File::Directory(Directory {
                        opened:  Some("root/d".to_owned()),
                        entries: vec![],
                    }),
                },
            ],
        })
    }

    pub fn load(path: &Path) -> Result<Self, TreeError> {
        let reader = BufReader::new(fs::File::open(path)?);
        let desc: NodeDesc = match path.extension().and_then(|ext| ext.to_str()) {
            | Some("json") => serde_json::from_reader(reader)?,
            | Some("yml") | Some("yaml") => serde_yml::from_reader(reader)?,
            | _ => return Err(TreeError::UnknownFormat(path.display().to_string())),
        };

        File::try_from(&desc)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, File::Directory(_))
    }

    /// Number of fds opened anywhere in the tree.
    pub fn opened_count(&self) -> usize {
        match self {
            | File::RegularFile(_) => 0,
            | File::Directory(dir) => {
                dir.opened.iter().count()
                    + dir
                        .entries
                        .iter()
                        .map(|entry| entry.file.opened_count())
                        .sum::<usize>()
            },
        }
    }
}

impl TryFrom<&NodeDesc> for File {
    type Error = TreeError;

    fn try_from(desc: &NodeDesc) -> Result<Self, Self::Error> {
        let mut opened_ids = HashSet::new();

        validate(desc, "", &mut opened_ids)
    }
}

fn validate(
    desc: &NodeDesc,
    path: &str,
    opened_ids: &mut HashSet<String>,
) -> Result<File, TreeError> {
    match desc.ty.as_str() {
        | "regular-file" if desc.opened => Err(TreeError::OpenedRegularFile {
            path: display_path(path),
        }),
        | "regular-file" => Ok(File::RegularFile(RegularFile {})),
        | "directory" => {
            let opened = if desc.opened {
                let id = desc
                    .opened_id
                    .clone()
                    .ok_or_else(|| TreeError::MissingOpenedId {
                        path: display_path(path),
                    })?;

                if !opened_ids.insert(id.clone()) {
                    return Err(TreeError::DuplicateOpenedId(id));
                }

                Some(id)
            } else {
                None
            };
            let mut names = HashSet::new();
            let mut entries = Vec::with_capacity(desc.entries.len());

            for entry in &desc.entries {
                if entry.name.is_empty() || entry.name.contains(['/', '\0']) {
                    return Err(TreeError::InvalidEntryName {
                        path: display_path(path),
                        name: entry.name.clone(),
                    });
                }

                if !names.insert(entry.name.as_str()) {
                    return Err(TreeError::DuplicateEntry {
                        path: display_path(path),
                        name: entry.name.clone(),
                    });
                }

                let child_path = format!("{path}/{}", entry.name);

                entries.push(DirEntry {
                    name: entry.name.clone(),
                    file: validate(&entry.file, &child_path, opened_ids)?,
                });
            }

            Ok(File::Directory(Directory { opened, entries }))
        },
        | other => Err(TreeError::UnknownFileType(other.to_owned())),
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_owned()
    } else {
        path.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn parse(json: &str) -> Result<File, TreeError> {
        let desc: NodeDesc = serde_json::from_str(json).unwrap();

        File::try_from(&desc)
    }

    #[test]
    fn example_matches_description() {
        let file = parse(
            r#"{
                "type": "directory",
                "opened": true,
                "opened_id": "root",
                "entries": [
                    { "name": "f", "file": { "type": "regular-file" } },
                    {
                        "name": "d",
                        "file": {
                            "type": "directory",
                            "opened": true,
                            "opened_id": "root/d",
                            "entries": []
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(file, File::example());
        assert_eq!(file.opened_count(), 2);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse(
            r#"{
                "type": "directory",
                "entries": [{ "name": "s", "file": { "type": "symlink" } }]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, TreeError::UnknownFileType(ty) if ty == "symlink"));
    }

    #[test]
    fn opened_without_id() {
        let err = parse(r#"{ "type": "directory", "opened": true }"#).unwrap_err();

        assert!(matches!(err, TreeError::MissingOpenedId { path } if path == "/"));
    }

    #[test]
    fn duplicate_opened_id() {
        let err = parse(
            r#"{
                "type": "directory",
                "opened": true,
                "opened_id": "fd",
                "entries": [{
                    "name": "d",
                    "file": { "type": "directory", "opened": true, "opened_id": "fd" }
                }]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, TreeError::DuplicateOpenedId(id) if id == "fd"));
    }

    #[test]
    fn duplicate_entry() {
        let err = parse(
            r#"{
                "type": "directory",
                "entries": [
                    { "name": "a", "file": { "type": "regular-file" } },
                    { "name": "a", "file": { "type": "directory" } }
                ]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, TreeError::DuplicateEntry { name, .. } if name == "a"));
    }

    #[test]
    fn entry_name_with_separator() {
        let err = parse(
            r#"{
                "type": "directory",
                "entries": [{ "name": "a/b", "file": { "type": "regular-file" } }]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, TreeError::InvalidEntryName { .. }));
    }

    #[test]
    fn opened_regular_file() {
        let err = parse(
            r#"{
                "type": "directory",
                "entries": [{
                    "name": "f",
                    "file": { "type": "regular-file", "opened": true, "opened_id": "f" }
                }]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, TreeError::OpenedRegularFile { path } if path == "/f"));
    }

    #[test]
    fn unknown_extension() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();

        write!(file, r#"{{ "type": "directory" }}"#).unwrap();

        assert!(matches!(
            File::load(file.path()),
            Err(TreeError::UnknownFormat(_))
        ));
    }

    #[test]
    fn load_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();

        write!(
            file,
            "type: directory\nopened: true\nopened_id: root\nentries:\n  - name: f\n    file:\n      type: regular-file\n"
        )
        .unwrap();

        let tree = File::load(file.path()).unwrap();

        assert_eq!(tree.opened_count(), 1);
        assert!(tree.is_directory());
    }
}
