use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dropfs_types::fs::{Entry, FileEntry};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::util::PathWalkExt;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct File {
	pub name: String,
	pub size: u64,
	pub modified: DateTime<Utc>,
}

impl File {
	fn from_entry(name: &str, entry: &FileEntry) -> Self {
		File {
			name: name.to_string(),
			size: entry.size,
			modified: entry.server_modified,
		}
	}
}

/// A node of the in-memory mirror of the remote namespace. Map keys carry the
/// server's current casing; lookups during batch application fall back to a
/// case-insensitive scan because the remote collides names
/// case-insensitively.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Folder {
	pub name: String,
	pub folders: HashMap<String, Folder>,
	pub files: HashMap<String, File>,
}

impl Folder {
	pub fn new(name: impl Into<String>) -> Self {
		Folder {
			name: name.into(),
			folders: HashMap::new(),
			files: HashMap::new(),
		}
	}

	/// Applies one change-log entry, creating missing intermediate folders
	/// along the entry's path.
	pub fn apply_entry(&mut self, entry: &Entry) {
		let mut folder = self;
		for (segment, rest) in entry.path_display().path_walk() {
			if rest.is_empty() {
				folder.apply_leaf(segment, entry);
			} else {
				folder = folder.child_folder_mut(segment);
			}
		}
	}

	pub fn apply_batch(&mut self, entries: &[Entry]) {
		for entry in entries {
			self.apply_entry(entry);
		}
	}

	fn apply_leaf(&mut self, name: &str, entry: &Entry) {
		match entry {
			Entry::File(meta) => {
				if !self.files.contains_key(name) {
					remove_case_insensitive(&mut self.files, name);
				}
				self.files
					.insert(name.to_string(), File::from_entry(name, meta));
			}
			Entry::Folder(_) => {
				// An existing folder under any casing keeps its children; the
				// entry only updates the display name.
				let folder = match remove_case_insensitive(&mut self.folders, name) {
					Some(mut folder) => {
						folder.name = name.to_string();
						folder
					}
					None => Folder::new(name),
				};
				self.folders.insert(name.to_string(), folder);
			}
			Entry::Deleted(_) => {
				remove_case_insensitive(&mut self.files, name);
				remove_case_insensitive(&mut self.folders, name);
			}
		}
	}

	/// Descends into `name`, matching existing folders case-insensitively and
	/// creating the folder with the incoming casing when it is missing. A
	/// case-insensitive match is re-keyed so the tree tracks the server's
	/// current casing.
	fn child_folder_mut(&mut self, name: &str) -> &mut Folder {
		let folder = remove_case_insensitive(&mut self.folders, name).map(|mut folder| {
			folder.name = name.to_string();
			folder
		});
		self.folders
			.entry(name.to_string())
			.or_insert_with(|| folder.unwrap_or_else(|| Folder::new(name)))
	}

	/// Segment-wise descent from this folder; exact, case-sensitive matches
	/// only.
	pub fn find_folder(&self, path: &str) -> Option<&Folder> {
		let mut folder = self;
		for (segment, _) in path.path_walk() {
			folder = folder.folders.get(segment)?;
		}
		Some(folder)
	}

	pub fn list(&self) -> (Vec<String>, Vec<String>) {
		(
			self.folders.keys().cloned().collect(),
			self.files.keys().cloned().collect(),
		)
	}
}

fn remove_case_insensitive<V>(map: &mut HashMap<String, V>, name: &str) -> Option<V> {
	if let Some(value) = map.remove(name) {
		return Some(value);
	}
	let lower = name.to_lowercase();
	let existing = map.keys().find(|k| k.to_lowercase() == lower).cloned()?;
	debug!("change {existing} to {name}");
	map.remove(&existing)
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use dropfs_types::fs::{DeletedEntry, FolderEntry};

	use super::*;

	fn file_entry(path: &str, size: u64) -> Entry {
		let name = path.rsplit('/').next().unwrap().to_string();
		Entry::File(FileEntry {
			name,
			path_display: path.to_string(),
			size,
			server_modified: Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap(),
		})
	}

	fn folder_entry(path: &str) -> Entry {
		let name = path.rsplit('/').next().unwrap().to_string();
		Entry::Folder(FolderEntry {
			name,
			path_display: path.to_string(),
		})
	}

	fn deleted_entry(path: &str) -> Entry {
		let name = path.rsplit('/').next().unwrap().to_string();
		Entry::Deleted(DeletedEntry {
			name,
			path_display: path.to_string(),
		})
	}

	fn no_case_insensitive_duplicates(folder: &Folder) {
		let mut seen: Vec<String> = Vec::new();
		for name in folder.folders.keys().chain(folder.files.keys()) {
			let lower = name.to_lowercase();
			assert!(!seen.contains(&lower), "duplicate child name {name}");
			seen.push(lower);
		}
		for child in folder.folders.values() {
			no_case_insensitive_duplicates(child);
		}
	}

	#[test]
	fn intermediate_folders_created() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/a/b/c.txt", 10));
		let b = root.find_folder("/a/b").unwrap();
		assert_eq!(b.files["c.txt"].size, 10);
		assert!(root.folders["a"].files.is_empty());
		no_case_insensitive_duplicates(&root);
	}

	#[test]
	fn case_folding_tracks_latest_casing() {
		let mut root = Folder::new("");
		root.apply_batch(&[file_entry("/Docs/Readme.md", 7)]);
		root.apply_batch(&[file_entry("/docs/README.MD", 42)]);

		assert_eq!(root.folders.len(), 1);
		let docs = &root.folders["docs"];
		assert_eq!(docs.name, "docs");
		assert_eq!(docs.files.len(), 1);
		assert_eq!(docs.files["README.MD"].size, 42);
		no_case_insensitive_duplicates(&root);
	}

	#[test]
	fn delete_is_case_insensitive() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/X/y.dat", 1));
		root.apply_entry(&deleted_entry("/x/Y.DAT"));
		assert!(root.folders["X"].files.is_empty());
	}

	#[test]
	fn delete_missing_path_is_noop() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/a/keep.txt", 1));
		let before = root.clone();
		root.apply_entry(&deleted_entry("/a/missing.txt"));
		assert_eq!(root, before);
	}

	#[test]
	fn empty_batch_is_noop() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/a/keep.txt", 1));
		let before = root.clone();
		root.apply_batch(&[]);
		assert_eq!(root, before);
	}

	#[test]
	fn repeated_folder_entry_keeps_children_updates_casing() {
		let mut root = Folder::new("");
		root.apply_entry(&folder_entry("/Music"));
		root.apply_entry(&file_entry("/Music/song.mp3", 3));
		root.apply_entry(&folder_entry("/MUSIC"));

		assert_eq!(root.folders.len(), 1);
		let music = &root.folders["MUSIC"];
		assert_eq!(music.name, "MUSIC");
		assert_eq!(music.files["song.mp3"].size, 3);
	}

	#[test]
	fn file_replaces_case_insensitive_sibling() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/a.txt", 1));
		root.apply_entry(&file_entry("/A.TXT", 2));
		assert_eq!(root.files.len(), 1);
		assert_eq!(root.files["A.TXT"].size, 2);
		no_case_insensitive_duplicates(&root);
	}

	#[test]
	fn find_folder_is_case_sensitive() {
		let mut root = Folder::new("");
		root.apply_entry(&file_entry("/Docs/a.txt", 1));
		assert!(root.find_folder("/Docs").is_some());
		assert!(root.find_folder("/docs").is_none());
		assert!(root.find_folder("/").is_some());
		assert_eq!(root.find_folder("/").unwrap().name, "");
	}
}
