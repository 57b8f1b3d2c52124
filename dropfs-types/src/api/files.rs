use serde::{Deserialize, Serialize};

use crate::fs::Entry;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ListFolderArg {
	pub path: String,
	pub recursive: bool,
	pub include_deleted: bool,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ListFolderResult {
	pub entries: Vec<Entry>,
	pub cursor: String,
	pub has_more: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ListFolderContinueArg {
	pub cursor: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LatestCursorResult {
	pub cursor: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LongpollArg {
	pub cursor: String,
	pub timeout: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LongpollResult {
	pub changes: bool,
	/// Seconds the client should wait before polling again, when the server
	/// asks for it.
	pub backoff: Option<u64>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DownloadArg {
	pub path: String,
}
