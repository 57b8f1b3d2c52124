use std::{
	collections::HashMap,
	ffi::OsStr,
	path::Path,
	sync::Arc,
	time::Duration,
};

use anyhow::Result;
use dropfs_sdk::{
	Error,
	auth::Client,
	fs::{DropboxFs, EntryKind, FileAttributes},
};
use fuser::{
	BackgroundSession, FUSE_ROOT_ID, FileAttr, FileType, Filesystem, MountOption, ReplyAttr,
	ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, Request,
};
use log::debug;
use tokio::runtime::Handle;

const TTL: Duration = Duration::from_secs(1);
const BLOCK_SIZE: u32 = 512;

/// Mounts the adapter read-only and serves kernel requests on fuser's
/// session thread. Quick metadata operations block on the runtime; reads are
/// spawned so one read waiting on a download never stalls the session loop.
pub fn mount(fs: Arc<DropboxFs<Client>>, mountpoint: &Path) -> Result<BackgroundSession> {
	let options = [
		MountOption::RO,
		MountOption::FSName("dropfs".to_string()),
		MountOption::AutoUnmount,
	];
	let host = HostFs {
		fs,
		rt: Handle::current(),
		inodes: InodeTable::new(),
	};
	Ok(fuser::spawn_mount2(host, mountpoint, &options)?)
}

/// Kernel inodes for the path-addressed adapter. Never shrinks; the
/// namespace it mirrors is the index tree, which fits in memory anyway.
struct InodeTable {
	paths: HashMap<u64, String>,
	inodes: HashMap<String, u64>,
	next: u64,
}

impl InodeTable {
	fn new() -> Self {
		let mut table = InodeTable {
			paths: HashMap::new(),
			inodes: HashMap::new(),
			next: FUSE_ROOT_ID + 1,
		};
		table.paths.insert(FUSE_ROOT_ID, "/".to_string());
		table.inodes.insert("/".to_string(), FUSE_ROOT_ID);
		table
	}

	fn get(&mut self, path: &str) -> u64 {
		if let Some(ino) = self.inodes.get(path) {
			return *ino;
		}
		let ino = self.next;
		self.next += 1;
		self.paths.insert(ino, path.to_string());
		self.inodes.insert(path.to_string(), ino);
		ino
	}

	fn path(&self, ino: u64) -> Option<&str> {
		self.paths.get(&ino).map(String::as_str)
	}
}

fn join_path(parent: &str, name: &str) -> String {
	if parent == "/" {
		format!("/{name}")
	} else {
		format!("{parent}/{name}")
	}
}

fn parent_path(path: &str) -> &str {
	match path.rsplit_once('/') {
		Some(("", _)) | None => "/",
		Some((parent, _)) => parent,
	}
}

fn to_fuse_attr(ino: u64, attr: &FileAttributes, uid: u32, gid: u32) -> FileAttr {
	FileAttr {
		ino,
		size: attr.size,
		blocks: attr.size.div_ceil(BLOCK_SIZE as u64),
		atime: attr.atime,
		mtime: attr.mtime,
		ctime: attr.ctime,
		crtime: attr.ctime,
		kind: to_fuse_kind(attr.kind),
		perm: attr.mode as u16,
		nlink: attr.nlink,
		uid,
		gid,
		rdev: 0,
		blksize: BLOCK_SIZE,
		flags: 0,
	}
}

fn to_fuse_kind(kind: EntryKind) -> FileType {
	match kind {
		EntryKind::Folder => FileType::Directory,
		EntryKind::File => FileType::RegularFile,
	}
}

fn errno_of(error: &Error) -> i32 {
	if error.is_not_found() {
		libc::ENOENT
	} else {
		libc::EIO
	}
}

struct HostFs {
	fs: Arc<DropboxFs<Client>>,
	rt: Handle,
	inodes: InodeTable,
}

impl Filesystem for HostFs {
	fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
		let Some(name) = name.to_str() else {
			reply.error(libc::ENOENT);
			return;
		};
		let Some(parent) = self.inodes.path(parent) else {
			reply.error(libc::ENOENT);
			return;
		};
		let path = join_path(parent, name);
		match self.rt.block_on(self.fs.getattr(&path)) {
			Ok(attr) => {
				let ino = self.inodes.get(&path);
				reply.entry(&TTL, &to_fuse_attr(ino, &attr, req.uid(), req.gid()), 0);
			}
			Err(e) => reply.error(errno_of(&e)),
		}
	}

	fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
		let Some(path) = self.inodes.path(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.rt.block_on(self.fs.getattr(path)) {
			Ok(attr) => reply.attr(&TTL, &to_fuse_attr(ino, &attr, req.uid(), req.gid())),
			Err(e) => reply.error(errno_of(&e)),
		}
	}

	fn readdir(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		_fh: u64,
		offset: i64,
		mut reply: ReplyDirectory,
	) {
		let Some(path) = self.inodes.path(ino).map(str::to_string) else {
			reply.error(libc::ENOENT);
			return;
		};
		let entries = self.rt.block_on(self.fs.readdir(&path));
		for (i, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
			let child_ino = match entry.name.as_str() {
				"." => ino,
				".." => self.inodes.get(parent_path(&path)),
				name => self.inodes.get(&join_path(&path, name)),
			};
			let full = reply.add(
				child_ino,
				(i + 1) as i64,
				to_fuse_kind(entry.kind),
				&entry.name,
			);
			if full {
				break;
			}
		}
		reply.ok();
	}

	fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
		let Some(path) = self.inodes.path(ino) else {
			reply.error(libc::ENOENT);
			return;
		};
		match self.rt.block_on(self.fs.open(path)) {
			Ok(fh) => reply.opened(fh, 0),
			Err(e) => reply.error(errno_of(&e)),
		}
	}

	fn read(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		fh: u64,
		offset: i64,
		size: u32,
		_flags: i32,
		_lock_owner: Option<u64>,
		reply: ReplyData,
	) {
		let Some(path) = self.inodes.path(ino).map(str::to_string) else {
			reply.error(libc::EIO);
			return;
		};
		let fs = self.fs.clone();
		self.rt.spawn(async move {
			match fs.read(&path, size, offset.max(0) as u64, fh).await {
				Ok(data) => reply.data(&data),
				Err(e) => {
					debug!("read of {path} failed: {e}");
					reply.error(errno_of(&e));
				}
			}
		});
	}

	fn release(
		&mut self,
		_req: &Request<'_>,
		ino: u64,
		fh: u64,
		_flags: i32,
		_lock_owner: Option<u64>,
		_flush: bool,
		reply: ReplyEmpty,
	) {
		if let Some(path) = self.inodes.path(ino) {
			self.fs.release(path, fh);
		}
		reply.ok();
	}
}
