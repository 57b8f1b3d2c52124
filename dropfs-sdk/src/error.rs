use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Api Error: `{0}`")]
	Api(#[from] dropfs_types::error::ApiError),
	#[error("Reqwest Error: `{0}`")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO Error: `{0}`")]
	Io(#[from] std::io::Error),
	#[error("serde_json Error: `{0}`")]
	SerdeJson(#[from] serde_json::Error),
	#[error("Snapshot Decode Error: `{0}`")]
	SnapshotDecode(#[from] rmp_serde::decode::Error),
	#[error("Snapshot Encode Error: `{0}`")]
	SnapshotEncode(#[from] rmp_serde::encode::Error),
	#[error("incompatible snapshot: data file has version `{found}`, this build expects `{expected}`")]
	SnapshotVersion { expected: u32, found: u32 },
	#[error("invalid access token; try re-generating an access token from the app console on the web")]
	Auth,
	#[error("no entry at `{0}`")]
	NotFound(String),
	#[error("no open file for handle `{0}`")]
	BadHandle(u64),
	#[error("download of `{0}` failed")]
	DownloadFailed(String),
	#[error("`{0}` context: `{1}`")]
	WithContext(Box<Error>, &'static str),
}

impl Error {
	fn root(&self) -> &Error {
		let mut error = self;
		while let Error::WithContext(inner, _) = error {
			error = inner;
		}
		error
	}

	/// Whether the remote call that produced this error is worth retrying on
	/// the next loop iteration.
	pub fn is_transient(&self) -> bool {
		match self.root() {
			Error::Reqwest(e) => e.is_timeout() || e.is_connect(),
			Error::Io(e) => matches!(
				e.kind(),
				std::io::ErrorKind::TimedOut
					| std::io::ErrorKind::ConnectionReset
					| std::io::ErrorKind::ConnectionAborted
					| std::io::ErrorKind::BrokenPipe
			),
			_ => false,
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self.root(), Error::NotFound(_))
	}
}

pub trait ErrorExt<T, E> {
	fn context(self, context: &'static str) -> Result<T, Error>;
}

impl<T, E> ErrorExt<T, E> for Result<T, E>
where
	Error: From<E>,
{
	fn context(self, context: &'static str) -> Result<T, Error> {
		self.map_err(|e| Error::WithContext(Box::new(Error::from(e)), context))
	}
}
