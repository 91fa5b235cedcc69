//! JSON-file [`CredentialStore`] for hosts that keep the session across restarts.

// std
use std::{
	fs::{self, File},
	io::{self, ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	store::{CredentialKey, CredentialStore, Credentials, StoreError, StoreFuture},
};

/// Keeps the token pair in a JSON file, mirrored in memory for reads.
///
/// Every mutation is written to a sibling temp file and renamed into place before the in-memory
/// copy changes, so the file always holds a complete pair and a failed write leaves both views on
/// the previous session.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Credentials>>,
}
impl FileStore {
	/// Opens the store at `path`, reading any session already saved there.
	///
	/// A missing or empty file is an empty session; missing parent directories are created.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		create_parent(&path)?;

		let credentials = read_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(credentials)) })
	}

	/// Location of the JSON file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn mutate(&self, apply: impl FnOnce(&mut Credentials)) -> Result<(), StoreError> {
		let mut current = self.inner.write();
		let mut next = current.clone();

		apply(&mut next);
		write_snapshot(&self.path, &next)?;

		*current = next;

		Ok(())
	}
}
impl CredentialStore for FileStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|credentials| credentials.set(key, value)) })
	}

	fn replace(&self, pair: TokenPair) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|credentials| *credentials = pair.into()) })
	}

	fn load(&self) -> StoreFuture<'_, Credentials> {
		Box::pin(async move { Ok(self.inner.read().clone()) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.mutate(|credentials| *credentials = Credentials::default()) })
	}
}

fn io_failure(action: &str, path: &Path, e: io::Error) -> StoreError {
	StoreError::Backend { message: format!("Could not {action} `{}`: {e}", path.display()) }
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() =>
			fs::create_dir_all(dir).map_err(|e| io_failure("create directory", dir, e)),
		_ => Ok(()),
	}
}

fn read_snapshot(path: &Path) -> Result<Credentials, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Credentials::default()),
		Err(e) => return Err(io_failure("read", path, e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Credentials::default());
	}

	serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
		message: format!("Session file `{}` is not valid JSON: {e}", path.display()),
	})
}

fn write_snapshot(path: &Path, credentials: &Credentials) -> Result<(), StoreError> {
	let json = serde_json::to_vec_pretty(credentials).map_err(|e| StoreError::Serialization {
		message: format!("Session could not be encoded: {e}"),
	})?;
	let staging = path.with_extension("tmp");
	let mut file = File::create(&staging).map_err(|e| io_failure("create", &staging, e))?;

	file.write_all(&json).map_err(|e| io_failure("write", &staging, e))?;
	file.sync_all().map_err(|e| io_failure("flush", &staging, e))?;
	drop(file);

	fs::rename(&staging, path).map_err(|e| io_failure("move into place", path, e))
}
