//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{TokenPair, TokenSecret},
	store::{CredentialKey, CredentialStore, Credentials, StoreError, StoreFuture},
};

type Slots = Arc<RwLock<Credentials>>;

/// Storage backend that keeps the session in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slots);
impl MemoryStore {
	fn get_now(slots: &Slots, key: CredentialKey) -> Option<TokenSecret> {
		slots.read().get(key).cloned()
	}

	fn set_now(slots: &Slots, key: CredentialKey, value: TokenSecret) {
		slots.write().set(key, value);
	}

	fn replace_now(slots: &Slots, pair: TokenPair) {
		*slots.write() = Credentials::from(pair);
	}

	fn clear_now(slots: &Slots) {
		*slots.write() = Credentials::default();
	}
}
impl CredentialStore for MemoryStore {
	fn get(&self, key: CredentialKey) -> StoreFuture<'_, Option<TokenSecret>> {
		let slots = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(&slots, key)) })
	}

	fn set(&self, key: CredentialKey, value: TokenSecret) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			Self::set_now(&slots, key, value);

			Ok::<_, StoreError>(())
		})
	}

	fn replace(&self, pair: TokenPair) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			Self::replace_now(&slots, pair);

			Ok(())
		})
	}

	fn load(&self) -> StoreFuture<'_, Credentials> {
		let slots = self.0.clone();

		Box::pin(async move { Ok(slots.read().clone()) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slots = self.0.clone();

		Box::pin(async move {
			Self::clear_now(&slots);

			Ok(())
		})
	}
}
