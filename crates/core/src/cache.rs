// Copyright 2024-2025 Irreducible Inc.

//! Memoization of local verdicts with single-flight computation.

use std::{
	collections::HashMap,
	hash::Hash,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Condvar, Mutex, MutexGuard, PoisonError,
	},
};

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
	/// The value was published by an earlier or concurrent computation.
	Hit(V),
	/// The value was computed by this call.
	Computed(V),
}

impl<V> Lookup<V> {
	pub const fn is_hit(&self) -> bool {
		matches!(self, Self::Hit(_))
	}

	pub fn into_value(self) -> V {
		match self {
			Self::Hit(value) | Self::Computed(value) => value,
		}
	}
}

#[derive(Debug)]
enum SlotState<V> {
	InFlight,
	Ready(V),
	/// The owner finished without publishing. Waiters retry the lookup.
	Abandoned,
}

#[derive(Debug)]
struct Slot<V> {
	state: Mutex<SlotState<V>>,
	done: Condvar,
}

impl<V> Slot<V> {
	fn new() -> Self {
		Self {
			state: Mutex::new(SlotState::InFlight),
			done: Condvar::new(),
		}
	}

	fn finish(&self, state: SlotState<V>) {
		*lock(&self.state) = state;
		self.done.notify_all();
	}
}

/// A concurrent map from keys to values where each key is computed at most once at a time.
///
/// Callers asking for a key whose computation is in flight block until it finishes and then
/// share its value. A computation may decline to publish its value, in which case it is returned
/// to its caller only and the key is free to be computed again.
#[derive(Debug)]
pub struct VerdictCache<K, V> {
	slots: Mutex<HashMap<K, Arc<Slot<V>>>>,
	hits: AtomicUsize,
	misses: AtomicUsize,
}

impl<K, V> Default for VerdictCache<K, V> {
	fn default() -> Self {
		Self {
			slots: Mutex::new(HashMap::new()),
			hits: AtomicUsize::new(0),
			misses: AtomicUsize::new(0),
		}
	}
}

impl<K: Hash + Eq + Clone, V: Clone> VerdictCache<K, V> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the value for `key`, running `compute` if no value is published or in flight.
	///
	/// The computed value is published only if `publish` accepts it. If `compute` panics the
	/// key is released and waiting callers retry.
	pub fn get_or_compute(
		&self,
		key: K,
		compute: impl FnOnce() -> V,
		publish: impl FnOnce(&V) -> bool,
	) -> Lookup<V> {
		let slot = loop {
			let (slot, owner) = self.claim(&key);
			if owner {
				break slot;
			}
			if let Some(value) = Self::wait(&slot) {
				self.hits.fetch_add(1, Ordering::Relaxed);
				return Lookup::Hit(value);
			}
		};
		self.misses.fetch_add(1, Ordering::Relaxed);

		let mut release = Release {
			cache: self,
			key: &key,
			slot: &slot,
			armed: true,
		};
		let value = compute();
		if publish(&value) {
			slot.finish(SlotState::Ready(value.clone()));
			release.armed = false;
		}
		Lookup::Computed(value)
	}

	/// Number of published values.
	pub fn len(&self) -> usize {
		lock(&self.slots)
			.values()
			.filter(|slot| matches!(*lock(&slot.state), SlotState::Ready(_)))
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn hits(&self) -> usize {
		self.hits.load(Ordering::Relaxed)
	}

	pub fn misses(&self) -> usize {
		self.misses.load(Ordering::Relaxed)
	}

	/// Finds the slot for `key`, inserting an in-flight one owned by the caller if absent.
	fn claim(&self, key: &K) -> (Arc<Slot<V>>, bool) {
		let mut slots = lock(&self.slots);
		match slots.get(key) {
			Some(slot) => (slot.clone(), false),
			None => {
				let slot = Arc::new(Slot::new());
				slots.insert(key.clone(), slot.clone());
				(slot, true)
			}
		}
	}

	/// Blocks until the slot leaves the in-flight state. Returns `None` if it was abandoned.
	fn wait(slot: &Slot<V>) -> Option<V> {
		let mut state = lock(&slot.state);
		loop {
			match &*state {
				SlotState::InFlight => {
					state = slot
						.done
						.wait(state)
						.unwrap_or_else(PoisonError::into_inner);
				}
				SlotState::Ready(value) => return Some(value.clone()),
				SlotState::Abandoned => return None,
			}
		}
	}

	fn release(&self, key: &K, slot: &Arc<Slot<V>>) {
		let mut slots = lock(&self.slots);
		if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
			slots.remove(key);
		}
		drop(slots);
		slot.finish(SlotState::Abandoned);
	}
}

/// Frees an owned slot that was not published, including on unwinding.
struct Release<'a, K: Hash + Eq + Clone, V: Clone> {
	cache: &'a VerdictCache<K, V>,
	key: &'a K,
	slot: &'a Arc<Slot<V>>,
	armed: bool,
}

impl<K: Hash + Eq + Clone, V: Clone> Drop for Release<'_, K, V> {
	fn drop(&mut self) {
		if self.armed {
			self.cache.release(self.key, self.slot);
		}
	}
}

impl<K: Hash + Eq + Clone, V: Clone> std::fmt::Debug for Release<'_, K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Release").field("armed", &self.armed).finish()
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
