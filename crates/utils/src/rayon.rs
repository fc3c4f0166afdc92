// Copyright 2024 Irreducible Inc.

use std::env;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// Builds a bounded worker pool.
///
/// With `num_threads` unset the size follows `RAYON_NUM_THREADS`, falling back to the number of
/// logical CPUs.
pub fn build_thread_pool(num_threads: Option<usize>) -> Result<ThreadPool, ThreadPoolBuildError> {
	let requested = num_threads.or_else(|| {
		env::var("RAYON_NUM_THREADS")
			.ok()
			.and_then(|v| v.parse::<usize>().ok())
	});

	let builder = ThreadPoolBuilder::new().thread_name(|i| format!("safecirc-worker-{i}"));
	match requested {
		Some(n) => builder.num_threads(n.max(1)).build(),
		None => builder.build(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pool_size() {
		let pool = build_thread_pool(Some(3)).unwrap();
		assert_eq!(pool.current_num_threads(), 3);
		assert_eq!(pool.install(|| 2 + 2), 4);
	}
}
