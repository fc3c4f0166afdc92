// Copyright 2024 Irreducible Inc.

use std::str::FromStr;

/// Read boolean flag from the environment variable.
pub fn boolean_env_flag_set(flag: &str) -> bool {
	match std::env::var(flag) {
		Ok(val) => ["1", "on", "ON", "true", "TRUE", "yes", "YES"].contains(&val.as_str()),
		Err(_) => false,
	}
}

/// Read and parse a value from the environment variable.
///
/// Returns `None` if the variable is unset or does not parse.
pub fn parsed_env_var<T: FromStr>(name: &str) -> Option<T> {
	std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unset_variables() {
		assert!(!boolean_env_flag_set("SAFECIRC_TEST_SURELY_UNSET_FLAG"));
		assert_eq!(parsed_env_var::<u64>("SAFECIRC_TEST_SURELY_UNSET_VALUE"), None);
	}
}
