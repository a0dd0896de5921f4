//! Exit codes of `perfwatch`. Part of the public contract with CI workflows.

pub const SUCCESS: i32 = 0;
pub const POLICY_FAILED: i32 = 1; // fail-on policy tripped on failed assertions
pub const INTERNAL_ERROR: i32 = 2; // config error, unreadable results, or history not persisted
