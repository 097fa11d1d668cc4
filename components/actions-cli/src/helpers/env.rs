// External crates
use std::collections::HashMap;

/// Environment of one invocation. Passed explicitly so the shell never reads
/// process-wide state behind the caller's back.
pub type EnvMap = HashMap<String, String>;

/// Enables debug logging when no explicit `--debug`/`--no-debug` is given.
pub const DEBUG_ENV_VAR: &str = "DATAHUB_DEBUG";

/// Snapshot of the process environment (non-UTF-8 entries are skipped).
pub fn process_env() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// `true` when the variable is set to `true` or `1` (any case), `default` when unset.
pub fn get_boolean_env_variable(env: &EnvMap, key: &str, default: bool) -> bool {
    match env.get(key) {
        Some(value) => matches!(value.trim().to_lowercase().as_str(), "true" | "1"),
        None => default,
    }
}
