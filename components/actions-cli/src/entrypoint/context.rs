/// Settings handed from the shell to whichever sub-command it dispatches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Wrap long-running commands in memory-leak detection.
    pub detect_memory_leaks: bool,
}
