//! Explicit logger registry.
//!
//! Loggers are keyed by name and own their sinks and threshold. A `tracing`
//! target belongs to the deepest registered logger whose name is a
//! `::`-bounded prefix of it; everything else belongs to the root logger.
//!
//! ```text
//! event(target = "datahub_actions::actions::commands", INFO)
//!     → lineage: ["datahub_actions"]            (registered ancestors only)
//!     → effective level: first explicit level in lineage, else root level
//!     → sinks of "datahub_actions", then ancestors while `propagate`
//!     → root sinks, only when every node on the way propagates
//! ```
//!
//! Nothing is inherited implicitly: a non-propagating logger with its own
//! level is unaffected by whatever happens to the root afterwards.

// Local crates
use crate::instrumentation::record::{LogRecord, Severity};

// External crates
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Logger owning every target of this crate.
pub const DEDICATED_LOGGER: &str = "datahub_actions";

/// Registry shared between the routing layer and whoever reconfigures it.
pub type SharedRegistry = Arc<RwLock<LoggerRegistry>>;

/// Destination receiving records between a minimum and an optional maximum severity.
pub struct Sink {
    name: &'static str,
    level: Severity,
    max_level: Option<Severity>,
    writer: BoxMakeWriter,
}

impl Sink {
    pub fn new<W>(name: &'static str, level: Severity, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            name,
            level,
            max_level: None,
            writer: BoxMakeWriter::new(writer),
        }
    }

    /// Only let through records at or below `max_level`.
    pub fn with_max_level(mut self, max_level: Severity) -> Self {
        self.max_level = Some(max_level);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn set_level(&mut self, level: Severity) {
        self.level = level;
    }

    pub fn accepts(&self, severity: Severity) -> bool {
        severity >= self.level && self.max_level.is_none_or(|max| severity <= max)
    }

    fn emit(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.make_writer();
        writer.write_all(line.as_bytes())?;
        writer.flush()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("max_level", &self.max_level)
            .finish_non_exhaustive()
    }
}

/// One named logger: optional threshold, propagation flag and attached sinks.
#[derive(Debug)]
pub struct LoggerNode {
    level: Option<Severity>,
    propagate: bool,
    sinks: Vec<Sink>,
}

impl LoggerNode {
    fn new() -> Self {
        Self {
            level: None,
            propagate: true,
            sinks: Vec::new(),
        }
    }

    pub fn level(&self) -> Option<Severity> {
        self.level
    }

    pub fn set_level(&mut self, level: Severity) {
        self.level = Some(level);
    }

    pub fn propagate(&self) -> bool {
        self.propagate
    }

    pub fn set_propagate(&mut self, propagate: bool) {
        self.propagate = propagate;
    }

    pub fn add_sink(&mut self, sink: Sink) {
        self.sinks.push(sink);
    }

    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    pub fn sink_mut(&mut self, name: &str) -> Option<&mut Sink> {
        self.sinks.iter_mut().find(|sink| sink.name == name)
    }

    pub fn clear_sinks(&mut self) {
        self.sinks.clear();
    }

    /// Offer the rendered line to every accepting sink. All sinks are tried;
    /// the first failure is reported.
    fn emit(&self, severity: Severity, line: &str) -> (usize, Option<io::Error>) {
        let mut written = 0;
        let mut first_error = None;

        for sink in self.sinks.iter().filter(|sink| sink.accepts(severity)) {
            match sink.emit(line) {
                Ok(()) => written += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        (written, first_error)
    }
}

impl Default for LoggerNode {
    fn default() -> Self {
        Self::new()
    }
}

/// All loggers of the process plus the root (ambient) logger.
#[derive(Debug)]
pub struct LoggerRegistry {
    root: LoggerNode,
    loggers: BTreeMap<String, LoggerNode>,
}

impl LoggerRegistry {
    /// Fresh registry whose root logger has `root_level` and no sinks.
    pub fn new(root_level: Severity) -> Self {
        let mut root = LoggerNode::new();
        root.set_level(root_level);
        root.set_propagate(false);

        Self {
            root,
            loggers: BTreeMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn root(&self) -> &LoggerNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut LoggerNode {
        &mut self.root
    }

    /// Named logger, created on first access (propagating, no level, no sinks).
    pub fn logger(&mut self, name: &str) -> &mut LoggerNode {
        self.loggers.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&LoggerNode> {
        self.loggers.get(name)
    }

    /// Registered loggers owning `target`, deepest first. The root is not included.
    fn lineage<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a LoggerNode> + 'a {
        std::iter::successors(Some(target), |name| name.rfind("::").map(|idx| &name[..idx]))
            .filter_map(|name| self.loggers.get(name))
    }

    /// Threshold a record from `target` must reach to be handled at all.
    pub fn effective_level(&self, target: &str) -> Severity {
        self.lineage(target)
            .find_map(LoggerNode::level)
            .or(self.root.level)
            .unwrap_or(Severity::Warning)
    }

    pub fn enabled(&self, target: &str, severity: Severity) -> bool {
        severity >= self.effective_level(target)
    }

    /// Route a record to the sinks responsible for it.
    ///
    /// Returns how many sinks received the record.
    pub fn dispatch(&self, record: &LogRecord) -> io::Result<usize> {
        if !self.enabled(&record.target, record.severity) {
            return Ok(0);
        }

        let line = record.format();
        let mut written = 0;
        let mut first_error = None;
        let mut reaches_root = true;

        for node in self.lineage(&record.target) {
            let (count, error) = node.emit(record.severity, &line);
            written += count;
            if let Some(err) = error {
                first_error.get_or_insert(err);
            }
            if !node.propagate {
                reaches_root = false;
                break;
            }
        }

        if reaches_root {
            let (count, error) = self.root.emit(record.severity, &line);
            written += count;
            if let Some(err) = error {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }
}

/// Read access that survives a panic in another writer.
pub fn read(registry: &SharedRegistry) -> RwLockReadGuard<'_, LoggerRegistry> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write access that survives a panic in another writer.
pub fn write(registry: &SharedRegistry) -> RwLockWriteGuard<'_, LoggerRegistry> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumentation::stream::Stream;
    use chrono::Local;

    fn record(target: &str, severity: Severity, message: &str) -> LogRecord {
        LogRecord {
            timestamp: Local::now(),
            severity,
            target: target.to_string(),
            line: 1,
            message: message.to_string(),
        }
    }

    #[test]
    fn targets_resolve_to_the_deepest_registered_logger() {
        let mut registry = LoggerRegistry::new(Severity::Warning);
        registry.logger("app").set_level(Severity::Info);
        registry.logger("app::noisy").set_level(Severity::Error);

        assert_eq!(registry.effective_level("app::cli"), Severity::Info);
        assert_eq!(registry.effective_level("app::noisy::inner"), Severity::Error);
        assert_eq!(registry.effective_level("application"), Severity::Warning);
        assert_eq!(registry.effective_level("other"), Severity::Warning);
    }

    #[test]
    fn loggers_without_level_inherit_from_ancestors() {
        let mut registry = LoggerRegistry::new(Severity::Error);
        registry.logger("app").set_level(Severity::Debug);
        registry.logger("app::child");

        assert_eq!(registry.effective_level("app::child::leaf"), Severity::Debug);
    }

    #[test]
    fn propagating_loggers_reach_root_sinks() {
        let root_out = Stream::captured();
        let mut registry = LoggerRegistry::new(Severity::Info);
        registry
            .root_mut()
            .add_sink(Sink::new("root", Severity::Trace, root_out.clone()));
        registry.logger("lib");

        let written = registry
            .dispatch(&record("lib::module", Severity::Info, "via root"))
            .unwrap();

        assert_eq!(written, 1);
        assert!(root_out.contents().contains("via root"));
    }

    #[test]
    fn non_propagating_loggers_stop_before_root() {
        let root_out = Stream::captured();
        let own_out = Stream::captured();
        let mut registry = LoggerRegistry::new(Severity::Trace);
        registry
            .root_mut()
            .add_sink(Sink::new("root", Severity::Trace, root_out.clone()));
        let logger = registry.logger("app");
        logger.add_sink(Sink::new("own", Severity::Trace, own_out.clone()));
        logger.set_propagate(false);

        registry
            .dispatch(&record("app", Severity::Error, "kept local"))
            .unwrap();

        assert!(own_out.contents().contains("kept local"));
        assert!(root_out.contents().is_empty());
    }

    #[test]
    fn sinks_respect_min_and_max_levels() {
        let sink = Sink::new("bounded", Severity::Debug, Stream::captured())
            .with_max_level(Severity::Info);

        assert!(!sink.accepts(Severity::Trace));
        assert!(sink.accepts(Severity::Debug));
        assert!(sink.accepts(Severity::Info));
        assert!(!sink.accepts(Severity::Warning));
    }

    #[test]
    fn records_below_effective_level_are_dropped() {
        let out = Stream::captured();
        let mut registry = LoggerRegistry::new(Severity::Warning);
        registry
            .root_mut()
            .add_sink(Sink::new("root", Severity::Trace, out.clone()));

        let written = registry
            .dispatch(&record("anything", Severity::Info, "too quiet"))
            .unwrap();

        assert_eq!(written, 0);
        assert!(out.contents().is_empty());
    }
}
