// Local crates
use crate::actions::pipeline_config::PipelineConfig;
use crate::helpers::shutdown::Shutdown;
use crate::metrics::metrics::RUNNING_PIPELINES;

// External crates
use anyhow::{Result, bail};
use prometheus::Gauge;
use tokio::task::JoinHandle;
use tracing::instrument;

#[derive(Debug)]
struct RunningPipeline {
    name: String,
    task: JoinHandle<()>,
}

/// Keeps registered pipelines alive until [`PipelineManager::stop_all`].
///
/// Event processing belongs to the pipeline framework; a pipeline here is a
/// background task holding its config until the shutdown broadcast arrives.
#[derive(Debug)]
pub struct PipelineManager {
    shutdown: Shutdown,
    pipelines: Vec<RunningPipeline>,
    running: Gauge,
}

impl Default for PipelineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineManager {
    /// Manager reporting on the process-wide `RUNNING_PIPELINES` gauge.
    pub fn new() -> Self {
        Self::with_gauge(RUNNING_PIPELINES.clone())
    }

    /// Manager tracking its running pipelines on `running`.
    pub fn with_gauge(running: Gauge) -> Self {
        Self {
            shutdown: Shutdown::new(),
            pipelines: Vec::new(),
            running,
        }
    }

    /// Spawn a task for `config`. Must be called within a tokio runtime.
    #[instrument(name = "pipeline_manager::start", skip_all, fields(pipeline = %config.name))]
    pub fn start_pipeline(&mut self, config: PipelineConfig) -> Result<()> {
        if self.pipelines.iter().any(|p| p.name == config.name) {
            bail!("Pipeline with name '{}' is already running", config.name);
        }

        let name = config.name.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let task = tokio::spawn(async move {
            tracing::debug!(
                source = %config.source.kind,
                action = %config.action.kind,
                transformers = config.transform.len(),
                event_types = ?config.filter.as_ref().map(|f| f.event_type.as_slice()),
                "Pipeline {} waiting for events",
                config.name
            );
            // Closed or lagged both mean the manager is going away.
            let _ = shutdown_rx.recv().await;
            tracing::debug!("Pipeline {} received shutdown", config.name);
        });

        self.running.inc();
        self.pipelines.push(RunningPipeline { name, task });
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Broadcast shutdown and wait for every pipeline task to finish.
    #[instrument(name = "pipeline_manager::stop_all", skip_all, fields(pipelines = self.pipelines.len()))]
    pub async fn stop_all(&mut self) {
        self.shutdown.trigger();

        for pipeline in self.pipelines.drain(..) {
            if let Err(err) = pipeline.task.await {
                tracing::warn!(error = %err, "Pipeline {} did not stop cleanly", pipeline.name);
            }
            self.running.dec();
            tracing::info!("Action Pipeline with name '{}' has been stopped.", pipeline.name);
        }
    }
}
