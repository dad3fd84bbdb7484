//! Post-import configuration.
//!
//! Optional tasks applied to a freshly imported distribution. Setting the
//! default and creating the Start Menu shortcut are conveniences: their
//! failures are reported as warnings and the run continues. A failed launch
//! fails the run.

use std::path::{Path, PathBuf};

use d2w_core::error::{ConvertError, PipelineStage, Result, StageContext};
use d2w_core::DistributionName;

use crate::host::DistributionHost;
use crate::shortcut::{start_menu_programs_dir, Shortcut, ShortcutWriter};

/// An optional post-import task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostImportTask {
    SetDefault,
    StartMenuShortcut,
    Launch,
}

impl PostImportTask {
    /// Selected tasks in execution order.
    ///
    /// Launch comes last: the interactive session blocks until it ends.
    pub fn from_flags(set_default: bool, start_menu: bool, launch: bool) -> Vec<Self> {
        [
            (set_default, PostImportTask::SetDefault),
            (start_menu, PostImportTask::StartMenuShortcut),
            (launch, PostImportTask::Launch),
        ]
        .into_iter()
        .filter_map(|(enabled, task)| enabled.then_some(task))
        .collect()
    }

    pub fn stage(self) -> PipelineStage {
        match self {
            PostImportTask::SetDefault => PipelineStage::SetDefault,
            PostImportTask::StartMenuShortcut => PipelineStage::CreateShortcut,
            PostImportTask::Launch => PipelineStage::LaunchDistribution,
        }
    }

    /// Whether a failure of this task fails the run.
    pub fn is_fatal(self) -> bool {
        matches!(self, PostImportTask::Launch)
    }
}

/// Result of a single task.
#[derive(Debug)]
pub enum TaskOutcome {
    Done,
    /// Failed, but the run continues
    SoftFailure(ConvertError),
    /// Failed and the run stops
    Fatal(ConvertError),
}

/// Shortcut path for `name` under the application-data root.
pub fn start_menu_shortcut(app_data: Option<&Path>, name: &DistributionName) -> Result<PathBuf> {
    let app_data = app_data.ok_or_else(|| {
        ConvertError::ShortcutError("APPDATA environment variable not found".to_string())
    })?;
    Ok(start_menu_programs_dir(app_data).join(format!("{name}.lnk")))
}

/// Applies post-import tasks to one distribution.
pub struct Configurator<'a> {
    host: &'a dyn DistributionHost,
    shortcuts: &'a dyn ShortcutWriter,
    app_data_dir: Option<PathBuf>,
}

impl<'a> Configurator<'a> {
    pub fn new(
        host: &'a dyn DistributionHost,
        shortcuts: &'a dyn ShortcutWriter,
        app_data_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            host,
            shortcuts,
            app_data_dir,
        }
    }

    /// Run one task, classifying its result.
    pub async fn run(&self, task: PostImportTask, name: &DistributionName) -> TaskOutcome {
        let result = match task {
            PostImportTask::SetDefault => self.host.set_default(name.as_str()).await,
            PostImportTask::StartMenuShortcut => self.create_shortcut(name),
            PostImportTask::Launch => self.host.launch_interactive(name.as_str()).await,
        };

        match result.stage(task.stage()) {
            Ok(()) => {
                tracing::info!(distribution = %name, task = ?task, "Post-import task complete");
                TaskOutcome::Done
            }
            Err(e) if task.is_fatal() => TaskOutcome::Fatal(e),
            Err(e) => {
                tracing::warn!(distribution = %name, task = ?task, error = %e, "Post-import task failed");
                TaskOutcome::SoftFailure(e)
            }
        }
    }

    /// Run `tasks` in order.
    ///
    /// Returns the soft failures collected along the way, or the first fatal
    /// error. Tasks after a fatal failure are not attempted.
    pub async fn run_all(
        &self,
        tasks: &[PostImportTask],
        name: &DistributionName,
    ) -> std::result::Result<Vec<ConvertError>, ConvertError> {
        let mut warnings = Vec::new();
        for &task in tasks {
            match self.run(task, name).await {
                TaskOutcome::Done => {}
                TaskOutcome::SoftFailure(e) => warnings.push(e),
                TaskOutcome::Fatal(e) => return Err(e),
            }
        }
        Ok(warnings)
    }

    fn create_shortcut(&self, name: &DistributionName) -> Result<()> {
        let path = start_menu_shortcut(self.app_data_dir.as_deref(), name)?;
        self.shortcuts
            .write(&Shortcut::launch_distribution(path, name.as_str()))
    }
}
