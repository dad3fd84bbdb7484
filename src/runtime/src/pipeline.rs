//! End-to-end conversion.
//!
//! Resolve the image, export its filesystem, import the archive as a
//! distribution, then apply the selected post-import tasks. Each step only
//! starts once the previous one succeeded; the export archive is deleted as
//! soon as the import is done with it, and on every failure path.
//!
//! The interactive launch blocks until the session ends, so it is kept out of
//! [`Pipeline::run`]. [`Pipeline::run_interactive`] hands the finished report
//! to the caller first and launches afterwards.

use std::sync::Arc;

use d2w_core::error::{PipelineStage, Result, StageContext};
use d2w_core::{ConvertConfig, ConvertError, DistributionName, RunId};

use crate::configure::{Configurator, PostImportTask, TaskOutcome};
use crate::engine::ImageEngine;
use crate::export::export_image;
use crate::host::DistributionHost;
use crate::import::{ImportMethod, Importer};
use crate::shortcut::ShortcutWriter;
use crate::source::{resolve_image, ImageSource, ResolveOptions};

/// What to convert and what to do afterwards.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Recipe path or registry reference
    pub image: String,
    pub distro_name: DistributionName,
    /// Post-import tasks, in execution order
    pub tasks: Vec<PostImportTask>,
}

/// Summary of a successful conversion.
#[derive(Debug)]
pub struct ConversionReport {
    pub run_id: RunId,
    /// Local image the distribution was exported from
    pub image: String,
    pub distro_name: DistributionName,
    pub import_method: ImportMethod,
    /// Export archive size in bytes
    pub archive_size: u64,
    /// Non-fatal post-import failures
    pub warnings: Vec<ConvertError>,
    /// An interactive session was requested and has not run yet
    pub launch_pending: bool,
}

/// Conversion pipeline over an image engine and a distribution host.
pub struct Pipeline {
    engine: Arc<dyn ImageEngine>,
    host: Arc<dyn DistributionHost>,
    shortcuts: Arc<dyn ShortcutWriter>,
    config: ConvertConfig,
    quiet: bool,
}

impl Pipeline {
    pub fn new(
        engine: Arc<dyn ImageEngine>,
        host: Arc<dyn DistributionHost>,
        shortcuts: Arc<dyn ShortcutWriter>,
        config: ConvertConfig,
    ) -> Self {
        Self {
            engine,
            host,
            shortcuts,
            config,
            quiet: false,
        }
    }

    /// Suppress progress output on stdout.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run a conversion with a fresh run identifier.
    ///
    /// A requested launch is not performed; see [`Pipeline::run_interactive`].
    pub async fn run(&self, request: &ConversionRequest) -> Result<ConversionReport> {
        self.run_with_id(request, RunId::generate()).await
    }

    /// Run a conversion whose per-run resources are named after `run_id`.
    pub async fn run_with_id(
        &self,
        request: &ConversionRequest,
        run_id: RunId,
    ) -> Result<ConversionReport> {
        let name = &request.distro_name;
        tracing::info!(run = %run_id, image = %request.image, distribution = %name, "Starting conversion");

        self.engine.ping().await.stage(PipelineStage::ResolveImage)?;

        let source = ImageSource::detect(&request.image);
        let options = ResolveOptions {
            build_tag: run_id.build_tag(&self.config.image_repository),
            quiet: self.quiet,
        };
        let image = resolve_image(self.engine.as_ref(), &source, &options)
            .await
            .stage(PipelineStage::ResolveImage)?;

        self.progress(format_args!("Exporting image {image}..."));
        let archive_path = run_id.archive_path(&self.config.work_dir);
        let archive = export_image(
            self.engine.as_ref(),
            &image,
            &run_id.container_name(),
            &archive_path,
        )
        .await
        .stage(PipelineStage::ExportImage)?;
        let archive_size = archive.size();

        self.progress(format_args!("Importing distribution {name}..."));
        let importer = Importer::new(
            self.host.as_ref(),
            &self.config.install_root,
            self.config.wsl_version,
        );
        let import_method = importer
            .import(name, archive.path())
            .await
            .stage(PipelineStage::ImportDistribution)?;
        drop(archive);

        let (launch, tasks): (Vec<PostImportTask>, Vec<PostImportTask>) = request
            .tasks
            .iter()
            .copied()
            .partition(|&task| task == PostImportTask::Launch);
        let warnings = self.configurator().run_all(&tasks, name).await?;

        tracing::info!(
            run = %run_id,
            distribution = %name,
            method = %import_method,
            warnings = warnings.len(),
            "Conversion complete"
        );

        Ok(ConversionReport {
            run_id,
            image,
            distro_name: name.clone(),
            import_method,
            archive_size,
            warnings,
            launch_pending: !launch.is_empty(),
        })
    }

    /// Open an interactive session in `name`, blocking until it ends.
    pub async fn launch(&self, name: &DistributionName) -> Result<()> {
        match self.configurator().run(PostImportTask::Launch, name).await {
            TaskOutcome::Done => Ok(()),
            TaskOutcome::SoftFailure(e) | TaskOutcome::Fatal(e) => Err(e),
        }
    }

    /// Run a conversion, pass the report to `on_ready`, then launch if
    /// requested.
    ///
    /// `on_ready` runs before the session starts, and also when the launch
    /// then fails, so the import result is always reported.
    pub async fn run_interactive<F>(
        &self,
        request: &ConversionRequest,
        on_ready: F,
    ) -> Result<ConversionReport>
    where
        F: FnOnce(&ConversionReport),
    {
        let mut report = self.run(request).await?;
        on_ready(&report);
        if report.launch_pending {
            self.launch(&report.distro_name).await?;
            report.launch_pending = false;
        }
        Ok(report)
    }

    fn configurator(&self) -> Configurator<'_> {
        Configurator::new(
            self.host.as_ref(),
            self.shortcuts.as_ref(),
            self.config.app_data_dir.clone(),
        )
    }

    fn progress(&self, message: std::fmt::Arguments<'_>) {
        if !self.quiet {
            println!("{message}");
        }
    }
}
