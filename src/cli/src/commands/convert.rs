//! `d2w` conversion.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use d2w_core::{ConvertConfig, DistributionName};
use d2w_runtime::{
    ConversionRequest, DockerEngine, LnkWriter, Pipeline, PostImportTask, WslHost,
};

use crate::output;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Name of the distribution to create (replaces an existing one)
    #[arg(long, default_value = "dist")]
    pub distro_name: DistributionName,

    /// Dockerfile to build, or image reference to pull when no such file exists
    #[arg(long, default_value = "Dockerfile")]
    pub image: String,

    /// Open an interactive session once imported
    #[arg(long)]
    pub launch: bool,

    /// Make the distribution the default
    #[arg(long)]
    pub set_default: bool,

    /// Create a Start Menu shortcut for the distribution
    #[arg(long)]
    pub start_menu: bool,

    /// Image engine endpoint (defaults to DOCKER_HOST, then the platform socket)
    #[arg(long)]
    pub docker_host: Option<String>,

    /// Directory for the temporary export archive
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Parent directory of the distribution's storage directory
    #[arg(long)]
    pub install_dir: Option<PathBuf>,
}

impl ConvertArgs {
    /// Overlay command-line overrides on `base`.
    pub fn apply(&self, mut base: ConvertConfig) -> ConvertConfig {
        if let Some(host) = &self.docker_host {
            base.engine_host = host.clone();
        }
        if let Some(dir) = &self.work_dir {
            base.work_dir = dir.clone();
        }
        if let Some(dir) = &self.install_dir {
            base.install_root = dir.clone();
        }
        base
    }

    pub fn request(&self) -> ConversionRequest {
        ConversionRequest {
            image: self.image.clone(),
            distro_name: self.distro_name.clone(),
            tasks: PostImportTask::from_flags(self.set_default, self.start_menu, self.launch),
        }
    }
}

pub async fn execute(args: ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.apply(ConvertConfig::from_env());
    tracing::debug!(
        engine = %config.engine_host,
        tls_verify = config.engine_tls_verify,
        work_dir = %config.work_dir.display(),
        install_root = %config.install_root.display(),
        app_data = ?config.app_data_dir,
        "Resolved configuration"
    );
    let engine = DockerEngine::from_config(&config)?;

    let pipeline = Pipeline::new(
        Arc::new(engine),
        Arc::new(WslHost::default()),
        Arc::new(LnkWriter),
        config,
    );

    pipeline
        .run_interactive(&args.request(), output::print_report)
        .await?;
    Ok(())
}
