//! Typst render invocation
//!
//! Checks that the templates a document needs are present, runs the external
//! renderer and turns its exit status into a typed result.

use crate::config::AppConfig;
use crate::error::DocsError;
use crate::models::{DocumentType, Organization};
use crate::projector::organization_dir;
use crate::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Files every organization template directory must contain
pub const REQUIRED_TEMPLATE_ASSETS: [&str; 4] =
    ["ru-numbers.typ", "act.typ", "invoice.typ", "org_card.typ"];

/// What a finished child process left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        timeout: Duration,
    ) -> std::io::Result<ProcessOutput>;
}

/// Runs programs as real child processes
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        timeout: Duration,
    ) -> std::io::Result<ProcessOutput> {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output()).await.map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} did not finish within {}s", program, timeout.as_secs_f32()),
            )
        })??;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub struct RenderInvoker<R = SystemRunner> {
    runner: R,
    renderer_bin: String,
    typst_root: PathBuf,
    fonts_dir: PathBuf,
    output_root: PathBuf,
    timeout: Duration,
}

impl RenderInvoker<SystemRunner> {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: ProcessRunner> RenderInvoker<R> {
    pub fn with_runner(config: &AppConfig, runner: R) -> Self {
        Self {
            runner,
            renderer_bin: config.renderer_bin.clone(),
            typst_root: config.typst_root.clone(),
            fonts_dir: config.fonts_dir.clone(),
            output_root: config.output_root.clone(),
            timeout: config.render_timeout,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Render a document whose payload is already at `payload_path`.
    ///
    /// Returns the path of the produced PDF.
    pub async fn render(
        &self,
        document_type: DocumentType,
        payload_path: &Path,
        organization: Option<&Organization>,
    ) -> Result<PathBuf> {
        let (template, output) = if document_type.is_organization_scoped() {
            let org = organization.ok_or_else(|| {
                DocsError::InvalidRequest(format!(
                    "{} requires an organization",
                    document_type.label()
                ))
            })?;

            let template_dir = organization_dir(&self.typst_root, org)?;
            check_assets(&template_dir, &REQUIRED_TEMPLATE_ASSETS)?;

            let output_dir = organization_dir(&self.output_root, org)?;
            (
                template_dir.join(document_type.template_file()),
                output_dir.join(document_type.output_file()),
            )
        } else {
            check_assets(&self.typst_root, &[document_type.template_file()])?;
            (
                self.typst_root.join(document_type.template_file()),
                self.output_root.join(document_type.output_file()),
            )
        };

        check_payload(payload_path)?;

        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir).map_err(|e| DocsError::persistence(dir, e))?;
        }

        let args: Vec<OsString> = vec![
            "compile".into(),
            "--root".into(),
            self.typst_root.clone().into(),
            "--font-path".into(),
            self.fonts_dir.clone().into(),
            template.into(),
            output.clone().into(),
        ];

        debug!(program = %self.renderer_bin, ?args, "Running renderer");

        let result = self
            .runner
            .run(&self.renderer_bin, &args, self.timeout)
            .await
            .map_err(|e| {
                warn!("Renderer could not be run: {}", e);
                DocsError::RenderFailed {
                    exit_code: None,
                    stderr: e.to_string(),
                }
            })?;

        debug!(
            exit_code = ?result.exit_code,
            stdout = %result.stdout,
            stderr = %result.stderr,
            "Renderer finished"
        );

        if !result.success() {
            return Err(DocsError::RenderFailed {
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        info!(document = document_type.slug(), pdf = %output.display(), "PDF rendered");

        Ok(output)
    }
}

/// Fail with every absent file name, in checklist order.
fn check_assets(dir: &Path, required: &[&str]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !dir.join(name).is_file())
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DocsError::MissingTemplateAssets {
            dir: dir.to_path_buf(),
            missing,
        })
    }
}

fn check_payload(payload_path: &Path) -> Result<()> {
    if payload_path.is_file() {
        return Ok(());
    }

    let dir = payload_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let name = payload_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| payload_path.display().to_string());

    Err(DocsError::MissingTemplateAssets {
        dir,
        missing: vec![name],
    })
}
