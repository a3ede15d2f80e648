//! External image tools: introspection (`identify`) and transform (`convert`).

use async_trait::async_trait;
use pictura_core::{DerivativeSpec, PipelineConfig};
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} produced output that is not UTF-8")]
    InvalidOutput { program: String },
}

#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Produce a textual report describing a local image.
    async fn identify(&self, source: &Path) -> Result<String, ToolError>;

    /// Write a derivative of `source` to `output`, bounded by `spec`.
    async fn transform(
        &self,
        source: &Path,
        output: &Path,
        spec: &DerivativeSpec,
    ) -> Result<(), ToolError>;
}

/// ImageMagick command-line tools.
pub struct ImageMagick {
    identify_path: String,
    convert_path: String,
}

impl ImageMagick {
    pub fn new(identify_path: impl Into<String>, convert_path: impl Into<String>) -> Self {
        Self {
            identify_path: identify_path.into(),
            convert_path: convert_path.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.identify_path.clone(), config.convert_path.clone())
    }

    fn command(program: &str) -> Command {
        let mut command = Command::new(program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(program: &str, mut command: Command) -> Result<Vec<u8>, ToolError> {
        let output = command.output().await.map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(program, status = %output.status, stderr = %stderr, "Image tool failed");
            return Err(ToolError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ImageTool for ImageMagick {
    #[tracing::instrument(skip(self), fields(tool = "identify"))]
    async fn identify(&self, source: &Path) -> Result<String, ToolError> {
        let mut command = Self::command(&self.identify_path);
        command.arg("-verbose").arg(source);

        let stdout = Self::run(&self.identify_path, command).await?;
        String::from_utf8(stdout).map_err(|_| ToolError::InvalidOutput {
            program: self.identify_path.clone(),
        })
    }

    #[tracing::instrument(skip(self, spec), fields(tool = "convert", repro = spec.name))]
    async fn transform(
        &self,
        source: &Path,
        output: &Path,
        spec: &DerivativeSpec,
    ) -> Result<(), ToolError> {
        let mut command = Self::command(&self.convert_path);
        command
            .arg(source)
            .arg(spec.resize_mode.as_flag())
            .arg(spec.geometry())
            .arg(output);

        Self::run(&self.convert_path, command).await?;
        Ok(())
    }
}
