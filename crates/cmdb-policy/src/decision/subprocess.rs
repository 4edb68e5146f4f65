//! Oracle adapter that runs the configured checker executable.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{parse_response, DecisionOracle, DecisionRequest, DecisionResponse};
use crate::config::{ChangeManagementConfig, ConfigError};
use crate::error::ChangeError;

/// Runs `<executable> <extra args...> --metadata <json>` and reads the
/// verdict from standard output.
#[derive(Debug, Clone)]
pub struct SubprocessOracle {
    executable: String,
    extra_args: Vec<String>,
}

impl SubprocessOracle {
    /// Creates an oracle running `executable` with `extra_args`.
    pub fn new(executable: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            extra_args,
        }
    }

    /// Builds the oracle from configuration, splitting `extra_options`.
    pub fn from_config(config: &ChangeManagementConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.executable.clone(), config.extra_args()?))
    }

    /// Full command line used for one request.
    pub fn command_line(&self, request: &DecisionRequest) -> Result<Vec<String>, ChangeError> {
        let mut cmd = Vec::with_capacity(self.extra_args.len() + 3);
        cmd.push(self.executable.clone());
        cmd.extend(self.extra_args.iter().cloned());
        cmd.push("--metadata".to_string());
        cmd.push(request.to_metadata()?);
        Ok(cmd)
    }
}

#[async_trait]
impl DecisionOracle for SubprocessOracle {
    fn name(&self) -> &str {
        &self.executable
    }

    fn args(&self) -> &[String] {
        &self.extra_args
    }

    #[instrument(skip(self, request), fields(executable = %self.executable, command = %request.command))]
    async fn submit(&self, request: &DecisionRequest) -> Result<DecisionResponse, ChangeError> {
        let metadata = request.to_metadata()?;
        debug!(metadata = %metadata, "Invoking change management oracle");

        let output = Command::new(&self.executable)
            .args(&self.extra_args)
            .arg("--metadata")
            .arg(&metadata)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ChangeError::OracleInvocation(format!("failed to run {}: {}", self.executable, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChangeError::OracleInvocation(format!(
                "{} exited with {}: {}",
                self.executable,
                output.status,
                stderr.trim()
            )));
        }

        parse_response(&output.stdout)
    }
}
