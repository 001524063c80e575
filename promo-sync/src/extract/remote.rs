//! Copying the planning spreadsheet out of remote storage
//!
//! The copy itself is delegated to rclone; [`RemoteCopy`] is the seam that
//! lets tests replace the subprocess.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::RemoteConfig;

/// Exit status and captured output of a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CopyOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait RemoteCopy: Send + Sync {
    /// Copy `remote:path` to `destination`, overwriting it.
    ///
    /// `Err` means the copy could not be attempted at all; a copy that ran
    /// and failed is reported through [`CopyOutput::status`].
    async fn copy_to(
        &self,
        source: &RemoteConfig,
        destination: &Path,
    ) -> std::io::Result<CopyOutput>;
}

/// Runs `rclone copyto`
#[derive(Debug, Clone)]
pub struct Rclone {
    program: PathBuf,
    config: Option<PathBuf>,
}

impl Rclone {
    pub fn new(program: impl Into<PathBuf>, config: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self::new(remote.rclone.clone(), remote.rclone_config.clone())
    }

    fn args(&self, source: &RemoteConfig, destination: &Path) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(config) = &self.config {
            args.push(OsString::from("--config"));
            args.push(config.clone().into_os_string());
        }
        args.push(OsString::from("copyto"));
        args.push(OsString::from(source.source_ref()));
        args.push(destination.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl RemoteCopy for Rclone {
    async fn copy_to(
        &self,
        source: &RemoteConfig,
        destination: &Path,
    ) -> std::io::Result<CopyOutput> {
        let args = self.args(source, destination);
        log::debug!("Running {} {:?}", self.program.display(), args);

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await?;

        Ok(CopyOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Test double that copies a local fixture instead of calling rclone
#[derive(Clone, Default)]
pub struct MockRemoteCopy {
    fixture: Option<PathBuf>,
    failure: Option<CopyOutput>,
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl MockRemoteCopy {
    /// Serve `fixture` as the remote file
    pub fn serving(fixture: impl Into<PathBuf>) -> Self {
        Self {
            fixture: Some(fixture.into()),
            ..Self::default()
        }
    }

    /// Fail every copy with the given status and output
    pub fn failing(status: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            failure: Some(CopyOutput {
                status,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
            ..Self::default()
        }
    }

    /// `(source ref, destination)` of every copy requested so far
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteCopy for MockRemoteCopy {
    async fn copy_to(
        &self,
        source: &RemoteConfig,
        destination: &Path,
    ) -> std::io::Result<CopyOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((source.source_ref(), destination.to_path_buf()));
        }

        if let Some(failure) = &self.failure {
            return Ok(failure.clone());
        }

        if let Some(fixture) = &self.fixture {
            tokio::fs::copy(fixture, destination).await?;
        }

        Ok(CopyOutput {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rclone_args_without_config() {
        let rclone = Rclone::new("rclone", None);
        let args = rclone.args(&RemoteConfig::default(), Path::new("/tmp/promo.xlsx"));
        assert_eq!(
            args,
            vec![
                OsString::from("copyto"),
                OsString::from("Prod:Promo/Retroplanning Promo Yannis.xlsx"),
                OsString::from("/tmp/promo.xlsx"),
            ]
        );
    }

    #[test]
    fn test_rclone_args_with_config() {
        let remote = RemoteConfig {
            rclone_config: Some(PathBuf::from("/etc/rclone/rclone.conf")),
            ..RemoteConfig::default()
        };
        let args = Rclone::from_config(&remote).args(&remote, Path::new("out.xlsx"));
        assert_eq!(args[0], OsString::from("--config"));
        assert_eq!(args[1], OsString::from("/etc/rclone/rclone.conf"));
        assert_eq!(args[2], OsString::from("copyto"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rclone_reports_exit_status() {
        // `false` ignores its arguments and exits with 1
        let rclone = Rclone::new("false", None);
        let output = rclone
            .copy_to(&RemoteConfig::default(), Path::new("/nonexistent/out.xlsx"))
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.status, 1);
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let rclone = Rclone::new("/nonexistent/bin/rclone", None);
        let result = rclone
            .copy_to(&RemoteConfig::default(), Path::new("out.xlsx"))
            .await;
        assert!(result.is_err());
    }
}
