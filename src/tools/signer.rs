use crate::di::Signer;
use async_trait::async_trait;
use bundlesmith_core::{BundleError, BundleResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Detached DER signatures via `openssl smime`
#[derive(Debug, Clone)]
pub struct OpensslSigner {
    certificate: PathBuf,
    private_key: PathBuf,
    program: PathBuf,
}

impl OpensslSigner {
    pub fn new(certificate: impl Into<PathBuf>, private_key: impl Into<PathBuf>) -> Self {
        Self {
            certificate: certificate.into(),
            private_key: private_key.into(),
            program: PathBuf::from("openssl"),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl Signer for OpensslSigner {
    async fn sign(&self, document: &Path) -> BundleResult<Vec<u8>> {
        for (what, path) in [("certificate", &self.certificate), ("private key", &self.private_key)] {
            if !path.is_file() {
                return Err(BundleError::Sign(format!(
                    "Signing {} not found: {}",
                    what,
                    path.display()
                )));
            }
        }

        let output = Command::new(&self.program)
            .args(["smime", "-sign", "-binary", "-in"])
            .arg(document)
            .arg("-signer")
            .arg(&self.certificate)
            .arg("-inkey")
            .arg(&self.private_key)
            .args(["-outform", "DER"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| BundleError::Sign(format!("Failed to run {}: {}", self.program.display(), e)))?;

        if !output.status.success() {
            return Err(BundleError::Sign(format!(
                "Signing {} failed: {}",
                document.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(BundleError::Sign(format!(
                "Signer produced an empty signature for {}",
                document.display()
            )));
        }

        Ok(output.stdout)
    }

    fn certificate(&self) -> Option<&Path> {
        Some(&self.certificate)
    }
}
