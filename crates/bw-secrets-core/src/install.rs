//! Makes sure the Bitwarden CLI is available.
//!
//! [`Installer::ensure`] tries each [`InstallMethod`] in order and stops at the first one that
//! leaves a usable `bw` behind. Nothing is retried within a step.

use std::{
    fmt,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    process::{CommandRunner, Invocation, find_in_path},
    vault::BW_BINARY,
};

/// Bitwarden CLI release fetched by the direct download step.
pub const PINNED_VERSION: &str = "2025.2.0";

/// Directory the direct download step installs into.
pub const DEFAULT_INSTALL_DIR: &str = "/usr/local/bin";

const RELEASE_BASE_URL: &str = "https://github.com/bitwarden/clients/releases/download";
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// How `bw` ended up available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    /// It was already resolvable; nothing was installed.
    AlreadyPresent,
    /// Installed with the primary package manager (npm).
    PrimaryPackageManager,
    /// Installed with the platform package manager (Homebrew or snap).
    SecondaryPackageManager,
    /// Downloaded from the pinned release.
    DirectDownload,
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallMethod::AlreadyPresent => "already installed",
            InstallMethod::PrimaryPackageManager => "installed with npm",
            InstallMethod::SecondaryPackageManager => "installed with the system package manager",
            InstallMethod::DirectDownload => "installed from the release archive",
        })
    }
}

/// Result of a successful [`Installer::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    #[allow(missing_docs)]
    pub method: InstallMethod,
    /// Location of the `bw` executable.
    pub path: PathBuf,
}

/// Release archive holding the `bw` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseArchive {
    /// Where the zip archive is downloaded from
    pub url: String,
    /// Name of the executable inside the archive
    pub entry: String,
}

impl ReleaseArchive {
    #[allow(missing_docs)]
    pub fn new(url: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            entry: entry.into(),
        }
    }

    /// Pinned archive for the host platform, if Bitwarden publishes one.
    pub fn pinned() -> Option<Self> {
        Self::pinned_for(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn pinned_for(os: &str, arch: &str) -> Option<Self> {
        let (platform, entry) = match (os, arch) {
            ("linux", "x86_64") => ("linux", BW_BINARY.to_owned()),
            ("macos", "x86_64") => ("macos", BW_BINARY.to_owned()),
            ("macos", "aarch64") => ("macos-arm64", BW_BINARY.to_owned()),
            ("windows", "x86_64") => ("windows", format!("{BW_BINARY}.exe")),
            _ => return None,
        };
        Some(Self::new(
            format!("{RELEASE_BASE_URL}/cli-v{PINNED_VERSION}/bw-{platform}-{PINNED_VERSION}.zip"),
            entry,
        ))
    }
}

struct PackageManager {
    program: &'static str,
    args: &'static [&'static str],
}

const NPM: PackageManager = PackageManager {
    program: "npm",
    args: &["install", "-g", "@bitwarden/cli"],
};

#[cfg(target_os = "macos")]
const SYSTEM_PACKAGE_MANAGER: PackageManager = PackageManager {
    program: "brew",
    args: &["install", "bitwarden-cli"],
};

#[cfg(not(target_os = "macos"))]
const SYSTEM_PACKAGE_MANAGER: PackageManager = PackageManager {
    program: "snap",
    args: &["install", "bw"],
};

/// Why the direct download step did not produce a binary.
enum DownloadError {
    /// A prerequisite of the step is absent; the step could not start.
    Prerequisite(String),
    /// The step ran and failed.
    Failed(String),
}

/// Ensures the `bw` executable is present.
pub struct Installer<R> {
    runner: R,
    install_dir: PathBuf,
    release: Option<ReleaseArchive>,
    staging_root: Option<PathBuf>,
    https_only: bool,
}

impl<R: CommandRunner> Installer<R> {
    /// Installer using the pinned release and [`DEFAULT_INSTALL_DIR`].
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            install_dir: PathBuf::from(DEFAULT_INSTALL_DIR),
            release: ReleaseArchive::pinned(),
            staging_root: None,
            https_only: true,
        }
    }

    /// Install into `dir` instead of [`DEFAULT_INSTALL_DIR`].
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = dir.into();
        self
    }

    /// Download from `release` instead of the pinned archive.
    pub fn with_release(mut self, release: Option<ReleaseArchive>) -> Self {
        self.release = release;
        self
    }

    /// Create the download staging directory under `dir` instead of the system temp directory.
    pub fn with_staging_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(dir.into());
        self
    }

    /// Allow plain HTTP downloads, for local mirrors.
    pub fn with_https_only(mut self, https_only: bool) -> Self {
        self.https_only = https_only;
        self
    }

    /// Location of an existing `bw`, without installing anything.
    pub fn locate(&self) -> Option<PathBuf> {
        self.runner
            .resolve(BW_BINARY)
            .or_else(|| find_in_path(BW_BINARY, Some(self.install_dir.as_os_str())))
    }

    /// Make sure `bw` is installed, installing it if needed.
    pub async fn ensure(&self) -> Result<Installed> {
        if let Some(path) = self.locate() {
            debug!("Found {BW_BINARY} at {}", path.display());
            return Ok(Installed {
                method: InstallMethod::AlreadyPresent,
                path,
            });
        }

        info!("{BW_BINARY} not found, installing");
        let mut attempts = Vec::new();

        for (method, manager) in [
            (InstallMethod::PrimaryPackageManager, &NPM),
            (InstallMethod::SecondaryPackageManager, &SYSTEM_PACKAGE_MANAGER),
        ] {
            match self.install_with(manager).await {
                Ok(path) => {
                    info!("Installed {BW_BINARY} with {}", manager.program);
                    return Ok(Installed { method, path });
                }
                Err(reason) => {
                    warn!("Installing with {} failed: {reason}", manager.program);
                    attempts.push(format!("{}: {reason}", manager.program));
                }
            }
        }

        match self.install_from_release().await {
            Ok(path) => {
                info!("Installed {BW_BINARY} to {}", path.display());
                Ok(Installed {
                    method: InstallMethod::DirectDownload,
                    path,
                })
            }
            Err(DownloadError::Prerequisite(reason)) => Err(Error::InstallToolMissing(reason)),
            Err(DownloadError::Failed(reason)) => {
                attempts.push(format!("download: {reason}"));
                Err(Error::InstallFailed(attempts.join("; ")))
            }
        }
    }

    async fn install_with(&self, manager: &PackageManager) -> Result<PathBuf, String> {
        let program = self
            .runner
            .resolve(manager.program)
            .ok_or_else(|| "not available".to_owned())?;

        let output = self
            .runner
            .run(&Invocation::new(program).args(manager.args.iter().copied()))
            .await
            .map_err(|e| e.to_string())?;
        if !output.success {
            return Err(output.diagnostic());
        }

        self.locate()
            .ok_or_else(|| format!("finished but {BW_BINARY} is still not on PATH"))
    }

    async fn install_from_release(&self) -> Result<PathBuf, DownloadError> {
        let release = self.release.as_ref().ok_or_else(|| {
            DownloadError::Prerequisite(format!(
                "no Bitwarden CLI release archive for {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            ))
        })?;
        if !self.install_dir.is_dir() {
            return Err(DownloadError::Prerequisite(format!(
                "install directory {} does not exist",
                self.install_dir.display()
            )));
        }
        let http = reqwest::Client::builder()
            .https_only(self.https_only)
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| DownloadError::Prerequisite(format!("no HTTPS client available: {e}")))?;

        let failed = |e: &dyn fmt::Display| DownloadError::Failed(e.to_string());

        // Removed when dropped, on every path out of this function.
        let staging = match &self.staging_root {
            Some(root) => tempfile::Builder::new()
                .prefix("bw-secrets-")
                .tempdir_in(root),
            None => tempfile::Builder::new().prefix("bw-secrets-").tempdir(),
        }
        .map_err(|e| failed(&e))?;

        info!("Downloading {}", release.url);
        let response = http.get(&release.url).send().await.map_err(|e| failed(&e))?;
        if !response.status().is_success() {
            return Err(DownloadError::Failed(format!(
                "{} returned {}",
                release.url,
                response.status()
            )));
        }
        let archive = response.bytes().await.map_err(|e| failed(&e))?;

        let extracted = extract_entry(&archive, &release.entry, staging.path())
            .map_err(DownloadError::Failed)?;

        let destination = self.install_dir.join(&release.entry);
        tokio::fs::copy(&extracted, &destination)
            .await
            .map_err(|e| failed(&format!("cannot write {}: {e}", destination.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            tokio::fs::set_permissions(&destination, perms)
                .await
                .map_err(|e| failed(&e))?;
        }

        Ok(destination)
    }
}

/// Extract the file called `entry` from a zip archive into `dir`.
fn extract_entry(data: &[u8], entry: &str, dir: &Path) -> Result<PathBuf, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| format!("invalid archive: {e}"))?;

    let index = (0..archive.len())
        .find(|&i| {
            archive
                .by_index(i)
                .map(|file| !file.is_dir() && file.name().rsplit('/').next() == Some(entry))
                .unwrap_or(false)
        })
        .ok_or_else(|| format!("archive does not contain {entry}"))?;

    let mut file = archive
        .by_index(index)
        .map_err(|e| format!("failed to read archive entry: {e}"))?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| format!("failed to read archive entry: {e}"))?;

    let target = dir.join(entry);
    std::fs::write(&target, contents).map_err(|e| format!("failed to extract {entry}: {e}"))?;
    Ok(target)
}
