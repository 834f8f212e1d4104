//! Materializes a copy of the app with only its production dependencies.

use std::{
    fs::{remove_file, File},
    io::BufReader,
    path::{Path, PathBuf},
    process::Command,
};

use flate2::read::GzDecoder;
use tempfile::TempDir;

use crate::{
    command::{find_tool, run},
    error::{Error, Result},
    platform::{Arch, Platform},
    types::Reporter,
};

/// Directory npm packs the app into inside the tarball.
pub const PACKAGE_DIR: &str = "package";

/// A fresh copy of the app, removed when dropped.
pub struct StagedApp {
    dir:     TempDir,
    package: PathBuf,
}
impl StagedApp {
    pub fn path(&self) -> &Path { &self.package }

    /// Keep the staging directory on disk, returning the app's location.
    pub fn keep(self) -> PathBuf {
        let _ = self.dir.keep();
        self.package
    }
}

fn npm() -> PathBuf { find_tool("npm").unwrap_or_else(|| PathBuf::from("npm")) }

/// Unpack a gzipped tarball into `into`.
pub fn extract_tarball(tarball: &Path, into: &Path) -> Result<()> {
    let file = File::open(tarball).map_err(Error::io("open", tarball))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(into).map_err(Error::io("extract", tarball))
}

/// Name of the tarball `npm pack` reports as the last line of its output.
pub fn packed_tarball(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

/// Pack `app_dir` with npm, unpack it into a private staging directory and
/// install its production dependencies for the target.
///
/// When the installation fails the staging directory is left on disk and
/// its path is part of the error.
pub fn install_app(
    app_dir: &Path, platform: Platform, arch: Arch, reporter: &dyn Reporter,
) -> Result<StagedApp> {
    reporter.step("Packing app");
    let mut pack = Command::new(npm());
    pack.arg("pack").current_dir(app_dir);
    let output = run(pack)?;
    let tarball = packed_tarball(&output.stdout)
        .map(|name| app_dir.join(name))
        .ok_or_else(|| Error::Install {
            staged: app_dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })?;

    let dir = tempfile::Builder::new()
        .prefix("fusepe-")
        .tempdir()
        .map_err(Error::io("create", std::env::temp_dir()))?;
    let extracted = extract_tarball(&tarball, dir.path());
    let _ = remove_file(&tarball);
    extracted?;
    let staged = StagedApp {
        package: dir.path().join(PACKAGE_DIR),
        dir,
    };

    reporter.step("Installing production dependencies");
    let mut install = Command::new(npm());
    install
        .args(["install", "--production"])
        .current_dir(staged.path())
        .env("npm_config_platform", platform.node_name())
        .env("npm_config_arch", arch.node_name());
    match run(install) {
        Ok(_) => Ok(staged),
        Err(Error::Command { stderr, .. }) => Err(Error::Install {
            staged: staged.keep(),
            stderr,
        }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};

    use super::*;

    #[test]
    fn reads_tarball_name_from_last_line() {
        assert_eq!(
            packed_tarball(b"npm notice Tarball Contents\nnpm notice 1kB index.js\nnotes-1.0.0.tgz\n"),
            Some("notes-1.0.0.tgz".to_string())
        );
        assert_eq!(packed_tarball(b"\n  \n"), None);
    }

    #[test]
    fn extracts_packed_app() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("notes-1.0.0.tgz");
        {
            let encoder = GzEncoder::new(File::create(&tarball).unwrap(), Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let contents = b"console.log('hi')";
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "package/index.js", &contents[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        let into = dir.path().join("staging");
        std::fs::create_dir(&into).unwrap();
        extract_tarball(&tarball, &into).unwrap();
        assert_eq!(
            std::fs::read(into.join(PACKAGE_DIR).join("index.js")).unwrap(),
            b"console.log('hi')"
        );
    }

    #[test]
    fn kept_staging_directory_survives() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedApp {
            package: dir.path().join(PACKAGE_DIR),
            dir,
        };
        let package = staged.keep();
        let root = package.parent().unwrap().to_path_buf();
        assert!(root.is_dir());
        std::fs::remove_dir_all(root).unwrap();
    }
}
