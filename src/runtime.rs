use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    platform::{Arch, Platform},
    types::RUNTIME_NAME,
};

/// Supplies the prebuilt runtime binary for a target.
pub trait RuntimeProvider: Sync {
    fn resolve(&self, version: Option<&str>, platform: Platform, arch: Arch) -> Result<PathBuf>;
}

/// A runtime binary at a fixed path, whatever the target.
pub struct ExplicitRuntime(pub PathBuf);

impl RuntimeProvider for ExplicitRuntime {
    fn resolve(&self, _: Option<&str>, _: Platform, _: Arch) -> Result<PathBuf> {
        if self.0.is_file() {
            Ok(self.0.clone())
        } else {
            Err(Error::MissingRuntime(self.0.clone()))
        }
    }
}

/// Runtime binaries previously unpacked into a cache directory, laid out as
/// `<cache>/yode-<version>-<platform>-<arch>/yode[.exe]`.
pub struct CachedRuntime {
    pub cache_dir: PathBuf,
}

impl CachedRuntime {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        CachedRuntime {
            cache_dir: cache_dir.into(),
        }
    }
}

impl RuntimeProvider for CachedRuntime {
    fn resolve(&self, version: Option<&str>, platform: Platform, arch: Arch) -> Result<PathBuf> {
        let version = version.ok_or(Error::MissingRuntimeVersion)?;
        let path = cache_entry(&self.cache_dir, version, platform, arch);
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::MissingRuntime(path))
        }
    }
}

pub fn runtime_file_name(platform: Platform) -> String { platform.executable_name(RUNTIME_NAME) }

/// Versions are tagged `v<semver>`; a bare version gets the prefix added.
pub fn version_tag(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

pub fn cache_entry(cache_dir: &Path, version: &str, platform: Platform, arch: Arch) -> PathBuf {
    cache_dir
        .join(format!("{}-{}-{}-{}", RUNTIME_NAME, version_tag(version), platform, arch))
        .join(runtime_file_name(platform))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_layout() {
        assert_eq!(
            cache_entry(Path::new("cache"), "0.11.2", Platform::Windows, Arch::X64),
            Path::new("cache").join("yode-v0.11.2-win32-x64").join("yode.exe")
        );
        assert_eq!(
            cache_entry(Path::new("cache"), "v0.11.2", Platform::MacOs, Arch::Arm64),
            Path::new("cache").join("yode-v0.11.2-darwin-arm64").join("yode")
        );
    }

    #[test]
    fn resolves_cached_binaries() {
        let cache = tempfile::tempdir().unwrap();
        let provider = CachedRuntime::new(cache.path());
        let expected = cache_entry(cache.path(), "1.0.0", Platform::Linux, Arch::X64);
        assert!(matches!(
            provider.resolve(Some("1.0.0"), Platform::Linux, Arch::X64),
            Err(Error::MissingRuntime(path)) if path == expected
        ));
        assert!(matches!(
            provider.resolve(None, Platform::Linux, Arch::X64),
            Err(Error::MissingRuntimeVersion)
        ));

        std::fs::create_dir_all(expected.parent().unwrap()).unwrap();
        std::fs::write(&expected, b"runtime").unwrap();
        assert_eq!(
            provider
                .resolve(Some("v1.0.0"), Platform::Linux, Arch::X64)
                .unwrap(),
            expected
        );
    }

    #[test]
    fn explicit_runtime_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ExplicitRuntime(dir.path().join("yode"));
        assert!(provider.resolve(None, Platform::Linux, Arch::X64).is_err());
        std::fs::write(dir.path().join("yode"), b"runtime").unwrap();
        assert_eq!(
            provider.resolve(None, Platform::Linux, Arch::X64).unwrap(),
            dir.path().join("yode")
        );
    }
}
