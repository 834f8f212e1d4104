use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    bundle::create_bundle,
    error::{Error, Result},
    macho::extend_string_table_size,
    resources::edit_resources,
    signing::{ad_hoc_sign, remove_signature},
    types::{AppInfo, Reporter},
};

/// Target operating system of a packaged app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
}

/// Target processor architecture of a packaged app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Ia32,
    Arm64,
    Arm,
}

/// Options for the steps that run after the executable is composed.
#[derive(Clone, Copy, Debug)]
pub struct FinishOptions {
    pub sign: bool,
}
impl Default for FinishOptions {
    fn default() -> Self { FinishOptions { sign: true } }
}

impl Platform {
    pub fn host() -> Option<Self> { std::env::consts::OS.parse().ok() }

    /// Name used by npm and in runtime archive names.
    pub fn node_name(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "win32",
            Platform::MacOs => "darwin",
        }
    }

    pub fn executable_suffix(self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }

    pub fn executable_name(self, name: &str) -> String { format!("{}{}", name, self.executable_suffix()) }

    /// Edit the staged runtime binary. Runs before the offset placeholder is
    /// patched and before anything is appended to the binary.
    pub fn prepare_runtime(
        self, runtime: &Path, app_dir: &Path, info: &AppInfo, reporter: &dyn Reporter,
    ) -> Result<()> {
        match self {
            Platform::Linux => Ok(()),
            Platform::Windows => edit_resources(runtime, app_dir, info, reporter),
            Platform::MacOs => remove_signature(runtime, reporter),
        }
    }

    /// Fix up the composed executable so its declared structure covers the
    /// appended archive.
    pub fn finish_executable(self, executable: &Path, reporter: &dyn Reporter) -> Result<()> {
        match self {
            Platform::MacOs => {
                let patch = extend_string_table_size(executable)?;
                if !patch.segment {
                    reporter.warning("no single __LINKEDIT segment found, executable may not be signable");
                }
                if !patch.symtab {
                    reporter.warning("no single symbol table found, executable may not be signable");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Produce the final artifact from the finished executable.
    pub fn wrap(
        self, executable: &Path, app_dir: &Path, output_dir: &Path, info: &AppInfo,
        options: FinishOptions, reporter: &dyn Reporter,
    ) -> Result<PathBuf> {
        match self {
            Platform::MacOs => {
                reporter.step("Creating app bundle");
                let bundle = create_bundle(executable, app_dir, output_dir, info)?;
                if options.sign {
                    reporter.step("Signing app bundle");
                    ad_hoc_sign(&bundle, reporter)?;
                }
                Ok(bundle)
            }
            _ => Ok(executable.to_path_buf()),
        }
    }
}
impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linux" => Ok(Platform::Linux),
            "win32" | "windows" => Ok(Platform::Windows),
            "darwin" | "macos" => Ok(Platform::MacOs),
            _ => Err(Error::UnsupportedPlatform(s.to_string())),
        }
    }
}
impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.node_name()) }
}

impl Arch {
    pub fn host() -> Option<Self> { std::env::consts::ARCH.parse().ok() }

    pub fn node_name(self) -> &'static str {
        match self {
            Arch::X64 => "x64",
            Arch::Ia32 => "ia32",
            Arch::Arm64 => "arm64",
            Arch::Arm => "arm",
        }
    }
}
impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x64" | "x86_64" => Ok(Arch::X64),
            "ia32" | "x86" => Ok(Arch::Ia32),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "arm" => Ok(Arch::Arm),
            _ => Err(Error::UnsupportedArch(s.to_string())),
        }
    }
}
impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.node_name()) }
}
