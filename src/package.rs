//! The packaging pipeline.

use std::{
    fs::{canonicalize, copy, create_dir_all, read_dir, remove_dir_all, remove_file, rename},
    path::{Path, PathBuf},
};

use crate::{
    archive::{create_archive, unpacked_path, ArchiveOptions, ArchiveReport},
    bundle::RESOURCES_DIR,
    compose::compose,
    error::{Error, Result},
    filters::{FilterSet, UnpackRules},
    footer::write_footer,
    install::install_app,
    license::write_license_file,
    manifest::{read_app_info, Overrides},
    minify::{Condenser, Minifier},
    placeholder::patch_offset,
    platform::{Arch, FinishOptions, Platform},
    runtime::{runtime_file_name, RuntimeProvider},
    types::{AppInfo, Reporter},
};

/// Name of the intermediate archive inside the working directory.
pub const ARCHIVE_NAME: &str = "app.ear";
/// Prefix of the private working directory created inside the output directory.
pub const WORKDIR_PREFIX: &str = ".fusepe-";

pub struct PackageOptions<'a> {
    pub platform:        Platform,
    pub arch:            Arch,
    pub overrides:       Overrides,
    pub runtime:         &'a dyn RuntimeProvider,
    /// Takes precedence over the manifest's `engines.yode`.
    pub runtime_version: Option<String>,
    /// Used when minification is enabled, [`Condenser`] if unset.
    pub minifier:        Option<&'a dyn Minifier>,
    pub finish:          FinishOptions,
}

#[derive(Debug)]
pub struct Packaged {
    /// The executable, or the app bundle on macOS.
    pub artifact:       PathBuf,
    pub info:           AppInfo,
    pub archive:        ArchiveReport,
    pub offset_patched: bool,
}

fn clear_directory(dir: &Path) -> Result<()> {
    for entry in read_dir(dir).map_err(Error::io("read", dir))? {
        let path = entry.map_err(Error::io("read", dir))?.path();
        let result = if path.is_dir() && !path.is_symlink() {
            remove_dir_all(&path)
        } else {
            remove_file(&path)
        };
        result.map_err(Error::io("remove", &path))?;
    }
    Ok(())
}

/// Create `output_dir` or empty it, refusing directories that contain the app.
fn prepare_output_dir(output_dir: &Path, app_dir: &Path) -> Result<PathBuf> {
    if output_dir.exists() {
        let output_dir = canonicalize(output_dir).map_err(Error::io("resolve", output_dir))?;
        if app_dir.starts_with(&output_dir) {
            return Err(Error::OutputContainsApp(output_dir));
        }
        clear_directory(&output_dir)?;
        Ok(output_dir)
    } else {
        create_dir_all(output_dir).map_err(Error::io("create", output_dir))?;
        canonicalize(output_dir).map_err(Error::io("resolve", output_dir))
    }
}

fn move_unpacked(archive: &Path, output_dir: &Path) -> Result<()> {
    let unpacked = unpacked_path(archive);
    if !unpacked.is_dir() {
        return Ok(());
    }
    let res = output_dir.join(RESOURCES_DIR);
    if res.exists() {
        let _ = remove_dir_all(&res);
    }
    rename(&unpacked, &res).map_err(Error::io("move", &unpacked))
}

/// Package the app in `app_dir` into `output_dir`.
///
/// Configuration problems (manifest, runtime binary, patterns) are reported
/// before `output_dir` is touched. Intermediate files live in a private
/// directory inside `output_dir` that is removed on every exit path.
pub fn package_app(
    output_dir: &Path, app_dir: &Path, options: &PackageOptions, reporter: &dyn Reporter,
) -> Result<Packaged> {
    let app_dir = canonicalize(app_dir).map_err(Error::io("resolve", app_dir))?;
    let info = read_app_info(&app_dir, &options.overrides)?;
    let platform = options.platform;
    let version = options
        .runtime_version
        .as_deref()
        .or(info.runtime_version.as_deref());
    let runtime = options.runtime.resolve(version, platform, options.arch)?;
    let mut filters = FilterSet::new(&info.ignore)?;
    let unpack = UnpackRules::new(info.unpack.as_deref(), info.unpack_dir.as_deref())?;
    let minifier = match info.minify {
        true => Some(options.minifier.unwrap_or(&Condenser)),
        false => None,
    };

    let output_dir = prepare_output_dir(output_dir, &app_dir)?;
    filters.exclude_directory(&app_dir, &output_dir)?;
    let workdir = tempfile::Builder::new()
        .prefix(WORKDIR_PREFIX)
        .tempdir_in(&output_dir)
        .map_err(Error::io("create working directory in", &output_dir))?;
    let archive = workdir.path().join(ARCHIVE_NAME);
    let staged_runtime = workdir.path().join(runtime_file_name(platform));

    reporter.step("Creating archive");
    let archive_options = ArchiveOptions {
        filters: &filters,
        unpack: &unpack,
        minifier,
    };
    let (report, copied) = rayon::join(
        || -> Result<ArchiveReport> {
            let report = create_archive(&app_dir, &archive, &archive_options, reporter)?;
            write_footer(&archive)?;
            Ok(report)
        },
        || copy(&runtime, &staged_runtime).map_err(Error::io("copy", &runtime)),
    );
    let report = report?;
    copied?;

    platform.prepare_runtime(&staged_runtime, &app_dir, &info, reporter)?;
    let offset_patched = patch_offset(&staged_runtime)?;
    if !offset_patched {
        reporter.warning("runtime has no offset placeholder, archive will be located from the footer");
    }

    reporter.step("Composing executable");
    let target = output_dir.join(platform.executable_name(&info.name));
    compose(&target, &staged_runtime, &archive)?;
    platform.finish_executable(&target, reporter)?;

    reporter.step("Collecting licenses");
    let (license, moved) = rayon::join(
        || write_license_file(&output_dir, &app_dir),
        || move_unpacked(&archive, &output_dir),
    );
    license?;
    moved?;
    let _ = workdir.close();

    let artifact = platform.wrap(&target, &app_dir, &output_dir, &info, options.finish, reporter)?;
    Ok(Packaged {
        artifact,
        info,
        archive: report,
        offset_patched,
    })
}

/// Package a fresh copy of the app that only has its production
/// dependencies installed.
pub fn package_clean_app(
    output_dir: &Path, app_dir: &Path, options: &PackageOptions, reporter: &dyn Reporter,
) -> Result<Packaged> {
    let staged = install_app(app_dir, options.platform, options.arch, reporter)?;
    package_app(output_dir, staged.path(), options, reporter)
}
