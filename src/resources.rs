use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};

use editpe::Image;

use crate::{
    command::{find_tool, run},
    error::{Error, Result},
    types::{AppInfo, Reporter},
};

/// Icons looked up in the app directory, in order of preference.
pub const ICON_CANDIDATES: &[&str] = &["build/icon.ico", "build/icon.png"];
const RCEDIT_NAMES: &[&str] = &["rcedit", "rcedit-x64", "rcedit-x86"];

pub fn find_icon(app_dir: &Path) -> Option<PathBuf> {
    ICON_CANDIDATES
        .iter()
        .map(|candidate| app_dir.join(candidate))
        .find(|path| path.is_file())
}

/// Set the main icon and the version strings of a Windows runtime binary.
/// Must run before anything is appended to the binary.
pub fn edit_resources(
    runtime: &Path, app_dir: &Path, info: &AppInfo, reporter: &dyn Reporter,
) -> Result<()> {
    if let Some(icon) = find_icon(app_dir) {
        reporter.step("Setting executable icon");
        set_icon(runtime, &icon)?;
    }
    match RCEDIT_NAMES.iter().find_map(|name| find_tool(name)) {
        Some(rcedit) => {
            reporter.step("Setting executable version info");
            let mut command = Command::new(rcedit);
            command.arg(runtime).args(version_arguments(info));
            run(command)?;
        }
        None => reporter.warning("rcedit not found, executable version info was not set"),
    }
    Ok(())
}

fn set_icon(runtime: &Path, icon: &Path) -> Result<()> {
    let failed = |message: String| Error::Resources {
        path: runtime.to_path_buf(),
        message,
    };
    let icon = icon
        .to_str()
        .ok_or_else(|| failed(format!("icon path {} is not valid unicode", icon.display())))?;
    let mut image = Image::parse_file(runtime).map_err(|e| failed(format!("{:?}", e)))?;
    let mut resources = image.resource_directory().cloned().unwrap_or_default();
    resources
        .set_main_icon_file(icon)
        .map_err(|e| failed(format!("{:?}", e)))?;
    image
        .set_resource_directory(resources)
        .map_err(|e| failed(format!("{:?}", e)))?;
    image
        .write_file(runtime)
        .map_err(|e| failed(format!("{:?}", e)))?;
    Ok(())
}

pub fn version_arguments(info: &AppInfo) -> Vec<OsString> {
    let strings = [
        ("FileDescription", &info.description),
        ("ProductName", &info.product_name),
        ("LegalCopyright", &info.copyright),
    ];
    let mut arguments = Vec::new();
    for (key, value) in strings {
        arguments.push("--set-version-string".into());
        arguments.push(key.into());
        arguments.push(value.into());
    }
    arguments.push("--set-file-version".into());
    arguments.push((&info.version).into());
    arguments.push("--set-product-version".into());
    arguments.push((&info.version).into());
    arguments
}
