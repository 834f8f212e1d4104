use std::{fs::read, path::Path};

use chrono::{Datelike, Local};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    types::AppInfo,
};

pub const MANIFEST_NAME: &str = "package.json";

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BuildConfig {
    product_name:     Option<String>,
    app_id:           Option<String>,
    copyright:        Option<String>,
    unpack:           Option<String>,
    unpack_dir:       Option<String>,
    minify:           Option<bool>,
    #[serde(default)]
    ignore:           Vec<String>,
    extra_info_plist: Option<String>,
}

#[derive(Deserialize, Default)]
struct Engines {
    yode: Option<String>,
}

#[derive(Deserialize)]
struct PackageJson {
    name:        Option<String>,
    version:     Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    build:       BuildConfig,
    #[serde(default)]
    engines:     Engines,
}

/// Settings given on the command line that take precedence over the manifest.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub minify:     Option<bool>,
    pub unpack:     Option<String>,
    pub unpack_dir: Option<String>,
    pub ignore:     Vec<String>,
}

/// Read `package.json` in `app_dir` and derive the app information.
pub fn read_app_info(app_dir: &Path, overrides: &Overrides) -> Result<AppInfo> {
    let path = app_dir.join(MANIFEST_NAME);
    let data = read(&path).map_err(Error::io("read manifest", &path))?;
    parse_app_info(&data, overrides).map_err(|reason| Error::Manifest { path, reason })
}

pub fn parse_app_info(data: &[u8], overrides: &Overrides) -> Result<AppInfo, String> {
    let manifest: PackageJson = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    let name = manifest
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or("missing \"name\"")?;
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("\"{}\" can't be used as a file name", name));
    }
    let version = manifest
        .version
        .filter(|version| !version.trim().is_empty())
        .ok_or("missing \"version\"")?;
    let build = manifest.build;
    let product_name = build.product_name.unwrap_or_else(|| product_name(&name));
    let app_id = build.app_id.unwrap_or_else(|| format!("com.{}.{}", name, name));
    let copyright = build
        .copyright
        .unwrap_or_else(|| format!("Copyright © {} {}", current_year(), product_name));
    let mut ignore = build.ignore;
    ignore.extend(overrides.ignore.iter().cloned());
    Ok(AppInfo {
        description: manifest.description.unwrap_or_default(),
        product_name,
        app_id,
        copyright,
        unpack: overrides.unpack.clone().or(build.unpack),
        unpack_dir: overrides.unpack_dir.clone().or(build.unpack_dir),
        minify: overrides.minify.or(build.minify).unwrap_or(false),
        ignore,
        extra_info_plist: build.extra_info_plist,
        runtime_version: manifest.engines.yode,
        name,
        version,
    })
}

/// Capitalize each word of a package name and turn `-`/`_` into spaces.
pub fn product_name(name: &str) -> String {
    let mut previous_is_word = false;
    name.chars()
        .map(|c| {
            let is_word = c.is_alphanumeric() || c == '_';
            let c = if is_word && !previous_is_word {
                c.to_ascii_uppercase()
            } else {
                c
            };
            previous_is_word = is_word;
            match c {
                '-' | '_' => ' ',
                c => c,
            }
        })
        .collect()
}

fn current_year() -> i32 { Local::now().year() }
