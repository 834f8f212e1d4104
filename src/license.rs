//! Collects the license texts of an app and its installed dependencies.

use std::{
    collections::BTreeMap,
    fs::{read, read_to_string, write},
    path::{Path, PathBuf},
};

use jwalk::WalkDir;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    manifest::MANIFEST_NAME,
};

pub const LICENSE_FILE: &str = "LICENSE";
const LICENSE_PREFIXES: &[&str] = &["license", "licence", "copying"];
const SEPARATOR_WIDTH: usize = 70;

#[derive(Deserialize)]
#[serde(untagged)]
enum Author {
    Text(String),
    Details {
        name:  Option<String>,
        email: Option<String>,
        url:   Option<String>,
    },
}

#[derive(Deserialize)]
struct PackageManifest {
    name:    Option<String>,
    version: Option<String>,
    author:  Option<Author>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PackageLicense {
    pub publisher: Option<String>,
    pub email:     Option<String>,
    pub url:       Option<String>,
    pub file:      PathBuf,
}

/// Split `Name <email> (url)` into its parts.
fn parse_author(author: &str) -> (Option<String>, Option<String>, Option<String>) {
    let delimited = |open: char, close: char| {
        let start = author.find(open)?;
        let end = author[start..].find(close)? + start;
        Some(author[start + 1..end].trim().to_string()).filter(|s| !s.is_empty())
    };
    let name = author
        .split(['<', '('])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (name, delimited('<', '>'), delimited('(', ')'))
}

const NODE_MODULES: &str = "node_modules";

fn named(path: Option<&Path>, name: &str) -> bool {
    path.and_then(Path::file_name).map(|n| n == name).unwrap_or(false)
}

fn is_license_name(name: &str) -> bool {
    let name = name.to_lowercase();
    LICENSE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn is_scope_dir(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.starts_with('@') && named(path.parent(), NODE_MODULES)
}

/// A package installed into `node_modules`, directly or below an `@scope`.
fn is_dependency_dir(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if name.starts_with('.') || name.starts_with('@') {
        return false;
    }
    let parent = path.parent();
    named(parent, NODE_MODULES) || parent.map(is_scope_dir).unwrap_or(false)
}

fn read_package(dir: &Path, file: PathBuf) -> Option<(String, PackageLicense)> {
    let data = read(dir.join(MANIFEST_NAME)).ok()?;
    let manifest = serde_json::from_slice::<PackageManifest>(&data).ok()?;
    let key = format!("{}@{}", manifest.name?, manifest.version.unwrap_or_default());
    let (publisher, email, url) = match manifest.author {
        Some(Author::Text(author)) => parse_author(&author),
        Some(Author::Details { name, email, url }) => (name, email, url),
        None => (None, None, None),
    };
    Some((key, PackageLicense {
        publisher,
        email,
        url,
        file,
    }))
}

/// Every package under `app_dir`, including the app itself, that ships a
/// license file, keyed by `name@version`.
pub fn collect_licenses(app_dir: &Path) -> BTreeMap<String, PackageLicense> {
    let walk = WalkDir::new(app_dir)
        .skip_hidden(false)
        .sort(true)
        .process_read_dir(|depth, _, _, children| {
            if depth.is_none() {
                return;
            }
            for child in children.iter_mut().flatten() {
                if !child.file_type().is_dir() {
                    continue;
                }
                let path = child.path();
                let keep = child.file_name() == NODE_MODULES
                    || is_scope_dir(&path)
                    || is_dependency_dir(&path);
                if !keep {
                    child.read_children_path = None;
                }
            }
        });

    let mut packages = vec![app_dir.to_path_buf()];
    let mut license_files = BTreeMap::<PathBuf, PathBuf>::new();
    for entry in walk.into_iter().filter_map(|entry| entry.ok()) {
        if entry.depth == 0 {
            continue;
        }
        let path = entry.path();
        if entry.file_type().is_dir() {
            if is_dependency_dir(&path) {
                packages.push(path);
            }
        } else if entry.file_type().is_file() && is_license_name(&entry.file_name().to_string_lossy()) {
            license_files.entry(entry.parent_path().to_path_buf()).or_insert(path);
        }
    }

    let mut found = BTreeMap::new();
    for dir in packages {
        if let Some(file) = license_files.remove(&dir) {
            if let Some((key, license)) = read_package(&dir, file) {
                found.entry(key).or_insert(license);
            }
        }
    }
    found
}

pub fn render_licenses(licenses: &BTreeMap<String, PackageLicense>) -> Result<String> {
    let mut text = String::new();
    for (package, license) in licenses {
        text.push_str(package);
        text.push('\n');
        for field in [&license.publisher, &license.email, &license.url]
            .into_iter()
            .flatten()
        {
            text.push_str(field);
            text.push('\n');
        }
        let content = read_to_string(&license.file).map_err(Error::io("read", &license.file))?;
        text.push('\n');
        text.push_str(&content.replace("\r\n", "\n"));
        text.push('\n');
        text.push_str(&"-".repeat(SEPARATOR_WIDTH));
        text.push_str("\n\n");
    }
    Ok(text)
}

/// Write the aggregated license texts of `app_dir` to `<output_dir>/LICENSE`.
pub fn write_license_file(output_dir: &Path, app_dir: &Path) -> Result<PathBuf> {
    let text = render_licenses(&collect_licenses(app_dir))?;
    let path = output_dir.join(LICENSE_FILE);
    write(&path, text).map_err(Error::io("write", &path))?;
    Ok(path)
}
