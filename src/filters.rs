use std::path::Path;

use glob::{MatchOptions, Pattern};
use path_slash::PathExt;

use crate::error::{Error, Result};

/// Build artifacts of the packer itself that must never be embedded.
pub const FIXED_FILTERS: &[&str] = &[
    "yode",
    "yode/**",
    "yode.exe",
    "**/.fusepe-*",
    "**/.fusepe-*/**",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
];

/// Common files that are of no use at run time.
pub const STOCK_FILTERS: &[&str] = &[
    "**/*.md",
    "**/*.markdown",
    "**/*.map",
    "**/*.ts",
    "**/*.tsbuildinfo",
    "**/.DS_Store",
    "**/Thumbs.db",
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    "**/.gitmodules",
    "**/.hg/**",
    "**/.svn/**",
    "**/.npmignore",
    "**/.npmrc",
    "**/.editorconfig",
    "**/.eslintrc",
    "**/.eslintrc.*",
    "**/.prettierrc",
    "**/.prettierrc.*",
    "**/.travis.yml",
    "**/appveyor.yml",
    "**/.github/**",
    "**/.vscode/**",
    "**/.idea/**",
    "**/*.swp",
    "**/*~",
    "**/test/**",
    "**/tests/**",
    "**/__tests__/**",
    "**/spec/**",
    "**/example/**",
    "**/examples/**",
    "**/node_modules/.bin/**",
];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive:              true,
    require_literal_separator:   true,
    require_literal_leading_dot: false,
};

pub fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|source| Error::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Exclusion patterns matched against slash-separated paths relative to the
/// source root.
#[derive(Clone, Debug)]
pub struct FilterSet {
    patterns: Vec<Pattern>,
}
impl FilterSet {
    /// Fixed and stock filters extended with `extra`.
    pub fn new<S: AsRef<str>>(extra: &[S]) -> Result<Self> {
        let patterns = FIXED_FILTERS
            .iter()
            .copied()
            .chain(STOCK_FILTERS.iter().copied())
            .chain(extra.iter().map(AsRef::as_ref))
            .map(compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(FilterSet { patterns })
    }

    /// Additionally exclude `directory` and everything below it, if it lies
    /// inside `root`.
    pub fn exclude_directory(&mut self, root: &Path, directory: &Path) -> Result<()> {
        let relative = match directory.strip_prefix(root) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative,
            _ => return Ok(()),
        };
        let relative = match relative.to_slash() {
            Some(relative) => relative.into_owned(),
            None => return Ok(()),
        };
        let escaped = Pattern::escape(&relative);
        self.patterns.push(compile(&escaped)?);
        self.patterns.push(compile(&format!("{}/**", escaped))?);
        Ok(())
    }

    pub fn is_excluded(&self, relative: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(relative, MATCH_OPTIONS))
    }
}

/// Which files are kept outside the archive.
#[derive(Clone, Debug, Default)]
pub struct UnpackRules {
    file:      Option<Pattern>,
    directory: Option<Pattern>,
}
impl UnpackRules {
    pub fn new(file: Option<&str>, directory: Option<&str>) -> Result<Self> {
        Ok(UnpackRules {
            file:      file.map(compile).transpose()?,
            directory: directory.map(compile).transpose()?,
        })
    }

    /// A file pattern without `/` matches the file name at any depth,
    /// otherwise the whole relative path. A directory pattern matches any
    /// ancestor directory.
    pub fn should_unpack(&self, relative: &str) -> bool {
        if let Some(pattern) = &self.file {
            let subject = if pattern.as_str().contains('/') {
                relative
            } else {
                relative.rsplit('/').next().unwrap_or(relative)
            };
            if pattern.matches_with(subject, MATCH_OPTIONS) {
                return true;
            }
        }
        if let Some(pattern) = &self.directory {
            let mut end = relative.len();
            while let Some(index) = relative[..end].rfind('/') {
                if pattern.matches_with(&relative[..index], MATCH_OPTIONS) {
                    return true;
                }
                end = index;
            }
        }
        false
    }
}
