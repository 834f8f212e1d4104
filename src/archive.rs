use std::{
    ffi::OsString,
    fs::{canonicalize, copy as copy_file, create_dir_all, metadata, read, read_link, File},
    io::{copy, BufWriter, Error as IoError, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use jwalk::WalkDir;
use path_slash::PathExt;
use rayon::prelude::*;
use trailpe::{encode_header, Entry};

use crate::{
    error::{Error, Result},
    filters::{FilterSet, UnpackRules},
    minify::Minifier,
    types::{Diagnostic, Reporter},
};

/// Extension of the files passed through the minifier.
pub const SCRIPT_EXTENSION: &str = ".js";

pub struct ArchiveOptions<'a> {
    pub filters:  &'a FilterSet,
    pub unpack:   &'a UnpackRules,
    pub minifier: Option<&'a dyn Minifier>,
}

#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub packed:      usize,
    pub unpacked:    usize,
    pub links:       usize,
    pub excluded:    usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Directory that receives the files kept outside of `archive`.
pub fn unpacked_path(archive: &Path) -> PathBuf {
    let mut name = OsString::from(archive.as_os_str());
    name.push(".unpacked");
    PathBuf::from(name)
}

enum Content {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

enum Prepared {
    Packed {
        relative:   String,
        size:       u64,
        executable: bool,
        content:    Content,
    },
    Unpacked {
        relative:   String,
        size:       u64,
        executable: bool,
    },
    Link {
        relative: String,
        target:   String,
    },
    Skipped,
}

struct Candidate {
    path:     PathBuf,
    relative: String,
    symlink:  bool,
}

#[cfg(any(unix, target_os = "redox"))]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(any(unix, target_os = "redox")))]
fn is_executable(_: &std::fs::Metadata) -> bool { false }

fn insert(root: &mut Entry, relative: &str, entry: Entry) {
    let (parents, name) = match relative.rsplit_once('/') {
        Some((parents, name)) => (Some(parents), name),
        None => (None, relative),
    };
    let mut current = root;
    for component in parents.into_iter().flat_map(|parents| parents.split('/')) {
        current = match current {
            Entry::Directory { files } => files.entry(component.to_string()).or_default(),
            _ => return,
        };
    }
    if let Entry::Directory { files } = current {
        files.insert(name.to_string(), entry);
    }
}

/// Serialize the files of `source` into an archive at `target`.
///
/// Files matching the filters are left out. Files matching the unpack rules
/// are copied into [`unpacked_path`] instead of the archive. Script files
/// are minified when a minifier is given; a minifier failure keeps the
/// original source and is recorded as a diagnostic.
pub fn create_archive(
    source: &Path, target: &Path, options: &ArchiveOptions, reporter: &dyn Reporter,
) -> Result<ArchiveReport> {
    let source = canonicalize(source).map_err(Error::io("resolve", source))?;
    let unpacked_dir = unpacked_path(target);
    let mut report = ArchiveReport::default();

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&source).skip_hidden(false).sort(true) {
        let entry = entry.map_err(|e| Error::Walk {
            path:    source.clone(),
            message: e.to_string(),
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        let relative = match path.strip_prefix(&source).ok().and_then(|p| p.to_slash()) {
            Some(relative) => relative.into_owned(),
            None => {
                report.diagnostics.push(Diagnostic {
                    path:     path.display().to_string(),
                    message:  "path is not valid unicode, skipping".into(),
                    position: None,
                });
                continue;
            }
        };
        if options.filters.is_excluded(&relative) {
            report.excluded += 1;
            continue;
        }
        candidates.push(Candidate {
            path,
            relative,
            symlink: file_type.is_symlink(),
        });
    }

    let prepared = candidates
        .into_par_iter()
        .map(|candidate| {
            let mut diagnostics = Vec::new();
            reporter.progress(&candidate.relative);
            let prepared = if candidate.symlink {
                prepare_link(&source, candidate, &mut diagnostics)?
            } else {
                prepare_file(&unpacked_dir, candidate, options, &mut diagnostics)?
            };
            for diagnostic in &diagnostics {
                reporter.warning(&diagnostic.to_string());
            }
            Ok((prepared, diagnostics))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut root = Entry::default();
    let mut offset = 0u64;
    let mut contents = Vec::new();
    for (prepared, diagnostics) in prepared {
        report.diagnostics.extend(diagnostics);
        match prepared {
            Prepared::Packed {
                relative,
                size,
                executable,
                content,
            } => {
                insert(&mut root, &relative, Entry::File {
                    size,
                    offset: Some(offset.to_string()),
                    unpacked: false,
                    executable,
                });
                offset += size;
                contents.push((relative, size, content));
                report.packed += 1;
            }
            Prepared::Unpacked {
                relative,
                size,
                executable,
            } => {
                insert(&mut root, &relative, Entry::File {
                    size,
                    offset: None,
                    unpacked: true,
                    executable,
                });
                report.unpacked += 1;
            }
            Prepared::Link { relative, target } => {
                insert(&mut root, &relative, Entry::Link { link: target });
                report.links += 1;
            }
            Prepared::Skipped => {}
        }
    }

    let header = encode_header(&root)?;
    let file = File::create(target).map_err(Error::io("create", target))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&header).map_err(Error::io("write", target))?;
    for (relative, size, content) in contents {
        let written = match content {
            Content::Memory(data) => {
                writer.write_all(&data).map_err(Error::io("write", target))?;
                data.len() as u64
            }
            Content::Disk(path) => {
                let file = File::open(&path).map_err(Error::io("open", &path))?;
                copy(&mut file.take(size), &mut writer).map_err(Error::io("write", target))?
            }
        };
        if written != size {
            return Err(Error::Io {
                action: "pack",
                path:   source.join(relative),
                source: IoError::new(ErrorKind::UnexpectedEof, "file changed while packing"),
            });
        }
    }
    writer.flush().map_err(Error::io("write", target))?;
    Ok(report)
}

fn prepare_file(
    unpacked_dir: &Path, candidate: Candidate, options: &ArchiveOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Prepared> {
    let Candidate { path, relative, .. } = candidate;
    let meta = metadata(&path).map_err(Error::io("read metadata of", &path))?;
    let executable = is_executable(&meta);

    if options.unpack.should_unpack(&relative) {
        let destination = unpacked_dir.join(&relative);
        if let Some(parent) = destination.parent() {
            create_dir_all(parent).map_err(Error::io("create", parent))?;
        }
        copy_file(&path, &destination).map_err(Error::io("copy", &path))?;
        return Ok(Prepared::Unpacked {
            relative,
            size: meta.len(),
            executable,
        });
    }

    let content = match options.minifier {
        Some(minifier) if relative.ends_with(SCRIPT_EXTENSION) => {
            let data = read(&path).map_err(Error::io("read", &path))?;
            Content::Memory(minify_or_keep(minifier, &relative, data, diagnostics))
        }
        _ => Content::Disk(path),
    };
    let size = match &content {
        Content::Memory(data) => data.len() as u64,
        Content::Disk(_) => meta.len(),
    };
    Ok(Prepared::Packed {
        relative,
        size,
        executable,
        content,
    })
}

fn minify_or_keep(
    minifier: &dyn Minifier, relative: &str, data: Vec<u8>, diagnostics: &mut Vec<Diagnostic>,
) -> Vec<u8> {
    let source = match std::str::from_utf8(&data) {
        Ok(source) => source,
        Err(_) => {
            diagnostics.push(Diagnostic {
                path:     relative.to_string(),
                message:  "failed to minify, source is not valid UTF-8".into(),
                position: None,
            });
            return data;
        }
    };
    match minifier.minify(source) {
        Ok(minified) => minified.into_bytes(),
        Err(e) => {
            diagnostics.push(Diagnostic {
                path:     relative.to_string(),
                message:  format!("failed to minify, {}", e.message),
                position: Some((e.line, e.column)),
            });
            data
        }
    }
}

fn prepare_link(
    source: &Path, candidate: Candidate, diagnostics: &mut Vec<Diagnostic>,
) -> Result<Prepared> {
    let Candidate { path, relative, .. } = candidate;
    let mut skip = |message: String| {
        diagnostics.push(Diagnostic {
            path: relative.clone(),
            message,
            position: None,
        });
        Ok(Prepared::Skipped)
    };
    let link = match read_link(&path) {
        Ok(link) => link,
        Err(e) => return skip(format!("couldn't read link: {}", e)),
    };
    let resolved = match canonicalize(&path) {
        Ok(resolved) => resolved,
        Err(e) => return skip(format!("link target {} can't be resolved: {}", link.display(), e)),
    };
    let target = match resolved.strip_prefix(source).ok().and_then(|p| p.to_slash()) {
        Some(target) if !target.is_empty() => target.into_owned(),
        _ => return skip(format!("link points outside the directory: {}", link.display())),
    };
    Ok(Prepared::Link { relative, target })
}
