use std::{
    collections::BTreeSet,
    fs::{create_dir_all, read, read_dir, read_to_string, write},
    hash::Hasher,
    path::Path,
};

use fusepe::{
    compose::compose,
    footer::write_footer,
    macho::{MachHeader64, SegmentCommand64, SymtabCommand, LC_SEGMENT_64, LC_SYMTAB, MH_MAGIC_64, SEG_LINKEDIT},
    manifest::Overrides,
    package_app,
    placeholder::render_offset,
    runtime::ExplicitRuntime,
    types::{Recorder, Silent, OFFSET_PLACEHOLDER},
    Arch, Error, FinishOptions, PackageOptions, Platform,
};
use trailpe::{locate_archive, Entry, PackedExecutable};
use twox_hash::XxHash64;
use zerocopy::{
    byteorder::little_endian::{U32, U64},
    FromBytes, IntoBytes,
};

const MANIFEST: &str = r#"{
  "name": "notes",
  "version": "1.4.0",
  "description": "Take notes",
  "build": {"unpack": "*.node", "minify": true}
}"#;

fn runtime_fixture(dir: &Path) -> (std::path::PathBuf, Vec<u8>) {
    let mut runtime = b"\x7fELF\x02\x01\x01\x00".to_vec();
    runtime.extend(std::iter::repeat(0x90).take(4096));
    runtime.extend_from_slice(b"load_archive(self");
    runtime.extend_from_slice(OFFSET_PLACEHOLDER);
    runtime.extend_from_slice(b");");
    runtime.extend(std::iter::repeat(0xcc).take(1024));
    let path = dir.join("yode");
    write(&path, &runtime).unwrap();
    (path, runtime)
}

fn app_fixture(dir: &Path) {
    create_dir_all(dir.join("lib")).unwrap();
    create_dir_all(dir.join("native")).unwrap();
    create_dir_all(dir.join("test")).unwrap();
    write(dir.join("package.json"), MANIFEST).unwrap();
    write(
        dir.join("index.js"),
        "// entry point\nconst message = 'hello';  /* greet */\nconsole.log(message);\n",
    )
    .unwrap();
    write(dir.join("lib/broken.js"), "const s = 'unterminated;\n").unwrap();
    write(dir.join("lib/data.json"), "{\"a\": 1}").unwrap();
    write(dir.join("native/addon.node"), [0u8, 1, 2, 3, 255]).unwrap();
    write(dir.join("README.md"), "# notes").unwrap();
    write(dir.join("test/index.js"), "assert(true)").unwrap();
    write(dir.join("LICENSE"), "MIT License\r\n").unwrap();
}

fn options<'a>(runtime: &'a ExplicitRuntime, platform: Platform) -> PackageOptions<'a> {
    PackageOptions {
        platform,
        arch: Arch::X64,
        overrides: Overrides::default(),
        runtime,
        runtime_version: None,
        minifier: None,
        finish: FinishOptions { sign: false },
    }
}

fn names(dir: &Path) -> BTreeSet<String> {
    read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn packages_linux_executable() {
    let fixtures = tempfile::tempdir().unwrap();
    let app = fixtures.path().join("app");
    app_fixture(&app);
    let (runtime_path, runtime) = runtime_fixture(fixtures.path());
    let output = fixtures.path().join("out");

    let provider = ExplicitRuntime(runtime_path);
    let recorder = Recorder::default();
    let packaged = package_app(&output, &app, &options(&provider, Platform::Linux), &recorder).unwrap();

    let executable = output.canonicalize().unwrap().join("notes");
    assert_eq!(packaged.artifact, executable);
    assert!(packaged.offset_patched);
    assert_eq!(names(&output), ["LICENSE", "notes", "res"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());

    // The runtime is intact apart from the patched placeholder.
    let region = locate_archive(&executable).unwrap();
    assert_eq!(region.start, runtime.len() as u64);
    let composed = read(&executable).unwrap();
    let marker = runtime
        .windows(OFFSET_PLACEHOLDER.len())
        .position(|window| window == OFFSET_PLACEHOLDER)
        .unwrap();
    let mut expected = runtime.clone();
    expected[marker..marker + OFFSET_PLACEHOLDER.len()]
        .copy_from_slice(&render_offset(runtime.len() as u64, OFFSET_PLACEHOLDER.len()).unwrap());
    assert_eq!(&composed[..runtime.len()], &expected[..]);

    let packed = PackedExecutable::open(&executable).unwrap();
    let archive = packed.archive().unwrap();
    let files: Vec<String> = archive.files().into_iter().map(|(path, _)| path).collect();
    assert_eq!(files, [
        "LICENSE",
        "index.js",
        "lib/broken.js",
        "lib/data.json",
        "native/addon.node",
        "package.json",
    ]);
    assert!(archive.header().root.find("native/addon.node").unwrap().is_unpacked());

    let index = String::from_utf8(archive.read("index.js").unwrap().to_vec()).unwrap();
    assert!(!index.contains("entry point"));
    assert!(!index.contains("greet"));
    assert!(index.contains("console.log(message)"));
    assert_eq!(archive.read("lib/broken.js").unwrap(), b"const s = 'unterminated;\n");
    assert_eq!(archive.read("lib/data.json").unwrap(), b"{\"a\": 1}");

    assert_eq!(packaged.archive.diagnostics.len(), 1);
    assert_eq!(packaged.archive.diagnostics[0].path, "lib/broken.js");
    assert_eq!(packaged.archive.diagnostics[0].position, Some((1, 11)));
    assert!(recorder.warnings().iter().any(|w| w.contains("lib/broken.js")));

    assert_eq!(read(output.join("res/native/addon.node")).unwrap(), [0u8, 1, 2, 3, 255]);
    let license = read_to_string(output.join("LICENSE")).unwrap();
    assert!(license.starts_with("notes@1.4.0\n\nMIT License\n"));
}

#[test]
fn configuration_errors_leave_output_alone() {
    let fixtures = tempfile::tempdir().unwrap();
    let app = fixtures.path().join("app");
    app_fixture(&app);
    let output = fixtures.path().join("out");
    create_dir_all(&output).unwrap();
    write(output.join("previous"), b"keep").unwrap();

    let provider = ExplicitRuntime(fixtures.path().join("missing-yode"));
    let result = package_app(&output, &app, &options(&provider, Platform::Linux), &Silent);
    assert!(matches!(result, Err(Error::MissingRuntime(_))));

    write(app.join("package.json"), r#"{"version": "1.0.0"}"#).unwrap();
    let (runtime_path, _) = runtime_fixture(fixtures.path());
    let provider = ExplicitRuntime(runtime_path);
    let result = package_app(&output, &app, &options(&provider, Platform::Linux), &Silent);
    assert!(matches!(result, Err(Error::Manifest { .. })));

    assert_eq!(read(output.join("previous")).unwrap(), b"keep");
}

#[test]
fn output_inside_app_is_not_archived() {
    let fixtures = tempfile::tempdir().unwrap();
    let app = fixtures.path().join("app");
    app_fixture(&app);
    let (runtime_path, _) = runtime_fixture(fixtures.path());
    let provider = ExplicitRuntime(runtime_path);
    let output = app.join("dist");

    package_app(&output, &app, &options(&provider, Platform::Windows), &Silent).unwrap();
    // Packaging again must not pick up the previous build.
    let packaged = package_app(&output, &app, &options(&provider, Platform::Windows), &Silent).unwrap();
    assert_eq!(packaged.artifact.file_name().unwrap(), "notes.exe");

    let packed = PackedExecutable::open(&packaged.artifact).unwrap();
    let archive = packed.archive().unwrap();
    assert!(archive
        .files()
        .iter()
        .all(|(path, _)| !path.starts_with("dist") && !path.contains(".fusepe-")));
}

fn macho_runtime(dir: &Path) -> std::path::PathBuf {
    let header = MachHeader64 {
        magic: U32::new(MH_MAGIC_64),
        ncmds: U32::new(2),
        sizeofcmds: U32::new((std::mem::size_of::<SegmentCommand64>() + std::mem::size_of::<SymtabCommand>()) as u32),
        ..Default::default()
    };
    let segment = SegmentCommand64 {
        cmd: U32::new(LC_SEGMENT_64),
        cmdsize: U32::new(std::mem::size_of::<SegmentCommand64>() as u32),
        segname: SEG_LINKEDIT,
        fileoff: U64::new(0x100),
        filesize: U64::new(0x80),
        vmsize: U64::new(0x1000),
        ..Default::default()
    };
    let symtab = SymtabCommand {
        cmd: U32::new(LC_SYMTAB),
        cmdsize: U32::new(std::mem::size_of::<SymtabCommand>() as u32),
        stroff: U32::new(0x140),
        strsize: U32::new(0x40),
        ..Default::default()
    };
    let mut data = header.as_bytes().to_vec();
    data.extend_from_slice(segment.as_bytes());
    data.extend_from_slice(symtab.as_bytes());
    data.resize(0x180, 0);
    let path = dir.join("yode-darwin");
    write(&path, data).unwrap();
    path
}

// Removing the signature of the fake runtime would fail where codesign exists.
#[cfg(not(target_os = "macos"))]
#[test]
fn packages_macos_bundle() {
    let fixtures = tempfile::tempdir().unwrap();
    let app = fixtures.path().join("app");
    app_fixture(&app);
    write(
        app.join("package.json"),
        r#"{"name": "notes", "version": "1.4.0", "build": {"productName": "Notes App", "unpack": "*.node"}}"#,
    )
    .unwrap();
    let provider = ExplicitRuntime(macho_runtime(fixtures.path()));
    let output = fixtures.path().join("out");

    let packaged = package_app(&output, &app, &options(&provider, Platform::MacOs), &Silent).unwrap();
    assert_eq!(packaged.artifact, output.canonicalize().unwrap().join("Notes App.app"));
    assert!(!packaged.offset_patched);

    let executable = packaged.artifact.join("Contents/MacOS/Notes App");
    let data = read(&executable).unwrap();
    let offset = std::mem::size_of::<MachHeader64>();
    let (segment, rest) = SegmentCommand64::read_from_prefix(&data[offset..]).unwrap();
    let (symtab, _) = SymtabCommand::read_from_prefix(rest).unwrap();
    assert_eq!(segment.filesize.get(), data.len() as u64 - 0x100);
    assert_eq!(segment.vmsize.get(), data.len() as u64 - 0x100);
    assert_eq!(symtab.strsize.get() as usize, data.len() - 0x140);

    assert_eq!(locate_archive(&executable).unwrap().start, 0x180);
    assert_eq!(
        read(packaged.artifact.join("Contents/MacOS/res/native/addon.node")).unwrap(),
        [0u8, 1, 2, 3, 255]
    );
    assert!(read_to_string(packaged.artifact.join("Contents/Info.plist"))
        .unwrap()
        .contains("<string>com.notes.notes</string>"));
    assert_eq!(names(&output), ["LICENSE", "Notes App.app"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>());
}

fn hash(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}

#[test]
fn composes_large_runtime_and_archive() {
    const RUNTIME_LEN: usize = 10 * 1024 * 1024;
    const ARCHIVE_LEN: usize = 2 * 1024 * 1024;
    let dir = tempfile::tempdir().unwrap();
    let runtime: Vec<u8> = (0..RUNTIME_LEN).map(|i| (i % 251) as u8).collect();
    let archive: Vec<u8> = (0..ARCHIVE_LEN).map(|i| (i % 241) as u8).collect();
    let runtime_path = dir.path().join("runtime");
    let archive_path = dir.path().join("app.ear");
    write(&runtime_path, &runtime).unwrap();
    write(&archive_path, &archive).unwrap();
    write_footer(&archive_path).unwrap();

    let output = dir.path().join("app");
    compose(&output, &runtime_path, &archive_path).unwrap();
    let composed = read(&output).unwrap();
    assert_eq!(composed.len(), 10_485_760 + 2_097_152 + 13);
    assert_eq!(composed.len(), 12_582_925);
    assert_eq!(hash(&composed[..RUNTIME_LEN]), hash(&runtime));
    assert_eq!(&composed[RUNTIME_LEN..RUNTIME_LEN + ARCHIVE_LEN], &archive[..]);

    let region = locate_archive(&output).unwrap();
    assert_eq!(region.start, RUNTIME_LEN as u64);
    assert_eq!(region.len, ARCHIVE_LEN as u64);
}

#[test]
fn cache_entries_are_ignored_by_the_archive() {
    let fixtures = tempfile::tempdir().unwrap();
    let app = fixtures.path().join("app");
    app_fixture(&app);
    let cache = app.join("yode/yode-v1.0.0-linux-x64");
    create_dir_all(&cache).unwrap();
    let (runtime_path, _) = runtime_fixture(&cache);
    let provider = ExplicitRuntime(runtime_path);
    let output = fixtures.path().join("out");

    let packaged = package_app(&output, &app, &options(&provider, Platform::Linux), &Silent).unwrap();
    let packed = PackedExecutable::open(&packaged.artifact).unwrap();
    let archive = packed.archive().unwrap();
    assert!(archive.header().root.find("yode").is_none());
    assert!(matches!(archive.header().root.find("index.js"), Some(Entry::File { .. })));
}
