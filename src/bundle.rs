//! macOS app bundle assembly.

use std::{
    fs::{copy, create_dir_all, remove_dir_all, rename, write},
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    types::AppInfo,
};

pub const BUNDLE_ICON: &str = "build/icon.icns";
pub const RESOURCES_DIR: &str = "res";

const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>CFBundlePackageType</key>
  <string>APPL</string>
  <key>CFBundleIdentifier</key>
  <string>{{IDENTIFIER}}</string>
  <key>CFBundleDisplayName</key>
  <string>{{NAME}}</string>
  <key>CFBundleName</key>
  <string>{{NAME}}</string>
  <key>CFBundleExecutable</key>
  <string>{{NAME}}</string>
  <key>CFBundleVersion</key>
  <string>{{VERSION}}</string>
  <key>CFBundleShortVersionString</key>
  <string>{{VERSION}}</string>
{{ICON}}  <key>LSMinimumSystemVersion</key>
  <string>10.10.0</string>
  <key>NSHighResolutionCapable</key>
  <true/>
  <key>NSSupportsAutomaticGraphicsSwitching</key>
  <true/>
{{EXTRA}}</dict>
</plist>
"#;

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the bundle's Info.plist. The extra fragment is inserted verbatim
/// at the end of the top-level dict.
pub fn info_plist(info: &AppInfo, has_icon: bool) -> String {
    let icon = if has_icon {
        "  <key>CFBundleIconFile</key>\n  <string>icon.icns</string>\n"
    } else {
        ""
    };
    let extra = match info.extra_info_plist.as_deref().map(str::trim) {
        Some(extra) if !extra.is_empty() => format!("  {}\n", extra),
        _ => String::new(),
    };
    INFO_PLIST
        .replace("{{IDENTIFIER}}", &escape(&info.app_id))
        .replace("{{NAME}}", &escape(&info.product_name))
        .replace("{{VERSION}}", &escape(&info.version))
        .replace("{{ICON}}", icon)
        .replace("{{EXTRA}}", &extra)
}

/// Wrap `executable` into `<output_dir>/<product name>.app`, moving the
/// sidecar resources along with it.
pub fn create_bundle(
    executable: &Path, app_dir: &Path, output_dir: &Path, info: &AppInfo,
) -> Result<PathBuf> {
    let bundle = output_dir.join(format!("{}.app", info.product_name));
    if bundle.exists() {
        remove_dir_all(&bundle).map_err(Error::io("remove", &bundle))?;
    }
    let contents = bundle.join("Contents");
    let macos = contents.join("MacOS");
    let resources = contents.join("Resources");
    create_dir_all(&macos).map_err(Error::io("create", &macos))?;
    create_dir_all(&resources).map_err(Error::io("create", &resources))?;

    let target = macos.join(&info.product_name);
    rename(executable, &target).map_err(Error::io("move", executable))?;
    let res = output_dir.join(RESOURCES_DIR);
    if res.is_dir() {
        rename(&res, macos.join(RESOURCES_DIR)).map_err(Error::io("move", &res))?;
    }

    let icon = app_dir.join(BUNDLE_ICON);
    let has_icon = icon.is_file();
    if has_icon {
        copy(&icon, resources.join("icon.icns")).map_err(Error::io("copy", &icon))?;
    }
    let plist = contents.join("Info.plist");
    write(&plist, info_plist(info, has_icon)).map_err(Error::io("write", &plist))?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use std::fs::{read, read_to_string};

    use super::*;
    use crate::manifest::{parse_app_info, Overrides};

    fn app_info(manifest: &str) -> AppInfo { parse_app_info(manifest.as_bytes(), &Overrides::default()).unwrap() }

    #[test]
    fn fills_in_identity() {
        let info = app_info(r#"{"name": "notes", "version": "2.0.1"}"#);
        let plist = info_plist(&info, false);
        assert!(plist.contains("<string>com.notes.notes</string>"));
        assert!(plist.contains("<key>CFBundleExecutable</key>\n  <string>Notes</string>"));
        assert!(plist.contains("<key>CFBundleShortVersionString</key>\n  <string>2.0.1</string>"));
        assert!(!plist.contains("{{"));
        assert!(!plist.contains("CFBundleIconFile"));
    }

    #[test]
    fn appends_extra_fragment_to_top_level_dict() {
        let info = app_info(
            r#"{"name": "notes", "version": "1.0.0",
                "build": {"extraInfoPlist": "<key>LSUIElement</key><true/>"}}"#,
        );
        let plist = info_plist(&info, true);
        assert!(plist.ends_with("  <key>LSUIElement</key><true/>\n</dict>\n</plist>\n"));
        assert!(plist.contains("<key>CFBundleIconFile</key>"));
    }

    #[test]
    fn escapes_markup_in_names() {
        let info = app_info(
            r#"{"name": "notes", "version": "1.0.0", "build": {"productName": "Pen & Paper"}}"#,
        );
        assert!(info_plist(&info, false).contains("<string>Pen &amp; Paper</string>"));
    }

    #[test]
    fn assembles_bundle() {
        let app = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::create_dir(app.path().join("build")).unwrap();
        std::fs::write(app.path().join(BUNDLE_ICON), b"icns").unwrap();
        let executable = output.path().join("notes");
        std::fs::write(&executable, b"exe").unwrap();
        std::fs::create_dir_all(output.path().join("res/native")).unwrap();
        std::fs::write(output.path().join("res/native/addon.node"), b"addon").unwrap();

        let info = app_info(r#"{"name": "notes", "version": "1.0.0"}"#);
        let bundle = create_bundle(&executable, app.path(), output.path(), &info).unwrap();
        assert_eq!(bundle, output.path().join("Notes.app"));
        let macos = bundle.join("Contents/MacOS");
        assert_eq!(read(macos.join("Notes")).unwrap(), b"exe");
        assert_eq!(read(macos.join("res/native/addon.node")).unwrap(), b"addon");
        assert_eq!(read(bundle.join("Contents/Resources/icon.icns")).unwrap(), b"icns");
        assert!(read_to_string(bundle.join("Contents/Info.plist"))
            .unwrap()
            .contains("<string>Notes</string>"));
        assert!(!executable.exists());
        assert!(!output.path().join("res").exists());
    }
}
