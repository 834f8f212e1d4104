use std::{path::Path, process::Command};

use crate::{
    command::{find_tool, run},
    error::Result,
    types::Reporter,
};

const CODESIGN: &str = "codesign";

/// Strip the existing signature of the runtime binary; appending to a signed
/// binary would invalidate it anyway.
pub fn remove_signature(runtime: &Path, reporter: &dyn Reporter) -> Result<()> {
    let codesign = match find_tool(CODESIGN) {
        Some(codesign) => codesign,
        None => {
            reporter.warning("codesign not found, runtime signature was not removed");
            return Ok(());
        }
    };
    let mut command = Command::new(codesign);
    command.arg("--remove-signature").arg(runtime);
    run(command)?;
    Ok(())
}

/// Ad-hoc sign an app bundle. Returns `false` when `codesign` is not
/// installed and the bundle was left unsigned.
pub fn ad_hoc_sign(bundle: &Path, reporter: &dyn Reporter) -> Result<bool> {
    let codesign = match find_tool(CODESIGN) {
        Some(codesign) => codesign,
        None => {
            reporter.warning("codesign not found, app bundle is not signed");
            return Ok(false);
        }
    };
    let mut command = Command::new(codesign);
    command.args(["--force", "--deep", "--sign", "-"]).arg(bundle);
    run(command)?;
    Ok(true)
}
