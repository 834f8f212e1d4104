//! Fuses an application directory into a prebuilt runtime executable.
//!
//! The app is serialized into an ASAR archive, the archive and a 13-byte
//! footer are appended to the runtime binary, and the result is finished
//! for the target platform.

pub mod archive;
pub mod bundle;
pub mod command;
pub mod compose;
pub mod error;
pub mod filters;
pub mod footer;
pub mod install;
pub mod license;
pub mod macho;
pub mod manifest;
pub mod minify;
pub mod package;
pub mod permissions;
pub mod placeholder;
pub mod platform;
pub mod resources;
pub mod runtime;
pub mod signing;
pub mod types;

pub use error::{Error, Result};
pub use package::{package_app, package_clean_app, PackageOptions, Packaged};
pub use platform::{Arch, FinishOptions, Platform};
