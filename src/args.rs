use std::path::{Path, PathBuf};

use console::style;
use fusepe::{Arch, Platform};

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|e| {
        println!("{}: {}", style("couldn't read the current directory").red(), e);
        std::process::exit(-1);
    })
}

pub fn get_platform(platform: Option<&str>) -> Platform {
    match platform {
        Some(platform) => platform.parse().unwrap_or_else(|_| {
            println!(
                "{}: {}",
                style("not a valid platform").red(),
                style(platform).red()
            );
            println!(
                "{}: linux, win32, darwin",
                style("available platforms").blue().bright(),
            );
            std::process::exit(-1);
        }),
        None => Platform::host().unwrap_or_else(|| {
            println!(
                "{}: {}",
                style("host platform is not supported, pass --platform").red(),
                std::env::consts::OS
            );
            std::process::exit(-1);
        }),
    }
}

pub fn get_arch(arch: Option<&str>) -> Arch {
    match arch {
        Some(arch) => arch.parse().unwrap_or_else(|_| {
            println!(
                "{}: {}",
                style("not a valid architecture").red(),
                style(arch).red()
            );
            println!(
                "{}: x64, ia32, arm64, arm",
                style("available architectures").blue().bright(),
            );
            std::process::exit(-1);
        }),
        None => Arch::host().unwrap_or_else(|| {
            println!(
                "{}: {}",
                style("host architecture is not supported, pass --arch").red(),
                std::env::consts::ARCH
            );
            std::process::exit(-1);
        }),
    }
}

pub fn get_app_dir(app_dir: Option<&Path>) -> PathBuf {
    let app_dir = current_dir().join(app_dir.unwrap_or(Path::new(".")));
    let app_dir = std::fs::canonicalize(&app_dir).unwrap_or_else(|_| {
        println!(
            "{}: {}",
            style("app directory does not exist").red(),
            app_dir.display()
        );
        std::process::exit(-1);
    });
    if !app_dir.is_dir() {
        println!(
            "{}: {}",
            style("app path is not a directory").red(),
            app_dir.display()
        );
        std::process::exit(-1);
    }
    app_dir
}

pub fn get_output_dir(output_dir: &Path) -> PathBuf {
    let output_dir = current_dir().join(output_dir);
    if output_dir.is_file() {
        println!(
            "{}: {}",
            style("output path is a file").red(),
            output_dir.display()
        );
        std::process::exit(-1);
    }
    output_dir
}

/// The cache defaults to the `yode` directory of the app.
pub fn get_cache_dir(cache_dir: Option<&Path>, app_dir: &Path) -> PathBuf {
    match cache_dir {
        Some(cache_dir) => current_dir().join(cache_dir),
        None => app_dir.join(fusepe::types::RUNTIME_NAME),
    }
}

pub fn get_runtime(runtime: &Path) -> PathBuf {
    let runtime = current_dir().join(runtime);
    if !runtime.is_file() {
        println!(
            "{}: {}",
            style("runtime binary does not exist").red(),
            runtime.display()
        );
        std::process::exit(-1);
    }
    runtime
}

pub fn get_executable(executable: &Path) -> PathBuf {
    let executable = current_dir().join(executable);
    std::fs::canonicalize(&executable).unwrap_or_else(|_| {
        println!(
            "{}: {}",
            style("executable does not exist").red(),
            executable.display()
        );
        std::process::exit(-1);
    })
}
