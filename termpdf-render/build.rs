use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;

const DEFAULT_PDFIUM_VERSION: &str = "7350";
const DEFAULT_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Stages a prebuilt pdfium next to the build output and exports its path as
/// `TERMPDF_PDFIUM_LIBRARY_PATH`. Failing to do so is not fatal: the runtime
/// binder falls back to `./` and the system library, and the `auto` backend
/// to lopdf.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for var in [
        "TERMPDF_PDFIUM_SKIP_DOWNLOAD",
        "TERMPDF_PDFIUM_ARCHIVE_PATH",
        "TERMPDF_PDFIUM_VERSION",
        "TERMPDF_PDFIUM_PLATFORM",
        "TERMPDF_PDFIUM_BASE_URL",
        "PDFIUM_DYNAMIC_LIB_PATH",
        "PDFIUM_STATIC_LIB_PATH",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    if env::var_os("CARGO_FEATURE_PDFIUM").is_none()
        || env::var_os("TERMPDF_PDFIUM_SKIP_DOWNLOAD").is_some()
        || env::var_os("PDFIUM_DYNAMIC_LIB_PATH").is_some()
        || env::var_os("PDFIUM_STATIC_LIB_PATH").is_some()
    {
        return;
    }

    match stage_pdfium() {
        Ok(path) => println!(
            "cargo:rustc-env=TERMPDF_PDFIUM_LIBRARY_PATH={}",
            path.display()
        ),
        Err(err) => println!("cargo:warning=pdfium was not staged: {err:#}"),
    }
}

struct Target {
    os: String,
    platform: String,
}

impl Target {
    fn from_env() -> Result<Self> {
        let os = env::var("CARGO_CFG_TARGET_OS").context("CARGO_CFG_TARGET_OS not set")?;
        let arch = env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH not set")?;
        let platform = env::var("TERMPDF_PDFIUM_PLATFORM").unwrap_or_else(|_| {
            let os_label = match os.as_str() {
                "macos" => "mac",
                "windows" => "win",
                other => other,
            };
            let arch_label = match arch.as_str() {
                "x86_64" => "x64",
                "aarch64" => "arm64",
                other => other,
            };
            format!("{os_label}-{arch_label}")
        });
        Ok(Self { os, platform })
    }

    /// Where the pdfium-binaries archives keep the shared library.
    fn library_path(&self, root: &Path) -> PathBuf {
        match self.os.as_str() {
            "windows" => root.join("bin").join("pdfium.dll"),
            "macos" => root.join("lib").join("libpdfium.dylib"),
            _ => root.join("lib").join("libpdfium.so"),
        }
    }
}

fn stage_pdfium() -> Result<PathBuf> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR not set")?);
    let staging = out_dir.join("pdfium");
    let target = Target::from_env()?;

    let library = target.library_path(&staging);
    if library.is_file() {
        return Ok(library);
    }

    let archive = match env::var_os("TERMPDF_PDFIUM_ARCHIVE_PATH") {
        Some(path) => PathBuf::from(path),
        None => download(&out_dir, &target.platform)?,
    };
    unpack(&archive, &staging)?;

    if library.is_file() {
        Ok(library)
    } else {
        Err(anyhow!("{:?} missing after unpacking {:?}", library, archive))
    }
}

fn download(out_dir: &Path, platform: &str) -> Result<PathBuf> {
    let version =
        env::var("TERMPDF_PDFIUM_VERSION").unwrap_or_else(|_| DEFAULT_PDFIUM_VERSION.to_string());
    let base_url =
        env::var("TERMPDF_PDFIUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let file_name = format!("pdfium-{platform}.tgz");
    let url = format!(
        "{}/chromium%2F{}/{}",
        base_url.trim_end_matches('/'),
        version,
        file_name
    );

    let destination = out_dir.join(format!("pdfium-{version}-{platform}.tgz"));
    if destination.is_file() {
        return Ok(destination);
    }

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(15))
        .timeout_read(Duration::from_secs(120))
        .build();
    let response = agent
        .get(&url)
        .call()
        .with_context(|| format!("GET {url} failed"))?;

    let partial = destination.with_extension("part");
    let mut file =
        File::create(&partial).with_context(|| format!("failed to create {:?}", partial))?;
    io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to write {:?}", partial))?;
    fs::rename(&partial, &destination)?;
    Ok(destination)
}

fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    let is_tarball = archive
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("tgz") || ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if !is_tarball {
        bail!("expected a .tgz pdfium archive, got {:?}", archive);
    }

    if destination.exists() {
        fs::remove_dir_all(destination)
            .with_context(|| format!("failed to clear {:?}", destination))?;
    }
    fs::create_dir_all(destination)?;

    let file = File::open(archive).with_context(|| format!("failed to open {:?}", archive))?;
    Archive::new(GzDecoder::new(file))
        .unpack(destination)
        .with_context(|| format!("failed to unpack {:?}", archive))
}
