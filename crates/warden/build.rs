//! Build script: render the warden(1) manual page for packagers.
//!
//! The page lands in `target/generated-man/<target>/<profile>/warden.1` and,
//! when Cargo provides one, in `OUT_DIR`.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;

const EPOCH_DATE: &str = "1970-01-01";

const MODES: &[(&str, &str)] = &[
    (
        "run [--dry-run]",
        "Apply the patch policy; restart the service only when the document changed.",
    ),
    ("freeze", "Pin every line before the live boundary."),
    ("enforce", "Restore the frozen prefix ahead of the live suffix."),
    ("unfreeze", "Remove all freeze state."),
    ("status", "Print freeze state and document fingerprints."),
    ("verify", "Check the live document's structure without taking the lock."),
];

/// Page date from `SOURCE_DATE_EPOCH` for reproducible builds.
fn page_date() -> String {
    let stamp = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok());
    match stamp.map(|moment| moment.format(&Iso8601::DATE)) {
        Some(Ok(date)) => date,
        Some(Err(_)) | None => {
            if env::var_os("SOURCE_DATE_EPOCH").is_some() {
                println!("cargo:warning=unusable SOURCE_DATE_EPOCH; dating page {EPOCH_DATE}");
            }
            EPOCH_DATE.to_owned()
        }
    }
}

fn render_page(name: &str, version: &str, date: &str) -> String {
    let mut page = format!(
        ".TH \"{title}\" \"1\" \"{date}\" \"{name} {version}\" \"Warden\"\n\
         .SH NAME\n\
         {name} \\- patch and freeze a live web server configuration\n\
         .SH SYNOPSIS\n\
         .B {name}\n\
         [\\fIconfig flags\\fR] [\\fImode\\fR]\n\
         .SH MODES\n",
        title = name.to_uppercase(),
    );
    for (mode, summary) in MODES {
        page.push_str(&format!(".TP\n.B {mode}\n{summary}\n"));
    }
    page.push_str(
        ".SH EXIT STATUS\n\
         0 on success or when another invocation holds the lock; 1 on any fatal error.\n",
    );
    page
}

/// `OUT_DIR` is `<target>/<profile>/build/<crate>-<hash>/out`.
fn generated_man_dir() -> PathBuf {
    let target_root = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .and_then(|out| out.ancestors().nth(4).map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("target"));
    let triple = env::var("TARGET").unwrap_or_else(|_| "unknown-target".into());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown-profile".into());
    target_root.join("generated-man").join(triple).join(profile)
}

fn install(page: &str, dir: &Path, file_name: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let staged = dir.join(format!("{file_name}.tmp"));
    fs::write(&staged, page)?;
    fs::rename(&staged, dir.join(file_name))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    for variable in ["CARGO_PKG_VERSION", "SOURCE_DATE_EPOCH", "TARGET", "PROFILE"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }
    let version = env::var("CARGO_PKG_VERSION")?;
    let page = render_page("warden", &version, &page_date());

    install(&page, &generated_man_dir(), "warden.1")?;
    if let Some(out_dir) = env::var_os("OUT_DIR").map(PathBuf::from)
        && let Err(error) = install(&page, &out_dir, "warden.1")
    {
        println!(
            "cargo:warning=could not stage warden.1 in {}: {error}",
            out_dir.display()
        );
    }
    Ok(())
}
