use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

const ASSETS_ENV: &str = "DEEDSCOUT_ASSETS_DIR";

fn candidate_dirs() -> Vec<PathBuf> {
	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = std::env::var_os(ASSETS_ENV) {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	// Compile-time path to the `deedscout/` crate, for `cargo run` from elsewhere.
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".."));
	candidates
}

/// Find a template asset.
///
/// An absolute configured path is used as is. A relative one is tried under
/// each candidate directory, both directly and inside an `assets/` folder.
/// `DEEDSCOUT_ASSETS_DIR` takes precedence over the default locations.
pub fn resolve_asset(configured: &Path) -> Result<PathBuf> {
	if configured.is_absolute() {
		if configured.is_file() {
			return Ok(configured.to_path_buf());
		}
		bail!("template {} does not exist", configured.display());
	}

	resolve_in(configured, candidate_dirs())
}

fn resolve_in(relative: &Path, bases: Vec<PathBuf>) -> Result<PathBuf> {
	let mut tried = Vec::new();
	for base in bases {
		for dir in [base.clone(), base.join("assets")] {
			let path = dir.join(relative);
			if path.is_file() {
				return Ok(path);
			}
			tried.push(path);
		}
	}

	bail!(
		"template {} not found. Searched in:\n{}\n\nFix: copy the 'assets/' folder next to the executable (or set {ASSETS_ENV} to the folder that contains it).",
		relative.display(),
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}
