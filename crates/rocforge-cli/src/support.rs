use rocforge_patch::{PatchError, PatchSite};
use rocforge_pip::{PipClient, PipError};

/// Resolve the installed package's patch site via pip, or terminate with the
/// matching failure code.
pub fn resolve_site_or_exit(pip: &PipClient, package: &str) -> PatchSite {
    match pip.package_location(package) {
        Ok(install_dir) => PatchSite::new(install_dir, package),
        Err(PipError::PackageNotFound(_)) => {
            exit_with(&PatchError::PackageNotFound(package.to_string()))
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Print the patcher diagnostic and terminate with its per-kind exit code.
pub fn exit_with(err: &PatchError) -> ! {
    eprintln!("error: {err}");
    std::process::exit(err.exit_code());
}
