//! Log setup. Stdout carries the protocol result, so logs go to the configured
//! file or to stderr.

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

type InstallError = Box<dyn Error + Send + Sync + 'static>;

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open(path: &str) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Returns the reason when `log_file` could
/// not be opened and stderr is used instead.
///
/// A subscriber that cannot be installed is reported on stderr; the
/// invocation goes on without logs.
pub fn init(log_file: Option<&str>) -> Option<String> {
    let (fallback, installed) = match log_file.filter(|p| !p.is_empty()) {
        Some(path) => match open(path) {
            Ok(file) => (None, install_file(file)),
            Err(e) => (Some(format!("cannot open log file {path:?}: {e}")), install_stderr()),
        },
        None => (None, install_stderr()),
    };

    if let Err(e) = installed {
        eprintln!("pod-ipam-cni: logging disabled, cannot install subscriber: {e}");
    }
    fallback
}

fn install_file(file: File) -> Result<(), InstallError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
}

fn install_stderr() -> Result<(), InstallError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unopenable_log_file_falls_back_and_reinstall_fails() {
        let reason = init(Some("/nonexistent-pod-ipam-dir/cni.log")).unwrap();
        assert!(reason.contains("/nonexistent-pod-ipam-dir/cni.log"));

        // the global subscriber is set; a second install reports an error
        // instead of being dropped
        assert!(install_stderr().is_err());
        assert_eq!(init(None), None);
    }
}
