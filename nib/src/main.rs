use std::process::ExitCode;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::render::Nib;

mod config;
mod render;

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Expands MDX partials across a documentation tree.
        cmd nib {
            /// The content root to discover documents in.
            required input: PathBuf
            /// Write expanded documents here, mirroring the content root.
            optional -o, --output output: PathBuf
            /// The partials directory. Defaults to `partials` in the content root.
            optional -p, --partials partials: PathBuf
            /// Read settings from this file instead of `nib.toml` in the content root.
            optional -c, --config config: PathBuf
            /// Write a JSON map of page slugs to headings here.
            optional --headings headings: PathBuf
            /// Fail if any diagnostic is reported.
            optional --strict
        }
    }
}

pub fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let flags = flags::Nib::from_env_or_exit();
    let start = Instant::now();
    let result = Config::new(flags).and_then(Nib::new).and_then(|nib| nib.run());
    match result {
        Ok(report) => {
            tracing::info!(
                documents = report.documents,
                diagnostics = report.diagnostics.len(),
                failed = report.failed,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "done"
            );

            if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
