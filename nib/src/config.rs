use std::path::{Path, PathBuf};

use quill::error::Result;
use quill::{Sandbox, Settings};

use crate::flags;

/// Settings from the configuration file with command-line overrides applied
/// and every path made absolute.
#[derive(Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub headings: Option<PathBuf>,
    pub strict: bool,
    pub settings: Settings,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(quill::util::normalize(&std::path::absolute(path)?))
}

impl Config {
    pub fn new(flags: flags::Nib) -> Result<Self> {
        let input = absolute(&flags.input)?;
        let mut settings = match &flags.config {
            Some(path) => Settings::read(path)?,
            None => Settings::discover(&input)?,
        };

        // Paths in the file are relative to the content root, flags to the
        // working directory.
        if let Some(partials) = &flags.partials {
            settings.partials = absolute(partials)?;
        }

        let headings = match &flags.headings {
            Some(path) => Some(absolute(path)?),
            None => settings.headings.as_ref().map(|p| absolute(&input.join(p))).transpose()?,
        };

        Ok(Config {
            output: flags.output.as_deref().map(absolute).transpose()?,
            strict: flags.strict || settings.strict,
            headings,
            input,
            settings,
        })
    }

    pub fn sandbox(&self) -> Result<Sandbox> {
        Ok(Sandbox::from_settings(&self.settings, &self.input)?)
    }
}
