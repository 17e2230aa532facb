use std::collections::BTreeMap;
use std::fs;

use parking_lot::Mutex;
use quill::rayon::prelude::*;
use quill::diagnostics::Log;
use quill::discover::{discover, Source};
use quill::error::{Chainable, Result};
use quill::mdx::Mdx;
use quill::partials::Expand;
use quill::toc::{self, Heading, Headings};
use quill::{error, Diagnostic, DiagnosticSink, Diagnostics, Inliner};

use crate::config::Config;

#[derive(Debug)]
pub struct Nib {
    config: Config,
    inliner: Inliner,
}

/// What a run did.
#[derive(Debug)]
pub struct Report {
    pub documents: usize,
    pub failed: usize,
    pub strict: bool,
    pub diagnostics: Diagnostics,
}

impl Report {
    pub fn success(&self) -> bool {
        self.failed == 0 && !(self.strict && !self.diagnostics.is_empty())
    }
}

type HeadingsMap = BTreeMap<String, Vec<Heading>>;

impl Nib {
    pub fn new(config: Config) -> Result<Self> {
        let inliner = Inliner::new(config.sandbox()?);
        Ok(Nib { config, inliner })
    }

    pub fn run(&self) -> Result<Report> {
        let mut exclude = vec![self.inliner.sandbox().root().to_path_buf()];
        exclude.extend(self.config.output.clone());

        let sources = discover(&self.config.input, &exclude)?;
        let diagnostics = Diagnostics::new();
        let headings = Mutex::new(HeadingsMap::new());

        let failed = sources.par_iter()
            .map(|source| self.render(source, &diagnostics, &headings))
            .filter_map(|result| result.err())
            .inspect(|e| tracing::error!("{e}"))
            .count();

        if let Some(path) = &self.config.headings {
            let map = headings.into_inner();
            let json = serde_json::to_string_pretty(&map)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(path, json)
                .chain_with(|| error!("failed to write headings", "path" => path.display()))?;
        }

        Ok(Report {
            documents: sources.len(),
            failed,
            strict: self.config.strict,
            diagnostics,
        })
    }

    fn render(&self, source: &Source, diagnostics: &Diagnostics, headings: &Mutex<HeadingsMap>) -> Result<()> {
        let span = tracing::info_span!("document", path = %source.relative.display());
        let _enter = span.enter();

        let text = fs::read_to_string(&source.path)
            .chain_with(|| error!("failed to read document", "path" => source.path.display()))?;

        let sink = (Log, |d: Diagnostic| diagnostics.report(d));
        let mut expand = Expand::new(&self.inliner, &source.path, &sink);
        let mut toc = Headings::default();
        let doc = Mdx::from(&text)
            .plugin(&mut expand)
            .plugin(&mut toc)
            .run()
            .chain_with(|| error!("failed to expand document", "path" => source.path.display()))?;

        if let Some(output) = &self.config.output {
            let path = output.join(&source.relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&path, doc.to_string())
                .chain_with(|| error!("failed to write document", "path" => path.display()))?;
        }

        if !toc.entries.is_empty() {
            headings.lock().insert(toc::page_slug(&source.relative), toc.entries);
        }

        tracing::debug!("expanded");
        Ok(())
    }
}
