use std::borrow::Cow;

use crate::error::{Chainable, Result};
use crate::mdx::{self, Document};

/// A stage in an [`Mdx`] pipeline.
pub trait Plugin {
    /// Rewrites the source before it is parsed.
    #[inline(always)]
    fn preprocess<'a>(&mut self, input: &'a str) -> Result<Cow<'a, str>> {
        Ok(Cow::Borrowed(input))
    }

    #[inline(always)]
    fn transform(&mut self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }

    /// Called once every plugin has transformed the document.
    #[inline(always)]
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Parses a document and runs it through a list of plugins, in the order
/// they were added.
///
/// ```
/// use quill::mdx::Mdx;
/// use quill::toc::Headings;
///
/// let mut headings = Headings::default();
/// let doc = Mdx::from("# One\n\n## Two")
///     .plugin(&mut headings)
///     .run()
///     .unwrap();
///
/// assert_eq!(doc.children.len(), 2);
/// assert_eq!(headings.entries[1].slug, "two");
/// ```
pub struct Mdx<'a, 'p> {
    input: &'a str,
    plugins: Vec<&'p mut dyn Plugin>,
}

impl<'a, 'p> Mdx<'a, 'p> {
    pub fn from(input: &'a str) -> Self {
        Mdx { input, plugins: vec![] }
    }

    pub fn plugin(mut self, plugin: &'p mut dyn Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn run(mut self) -> Result<Document> {
        let mut input = Cow::Borrowed(self.input);
        for plugin in self.plugins.iter_mut() {
            input = match input {
                Cow::Borrowed(input) => plugin.preprocess(input)?,
                Cow::Owned(input) => Cow::Owned(plugin.preprocess(&input)?.into_owned()),
            };
        }

        let mut doc = mdx::parse(&input).chain(error!("failed to parse MDX"))?;
        for plugin in self.plugins.iter_mut() {
            plugin.transform(&mut doc)?;
        }

        for plugin in self.plugins.iter_mut() {
            plugin.finalize().chain(error!("MDX plugin failed"))?;
        }

        Ok(doc)
    }
}
