use rustc_hash::FxHashMap;

use crate::mdx::{Attribute, AttributeValue, Element};

/// The properties passed at one invocation site, as script source text.
///
/// Every value is something that can be spliced into an expression as is:
/// a bare attribute is `true`, a string literal is JSON-quoted, and an
/// expression attribute is its source.
#[derive(Debug, Clone, Default, PartialEq, derive_more::Deref)]
pub struct Props(FxHashMap<String, String>);

impl Props {
    /// Binds the attributes of `element`. Spread attributes are skipped.
    ///
    /// ```
    /// use quill::mdx::{Element, AttributeValue, Embedded};
    /// use quill::partials::Props;
    ///
    /// let element = Element::new("Base")
    ///     .attribute("title", Some(AttributeValue::Literal("A \"b\"".into())))
    ///     .attribute("count", Some(AttributeValue::Expression(Embedded::new("1+1"))))
    ///     .attribute("open", None);
    ///
    /// let props = Props::bind(&element);
    /// assert_eq!(props["title"], r#""A \"b\"""#);
    /// assert_eq!(props["count"], "1+1");
    /// assert_eq!(props["open"], "true");
    /// ```
    pub fn bind(element: &Element) -> Self {
        let mut props = Props::default();
        for attribute in &element.attributes {
            let Attribute::Property { name, value } = attribute else { continue };
            let source = match value {
                None => "true".to_string(),
                Some(AttributeValue::Literal(s)) => serde_json::Value::from(s.as_str()).to_string(),
                Some(AttributeValue::Expression(e)) => e.value.clone(),
            };

            props.insert(name, source);
        }

        props
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.0.insert(name.into(), source.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Props(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
