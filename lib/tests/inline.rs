use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use quill::mdx::{self, Document, Node};
use quill::toc;
use quill::rayon::prelude::*;
use quill::{Diagnostic, Diagnostics, Inliner, Sandbox};

struct Site {
    dir: tempfile::TempDir,
    inliner: Inliner,
}

impl Site {
    fn new(partials: &[(&str, &str)]) -> Site {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("partials");
        fs::create_dir_all(&root).unwrap();
        let site = Site { inliner: Inliner::new(Sandbox::new(&root).unwrap()), dir };
        for (name, content) in partials {
            site.write(name, content);
        }

        site
    }

    fn partial(&self, name: &str) -> PathBuf {
        self.inliner.sandbox().root().join(name)
    }

    fn write(&self, name: &str, content: &str) {
        let path = self.partial(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn expand(&self, src: &str) -> (Document, Diagnostics) {
        let mut doc = mdx::parse(src).unwrap();
        let sink = Diagnostics::new();
        self.inliner.inline(&mut doc, &self.dir.path().join("doc.mdx"), &sink).unwrap();
        (doc, sink)
    }
}

fn heading_texts(doc: &Document) -> Vec<String> {
    toc::headings(doc).into_iter().map(|h| h.text).collect()
}

fn element_names(doc: &Document) -> Vec<String> {
    let mut names = vec![];
    doc.walk(|node| {
        if let Node::FlowElement(e) = node {
            names.extend(e.name.clone());
        }
    });

    names
}

fn esm_values(doc: &Document) -> Vec<String> {
    let mut values = vec![];
    doc.walk(|node| {
        if let Node::Esm(e) = node {
            values.push(e.value.clone());
        }
    });

    values
}

fn documentation_site() -> Site {
    Site::new(&[
        ("Base.mdx", "### `base = string`\n\nBase content."),
        ("Child.mdx", "import Base from \"./Base.mdx\";\n\n<Base />\n\n### `child = number`"),
        ("UsesComponent.mdx", concat!(
            "import InlineSVG from \"@components/InlineSVG.astro\";\n\n",
            "<InlineSVG />\n\n",
            "### `with svg`",
        )),
        ("WithProps.mdx", "### {props.Name}"),
        ("Wrapper.mdx", "import WithProps from \"./WithProps.mdx\";\n\n<WithProps Name={props.Name} />"),
    ])
}

const DOC: &str = r#"import Child from "@partials/Child.mdx";
import UsesComponent from "@partials/UsesComponent.mdx";
import Wrapper from "@partials/Wrapper.mdx";

# Doc

<Child />

<UsesComponent />

<Wrapper Name="Gadget" />"#;

#[test]
fn expands_headings_imports_and_props() {
    let site = documentation_site();
    let (doc, sink) = site.expand(DOC);
    assert!(sink.is_empty(), "{sink:?}");

    assert_eq!(heading_texts(&doc), ["Doc", "base = string", "child = number", "with svg", "Gadget"]);

    let names = element_names(&doc);
    for invocation in ["Child", "UsesComponent", "Wrapper", "WithProps", "Base"] {
        assert!(!names.iter().any(|n| n == invocation), "{invocation} left in {names:?}");
    }

    assert_eq!(names, ["InlineSVG"]);

    let imports = esm_values(&doc);
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[1], "import InlineSVG from \"@components/InlineSVG.astro\";");
    assert!(!doc.to_string().contains("props."));
    assert!(!imports.iter().any(|i| i.contains("./Base.mdx") || i.contains("./WithProps.mdx")));
}

#[test]
fn headings_map_sees_final_text() {
    let site = documentation_site();
    let (doc, _) = site.expand(DOC);
    let slugs: Vec<_> = toc::headings(&doc).into_iter().map(|h| h.slug).collect();
    assert_eq!(slugs, ["doc", "base--string", "child--number", "with-svg", "gadget"]);
}

#[test]
fn substitutes_literals_and_expressions() {
    let site = Site::new(&[("P.mdx", "{props.X + props.Y}")]);
    let (doc, sink) = site.expand("import P from '@partials/P'\n\n<P X=\"a\" Y={1+1} />");
    assert!(sink.is_empty());

    let Node::FlowExpression(e) = &doc.children[1] else { panic!("{doc:?}") };
    assert_eq!(e.value, "\"a\" + 1+1");
    assert!(e.program().is_some());
}

#[test]
fn folds_static_props() {
    let site = Site::new(&[("Title.mdx", "## {props.Name}")]);
    let (doc, _) = site.expand("import Title from '@partials/Title'\n\n<Title Name=\"Gadget\" />");
    assert_eq!(doc.children[1], Node::Heading { depth: 2, children: vec![Node::text("Gadget")] });
    assert_eq!(heading_texts(&doc), ["Gadget"]);
}

#[test]
fn cycles_produce_exactly_one_diagnostic() {
    let site = Site::new(&[
        ("A.mdx", "import B from './B.mdx'\n\n## A\n\n<B />"),
        ("B.mdx", "import C from './C.mdx'\n\n## B\n\n<C />"),
        ("C.mdx", "import A from './A.mdx'\n\n## C\n\n<A />"),
    ]);

    let (doc, sink) = site.expand("import A from '@partials/A'\n\n<A />");
    assert_eq!(heading_texts(&doc), ["A", "B", "C"]);
    assert_eq!(element_names(&doc), ["A"]);
    assert_eq!(sink.to_vec(), [Diagnostic::CyclicInclusion {
        chain: vec![site.partial("A.mdx"), site.partial("B.mdx"), site.partial("C.mdx"), site.partial("A.mdx")],
    }]);

    let message = sink.iter().next().unwrap().to_string();
    assert!(message.starts_with("Cyclic partial import detected: "));
    assert!(message.ends_with("A.mdx"));
}

#[test]
fn self_inclusion_is_a_cycle() {
    let site = Site::new(&[("Loop.mdx", "import Loop from './Loop.mdx'\n\nonce\n\n<Loop />")]);
    let (doc, sink) = site.expand("import Loop from '@partials/Loop'\n\n<Loop />");
    assert_eq!(doc.to_string(), "import Loop from '@partials/Loop'\n\nonce\n\n<Loop />\n");
    assert_eq!(sink.with_code("cyclic-inclusion").count(), 1);
}

#[test]
fn hoists_one_import_for_nested_chains() {
    let site = Site::new(&[
        ("Outer.mdx", "import Middle from './Middle.mdx'\n\n<Middle />\n\n<Middle />"),
        ("Middle.mdx", "import Inner from '@partials/deep/Inner'\n\n<Inner />"),
        ("deep/Inner.mdx", "import Badge from '@components/Badge.astro'\n\n<Badge text=\"new\" />"),
    ]);

    let (doc, sink) = site.expand("---\ntitle: Page\n---\n\nimport Outer from '@partials/Outer'\n\n<Outer />");
    assert!(sink.is_empty());

    let imports = esm_values(&doc);
    assert_eq!(imports, ["import Outer from '@partials/Outer'", "import Badge from '@components/Badge.astro'"]);
    assert_eq!(element_names(&doc), ["Badge", "Badge"]);
    assert!(matches!(doc.children[0], Node::Frontmatter { .. }));
}

#[test]
fn existing_document_imports_are_not_duplicated() {
    let site = Site::new(&[("Icon.mdx", "import { Icon } from '@astrojs/starlight/components';\n\n<Icon name=\"star\" />")]);
    let src = "import { Icon } from '@astrojs/starlight/components';\n\nimport I from '@partials/Icon'\n\n<I />";
    let (doc, _) = site.expand(src);
    let imports = esm_values(&doc);
    assert_eq!(imports.iter().filter(|i| i.contains("starlight")).count(), 1);
    assert_eq!(imports.len(), 2);
}

#[test]
fn cache_reuses_until_modified() {
    let site = Site::new(&[("Q.mdx", "## Before")]);
    let src = "import Q from '@partials/Q'\n\n<Q />";

    let (doc, _) = site.expand(src);
    assert_eq!(heading_texts(&doc), ["Before"]);
    let (doc, _) = site.expand(src);
    assert_eq!(heading_texts(&doc), ["Before"]);
    assert_eq!(site.inliner.cache().loads(), 1);

    let path = site.partial("Q.mdx");
    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    fs::write(&path, "## After").unwrap();
    File::options().write(true).open(&path).unwrap()
        .set_modified(modified + Duration::from_secs(10))
        .unwrap();

    let (doc, _) = site.expand(src);
    assert_eq!(heading_texts(&doc), ["After"]);
    assert_eq!(site.inliner.cache().loads(), 2);
}

#[test]
fn sandbox_is_enforced() {
    let site = Site::new(&[]);
    fs::write(site.dir.path().join("Secret.mdx"), "## Secret").unwrap();
    fs::write(site.dir.path().join("Other.mdx"), "## Other").unwrap();
    site.write("Leak.mdx", "import Secret from '../Secret.mdx'\n\n<Secret />");

    let src = "import Other from './Other.mdx'\nimport Leak from '@partials/Leak'\nimport Up from '@partials/../Secret.mdx'\n\n<Other />\n\n<Leak />\n\n<Up />";
    let (doc, sink) = site.expand(src);
    assert!(sink.is_empty());
    assert!(heading_texts(&doc).is_empty());
    assert_eq!(element_names(&doc), ["Other", "Secret", "Up"]);
    assert!(esm_values(&doc).iter().any(|i| i == "import Secret from '../Secret.mdx'"));
}

#[test]
fn reexpansion_is_a_no_op() {
    let site = documentation_site();
    let (mut doc, _) = site.expand(DOC);
    let once = doc.to_string();

    let sink = Diagnostics::new();
    site.inliner.inline(&mut doc, &site.dir.path().join("doc.mdx"), &sink).unwrap();
    assert_eq!(doc.to_string(), once);
    assert!(sink.is_empty());

    let reparsed = mdx::parse(&once).unwrap();
    assert_eq!(reparsed, doc);
}

#[test]
fn missing_props_are_reported_per_site() {
    let site = Site::new(&[("Card.mdx", "**{props.title}** {props.title} {props.body}")]);
    let (doc, sink) = site.expand("import Card from '@partials/Card'\n\n<Card />\n\n<Card body=\"b\" />");
    let missing: Vec<_> = sink.with_code("missing-property").map(|d| match d {
        Diagnostic::MissingProperty { name, partial } => (name.as_str(), partial.clone()),
        _ => unreachable!(),
    }).collect();

    assert_eq!(missing, [
        ("title", site.partial("Card.mdx")),
        ("body", site.partial("Card.mdx")),
        ("title", site.partial("Card.mdx")),
    ]);

    assert!(doc.to_string().contains("{props.title} b"));
}

#[test]
fn nested_directories_resolve_relatively() {
    let site = Site::new(&[
        ("guides/Steps.mdx", "import Step from '../shared/Step'\n\n<Step n={1} />\n\n<Step n={2} />"),
        ("shared/Step.md", "Step {props.n}"),
    ]);

    let (doc, sink) = site.expand("import Steps from '@partials/guides/Steps.mdx'\n\n<Steps />");
    assert!(sink.is_empty());
    assert_eq!(doc.to_string(), "import Steps from '@partials/guides/Steps.mdx'\n\nStep {1}\n\nStep {2}\n");
}

#[test]
fn relative_document_paths_resolve() {
    let site = Site::new(&[("A.mdx", "a")]);
    let mut doc = mdx::parse("import A from '@partials/A'\n\n<A />").unwrap();
    let sink = Diagnostics::new();
    site.inliner.inline(&mut doc, Path::new("relative/doc.mdx"), &sink).unwrap();
    assert_eq!(doc.to_string(), "import A from '@partials/A'\n\na\n");
}

#[test]
fn partials_expand_beside_function_exports() {
    let site = Site::new(&[("A.mdx", "## Expanded")]);
    let src = "import A from '@partials/A'\nexport function year() { return 2024 }\n\n<A />";
    let (doc, sink) = site.expand(src);
    assert!(sink.is_empty(), "{sink:?}");
    assert_eq!(heading_texts(&doc), ["Expanded"]);
    assert!(element_names(&doc).is_empty());
}

#[test]
fn partials_expand_beside_unsupported_statements() {
    let site = Site::new(&[
        ("A.mdx", "import Icon from '@components/Icon.astro'\n\n<Icon />"),
    ]);

    let src = concat!(
        "import A from '@partials/A'\n",
        "import Icon from '@components/Icon.astro'\n",
        "label: for (;;) {}\n\n",
        "<A />",
    );

    let (doc, sink) = site.expand(src);
    assert!(sink.is_empty(), "{sink:?}");
    assert_eq!(element_names(&doc), ["Icon"]);
    assert_eq!(esm_values(&doc).len(), 1);
}

#[test]
fn regex_props_substitute() {
    let site = Site::new(&[("R.mdx", "{props.slug.replace(/-/g, ' ')}")]);
    let (doc, sink) = site.expand("import R from '@partials/R'\n\n<R slug=\"a-b\" />");
    assert!(sink.is_empty(), "{sink:?}");
    assert_eq!(doc.to_string(), "import R from '@partials/R'\n\n{\"a-b\".replace(/-/g, ' ')}\n");
}

#[test]
fn folded_text_survives_printing() {
    let site = Site::new(&[("T.mdx", "## {props.t}\n\n{props.t}")]);
    for value in [r#"{"a `x`"}"#, r#"{"line\n\nbreak"}"#, r##"{"# hash"}"##, r#"{"  spaced  "}"#] {
        let (doc, sink) = site.expand(&format!("import T from '@partials/T'\n\n<T t={value} />"));
        assert!(sink.is_empty(), "{sink:?}");

        let printed = doc.to_string();
        assert_eq!(mdx::parse(&printed).unwrap(), doc, "printed:\n{printed}");
    }
}

#[test]
fn concurrent_documents_share_one_cache() {
    let site = Site::new(&[
        ("Shared.mdx", "import Leaf from './Leaf.mdx'\n\n## Shared {props.n}\n\n<Leaf />"),
        ("Leaf.mdx", "import Badge from '@components/Badge.astro'\n\n<Badge />"),
    ]);

    let src = "import Shared from '@partials/Shared'\n\n<Shared n=\"x\" />\n\n<Shared n=\"x\" />";
    let render = |_| {
        let (doc, sink) = site.expand(src);
        assert!(sink.is_empty(), "{sink:?}");
        doc.to_string()
    };

    let outputs: Vec<String> = (0..64).into_par_iter().map(render).collect();
    assert!(outputs.iter().all(|o| o == &outputs[0]));
    assert_eq!(heading_texts(&mdx::parse(&outputs[0]).unwrap()), ["Shared x", "Shared x"]);

    // Racing misses may parse a partial more than once, but never more than
    // once per worker.
    let loads = site.inliner.cache().loads();
    assert!(loads >= 2 && loads <= 2 * quill::rayon::current_num_threads(), "{loads} loads");
    assert_eq!(site.inliner.cache().len(), 2);

    let _ = render(0);
    assert_eq!(site.inliner.cache().loads(), loads);
}
