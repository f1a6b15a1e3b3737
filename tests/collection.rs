//! End-to-end collection builds from a temporary directory.

use mn_collection::collection::{BuildContext, Collection};
use mn_collection::config::CollectionConfig;
use mn_collection::diagnostics::DiagnosticCode;
use mn_collection::flavor::FlavorRegistry;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ISO1: &str = r#"<standard-document>
  <bibdata><title>Widgets</title><docidentifier>ISO 1</docidentifier></bibdata>
  <sections>
    <clause id="sec1"><title>Scope</title></clause>
    <clause id="sec2"><title>Terms</title></clause>
  </sections>
</standard-document>"#;

const BIG: &str = r#"<standard-document>
  <bibdata><title>Big</title><docidentifier>ISO 9</docidentifier></bibdata>
  <preface><foreword id="fwd" displayorder="1"><title>Foreword</title><p>See <xref target="c2"/>.</p></foreword></preface>
  <sections>
    <clause id="c1" displayorder="2"><title>Scope</title></clause>
    <clause id="c2" displayorder="3"><title>Terms</title></clause>
  </sections>
</standard-document>"#;

fn citing(target: &str, anchor: &str) -> String {
    format!(
        r#"<standard-document>
  <bibdata><title>Gadgets</title><docidentifier>ISO 2</docidentifier></bibdata>
  <sections><clause id="c"><p>
    <eref bibitemid="ref1"><localityStack><locality type="anchor"><referenceFrom>{anchor}</referenceFrom></locality></localityStack></eref>
  </p></clause></sections>
  <bibliography><references id="norm">
    <bibitem id="ref1"><docidentifier type="repository">current-metanorma-collection/{target}</docidentifier></bibitem>
  </references></bibliography>
</standard-document>"#
    )
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn load(dir: &Path, toml: &str) -> CollectionConfig {
    write(dir, "collection.toml", toml);
    CollectionConfig::from_path(&dir.join("collection.toml")).unwrap()
}

const BASIC: &str = r#"
[collection]
name = "coll"
title = "Test Collection"

[build]
output = "out"
parallel = 2

[[entry]]
identifier = "ISO 1"
file = "iso1.xml"

[[entry]]
identifier = "ISO 2"
file = "iso2.xml"

[[entry]]
identifier = "logo"
file = "img/logo.svg"
kind = "attachment"
"#;

#[test]
fn test_build_resolves_and_writes_outputs() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "iso1.xml", ISO1);
    write(dir.path(), "iso2.xml", &citing("ISO 1", "sec1"));
    write(dir.path(), "img/logo.svg", "<svg/>");
    let config = load(dir.path(), BASIC);

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let output = Collection::build(&config, &ctx).unwrap();
    assert!(output.errors.is_empty());
    assert!(ctx.diagnostics.is_empty());

    let out = &config.build.output;
    for name in ["iso1.xml", "iso2.xml", "img/logo.svg", "index.html", "coll.xml"] {
        assert!(out.join(name).exists(), "{name} missing");
    }
    assert!(!out.join("coll.err.json").exists());

    let iso2 = fs::read_to_string(out.join("iso2.xml")).unwrap();
    assert!(iso2.contains("<referenceFrom>sec1_ISO_1</referenceFrom>"));
    assert!(iso2.contains(r#"<uri type="citation">iso1.html</uri>"#));

    let iso1 = fs::read_to_string(out.join("iso1.xml")).unwrap();
    assert!(iso1.contains(r#"id="sec1_ISO_1""#));

    let index = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains(r#"<a href="iso1.xml">Widgets</a>"#));
    assert!(index.contains(r#"<a href="img/logo.svg">"#));

    let entry = output.registry.get("ISO 2").unwrap();
    assert_eq!(entry.outputs.get("xml"), Some(&out.join("iso2.xml")));
}

#[test]
fn test_unresolved_anchor_writes_error_report() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "iso1.xml", ISO1);
    write(dir.path(), "iso2.xml", &citing("ISO 1", "nosuch"));
    write(dir.path(), "img/logo.svg", "<svg/>");
    let config = load(dir.path(), BASIC);

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let output = Collection::build(&config, &ctx).unwrap();

    assert_eq!(ctx.diagnostics.count(DiagnosticCode::UnresolvedReference), 1);
    let out = &config.build.output;
    assert!(out.join("coll.err.json").exists());
    assert!(out.join("coll.err.html").exists());
    assert!(output.files.contains(&out.join("coll.err.json")));

    let iso2 = fs::read_to_string(out.join("iso2.xml")).unwrap();
    assert!(!iso2.contains("nosuch"));
}

#[test]
fn test_missing_source_aborts_before_output() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "iso1.xml", ISO1);
    let config = load(dir.path(), BASIC);

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let err = Collection::build(&config, &ctx).err().unwrap();
    assert!(format!("{err:#}").contains("ISO 2"));
    assert!(!config.build.output.join("iso1.xml").exists());
}

#[test]
fn test_sectionsplit_collection() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "big.xml", BIG);
    write(dir.path(), "iso2.xml", &citing("ISO 9", "c2"));
    let config = load(
        dir.path(),
        r#"
[collection]
name = "coll"

[build]
output = "out"
parallel = 2

[[entry]]
identifier = "ISO 9"
file = "big.xml"
sectionsplit = true

[[entry]]
identifier = "ISO 2"
file = "iso2.xml"
"#,
    );

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let output = Collection::build(&config, &ctx).unwrap();
    assert!(output.errors.is_empty());
    assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics.entries());

    let out = &config.build.output;
    for name in [
        "big_collection/big.0.xml",
        "big_collection/big.manifest.toml",
        "big.0.xml",
        "big.1.xml",
        "big.2.xml",
        "big.html",
        "iso2.xml",
        "index.html",
    ] {
        assert!(out.join(name).exists(), "{name} missing");
    }
    // the split document itself is not rendered
    assert!(!out.join("big.xml").exists());

    // fragment order follows displayorder
    let manifest =
        CollectionConfig::from_str(&fs::read_to_string(out.join("big_collection/big.manifest.toml")).unwrap())
            .unwrap();
    let ids: Vec<_> = manifest.entries.iter().map(|e| e.identifier.as_str()).collect();
    assert_eq!(ids, vec!["ISO 9 Foreword", "ISO 9 Scope", "ISO 9 Terms"]);

    // the foreword's cross-reference now points at the Terms fragment
    let foreword = fs::read_to_string(out.join("big.0.xml")).unwrap();
    assert!(foreword.contains(r#"citeas="ISO 9 Terms""#));
    assert!(foreword.contains("big.2.html"));

    // the citation from ISO 2 moves to the fragment holding c2
    let iso2 = fs::read_to_string(out.join("iso2.xml")).unwrap();
    assert!(iso2.contains(r#"bibitemid="ISO_9_Terms_ISO_2""#));
    assert!(iso2.contains("big.2.html"));

    let registry = &output.registry;
    let split = registry.get("ISO 9").unwrap();
    assert!(split.indirect_key.is_some());
    assert_eq!(split.link_target(), Path::new("big.html"));
    let fragments: Vec<_> = registry
        .entries()
        .filter(|e| e.parent_id.as_deref() == Some("ISO 9"))
        .collect();
    assert_eq!(fragments.len(), 3);
    assert!(!fragments[0].bare);
    assert!(fragments[1].bare && fragments[2].bare);

    let index = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains(r#"href="big.html""#));
    assert!(!index.contains("big.0.html"));
}

#[test]
fn test_split_fragments_never_reuse_an_output_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "big.xml", BIG);
    write(dir.path(), "big.1.xml", ISO1);
    let config = load(
        dir.path(),
        r#"
[collection]
name = "coll"

[build]
output = "out"

[[entry]]
identifier = "ISO 9"
file = "big.xml"
sectionsplit = true

[[entry]]
identifier = "ISO 1"
file = "big.1.xml"
"#,
    );

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let output = Collection::build(&config, &ctx).unwrap();
    assert!(output.errors.is_empty());

    let registry = &output.registry;
    let mut seen = HashSet::new();
    for entry in registry.entries() {
        assert!(seen.insert(entry.out_path.clone()), "{} reused", entry.out_path.display());
    }
    assert_eq!(registry.get("ISO 1").unwrap().out_path, Path::new("big.1.xml"));
    assert_eq!(registry.get("ISO 9 Scope").unwrap().out_path, Path::new("big.2.xml"));
    assert_eq!(registry.get("ISO 9 Terms").unwrap().out_path, Path::new("big.3.xml"));

    let out = &config.build.output;
    assert!(fs::read_to_string(out.join("big.1.xml")).unwrap().contains(r#"id="sec1_ISO_1""#));
    assert!(fs::read_to_string(out.join("big.2.xml")).unwrap().contains(r#"id="c1_ISO_9""#));
    assert!(fs::read_to_string(out.join("big.3.xml")).unwrap().contains(r#"id="c2_ISO_9""#));
}

#[test]
fn test_attachments_stay_with_first_emitted_fragment() {
    let dir = TempDir::new().unwrap();
    let big = BIG
        .replace(r#"<foreword id="fwd" displayorder="1">"#, r#"<foreword id="fwd" displayorder="9">"#)
        .replace(
            "<preface>",
            r#"<metanorma-extension><attachment name="a.pdf"/></metanorma-extension><preface>"#,
        );
    write(dir.path(), "big.xml", &big);
    let config = load(
        dir.path(),
        r#"
[collection]
name = "coll"

[build]
output = "out"

[[entry]]
identifier = "ISO 9"
file = "big.xml"
sectionsplit = true
"#,
    );

    let flavors = FlavorRegistry::with_builtin();
    let ctx = BuildContext::new(&flavors);
    let output = Collection::build(&config, &ctx).unwrap();

    let registry = &output.registry;
    let bare: Vec<_> = registry
        .entries()
        .filter(|e| e.parent_id.is_some())
        .map(|e| (e.identifier.as_str(), e.bare))
        .collect();
    assert_eq!(
        bare,
        vec![("ISO 9 Scope", true), ("ISO 9 Terms", true), ("ISO 9 Foreword", false)]
    );

    let out = &config.build.output;
    let foreword = &registry.get("ISO 9 Foreword").unwrap().out_path;
    assert!(fs::read_to_string(out.join(foreword)).unwrap().contains("a.pdf"));
    let scope = &registry.get("ISO 9 Scope").unwrap().out_path;
    assert!(!fs::read_to_string(out.join(scope)).unwrap().contains("a.pdf"));

    let page = fs::read_to_string(out.join("big.html")).unwrap();
    let lead = format!(r#"<h1><a href="{}">"#, foreword.display());
    assert!(page.contains(&lead), "{page}");
}
