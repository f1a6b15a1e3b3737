//! Collection building orchestration.
//!
//! # Architecture
//!
//! ```text
//! Collection::build()
//!     │
//!     ├── load_registry()        parse entries (rayon), register in order
//!     │
//!     ├── split_documents()      outer collection only
//!     │       │
//!     │       └── per sectionsplit entry: preprocess → chunk → render →
//!     │           manifest → nested Collection::build → adopt fragments
//!     │
//!     ├── resolve_documents()    direct → indirect → split passes (rayon)
//!     │
//!     ├── render::run()          one worker-pool job per (document, format)
//!     │
//!     └── index / concatenated XML / diagnostics report
//! ```
//!
//! A nested build (the fragments of one split document) resolves against
//! its own registry first and the outer registry second, and never splits
//! again.

pub mod anchors;
pub mod disambig;
pub mod entry;
mod index;
pub mod registry;
mod render;
pub mod suffix;

pub use entry::FileEntry;
pub use registry::{FileRefSpec, Registry, RegistryError};

use crate::config::CollectionConfig;
use crate::diagnostics::Diagnostics;
use crate::flavor::FlavorRegistry;
use crate::log;
use crate::resolver::{InternalRefs, Resolver};
use crate::sectionsplit::{SplitOptions, Splitter};
use crate::xml::{self, Document};
use anchors::XrefNumbering;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::{fs, path::PathBuf, sync::Arc};

/// Where a build runs: outer collection, or the nested collection of one
/// split document.
pub struct BuildContext<'a> {
    pub nested: bool,
    /// Registry of the enclosing collection, consulted after the own one.
    pub parent: Option<&'a Registry>,
    pub diagnostics: Arc<Diagnostics>,
    pub flavors: &'a FlavorRegistry,
}

impl<'a> BuildContext<'a> {
    pub fn new(flavors: &'a FlavorRegistry) -> Self {
        Self {
            nested: false,
            parent: None,
            diagnostics: Arc::new(Diagnostics::new()),
            flavors,
        }
    }

    fn nested_in<'b>(&'b self, parent: &'b Registry) -> BuildContext<'b> {
        BuildContext {
            nested: true,
            parent: Some(parent),
            diagnostics: Arc::clone(&self.diagnostics),
            flavors: self.flavors,
        }
    }
}

pub struct CollectionOutput {
    pub registry: Registry,
    /// Every file written, nested builds included.
    pub files: Vec<PathBuf>,
    /// Worker task failures.
    pub errors: Vec<String>,
}

pub struct Collection;

impl Collection {
    pub fn build(config: &CollectionConfig, ctx: &BuildContext) -> Result<CollectionOutput> {
        config.validate()?;
        let flavor = ctx.flavors.get(&config.build.flavor)?;
        let output = &config.build.output;
        fs::create_dir_all(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;

        let mut registry = load_registry(config, flavor.numbering(), ctx.parent)?;
        log!(
            "collection";
            "{}: {} entries{}",
            config.collection.name,
            registry.len(),
            if ctx.nested { " (split)" } else { "" }
        );

        let mut refs = InternalRefs::build(&registry, ctx.parent, &ctx.diagnostics);
        let mut files = Vec::new();
        let mut errors = Vec::new();
        if !ctx.nested {
            let nested = split_documents(config, &mut registry, &refs, ctx)?;
            files.extend(nested.files);
            errors.extend(nested.errors);
            refs.gather(&registry, ctx.parent, &ctx.diagnostics);
        }

        let resolved = resolve_documents(&mut registry, &refs, ctx);

        let rendered = render::run(config, &flavor, &mut registry, &resolved, &ctx.diagnostics)?;
        files.extend(rendered.files);
        errors.extend(rendered.errors);

        files.push(index::write_index(config, &registry, ctx.nested)?);
        if config.build.concatenate && !ctx.nested {
            files.push(index::write_concatenated(config, &registry, &resolved)?);
        }
        if !ctx.nested && !ctx.diagnostics.is_empty() {
            log!("collection"; "{} problem(s) reported", ctx.diagnostics.len());
            files.extend(ctx.diagnostics.write(output, &config.collection.name)?);
        }

        Ok(CollectionOutput {
            registry,
            files,
            errors,
        })
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Parse every document entry in parallel, then register them in
/// collection order. A nested build never reuses an output name of `parent`.
fn load_registry(
    config: &CollectionConfig,
    numbering: Arc<dyn XrefNumbering>,
    parent: Option<&Registry>,
) -> Result<Registry> {
    let specs = config
        .entries
        .par_iter()
        .map(|entry| {
            let mut spec = FileRefSpec::from_config(config, entry);
            if entry.kind.is_document() {
                let path = spec.root.join(&spec.path);
                let doc = xml::read_file(&path)
                    .with_context(|| format!("Failed to load `{}`", entry.identifier))?;
                spec.document = Some(doc);
            }
            Ok(spec)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut registry = Registry::new(
        Some(&config.collection.name),
        numbering,
        &config.build.language,
    )
    .with_indirect_key(config.collection.indirect_key.clone())
    .reserving(parent);
    for spec in specs {
        registry.register(spec)?;
    }
    Ok(registry)
}

// ============================================================================
// Section splits
// ============================================================================

struct NestedOutput {
    files: Vec<PathBuf>,
    errors: Vec<String>,
}

/// Split every `sectionsplit` document, build its fragments as a nested
/// collection, and register the fragments here.
fn split_documents(
    config: &CollectionConfig,
    registry: &mut Registry,
    refs: &InternalRefs,
    ctx: &BuildContext,
) -> Result<NestedOutput> {
    let split_ids: Vec<String> = registry
        .entries()
        .filter(|e| e.sectionsplit && !e.is_attachment())
        .map(|e| e.identifier.clone())
        .collect();

    let mut out = NestedOutput {
        files: Vec::new(),
        errors: Vec::new(),
    };
    for id in split_ids {
        let Some(doc) = registry.take_document(&id) else {
            continue;
        };
        let entry = registry.try_get(&id)?;
        let base = entry
            .out_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        let opts = SplitOptions {
            identifier: id.clone(),
            source: entry.rel_path.clone(),
            output: config.build.output.clone(),
            base: base.clone(),
            parallel: config.build.parallel,
            flavor: config.build.flavor.clone(),
            formats: entry.formats.clone(),
        };

        let resolver = Resolver::new(registry, &ctx.diagnostics);
        let splitter = Splitter::preprocess(doc, &resolver, refs, opts)
            .chunk()?
            .render()?
            .build_manifest();
        out.files.push(splitter.write_manifest()?);
        let key = splitter.key().to_owned();
        let (_, mut manifest) = splitter.into_config();
        manifest.build.parallel = config.build.parallel;
        manifest.build.language = config.build.language.clone();

        let nested = Collection::build(&manifest, &ctx.nested_in(registry))
            .with_context(|| format!("Failed to build the fragments of `{id}`"))?;
        out.files.extend(nested.files);
        out.errors.extend(nested.errors);

        adopt_fragments(registry, &id, &key, nested.registry)?;
        registry.update(&id, |e| {
            e.split_index = Some(PathBuf::from(format!("{base}.html")));
            e.indirect_key = Some(key);
        })?;
    }
    Ok(out)
}

/// Register the fragments of split `split_id` in the outer registry. Their
/// `bare` flags come from the manifest.
fn adopt_fragments(registry: &mut Registry, split_id: &str, key: &str, nested: Registry) -> Result<()> {
    for mut entry in nested.into_entries() {
        entry.document = None;
        entry.parent_id = Some(split_id.to_owned());
        entry.indirect_key = Some(key.to_owned());
        entry.sectionsplit_output = true;
        match registry.adopt(entry) {
            Ok(_) => {}
            Err(err @ RegistryError::Duplicate(_)) => log!("split"; "{split_id}: {err}"),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve every renderable document. Trees are taken out of the registry,
/// which then stays read-only while documents resolve in parallel.
fn resolve_documents(
    registry: &mut Registry,
    refs: &InternalRefs,
    ctx: &BuildContext,
) -> Vec<(String, Document)> {
    let ids: Vec<String> = registry
        .entries()
        .filter(|e| e.is_renderable())
        .map(|e| e.identifier.clone())
        .collect();
    let docs: Vec<(String, Document)> = ids
        .into_iter()
        .filter_map(|id| registry.take_document(&id).map(|doc| (id, doc)))
        .collect();

    let registry = &*registry;
    let mut resolver = Resolver::new(registry, &ctx.diagnostics);
    if ctx.nested {
        resolver = resolver.nested(ctx.parent);
    }
    docs.into_par_iter()
        .map(|(id, mut doc)| {
            resolver.resolve_document(&mut doc, &id, refs);
            (id, doc)
        })
        .collect()
}
