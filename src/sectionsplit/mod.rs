//! Section split: one large document → ordered standalone fragments plus a
//! collection manifest that builds them as a nested collection.
//!
//! The pipeline is a typestate chain; each step consumes the previous one:
//!
//! ```text
//! Splitter::preprocess ──► Preprocessed   document resolved standalone
//!          .chunk()    ──► Chunked        zones grouped, shell cut
//!          .render()   ──► Rendered       fragments written (worker pool)
//!          .build_manifest() ► ManifestBuilt  chunks in displayorder
//! ```
//!
//! Fragments land in `<output>/<base>_collection/<base>.<n>.xml`, `<n>` being
//! the emission index; the manifest goes next to them.

mod chunk;
mod manifest;

pub use chunk::Chunk;
pub use manifest::{ManifestInfo, SplitChunk, build_manifest, sort_chunks};

use crate::collection::anchors::DefaultNumbering;
use crate::collection::registry::{FileRefSpec, Registry, RegistryError};
use crate::config::CollectionConfig;
use crate::diagnostics::Diagnostics;
use crate::log;
use crate::pool::WorkerPool;
use crate::resolver::{InternalRefs, Resolver, split::localize};
use crate::utils::ident::collapse_whitespace;
use crate::utils::path::to_slash;
use crate::xml::{self, Document, XmlError};
use parking_lot::Mutex;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error(transparent)]
    Xml(#[from] XmlError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("`{0}` has no sections to split")]
    Empty(String),

    #[error("failed to write `{0}`")]
    Write(PathBuf, #[source] io::Error),

    #[error("rendering fragments failed: {}", .0.join("; "))]
    Render(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub identifier: String,
    /// Source path of the document; seeds the split key.
    pub source: PathBuf,
    /// Output directory of the enclosing collection.
    pub output: PathBuf,
    /// Base name of fragment files.
    pub base: String,
    pub parallel: usize,
    pub flavor: String,
    pub formats: Vec<String>,
}

impl SplitOptions {
    /// Directory receiving fragment sources and the manifest.
    pub fn fragment_dir(&self) -> PathBuf {
        self.output.join(format!("{}_collection", self.base))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.fragment_dir().join(format!("{}.manifest.toml", self.base))
    }
}

/// Eight uppercase letters derived from the identifier and source path.
pub fn split_key(identifier: &str, source: &Path) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(identifier.as_bytes());
    hasher.update(&[0]);
    hasher.update(to_slash(source).as_bytes());
    hasher.finalize().as_bytes()[..8]
        .iter()
        .map(|b| char::from(b'A' + b % 26))
        .collect()
}

// ============================================================================
// Typestate
// ============================================================================

pub struct Preprocessed;

pub struct Chunked {
    chunks: Vec<Chunk>,
    shell: Document,
}

pub struct Rendered {
    chunks: Vec<SplitChunk>,
}

pub struct ManifestBuilt {
    chunks: Vec<SplitChunk>,
    manifest: CollectionConfig,
}

pub struct Splitter<S> {
    source: Arc<Document>,
    opts: SplitOptions,
    key: String,
    state: S,
}

impl<S> Splitter<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &SplitOptions {
        &self.opts
    }
}

impl Splitter<Preprocessed> {
    /// Resolve `doc` as a standalone document of `resolver`'s collection.
    pub fn preprocess(
        mut doc: Document,
        resolver: &Resolver,
        refs: &InternalRefs,
        opts: SplitOptions,
    ) -> Self {
        resolver.resolve_document(&mut doc, &opts.identifier, refs);
        let key = split_key(&opts.identifier, &opts.source);
        log!("split"; "{} (key {key})", opts.identifier);
        Self {
            source: Arc::new(doc),
            opts,
            key,
            state: Preprocessed,
        }
    }

    pub fn chunk(self) -> Result<Splitter<Chunked>, SplitError> {
        let chunks = chunk::chunks(&self.source);
        if chunks.is_empty() {
            return Err(SplitError::Empty(self.opts.identifier));
        }
        let shell = chunk::shell(&self.source);
        Ok(Splitter {
            source: self.source,
            opts: self.opts,
            key: self.key,
            state: Chunked { chunks, shell },
        })
    }
}

impl Splitter<Chunked> {
    pub fn chunks(&self) -> &[Chunk] {
        &self.state.chunks
    }

    /// Write every fragment on the worker pool.
    pub fn render(self) -> Result<Splitter<Rendered>, SplitError> {
        let dir = self.opts.fragment_dir();
        fs::create_dir_all(&dir).map_err(|err| SplitError::Write(dir.clone(), err))?;

        let shell = Arc::new(self.state.shell);
        let results = Arc::new(Mutex::new(Vec::with_capacity(self.state.chunks.len())));
        let pool = WorkerPool::new(self.opts.parallel);

        for (index, chunk) in self.state.chunks.into_iter().enumerate() {
            let shell = Arc::clone(&shell);
            let source = Arc::clone(&self.source);
            let results = Arc::clone(&results);
            let key = self.key.clone();
            let url = format!("{}.{index}.xml", self.opts.base);
            let path = dir.join(&url);

            pool.schedule(move || {
                let mut fragment = chunk::fragment(&shell, &source, &chunk, index);
                localize(&mut fragment, &source, &key);
                let text = xml::to_string(&fragment)?;
                fs::write(&path, text).map_err(|err| SplitError::Write(path.clone(), err))?;
                results.lock().push(SplitChunk {
                    order: chunk.order,
                    index,
                    url,
                    title: chunk.title,
                });
                Ok(())
            });
        }

        let errors = pool.shutdown();
        if !errors.is_empty() {
            return Err(SplitError::Render(errors));
        }
        let mut chunks = std::mem::take(&mut *results.lock());
        sort_chunks(&mut chunks);
        log!("split"; "{}: {} fragments", self.opts.identifier, chunks.len());

        Ok(Splitter {
            source: self.source,
            opts: self.opts,
            key: self.key,
            state: Rendered { chunks },
        })
    }
}

impl Splitter<Rendered> {
    pub fn chunks(&self) -> &[SplitChunk] {
        &self.state.chunks
    }

    pub fn build_manifest(self) -> Splitter<ManifestBuilt> {
        let info = ManifestInfo {
            name: self.opts.base.clone(),
            title: document_title(&self.source).unwrap_or_else(|| self.opts.identifier.clone()),
            identifier: self.opts.identifier.clone(),
            indirect_key: self.key.clone(),
            output: self.opts.output.clone(),
            flavor: self.opts.flavor.clone(),
            formats: self.opts.formats.clone(),
        };
        let manifest = build_manifest(&self.state.chunks, &info);
        Splitter {
            source: self.source,
            opts: self.opts,
            key: self.key,
            state: ManifestBuilt {
                chunks: self.state.chunks,
                manifest,
            },
        }
    }
}

impl Splitter<ManifestBuilt> {
    pub fn chunks(&self) -> &[SplitChunk] {
        &self.state.chunks
    }

    pub fn manifest(&self) -> &CollectionConfig {
        &self.state.manifest
    }

    /// Write `<base>.manifest.toml` next to the fragments.
    pub fn write_manifest(&self) -> Result<PathBuf, SplitError> {
        let path = self.opts.manifest_path();
        let text = self
            .state
            .manifest
            .to_toml()
            .map_err(|err| SplitError::Write(path.clone(), io::Error::other(err.to_string())))?;
        fs::write(&path, text).map_err(|err| SplitError::Write(path.clone(), err))?;
        Ok(path)
    }

    /// Manifest ready to build, its entries resolved against the fragment
    /// directory.
    pub fn into_config(self) -> (Vec<SplitChunk>, CollectionConfig) {
        let mut config = self.state.manifest;
        config.root = self.opts.fragment_dir();
        config.config_path = self.opts.manifest_path();
        (self.state.chunks, config)
    }
}

fn document_title(doc: &Document) -> Option<String> {
    let root = doc.root()?;
    let bibdata = doc.child(root, "bibdata")?;
    let title = doc.child(bibdata, "title")?;
    Some(collapse_whitespace(&doc.text_content(title))).filter(|t| !t.is_empty())
}

// ============================================================================
// Standalone entry point
// ============================================================================

/// Split the document at `input` on its own: resolve it, write its
/// fragments and manifest, and return the fragments in display order.
pub fn split(input: &Path, opts: &SplitOptions) -> Result<Vec<SplitChunk>, SplitError> {
    let doc = xml::read_file(input)?;

    let mut registry = Registry::new(None, Arc::new(DefaultNumbering), "en");
    let path = input.file_name().map(PathBuf::from).unwrap_or_default();
    let root = input.parent().map(Path::to_path_buf).unwrap_or_default();
    registry.register(FileRefSpec {
        identifier: opts.identifier.clone(),
        path,
        root,
        document: Some(doc),
        ..FileRefSpec::default()
    })?;
    let identifier = registry.normalize(&opts.identifier);
    let doc = registry
        .take_document(&identifier)
        .ok_or_else(|| SplitError::Empty(identifier.clone()))?;

    let diagnostics = Diagnostics::new();
    let refs = InternalRefs::build(&registry, None, &diagnostics);
    let resolver = Resolver::new(&registry, &diagnostics);
    let splitter = Splitter::preprocess(doc, &resolver, &refs, opts.clone())
        .chunk()?
        .render()?
        .build_manifest();
    splitter.write_manifest()?;
    Ok(splitter.chunks().to_vec())
}
