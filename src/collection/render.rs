//! Output fan-out: one worker-pool job per (document, format), plus one
//! copy job per attachment.

use super::registry::Registry;
use crate::config::CollectionConfig;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::flavor::Flavor;
use crate::log;
use crate::pool::WorkerPool;
use crate::utils::path::with_output_extension;
use crate::xml::{self, Document};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{fs, path::PathBuf, sync::Arc};

pub(super) struct Rendered {
    pub files: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// `(identifier, format, written file)`
type Done = Arc<Mutex<Vec<(String, String, PathBuf)>>>;

/// Write every requested format of every resolved document, and copy the
/// attachments. Failed jobs are recorded, not fatal.
pub(super) fn run(
    config: &CollectionConfig,
    flavor: &Arc<dyn Flavor>,
    registry: &mut Registry,
    resolved: &[(String, Document)],
    diagnostics: &Diagnostics,
) -> Result<Rendered> {
    let output = &config.build.output;
    let pool = WorkerPool::new(config.build.parallel);
    let done: Done = Arc::new(Mutex::new(Vec::new()));

    for (id, doc) in resolved {
        let entry = registry.try_get(id)?;
        let semantic: Arc<str> = Arc::from(xml::to_string(doc)?);

        // Presentation XML is derived once per document, shared by its formats.
        let presentation: Option<Arc<str>> =
            if entry.formats.iter().any(|f| flavor.uses_presentation_xml(f)) {
                Some(Arc::from(flavor.presentation(&semantic)?))
            } else {
                None
            };

        for format in &entry.formats {
            let Some(ext) = flavor.extension(format) else {
                diagnostics.record(
                    DiagnosticCode::TaskFailure,
                    Some(id),
                    format!("flavor `{}` does not produce `{format}`", flavor.name()),
                );
                continue;
            };
            let input = match &presentation {
                Some(xml) if flavor.uses_presentation_xml(format) => Arc::clone(xml),
                _ => Arc::clone(&semantic),
            };
            let out = output.join(with_output_extension(&entry.out_path, ext));
            let flavor = Arc::clone(flavor);
            let done = Arc::clone(&done);
            let id = id.clone();
            let format = format.clone();

            pool.schedule(move || {
                flavor
                    .convert(&input, &format, &out)
                    .with_context(|| format!("{id}: {format}"))?;
                done.lock().push((id, format, out));
                Ok(())
            });
        }
    }

    for entry in registry.entries().filter(|e| e.is_attachment()) {
        let source = entry.source_path.clone();
        let out = output.join(&entry.out_path);
        let done = Arc::clone(&done);
        let id = entry.identifier.clone();

        pool.schedule(move || {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &out)
                .with_context(|| format!("Failed to copy {}", source.display()))?;
            done.lock().push((id, "attachment".to_owned(), out));
            Ok(())
        });
    }

    let errors = pool.shutdown();
    for err in &errors {
        diagnostics.record(DiagnosticCode::TaskFailure, None, err.clone());
    }

    let mut written = std::mem::take(&mut *done.lock());
    written.sort_by(|a, b| a.2.cmp(&b.2));
    let mut files = Vec::with_capacity(written.len());
    for (id, format, path) in written {
        registry.update(&id, |e| {
            e.outputs.insert(format, path.clone());
        })?;
        files.push(path);
    }
    log!("render"; "{} file(s), {} failure(s)", files.len(), errors.len());

    Ok(Rendered { files, errors })
}
