//! Writing rendered codecs to disk.
//!
//! Every file goes through a temporary file in its target directory and is
//! persisted with a rename, so a failed pass never leaves a truncated file.

use super::{RenderContext, Writer};
use crate::error::{Error, Result};
use crate::ir::CodecUnit;
use crate::registry::AdapterRegistry;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Replace `path` with `contents` atomically.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let io = |source: std::io::Error| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(io)?;
    tmp.write_all(contents.as_bytes()).map_err(io)?;
    tmp.as_file().sync_all().map_err(io)?;
    tmp.persist(path).map_err(|e| io(e.error))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote");
    Ok(())
}

/// What a pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Emitted {
    /// Unit sources followed by the module index.
    pub sources: Vec<PathBuf>,
    pub manifest: PathBuf,
    /// Unit files of types this pass no longer generates.
    pub removed: Vec<PathBuf>,
}

/// Render every unit with `writer` and write the sources, the index and the
/// manifest into `dir`.
pub fn emit(
    writer: &dyn Writer,
    units: &[CodecUnit],
    registry: &AdapterRegistry,
    ctx: &RenderContext,
    dir: &Path,
    manifest_file: &str,
    parallel: bool,
) -> Result<Emitted> {
    let render = |unit: &CodecUnit| {
        let name = format!("{}.{}", writer.file_stem(unit), writer.extension());
        (name, writer.write_unit(unit, registry, ctx))
    };
    #[cfg(feature = "parallel")]
    let rendered: Vec<(String, String)> = if parallel {
        units.par_iter().map(render).collect()
    } else {
        units.iter().map(render).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let rendered: Vec<(String, String)> = {
        let _ = parallel;
        units.iter().map(render).collect()
    };

    std::fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut sources = Vec::with_capacity(rendered.len() + 1);
    for (name, contents) in &rendered {
        let path = dir.join(name);
        write_atomic(&path, contents)?;
        sources.push(path);
    }
    let index = dir.join(writer.index_file());
    write_atomic(&index, &writer.write_index(units, registry, ctx))?;
    sources.push(index);

    let manifest = dir.join(manifest_file);
    registry.manifest().write(&manifest)?;

    let keep: HashSet<&Path> = sources.iter().map(PathBuf::as_path).collect();
    let removed = remove_stale(writer, dir, &keep)?;

    info!(
        dir = %dir.display(),
        files = sources.len(),
        removed = removed.len(),
        keys = registry.len(),
        language = writer.language(),
        "emitted codecs"
    );
    Ok(Emitted {
        sources,
        manifest,
        removed,
    })
}

/// Delete unit files in `dir` that `writer` produced earlier but that are not
/// in `keep`. Files it did not produce are left alone.
pub fn remove_stale(
    writer: &dyn Writer,
    dir: &Path,
    keep: &HashSet<&Path>,
) -> Result<Vec<PathBuf>> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| Error::Io { path, source }
    };
    let mut removed = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io(dir))? {
        let path = entry.map_err(io(dir))?.path();
        let is_unit = path.is_file()
            && path.extension().is_some_and(|ext| ext == writer.extension())
            && !keep.contains(path.as_path());
        if !is_unit {
            continue;
        }
        let contents = std::fs::read_to_string(&path).map_err(io(&path))?;
        if writer.is_generated_unit(&contents) {
            std::fs::remove_file(&path).map_err(io(&path))?;
            debug!(path = %path.display(), "removed stale unit");
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}
