//! Walks a source tree and compiles every `.jack` file to a sibling `.vm`
//! file. Each file is an independent compilation unit.

use std::{
    ffi::OsStr,
    fs,
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

pub const SOURCE_EXTENSION: &str = "jack";
pub const OUTPUT_EXTENSION: &str = "vm";

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Output files written, in source order.
    pub compiled: Vec<PathBuf>,
    /// Sources that failed, with the first error of each.
    pub failed: Vec<(PathBuf, Error)>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

fn is_source(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(SOURCE_EXTENSION))
}

/// `path` itself if it is a `.jack` file, otherwise every `.jack` file
/// below it.
pub fn find_sources(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !is_source(path) {
            return Err(Error::NotSource {
                path: path.to_path_buf(),
            });
        }
        return Ok(vec![path.to_path_buf()]);
    }

    let mut sources = vec![];
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && is_source(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Compiles one file. The output replaces the old one in a single rename,
/// and only once the whole unit has translated. A unit that fails leaves no
/// output behind, not even one from an earlier build.
pub fn compile_file(path: &Path) -> Result<PathBuf> {
    if !is_source(path) {
        return Err(Error::NotSource {
            path: path.to_path_buf(),
        });
    }
    let output = path.with_extension(OUTPUT_EXTENSION);

    let vm = match fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|source| crate::compile_to_string(&source))
    {
        Ok(vm) => vm,
        Err(err) => {
            remove_stale_output(&output);
            return Err(err);
        }
    };

    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(vm.as_bytes())?;
    file.persist(&output).map_err(io::Error::from)?;
    Ok(output)
}

fn remove_stale_output(output: &Path) {
    match fs::remove_file(output) {
        Ok(()) => debug!(output = %output.display(), "removed stale output"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (),
        Err(err) => warn!(output = %output.display(), %err, "could not remove stale output"),
    }
}

/// Compiles every source under `path` on up to `jobs` threads. A failing
/// unit is recorded in the report and does not stop the others.
pub fn build(path: &Path, jobs: usize) -> Result<BuildReport> {
    let sources = find_sources(path)?;
    let workers = jobs.clamp(1, sources.len().max(1));
    let next = AtomicUsize::new(0);
    let (next, sources) = (&next, &sources);

    let mut results = thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                s.spawn(move || {
                    let mut done = vec![];
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(source) = sources.get(i) else {
                            break;
                        };
                        done.push((i, compile_file(source)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| panic::resume_unwind(e)))
            .collect::<Vec<_>>()
    });
    results.sort_by_key(|(i, _)| *i);

    let mut report = BuildReport::default();
    for (i, result) in results {
        let source = &sources[i];
        match result {
            Ok(output) => {
                info!(source = %source.display(), output = %output.display(), "compiled");
                report.compiled.push(output);
            }
            Err(err) => {
                warn!(source = %source.display(), %err, "compilation failed");
                report.failed.push((source.clone(), err));
            }
        }
    }
    Ok(report)
}
