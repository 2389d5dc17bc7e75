//! Render-and-notify pipeline.
//!
//! Each job renders one template against the resolved instances and replaces
//! its destination atomically. A failing job is logged and skipped; the
//! notify command runs once after all jobs were attempted.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rgen_events::Instance;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::notify::run_notify;

/// Render errors, scoped to a single job.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template {path}: {reason}")]
    Template { path: PathBuf, reason: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A template and the file it renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl TemplateJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl FromStr for TemplateJob {
    type Err = ConfigError;

    /// Parse a `SRC:DEST` pair.
    fn from_str(pair: &str) -> Result<Self, Self::Err> {
        match pair.split_once(':') {
            Some((source, destination)) if !source.is_empty() && !destination.is_empty() => {
                Ok(Self::new(source, destination))
            }
            _ => Err(ConfigError::InvalidTemplate(pair.to_string())),
        }
    }
}

/// Bindings visible to templates.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    pub containers: &'a [Instance],
}

impl<'a> RenderContext<'a> {
    pub fn new(containers: &'a [Instance]) -> Self {
        Self { containers }
    }
}

/// Outcome of one `apply` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Jobs whose destination was replaced.
    pub rendered: usize,

    /// Jobs that failed to read, render or write.
    pub failed: usize,

    /// Notify command ran and exited successfully.
    pub notified: bool,

    /// Nothing was attempted because the resolution was empty.
    pub skipped: bool,
}

/// Job list plus the optional notify command.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    jobs: Vec<TemplateJob>,
    notify: Option<String>,
    skip_empty: bool,
}

impl RenderPipeline {
    pub fn new(jobs: Vec<TemplateJob>, notify: Option<String>) -> Self {
        Self {
            jobs,
            notify: notify.filter(|command| !command.trim().is_empty()),
            skip_empty: false,
        }
    }

    /// Skip render and notify when there are no instances.
    pub fn skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    pub fn jobs(&self) -> &[TemplateJob] {
        &self.jobs
    }

    /// Render every job, then run the notify command once.
    ///
    /// Blocking: file and process I/O happen on the calling thread.
    pub fn apply(&self, instances: &[Instance]) -> RenderReport {
        let mut report = RenderReport::default();

        if self.skip_empty && instances.is_empty() {
            info!("No instances resolved, skipping render");
            report.skipped = true;
            return report;
        }

        for job in &self.jobs {
            match render_job(job, instances) {
                Ok(()) => {
                    info!(
                        template = %job.source.display(),
                        destination = %job.destination.display(),
                        instances = instances.len(),
                        "Rendered template"
                    );
                    report.rendered += 1;
                }
                Err(e) => {
                    error!(
                        template = %job.source.display(),
                        destination = %job.destination.display(),
                        error = %e,
                        "Template job failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if let Some(command) = &self.notify {
            match run_notify(command) {
                Ok(()) => {
                    info!(command = %command, "Notify command completed");
                    report.notified = true;
                }
                Err(e) => warn!(command = %command, error = %e, "Notify command failed"),
            }
        }

        report
    }
}

fn render_job(job: &TemplateJob, instances: &[Instance]) -> Result<(), RenderError> {
    let rendered = render_template(&job.source, instances)?;
    write_atomic(&job.destination, rendered.as_bytes())
}

/// Render the template at `path` with `containers` bound to `instances`.
///
/// Templates next to it can be pulled in with `include`, `extends` and
/// `import`, named by their path relative to the template's directory.
pub fn render_template(path: &Path, instances: &[Instance]) -> Result<String, RenderError> {
    let template_err = |e: tera::Error| RenderError::Template {
        path: path.to_path_buf(),
        reason: error_chain(&e),
    };

    let (tera, name) = load_templates(path)?;
    let context =
        tera::Context::from_serialize(RenderContext::new(instances)).map_err(template_err)?;
    tera.render(&name, &context).map_err(template_err)
}

/// How far below the template's directory siblings are picked up.
const SIBLING_DEPTH: usize = 3;

/// Larger files are not treated as templates.
const SIBLING_MAX_BYTES: u64 = 1024 * 1024;

/// Load the template at `path` plus the usable templates around it.
///
/// Siblings that fail to parse, or that extend or import something missing,
/// are left out so they only break the templates that reference them.
fn load_templates(path: &Path) -> Result<(tera::Tera, String), RenderError> {
    let contents = fs::read_to_string(path).map_err(|source| RenderError::ReadTemplate {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let extension = path.extension().map(|e| e.to_os_string());
    // Without an extension there is no telling templates from other files.
    let depth = if extension.is_some() { SIBLING_DEPTH } else { 0 };

    let mut found = Vec::new();
    collect_siblings(dir, "", depth, extension.as_deref(), &mut found);
    found.retain(|(sibling, _)| *sibling != name);

    let mut siblings: Vec<(String, String, tera::Template)> = found
        .into_iter()
        .filter_map(|(sibling, source)| match tera::Template::new(&sibling, None, &source) {
            Ok(parsed) => Some((sibling, source, parsed)),
            Err(e) => {
                debug!(template = %sibling, error = %error_chain(&e), "Skipping sibling template");
                None
            }
        })
        .collect();

    loop {
        let unresolved = unresolved_siblings(&siblings, &name);
        if unresolved.is_empty() {
            break;
        }
        siblings.retain(|(sibling, _, _)| !unresolved.contains(sibling));
    }

    let mut tera = tera::Tera::default();
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(
        siblings
            .into_iter()
            .map(|(sibling, source, _)| (sibling, source))
            .chain(std::iter::once((name.clone(), contents))),
    )
    .map_err(|e| RenderError::Template {
        path: path.to_path_buf(),
        reason: error_chain(&e),
    })?;

    Ok((tera, name))
}

/// Siblings whose parent or imported macro file is not loadable.
fn unresolved_siblings(siblings: &[(String, String, tera::Template)], main: &str) -> Vec<String> {
    let known: HashSet<&str> = siblings
        .iter()
        .map(|(sibling, _, _)| sibling.as_str())
        .chain(std::iter::once(main))
        .collect();

    siblings
        .iter()
        .filter(|(_, _, parsed)| {
            parsed.parent.iter().any(|p| !known.contains(p.as_str()))
                || parsed
                    .imported_macro_files
                    .iter()
                    .any(|(file, _)| !known.contains(file.as_str()))
        })
        .map(|(sibling, _, _)| sibling.clone())
        .collect()
}

fn collect_siblings(
    dir: &Path,
    prefix: &str,
    depth: usize,
    extension: Option<&std::ffi::OsStr>,
    found: &mut Vec<(String, String)>,
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot list template directory");
            return;
        }
    };

    for entry in entries.filter_map(Result::ok) {
        let entry_path = entry.path();
        let Ok(metadata) = fs::metadata(&entry_path) else {
            continue;
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            file_name
        } else {
            format!("{prefix}/{file_name}")
        };

        if metadata.is_dir() {
            if depth > 0 {
                collect_siblings(&entry_path, &relative, depth - 1, extension, found);
            }
            continue;
        }
        if !metadata.is_file() || metadata.len() > SIBLING_MAX_BYTES {
            continue;
        }
        if extension.is_some() && entry_path.extension() != extension {
            continue;
        }
        if let Ok(source) = fs::read_to_string(&entry_path) {
            found.push((relative, source));
        }
    }
}

/// Tera puts the useful detail in the source chain.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Replace `path` with `contents` via a temp file in the same directory.
///
/// Readers see either the old file or the new one, never a partial write.
/// A symlinked destination stays a symlink: the file it points at is
/// replaced instead, so that file's directory must be writable.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RenderError> {
    let write_err = |source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    };

    let target = resolve_destination(path).map_err(write_err)?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(contents).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;
    set_permissions(temp.as_file(), &target).map_err(write_err)?;

    temp.persist(&target).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), target = %target.display(), bytes = contents.len(), "Replaced file");
    Ok(())
}

fn resolve_destination(path: &Path) -> std::io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => fs::canonicalize(path),
        _ => Ok(path.to_path_buf()),
    }
}

/// Keep the destination's mode; new files get 0644 instead of tempfile's 0600.
#[cfg(unix)]
fn set_permissions(file: &fs::File, destination: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(destination) {
        Ok(metadata) => metadata.permissions(),
        Err(_) => fs::Permissions::from_mode(0o644),
    };
    file.set_permissions(permissions)
}

#[cfg(not(unix))]
fn set_permissions(_file: &fs::File, _destination: &Path) -> std::io::Result<()> {
    Ok(())
}
