use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::report::{OutputTarget, RenderedOutput};

/// Resolves a report path. Absolute paths are taken as is; relative ones stay
/// under `base_dir` and may not climb out of it.
fn resolve_output_path(base_dir: &Path, raw: &Path) -> Result<PathBuf> {
    if raw.is_absolute() {
        return Ok(raw.to_path_buf());
    }

    let mut clean = PathBuf::new();
    for c in raw.components() {
        match c {
            Component::CurDir => {}
            Component::Normal(p) => clean.push(p),
            // Forbid parent traversal and any prefix/root components.
            _ => return Err(Error::InvalidOutputPath(raw.display().to_string())),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(Error::InvalidOutputPath(raw.display().to_string()));
    }

    Ok(base_dir.join(clean))
}

/// Writes every rendered report: files (creating parent directories) relative
/// to `base_dir`, stdout targets to `stdout`. Returns the files written.
pub fn write_outputs(
    base_dir: &Path,
    outputs: &[RenderedOutput],
    stdout: &mut dyn Write,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for output in outputs {
        match &output.target {
            OutputTarget::Stdout => {
                stdout.write_all(output.content.as_bytes())?;
                stdout.flush()?;
            }
            OutputTarget::File(rel) => {
                let path = resolve_output_path(base_dir, rel)?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &output.content)?;
                tracing::info!(path = %path.display(), "report written");
                written.push(path);
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> RenderedOutput {
        RenderedOutput {
            target: OutputTarget::File(PathBuf::from(path)),
            content: content.to_string(),
        }
    }

    #[test]
    fn writes_files_and_stdout() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let mut stdout = Vec::new();
        let outputs = vec![
            file("test-results/summary.json", "{}"),
            RenderedOutput {
                target: OutputTarget::Stdout,
                content: "summary\n".to_string(),
            },
        ];

        let written =
            write_outputs(dir.path(), &outputs, &mut stdout).unwrap_or_else(|e| panic!("{e}"));

        let expected = dir.path().join("test-results").join("summary.json");
        assert_eq!(written, vec![expected.clone()]);
        assert_eq!(
            std::fs::read_to_string(expected).unwrap_or_else(|e| panic!("{e}")),
            "{}"
        );
        assert_eq!(stdout, b"summary\n");
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let mut sink = Vec::new();
        for bad in ["../escape.json", "a/../../b.json", ""] {
            let res = write_outputs(dir.path(), &[file(bad, "x")], &mut sink);
            assert!(
                matches!(res, Err(Error::InvalidOutputPath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn absolute_paths_are_allowed() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
        let target = dir.path().join("nested").join("report.html");
        let mut sink = Vec::new();
        let out = RenderedOutput {
            target: OutputTarget::File(target.clone()),
            content: "<html></html>".to_string(),
        };
        write_outputs(Path::new("/nonexistent-base"), &[out], &mut sink)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(target.exists());
    }
}
