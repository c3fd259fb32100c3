//! HTML-to-PDF rendering.
//!
//! The [`Renderer`] trait is the seam between the pipeline and the external
//! tool. The production implementation is [`CommandRenderer`], which shells
//! out to `wkhtmltopdf` (or any CLI with the same `<flags> <in> <out>`
//! calling convention):
//!
//! ```text
//! wkhtmltopdf --enable-local-file-access .tmp/ebook.html ebook.pdf
//! ```
//!
//! The local-file-access flag is required: the document links its stylesheet
//! and every image through absolute `file://` URLs.

use crate::config::RendererConfig;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Renderer '{program}' not found: install it and ensure it is on PATH")]
    Unavailable { program: String },
    #[error("Failed to start renderer '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("Renderer did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("Renderer reported success but {} was not created", .0.display())]
    MissingOutput(PathBuf),
}

/// Converts an HTML file into a PDF file.
pub trait Renderer {
    fn render(&self, html: &Path, pdf: &Path) -> Result<(), RenderError>;
}

/// Runs an external renderer binary.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &RendererConfig) -> Self {
        let mut args = Vec::with_capacity(config.extra_args.len() + 1);
        if !config.local_file_access_flag.is_empty() {
            args.push(config.local_file_access_flag.clone());
        }
        args.extend(config.extra_args.iter().cloned());
        Self::new(
            config.program.clone(),
            args,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Resolve the program on `PATH` (or as a path).
    pub fn locate(&self) -> Result<PathBuf, RenderError> {
        which::which(&self.program).map_err(|_| RenderError::Unavailable {
            program: self.program.clone(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, html: &Path, pdf: &Path) -> Result<(), RenderError> {
        let binary = self.locate()?;
        tracing::info!(renderer = %binary.display(), html = %html.display(), pdf = %pdf.display(), "rendering PDF");

        let mut child = Command::new(&binary)
            .args(&self.args)
            .arg(html)
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain stderr concurrently; wkhtmltopdf writes progress there and a
        // full pipe would block it.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let status = match wait_with_timeout(&mut child, self.timeout) {
            Ok(status) => status,
            Err(e) => {
                discard_output(pdf);
                return Err(e);
            }
        };
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if !status.success() {
            // wkhtmltopdf may write a complete-looking file before exiting 1.
            discard_output(pdf);
            return Err(RenderError::Failed {
                status,
                stderr: stderr.trim().to_string(),
            });
        }
        if !pdf.is_file() {
            return Err(RenderError::MissingOutput(pdf.to_path_buf()));
        }
        Ok(())
    }
}

/// Remove whatever a failed run left at `pdf`. Absent files are fine.
pub fn discard_output(pdf: &Path) {
    match fs::remove_file(pdf) {
        Ok(()) => tracing::debug!(path = %pdf.display(), "removed partial PDF"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %pdf.display(), error = %e, "cannot remove partial PDF"),
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RenderError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RenderError::TimedOut(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll renderer, waiting without timeout");
                return child.wait().map_err(|source| RenderError::Spawn {
                    program: String::from("renderer"),
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Fake renderer that records calls and writes a stub PDF.
    #[derive(Default)]
    pub struct RecordingRenderer {
        pub calls: RefCell<Vec<(PathBuf, PathBuf)>>,
    }

    impl Renderer for RecordingRenderer {
        fn render(&self, html: &Path, pdf: &Path) -> Result<(), RenderError> {
            self.calls
                .borrow_mut()
                .push((html.to_path_buf(), pdf.to_path_buf()));
            fs::write(pdf, b"%PDF-1.4\n").map_err(|source| RenderError::Spawn {
                program: "fake".to_string(),
                source,
            })?;
            Ok(())
        }
    }

    #[test]
    fn from_config_puts_local_file_flag_first() {
        let config = RendererConfig {
            extra_args: vec!["--page-size".to_string(), "A5".to_string()],
            ..RendererConfig::default()
        };
        let renderer = CommandRenderer::from_config(&config);
        assert_eq!(renderer.program(), "wkhtmltopdf");
        assert_eq!(
            renderer.args(),
            &["--enable-local-file-access", "--page-size", "A5"]
        );
    }

    #[test]
    fn from_config_empty_flag_is_omitted() {
        let config = RendererConfig {
            local_file_access_flag: String::new(),
            ..RendererConfig::default()
        };
        assert!(CommandRenderer::from_config(&config).args().is_empty());
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let renderer = CommandRenderer::new(
            "ebook-builder-no-such-renderer",
            vec![],
            Duration::from_secs(5),
        );
        let err = renderer
            .render(&tmp.path().join("in.html"), &tmp.path().join("out.pdf"))
            .unwrap_err();
        assert!(matches!(err, RenderError::Unavailable { .. }));
        assert!(err.to_string().contains("ensure it is on PATH"));
    }

    /// Renderer running a shell script through `sh`, so the script file never
    /// needs to be executable.
    #[cfg(unix)]
    fn script_renderer(dir: &Path, body: &str, extra: &[&str], timeout: Duration) -> CommandRenderer {
        let path = dir.join("renderer.sh");
        fs::write(&path, format!("{body}\n")).unwrap();
        let mut args = vec![path.to_string_lossy().into_owned()];
        args.extend(extra.iter().map(|a| a.to_string()));
        CommandRenderer::new("sh", args, timeout)
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_surfaces_stderr() {
        let tmp = TempDir::new().unwrap();
        let renderer = script_renderer(
            tmp.path(),
            "echo 'Exit with code 1 due to network error' >&2\nexit 1",
            &[],
            Duration::from_secs(10),
        );

        let err = renderer
            .render(&tmp.path().join("in.html"), &tmp.path().join("out.pdf"))
            .unwrap_err();
        match err {
            RenderError::Failed { status, stderr } => {
                assert_eq!(status.code(), Some(1));
                assert!(stderr.contains("network error"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_removes_partial_output() {
        let tmp = TempDir::new().unwrap();
        let renderer = script_renderer(
            tmp.path(),
            "for last; do :; done\necho '%PDF-partial' > \"$last\"\necho 'Exit with code 1 due to network error' >&2\nexit 1",
            &[],
            Duration::from_secs(10),
        );
        let pdf = tmp.path().join("out.pdf");

        let err = renderer.render(&tmp.path().join("in.html"), &pdf).unwrap_err();

        assert!(matches!(err, RenderError::Failed { .. }));
        assert!(!pdf.exists());
    }

    #[cfg(unix)]
    #[test]
    fn passes_args_then_input_then_output() {
        let tmp = TempDir::new().unwrap();
        // Writes its argument list into the output path (last argument).
        let renderer = script_renderer(
            tmp.path(),
            "for last; do :; done\necho \"$@\" > \"$last\"",
            &["--enable-local-file-access"],
            Duration::from_secs(10),
        );
        let html = tmp.path().join("in.html");
        let pdf = tmp.path().join("out.pdf");
        renderer.render(&html, &pdf).unwrap();

        let recorded = fs::read_to_string(&pdf).unwrap();
        assert_eq!(
            recorded.trim(),
            format!("--enable-local-file-access {} {}", html.display(), pdf.display())
        );
    }

    #[cfg(unix)]
    #[test]
    fn success_without_output_is_error() {
        let tmp = TempDir::new().unwrap();
        let renderer = script_renderer(tmp.path(), "exit 0", &[], Duration::from_secs(10));
        let err = renderer
            .render(&tmp.path().join("in.html"), &tmp.path().join("out.pdf"))
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn hung_renderer_times_out() {
        let tmp = TempDir::new().unwrap();
        let renderer = script_renderer(
            tmp.path(),
            "for last; do :; done\necho '%PDF-partial' > \"$last\"\nexec sleep 30",
            &[],
            Duration::from_millis(500),
        );
        let pdf = tmp.path().join("out.pdf");
        let err = renderer.render(&tmp.path().join("in.html"), &pdf).unwrap_err();
        assert!(matches!(err, RenderError::TimedOut(_)));
        assert!(!pdf.exists());
    }

    #[test]
    fn recording_renderer_writes_stub_pdf() {
        let tmp = TempDir::new().unwrap();
        let renderer = RecordingRenderer::default();
        let pdf = tmp.path().join("out.pdf");
        renderer.render(&tmp.path().join("in.html"), &pdf).unwrap();
        assert!(pdf.is_file());
        assert_eq!(renderer.calls.borrow().len(), 1);
    }
}
