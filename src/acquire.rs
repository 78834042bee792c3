use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use scraper::{ElementRef, Html, Node};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table", "tr", "ul",
];
const CELL_ELEMENTS: &[&str] = &["td", "th"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Html,
    PlainText,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "html" | "htm" => Some(Self::Html),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// Turns a source document into raw text. Never fails from the caller's
/// point of view: any problem is logged and yields an empty string.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    pdftotext_program: String,
    timeout: Duration,
}

impl TextExtractor {
    pub fn new(pdftotext_program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pdftotext_program: pdftotext_program.into(),
            timeout,
        }
    }

    pub fn extract_text(&self, path: &Path) -> String {
        match self.try_extract(path) {
            Ok(text) => {
                debug!(path = %path.display(), chars = text.len(), "extracted text");
                text
            }
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "text extraction failed");
                String::new()
            }
        }
    }

    fn try_extract(&self, path: &Path) -> Result<String> {
        let Some(kind) = SourceKind::from_path(path) else {
            bail!("unsupported document type: {}", path.display());
        };

        match kind {
            SourceKind::Pdf => self.extract_pdf(path),
            SourceKind::Html => {
                let raw = fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(html_to_text(&String::from_utf8_lossy(&raw)))
            }
            SourceKind::PlainText => {
                let raw = fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(String::from_utf8_lossy(&raw).replace('\u{0000}', ""))
            }
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<String> {
        let mut command = Command::new(&self.pdftotext_program);
        command
            .arg("-enc")
            .arg("UTF-8")
            .arg("-layout")
            .arg(path)
            .arg("-");

        let output = run_with_timeout(&mut command, self.timeout).with_context(|| {
            format!(
                "failed to execute {} for {}",
                self.pdftotext_program,
                path.display()
            )
        })?;

        if !output.success {
            bail!(
                "{} returned non-zero exit status for {}: {}",
                self.pdftotext_program,
                path.display(),
                output.stderr.trim()
            );
        }

        Ok(output
            .stdout
            .replace('\u{0000}', "")
            .replace('\u{000C}', "\n"))
    }
}

struct ProcessOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<ProcessOutput> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn process")?;

    // Pipes are drained on their own threads so a chatty child cannot block on a full buffer.
    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().context("failed to poll process")? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            bail!("process timed out after {}s", timeout.as_secs());
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();
    let stderr = stderr_reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    Ok(ProcessOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn spawn_reader<R>(mut pipe: R) -> thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Visible text of an HTML document, one line per block element.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    push_visible_text(document.root_element(), &mut text);

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().is_none_or(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child.value().name();
                if HIDDEN_ELEMENTS.contains(&name) {
                    continue;
                }
                push_visible_text(child, out);
                if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                } else if CELL_ELEMENTS.contains(&name) {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
