use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use quick_xml::events::Event;
use quick_xml::Reader;
use rag_core::{Document, RagError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Main body part of a WordprocessingML package
const DOCX_BODY_PART: &str = "word/document.xml";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Outcome of loading a documents directory
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded documents, ordered by relative path
    pub documents: Vec<Document>,
    /// Files that matched the pattern but could not be read or parsed
    pub failures: Vec<RagError>,
}

/// Loads every file under a directory whose relative path matches a glob
pub struct DocumentLoader {
    root: PathBuf,
    pattern: Pattern,
}

impl DocumentLoader {
    /// Create a loader for `root` using a glob such as `**/*.docx`
    pub fn new(root: impl Into<PathBuf>, glob: &str) -> Result<Self> {
        let pattern = Pattern::new(glob)
            .map_err(|e| RagError::InvalidConfig(format!("invalid glob '{}': {}", glob, e)))?;

        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load all matching files.
    ///
    /// A missing root directory is an error. Individual files that fail are
    /// logged and collected in [`LoadReport::failures`] without stopping the run.
    pub fn load(&self) -> Result<LoadReport> {
        if !self.root.is_dir() {
            return Err(RagError::DocumentsDirMissing(self.root.clone()).into());
        }

        let files = self.matching_files();
        tracing::info!(
            "Found {} files matching '{}' under {}",
            files.len(),
            self.pattern.as_str(),
            self.root.display()
        );

        let mut report = LoadReport::default();

        for relative in files {
            let full_path = self.root.join(&relative);
            match load_file(&full_path) {
                Ok(text) => {
                    tracing::debug!(
                        "Loaded {} ({} chars)",
                        relative.display(),
                        text.chars().count()
                    );
                    report.documents.push(Document::new(text, relative));
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {:#}", full_path.display(), e);
                    report.failures.push(RagError::DocumentLoad {
                        path: full_path,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Relative paths of matching files, sorted so runs are order-stable
    fn matching_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Failed to walk documents directory: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };

            if self.pattern.matches_path_with(relative, MATCH_OPTIONS) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        files
    }
}

/// Extract text from a single file, dispatching on its extension
pub fn load_file(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "docx" => extract_docx_text(path),
        _ => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {} as UTF-8 text", path.display())),
    }
}

fn extract_docx_text(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).context("Not a valid .docx archive")?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .with_context(|| format!("Missing {}", DOCX_BODY_PART))?
        .read_to_string(&mut xml)
        .with_context(|| format!("Failed to read {}", DOCX_BODY_PART))?;

    docx_xml_to_text(&xml)
}

/// Render the paragraphs of a `word/document.xml` body as plain text.
///
/// Runs inside `w:t` are concatenated per `w:p`; `w:tab` becomes a tab and
/// `w:br`/`w:cr` a newline. Non-empty paragraphs are separated by a blank line.
pub fn docx_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().context("Malformed document.xml")? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:p" => current.clear(),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" | b"w:cr" => current.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().context("Invalid text escape")?);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n\n"))
}
