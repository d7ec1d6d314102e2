//! Import of hand-pasted test cases
//!
//! For pages the extractor cannot read, the test script is copied by hand
//! into a paste file below a marker line. Importing turns that paste into a
//! regular artifact and resets the paste file for the next case.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::artifact::{ArtifactWriter, Provenance, WrittenArtifact};
use crate::error::{HarvestError, HarvestResult};

/// Everything after the line holding this marker is the pasted content
pub const PASTE_MARKER: &str = "[PASTE HERE]";

/// Default test-case key shape, e.g. `XPM-T4436`
pub const DEFAULT_KEY_PATTERN: &str = r"[A-Z][A-Z0-9]+-T\d+";

/// Only the head of the paste is searched for the key
const KEY_SEARCH_LINES: usize = 10;

const MIN_PASTE_CHARS: usize = 10;

/// A parsed paste
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastedCase {
    pub key: String,
    pub name: Option<String>,
    pub content: String,
}

/// Parse the paste file text
pub fn parse_paste(text: &str, key_pattern: &Regex) -> HarvestResult<PastedCase> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.contains(PASTE_MARKER))
        .map(|i| i + 1)
        .ok_or_else(|| HarvestError::Import(format!("no {} line found", PASTE_MARKER)))?;

    let content = lines[start..].join("\n").trim().to_string();
    if content.is_empty() {
        return Err(HarvestError::Import(format!(
            "nothing pasted after the {} line",
            PASTE_MARKER
        )));
    }
    if content.chars().count() < MIN_PASTE_CHARS {
        return Err(HarvestError::Import(
            "pasted content too short, paste the full test case".to_string(),
        ));
    }

    let head: Vec<&str> = content.lines().take(KEY_SEARCH_LINES).collect();
    for (i, line) in head.iter().enumerate() {
        let Some(found) = key_pattern.find(line) else {
            continue;
        };
        let key = found.as_str().to_string();
        let rest = line.replacen(&key, "", 1);
        let name = trim_separators(&rest);
        let name = if name.is_empty() {
            head.get(i + 1).map(|next| next.trim()).unwrap_or_default()
        } else {
            name
        };

        debug!("Paste key {} on line {}", key, i + 1);
        return Ok(PastedCase {
            key,
            name: (!name.is_empty()).then(|| name.to_string()),
            content,
        });
    }

    Err(HarvestError::Import(format!(
        "no test case key matching '{}' in the first {} lines",
        key_pattern.as_str(),
        KEY_SEARCH_LINES
    )))
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|'))
}

/// Fresh paste file: instructions followed by the marker line
pub fn reset_template() -> String {
    format!(
        "=== PASTE TEST CASE CONTENT HERE ===\n\
         \n\
         Instructions:\n\
         1. Replace everything below the marker with the test case content\n\
         2. Make sure the first lines contain the test case key (e.g. XPM-T4436)\n\
         3. Save this file\n\
         4. Run: tcharvest import\n\
         5. Repeat for each test case\n\
         \n\
         {}\n\
         \n\
         {}\n",
        "─".repeat(72),
        PASTE_MARKER
    )
}

/// One import request
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub key_pattern: String,
    pub max_name_len: usize,
    /// Rewrite the paste file with the template afterwards
    pub reset: bool,
}

impl ImportOptions {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
            max_name_len: 150,
            reset: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub case: PastedCase,
    pub artifact: WrittenArtifact,
}

/// Import the paste file as an artifact
pub fn import_paste(options: &ImportOptions) -> HarvestResult<ImportOutcome> {
    let pattern = Regex::new(&options.key_pattern)?;
    let text = std::fs::read_to_string(&options.input)?;
    let case = parse_paste(&text, &pattern)?;

    let mut writer = ArtifactWriter::new(&options.output_dir, options.max_name_len)?;
    let artifact = writer.write(
        &case.key,
        case.name.as_deref(),
        &case.content,
        &Provenance::Pasted,
    )?;
    info!("Imported {} as {}", case.key, artifact.file_name);

    if options.reset {
        write_template(&options.input)?;
        debug!("Reset {}", options.input.display());
    }

    Ok(ImportOutcome { case, artifact })
}

/// Write an empty paste file
pub fn write_template(path: &Path) -> HarvestResult<()> {
    std::fs::write(path, reset_template())?;
    Ok(())
}
