//! Artifact writer: one plain-text file per test case
//!
//! ```text
//! Test Case: <id>
//! Name: <title>
//! URL: <source>
//! Extracted: <local timestamp>
//!
//! ======================================================================
//! TEST SCRIPT
//! ======================================================================
//!
//! <content>
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};

const RULE_WIDTH: usize = 70;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where the content came from, recorded in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// Read from a detail page
    Extracted { url: String },
    /// Pasted in by hand
    Pasted,
}

/// A written artifact
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    pub file_name: String,
    /// SHA-256 of the body content, hex encoded
    pub content_sha256: String,
}

/// Writes artifacts into one flat directory
///
/// Names handed out by one writer never collide with each other, so a writer
/// should live exactly as long as one run.
pub struct ArtifactWriter {
    output_dir: PathBuf,
    max_name_len: usize,
    used: HashSet<String>,
}

impl ArtifactWriter {
    /// Create the output directory if needed
    pub fn new(output_dir: impl Into<PathBuf>, max_name_len: usize) -> HarvestResult<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| HarvestError::Persistence {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self {
            output_dir,
            max_name_len,
            used: HashSet::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write one artifact and return where it went
    pub fn write(
        &mut self,
        id: &str,
        title: Option<&str>,
        content: &str,
        provenance: &Provenance,
    ) -> HarvestResult<WrittenArtifact> {
        let stem = self.unique_stem(&file_stem(id, title, self.max_name_len));
        let file_name = format!("{}.txt", stem);
        let path = self.output_dir.join(&file_name);

        let content = content.trim();
        let title = title.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(id);
        let body = render(id, title, content, provenance, &timestamp());

        std::fs::write(&path, body).map_err(|source| HarvestError::Persistence {
            path: path.clone(),
            source,
        })?;
        self.used.insert(stem.to_lowercase());
        debug!("Wrote {}", path.display());

        Ok(WrittenArtifact {
            path,
            file_name,
            content_sha256: hex::encode(Sha256::digest(content.as_bytes())),
        })
    }

    /// Append ` (n)` until the stem is unused in this run
    fn unique_stem(&self, stem: &str) -> String {
        if !self.used.contains(&stem.to_lowercase()) {
            return stem.to_string();
        }
        for n in 2.. {
            let suffix = format!(" ({})", n);
            let room = self.max_name_len.saturating_sub(suffix.chars().count());
            let candidate = format!("{}{}", truncate_chars(stem, room).trim_end(), suffix);
            if !self.used.contains(&candidate.to_lowercase()) {
                return candidate;
            }
        }
        unreachable!("unbounded suffix search")
    }
}

/// Composite, sanitized and bounded file stem for a test case
pub fn file_stem(id: &str, title: Option<&str>, max_len: usize) -> String {
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let raw = match title {
        Some(t) if t.contains(id) => t.to_string(),
        Some(t) => format!("{} - {}", id, t),
        None => id.to_string(),
    };

    let clean = sanitize(&raw);
    let bounded = truncate_chars(&clean, max_len);
    let stem = bounded.trim_end_matches(['.', ' ']).trim_start();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// Replace characters illegal in file names and collapse whitespace
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Full file body: header, banner, content
pub fn render(
    id: &str,
    title: &str,
    content: &str,
    provenance: &Provenance,
    stamp: &str,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut header = format!("Test Case: {}\nName: {}\n", id, title);
    let banner = match provenance {
        Provenance::Extracted { url } => {
            header.push_str(&format!("URL: {}\nExtracted: {}\n", url, stamp));
            "TEST SCRIPT"
        }
        Provenance::Pasted => {
            header.push_str(&format!("Saved: {}\n", stamp));
            "TEST SCRIPT CONTENT"
        }
    };
    format!("{}\n{}\n{}\n{}\n\n{}", header, rule, banner, rule, content)
}

/// Content part of an artifact body, i.e. everything after the banner
pub fn body_content(body: &str) -> Option<&str> {
    let rule = "=".repeat(RULE_WIDTH);
    let marker = format!("\n{}\n\n", rule);
    let first = body.find(&rule)?;
    let rest = &body[first + rule.len()..];
    let second = rest.find(&marker)?;
    Some(&rest[second + marker.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_illegal_characters() {
        let name = sanitize("Login: a/b\\c?d*e|f<g>h\"i\tj\r\nk");
        for c in [':', '/', '\\', '?', '*', '|', '<', '>', '"', '\t', '\r', '\n'] {
            assert!(!name.contains(c), "{:?} left in {}", c, name);
        }
        assert_eq!(sanitize("a   b \n c"), "a b - c");
    }

    #[test]
    fn test_stem_composition() {
        assert_eq!(file_stem("XPM-T1", Some("Check in"), 150), "XPM-T1 - Check in");
        assert_eq!(file_stem("XPM-T1", Some("XPM-T1 Check in"), 150), "XPM-T1 Check in");
        assert_eq!(file_stem("XPM-T1", None, 150), "XPM-T1");
        assert_eq!(file_stem("XPM-T1", Some("   "), 150), "XPM-T1");
    }

    #[test]
    fn test_stem_is_bounded() {
        let title = "é".repeat(400);
        let stem = file_stem("XPM-T1", Some(&title), 150);
        assert_eq!(stem.chars().count(), 150);
        assert!(stem.starts_with("XPM-T1 - "));
    }

    #[test]
    fn test_stem_trims_trailing_dots() {
        assert_eq!(file_stem("T-1", Some("Ends with dots..."), 150), "T-1 - Ends with dots");
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), 150).unwrap();
        let provenance = Provenance::Pasted;

        let a = writer.write("T-1", None, "first", &provenance).unwrap();
        let b = writer.write("T-1", None, "second", &provenance).unwrap();
        let c = writer.write("t-1", None, "third", &provenance).unwrap();

        assert_eq!(a.file_name, "T-1.txt");
        assert_eq!(b.file_name, "T-1 (2).txt");
        assert_eq!(c.file_name, "t-1 (3).txt");
        assert!(std::fs::read_to_string(&a.path).unwrap().ends_with("first"));
    }

    #[test]
    fn test_suffix_respects_max_len() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ArtifactWriter::new(dir.path(), 20).unwrap();
        let title = "x".repeat(50);
        writer.write("T-1", Some(&title), "a", &Provenance::Pasted).unwrap();
        let second = writer.write("T-1", Some(&title), "b", &Provenance::Pasted).unwrap();
        let stem = second.file_name.trim_end_matches(".txt");
        assert!(stem.ends_with(" (2)"));
        assert_eq!(stem.chars().count(), 20);
    }

    #[test]
    fn test_render_extracted_header() {
        let body = render(
            "T-1",
            "Login",
            "Step 1:\nOpen",
            &Provenance::Extracted {
                url: "https://example.com/tc/T-1".to_string(),
            },
            "2026-01-01 10:00:00",
        );
        let expected = "Test Case: T-1\nName: Login\nURL: https://example.com/tc/T-1\n\
                        Extracted: 2026-01-01 10:00:00\n\n";
        assert!(body.starts_with(expected));
        assert!(body.contains("\nTEST SCRIPT\n"));
        assert_eq!(body_content(&body), Some("Step 1:\nOpen"));
    }

    #[test]
    fn test_render_pasted_header() {
        let body = render("T-1", "Login", "text", &Provenance::Pasted, "now");
        assert!(body.contains("Saved: now\n"));
        assert!(!body.contains("URL:"));
        assert!(body.contains("TEST SCRIPT CONTENT"));
        assert_eq!(body_content(&body), Some("text"));
    }

    #[test]
    fn test_writer_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ArtifactWriter::new(&nested, 150).unwrap();
        assert!(nested.is_dir());
        // idempotent
        ArtifactWriter::new(&nested, 150).unwrap();
    }
}
