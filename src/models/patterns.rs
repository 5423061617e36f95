//! Regex-based organization extraction, used when no hosted NER model is configured.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use super::EntityExtractor;
use crate::error::{NewsgraphError, Result};

/// Capitalized run of up to four words ending in a corporate suffix, such as
/// "Globex Corp". Names with lowercase connectors ("Bank of America") do not match.
const SUFFIX_PATTERN: &str = r"\b([A-Z][A-Za-z0-9&'\-]*(?:\s+[A-Z][A-Za-z0-9&'\-]*){0,3}\s+(?:Inc|Corp|Corporation|Co|Ltd|LLC|PLC|Group|Holdings|Technologies|Systems|Motors|Bank|Capital|Partners|Labs|Industries|Airlines|Pharmaceuticals))\b";

/// Sentence-initial words the suffix pattern tends to swallow
const LEADING_NOISE: &[&str] = &["The", "A", "An", "Shares", "Rival", "Yesterday", "Today", "While", "As"];

/// Organization extractor combining a configurable list of known names
/// (matched case-insensitively as whole words) with the corporate-suffix pattern.
pub struct PatternEntityExtractor {
    known: Vec<Regex>,
    suffix: Regex,
}

impl PatternEntityExtractor {
    pub fn new(known_organizations: &[String]) -> Result<Self> {
        let mut known = Vec::new();
        for name in known_organizations {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let re = RegexBuilder::new(&format!(r"(?:^|\W)({})(?:$|\W)", regex::escape(name)))
                .case_insensitive(true)
                .build()
                .map_err(|e| NewsgraphError::Config(format!("Bad organization name {}: {}", name, e)))?;
            known.push(re);
        }
        let suffix = Regex::new(SUFFIX_PATTERN)
            .map_err(|e| NewsgraphError::Config(format!("Invalid suffix pattern: {}", e)))?;
        Ok(Self { known, suffix })
    }

    /// Synchronous extraction; ordered by position in the text, exact repeats removed
    pub fn extract(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = Vec::new();

        // surface text as written, without the boundary characters
        for re in &self.known {
            if let Some(m) = re.captures(text).and_then(|cap| cap.get(1)) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }

        for cap in self.suffix.captures_iter(text) {
            let Some(m) = cap.get(1) else { continue };
            let mut start = m.start();
            let mut name = m.as_str();
            for noise in LEADING_NOISE {
                if let Some(rest) = name.strip_prefix(noise).and_then(|r| r.strip_prefix(' ')) {
                    start += name.len() - rest.len();
                    name = rest.trim_start();
                    break;
                }
            }
            found.push((start, name.to_string()));
        }

        found.sort_by_key(|(pos, _)| *pos);
        let mut out: Vec<String> = Vec::new();
        for (_, name) in found {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

#[async_trait]
impl EntityExtractor for PatternEntityExtractor {
    async fn extract_organizations(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.extract(text))
    }
}
