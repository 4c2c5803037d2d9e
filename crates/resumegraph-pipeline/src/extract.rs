//! Fact extraction: raw resume documents to [`CandidateFacts`].
//!
//! [`FactExtractor`] is the pluggable seam. [`RuleBasedExtractor`] handles
//! JSON resumes and plain-text/Markdown resumes with line-oriented rules;
//! [`crate::completion::CompletionExtractor`] delegates to a language model.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use resumegraph_core::{CandidateFacts, Document, DocumentFormat, ExtractionError};

/// Turns a document into normalized candidate facts. Must be side-effect free.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Short name, recorded as the source of asserted HAS_SKILL edges.
    fn name(&self) -> &str;

    async fn extract(&self, document: &Document) -> Result<CandidateFacts, ExtractionError>;
}

/// Section headings that introduce a skills list.
const SKILL_HEADINGS: &[&str] = &[
    "skills",
    "skill set",
    "skillset",
    "technical skills",
    "core skills",
    "key skills",
    "core competencies",
    "competencies",
    "technologies",
    "tech stack",
    "tools",
    "skills and tools",
    "skills & tools",
];

/// Other section headings; these end a skills section and are never names.
const OTHER_HEADINGS: &[&str] = &[
    "summary",
    "profile",
    "objective",
    "about",
    "about me",
    "contact",
    "contact information",
    "experience",
    "work experience",
    "professional experience",
    "employment",
    "employment history",
    "education",
    "projects",
    "certifications",
    "languages",
    "interests",
    "awards",
    "publications",
    "references",
    "resume",
    "curriculum vitae",
    "cv",
];

/// Longest plausible single skill item.
const MAX_SKILL_LEN: usize = 40;
const MAX_SKILL_WORDS: usize = 4;

/// Lines considered when looking for an unlabeled name.
const NAME_SCAN_LINES: usize = 10;

/// Extraction by fixed rules; no external calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedExtractor;

#[async_trait]
impl FactExtractor for RuleBasedExtractor {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn extract(&self, document: &Document) -> Result<CandidateFacts, ExtractionError> {
        let text = decode(document)?;
        let facts = match document.format {
            DocumentFormat::Json => parse_json_resume(text)?,
            DocumentFormat::PlainText | DocumentFormat::Markdown => extract_from_text(text)?,
        };

        tracing::debug!(
            source = document.source.as_deref().unwrap_or("-"),
            skill_count = facts.skills().len(),
            has_contact = !facts.contact().is_empty(),
            "Facts extracted"
        );
        Ok(facts)
    }
}

/// Decode document bytes as UTF-8, rejecting empty documents.
pub(crate) fn decode(document: &Document) -> Result<&str, ExtractionError> {
    let text = std::str::from_utf8(&document.content)
        .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

// ── JSON resumes ─────────────────────────────────────────────────

/// A JSON resume, as written by hand or returned by a language model.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonResume {
    #[serde(default, alias = "full_name")]
    name: Option<String>,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    skills: Option<SkillList>,
}

/// Skills either as a list or as one delimited string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillList {
    List(Vec<String>),
    Text(String),
}

impl JsonResume {
    pub(crate) fn into_facts(self) -> Result<CandidateFacts, ExtractionError> {
        let name = self.name.unwrap_or_default();
        let contact = [self.contact, self.email, self.phone]
            .into_iter()
            .flatten()
            .find(|c| !c.trim().is_empty())
            .unwrap_or_default();
        let skills = match self.skills {
            Some(SkillList::List(items)) => items,
            Some(SkillList::Text(text)) => split_skill_items(&text),
            None => Vec::new(),
        };
        CandidateFacts::new(&name, &contact, skills)
    }
}

pub(crate) fn parse_json_resume(text: &str) -> Result<CandidateFacts, ExtractionError> {
    let resume: JsonResume = serde_json::from_str(text)
        .map_err(|e| ExtractionError::Unreadable(format!("invalid JSON resume: {e}")))?;
    resume.into_facts()
}

// ── Text and Markdown resumes ────────────────────────────────────

fn name_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:full\s+)?name\s*[:\-]\s*(.+)$").expect("valid regex"))
}

fn skills_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:technical\s+|core\s+|key\s+)?skills?\s*[:\-]\s*(.+)$")
            .expect("valid regex")
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\(?\d[\d \t().\-]{5,}\d").expect("valid regex"))
}

fn phone_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:phone|tel|telephone|mobile|cell)\b").expect("valid regex")
    })
}

fn year_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:19|20)\d{2}\s*[-\u{2013}]\s*(?:19|20)\d{2}$").expect("valid regex")
    })
}

/// One resume line with Markdown decoration removed.
struct Line<'a> {
    raw: &'a str,
    text: String,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }

    /// Heading text, lowercased, without a trailing colon.
    fn heading_key(&self) -> String {
        self.text.trim_end_matches(':').trim().to_lowercase()
    }

    fn is_markdown_heading(&self) -> bool {
        self.raw.trim_start().starts_with('#')
    }

    fn is_skill_heading(&self) -> bool {
        SKILL_HEADINGS.contains(&self.heading_key().as_str())
    }

    fn is_section_heading(&self) -> bool {
        let key = self.heading_key();
        self.is_markdown_heading()
            || SKILL_HEADINGS.contains(&key.as_str())
            || OTHER_HEADINGS.contains(&key.as_str())
    }
}

fn clean_line(raw: &str) -> Line<'_> {
    let mut text = raw.trim().trim_start_matches('#').trim();
    for bullet in ["- ", "* ", "+ ", "• ", "· "] {
        if let Some(rest) = text.strip_prefix(bullet) {
            text = rest.trim();
            break;
        }
    }
    let text = text.replace("**", "").replace("__", "");
    Line {
        raw,
        text: text.trim().to_string(),
    }
}

fn extract_from_text(text: &str) -> Result<CandidateFacts, ExtractionError> {
    let lines: Vec<Line<'_>> = text.lines().map(clean_line).collect();

    let name = find_name(&lines).ok_or(ExtractionError::MissingName)?;
    let contact = find_contact(&lines);
    let skills = find_skills(&lines);

    CandidateFacts::new(&name, &contact, skills)
}

fn find_name(lines: &[Line<'_>]) -> Option<String> {
    let labeled = lines.iter().find_map(|line| {
        name_label_re()
            .captures(&line.text)
            .map(|caps| caps[1].trim().to_string())
    });
    if let Some(name) = labeled.filter(|n| !n.is_empty()) {
        return Some(name);
    }

    lines
        .iter()
        .filter(|line| !line.is_blank())
        .take(NAME_SCAN_LINES)
        .find(|line| looks_like_name(line))
        .map(|line| line.text.clone())
}

fn looks_like_name(line: &Line<'_>) -> bool {
    let words = line.text.split_whitespace().count();
    if !(1..=5).contains(&words) {
        return false;
    }
    let key = line.heading_key();
    if SKILL_HEADINGS.contains(&key.as_str()) || OTHER_HEADINGS.contains(&key.as_str()) {
        return false;
    }
    line.text.chars().any(|c| c.is_uppercase())
        && line
            .text
            .chars()
            .all(|c| c.is_alphabetic() || c.is_whitespace() || matches!(c, '.' | '\'' | '-'))
}

/// First email anywhere, else the first phone number in the header or on a
/// `Phone:`-style labelled line. Body text is full of digit runs (date
/// ranges, figures) that must not become the identity.
fn find_contact(lines: &[Line<'_>]) -> String {
    if let Some(m) = lines.iter().find_map(|line| email_re().find(line.raw)) {
        return m.as_str().to_string();
    }

    let header_end = lines
        .iter()
        .position(|line| line.is_section_heading() && !looks_like_name(line))
        .unwrap_or(lines.len());

    lines
        .iter()
        .enumerate()
        .filter(|(i, line)| *i < header_end || phone_label_re().is_match(&line.text))
        .flat_map(|(_, line)| phone_re().find_iter(line.raw))
        .map(|m| m.as_str().trim())
        .find(|candidate| is_phone_number(candidate))
        .map(str::to_string)
        .unwrap_or_default()
}

fn is_phone_number(candidate: &str) -> bool {
    let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=15).contains(&digits) && !year_range_re().is_match(candidate)
}

fn find_skills(lines: &[Line<'_>]) -> Vec<String> {
    let mut skills = Vec::new();
    let mut in_section = false;
    let mut seen_items = false;

    for line in lines {
        if let Some(caps) = skills_label_re().captures(&line.text) {
            skills.extend(split_skill_items(&caps[1]));
            in_section = false;
            continue;
        }
        if line.is_skill_heading() {
            in_section = true;
            seen_items = false;
            continue;
        }
        if !in_section {
            continue;
        }
        if line.is_section_heading() {
            in_section = false;
            continue;
        }
        if line.is_blank() {
            if seen_items {
                in_section = false;
            }
            continue;
        }

        let items = match line.text.split_once(':') {
            // "Languages: Rust, Go" inside a skills section
            Some((_, rest)) if !rest.trim().is_empty() => split_skill_items(rest),
            _ => split_skill_items(&line.text),
        };
        seen_items = true;
        skills.extend(items);
    }

    skills
}

/// Split a delimited skills string into plausible skill items.
pub(crate) fn split_skill_items(text: &str) -> Vec<String> {
    text.split([',', ';', '|', '•', '·'])
        .map(|item| {
            item.trim()
                .trim_start_matches(['-', '*', '+'])
                .trim()
                .trim_end_matches('.')
                .trim()
        })
        .filter(|item| {
            !item.is_empty()
                && item.len() <= MAX_SKILL_LEN
                && item.split_whitespace().count() <= MAX_SKILL_WORDS
        })
        .map(str::to_string)
        .collect()
}
