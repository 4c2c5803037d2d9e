//! Core domain types for the resume graph.
//!
//! Candidates and skills are the two node kinds; HAS_SKILL is the only
//! relationship. Extraction produces [`CandidateFacts`], storage resolves
//! them to a [`CandidateId`], and queries return [`ResultRow`]s.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::identity::candidate_identity;

// ── Identity ──────────────────────────────────────────────────────

/// Stable identity key of a Candidate node. See [`crate::identity`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Documents ─────────────────────────────────────────────────────

/// Format hint supplied alongside raw document bytes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    #[default]
    PlainText,
    Markdown,
    Json,
}

impl DocumentFormat {
    /// Infer the format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "md" | "markdown" => Self::Markdown,
            _ => Self::PlainText,
        }
    }
}

/// A raw document handed to extraction.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: Vec<u8>,
    pub format: DocumentFormat,
    /// Where the document came from (path, upload id), for logging only.
    pub source: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<Vec<u8>>, format: DocumentFormat) -> Self {
        Self {
            content: content.into(),
            format,
            source: None,
        }
    }

    pub fn text(content: &str) -> Self {
        Self::new(content.as_bytes(), DocumentFormat::PlainText)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ── Extracted facts ───────────────────────────────────────────────

/// Normalized facts about one candidate, ready for storage.
///
/// Only constructible through [`CandidateFacts::new`], which guarantees a
/// non-empty name and normalized, deduplicated skills.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CandidateFacts {
    name: String,
    contact: String,
    skills: BTreeSet<String>,
}

impl CandidateFacts {
    pub fn new<I, S>(name: &str, contact: &str, skills: I) -> Result<Self, ExtractionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = display_name(name);
        if name.is_empty() {
            return Err(ExtractionError::MissingName);
        }
        let skills = skills
            .into_iter()
            .map(|s| normalize_skill(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            name,
            contact: contact.split_whitespace().collect::<Vec<_>>().join(" "),
            skills,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &str {
        &self.contact
    }

    pub fn skills(&self) -> &BTreeSet<String> {
        &self.skills
    }

    /// The identity key this candidate resolves to.
    pub fn identity(&self) -> CandidateId {
        candidate_identity(&self.name, &self.contact)
    }
}

// ── Graph nodes ───────────────────────────────────────────────────

/// Node labels in the resume graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Candidate,
    Skill,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "Candidate",
            Self::Skill => "Skill",
        }
    }
}

/// A stored Candidate node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub contact: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// A stored Skill node. `name` is always the normalized label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub name: String,
    pub first_seen: DateTime<Utc>,
}

/// A stored HAS_SKILL relationship.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HasSkill {
    pub candidate_id: CandidateId,
    pub skill: String,
    /// Which extractor asserted the edge.
    pub source: String,
    pub confidence: Option<f64>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

// ── Queries ───────────────────────────────────────────────────────

/// The closed set of query intents the translator can produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum QueryPlan {
    FindBySkill { skill: String },
    FindByName { name: String },
    ListCandidates,
    Unsupported,
}

/// One candidate in a query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultRow {
    pub candidate_id: CandidateId,
    pub name: String,
    pub contact: String,
    /// All of the candidate's skills, sorted.
    pub skills: Vec<String>,
}

// ── Normalization ─────────────────────────────────────────────────

/// Canonical skill label: trimmed, internal whitespace collapsed, lowercased.
pub fn normalize_skill(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Display form of a name: trimmed with internal whitespace collapsed.
pub fn display_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lookup form of a name: display form, lowercased.
pub fn name_key(raw: &str) -> String {
    display_name(raw).to_lowercase()
}
