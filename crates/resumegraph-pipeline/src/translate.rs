//! Natural-language question to [`QueryPlan`], and plan execution.
//!
//! Classification is rule-based and total: anything not recognized becomes
//! [`QueryPlan::Unsupported`], which executes to an empty result without
//! touching the store.

use std::collections::BTreeSet;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use regex::Regex;

use resumegraph_core::types::{display_name, normalize_skill};
use resumegraph_core::{QueryError, QueryPlan, ResultRow};
use resumegraph_graph::GraphSession;

/// Skills recognized in questions before anything has been extracted.
const DEFAULT_VOCABULARY: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "go",
    "golang",
    "rust",
    "c",
    "c++",
    "c#",
    "ruby",
    "php",
    "swift",
    "kotlin",
    "scala",
    "r",
    "sql",
    "nosql",
    "neo4j",
    "cypher",
    "postgresql",
    "mysql",
    "mongodb",
    "redis",
    "graphql",
    "docker",
    "kubernetes",
    "terraform",
    "aws",
    "azure",
    "gcp",
    "linux",
    "git",
    "react",
    "angular",
    "vue",
    "node.js",
    "django",
    "flask",
    "spark",
    "hadoop",
    "kafka",
    "machine learning",
    "deep learning",
    "data science",
    "nlp",
    "ai",
    "tensorflow",
    "pytorch",
    "pandas",
    "excel",
    "html",
    "css",
    "agile",
    "scrum",
];

const DEFAULT_ROW_LIMIT: u32 = 500;

const MAX_SKILL_LEN: usize = 40;
const MAX_SKILL_WORDS: usize = 4;

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:named|called|name\s+is)\s+["']?([^"'?!]+?)["']?\s*[?.!]*\s*$"#)
            .expect("valid regex")
    })
}

fn skill_phrase_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)\bwith\s+(?:strong\s+|solid\s+|some\s+)?(.+?)\s+(?:skills?|experience|expertise|knowledge)\b",
            r"(?i)\b(?:knows?|knowing|skilled\s+(?:in|at)|proficient\s+(?:in|with)|experienced\s+(?:in|with)|experience\s+(?:in|with)|expertise\s+in)\s+(.+?)\s*[?.!]*\s*$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid regex"))
        .collect()
    })
}

fn list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:\b(?:all|every)\s+(?:the\s+)?(?:candidates?|applicants?|resumes?)\b|^\s*(?:list|show)(?:\s+me)?\s+(?:the\s+)?(?:candidates|applicants|resumes)\b)",
        )
        .expect("valid regex")
    })
}

/// Classifies questions and executes the resulting plans.
///
/// The skill vocabulary grows as the pipeline stores candidates, so a
/// skill seen in any resume is recognized in later questions.
pub struct QueryTranslator {
    vocabulary: RwLock<BTreeSet<String>>,
    row_limit: u32,
}

impl Default for QueryTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTranslator {
    pub fn new() -> Self {
        Self {
            vocabulary: RwLock::new(DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect()),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    /// Add configured skills to the vocabulary.
    pub fn with_skills<I, S>(self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.learn(skills);
        self
    }

    /// Bound `ListCandidates` results.
    pub fn with_row_limit(mut self, row_limit: u32) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Add skills to the vocabulary. Labels are normalized first.
    pub fn learn<I, S>(&self, skills: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary = self.write_vocabulary();
        for skill in skills {
            let label = normalize_skill(skill.as_ref());
            if !label.is_empty() {
                vocabulary.insert(label);
            }
        }
    }

    /// Snapshot of the current vocabulary, sorted.
    pub fn vocabulary(&self) -> Vec<String> {
        self.read_vocabulary().iter().cloned().collect()
    }

    pub fn translate(&self, query: &str) -> QueryPlan {
        let query = query.trim();

        if let Some(caps) = name_re().captures(query) {
            let name = display_name(&caps[1]);
            if !name.is_empty() {
                return QueryPlan::FindByName { name };
            }
        }

        if let Some(skill) = self.vocabulary_match(query) {
            return QueryPlan::FindBySkill { skill };
        }

        for re in skill_phrase_res() {
            let Some(caps) = re.captures(query) else {
                continue;
            };
            let skill = normalize_skill(caps[1].trim_matches(|c: char| c == '"' || c == '\''));
            if plausible_skill(&skill) {
                return QueryPlan::FindBySkill { skill };
            }
        }

        if list_re().is_match(query) {
            return QueryPlan::ListCandidates;
        }

        QueryPlan::Unsupported
    }

    /// Run a plan against the graph. Only read transactions are opened.
    pub async fn execute(
        &self,
        plan: &QueryPlan,
        session: &GraphSession,
    ) -> Result<Vec<ResultRow>, QueryError> {
        let rows = match plan {
            QueryPlan::FindBySkill { skill } => session.candidates_by_skill(skill).await,
            QueryPlan::FindByName { name } => session.candidates_by_name(name).await,
            QueryPlan::ListCandidates => session.list_candidates(self.row_limit).await,
            QueryPlan::Unsupported => {
                tracing::debug!("Unsupported query plan, skipping graph");
                return Ok(Vec::new());
            }
        }
        .map_err(QueryError::execution)?;

        tracing::debug!(?plan, row_count = rows.len(), "Query executed");
        Ok(rows)
    }

    /// Earliest whole-word vocabulary term in `query`; longest term on ties.
    fn vocabulary_match(&self, query: &str) -> Option<String> {
        let haystack = query.to_lowercase();
        let vocabulary = self.read_vocabulary();

        let mut best: Option<(usize, &str)> = None;
        for term in vocabulary.iter() {
            let Some(start) = find_whole_word(&haystack, term) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_start, best_term)) => {
                    start < best_start || (start == best_start && term.len() > best_term.len())
                }
            };
            if better {
                best = Some((start, term.as_str()));
            }
        }
        best.map(|(_, term)| term.to_string())
    }

    fn read_vocabulary(&self) -> RwLockReadGuard<'_, BTreeSet<String>> {
        self.vocabulary
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_vocabulary(&self) -> RwLockWriteGuard<'_, BTreeSet<String>> {
        self.vocabulary
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+' || c == '#'
}

/// Byte offset of the first occurrence of `term` not embedded in a longer word.
fn find_whole_word(haystack: &str, term: &str) -> Option<usize> {
    haystack.match_indices(term).map(|(i, _)| i).find(|&i| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + term.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Words that open a quantity or qualifier phrase rather than a skill name.
const NON_SKILL_LEADS: &[&str] = &[
    "a", "an", "the", "any", "some", "no", "most", "more", "less", "least", "much", "many",
    "lots", "several", "few", "relevant", "prior", "previous", "professional", "work", "their",
    "his", "her", "my", "our", "good", "great", "years", "year",
];

fn plausible_skill(skill: &str) -> bool {
    let Some(first) = skill.split_whitespace().next() else {
        return false;
    };
    skill.len() <= MAX_SKILL_LEN
        && skill.split_whitespace().count() <= MAX_SKILL_WORDS
        && !NON_SKILL_LEADS.contains(&first)
        && !first.starts_with(|c: char| c.is_ascii_digit())
        && !skill
            .split_whitespace()
            .any(|word| matches!(word, "years" | "year" | "months"))
}
