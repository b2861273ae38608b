//! Prompt complexity analysis
//!
//! Scores a request in `[0, 100]` and buckets it into a reasoning regime.
//! Two scoring strategies:
//!
//! - **Lexical heuristic** (always available): length, structural-keyword and
//!   domain-keyword signals with fixed weights.
//! - **Deep linguistic pass** (optional): sentence/phrase structure, lexical
//!   richness and cognitive-demand signals, used only when a
//!   [`LinguisticModel`] is attached and the prompt is long enough.
//!
//! Any fault or unavailability on the deep path falls back to the lexical
//! heuristic. `analyze` is a pure function of the prompt text and never
//! errors.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Complexity regime driving the reasoning strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Direct, first-instinct answering
    Low,
    /// Structured stepwise reasoning
    Medium,
    /// Decompose, solve concurrently, integrate
    High,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Bucket a complexity score: <30 low, <70 medium, otherwise high.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Self::Low
        } else if score < 70.0 {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Parse a regime name, as produced by judge verdicts.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

// Keyword families for the lexical heuristic
static CONDITIONAL_PATTERNS: &[&str] = &["if", "when", "unless", "provided that", "given that"];
static HIERARCHY_WORDS: &[&str] = &["first", "second", "then", "next", "finally", "step"];
static CONSTRAINT_PATTERNS: &[&str] = &["must", "cannot", "should not", "requires", "constraint"];

static MATH_KEYWORDS: &[&str] = &["calculate", "solve", "equation", "algorithm", "optimization"];
static PLANNING_KEYWORDS: &[&str] = &["plan", "strategy", "design", "organize", "coordinate"];
static ANALYSIS_KEYWORDS: &[&str] = &["analyze", "compare", "evaluate", "assess", "consider"];

/// Prompts below this word count always take the lexical path.
const MIN_WORDS_FOR_DEEP: usize = 10;

/// Analyzes prompt complexity to pick the optimal reasoning strategy.
pub struct ComplexityAnalyzer {
    linguistics: Option<LinguisticModel>,
}

impl ComplexityAnalyzer {
    /// Lexical-heuristic-only analyzer.
    pub fn new() -> Self {
        Self { linguistics: None }
    }

    /// Analyzer with a deep linguistic pass for long prompts.
    pub fn with_linguistics(model: LinguisticModel) -> Self {
        Self {
            linguistics: Some(model),
        }
    }

    /// Score a prompt and bucket it into a regime. Never errors; deep-path
    /// faults degrade silently to the lexical heuristic.
    pub fn analyze(&self, prompt: &str) -> (f64, Regime) {
        let word_count = prompt.split_whitespace().count();

        let score = match &self.linguistics {
            Some(model) if word_count > MIN_WORDS_FOR_DEEP => {
                match model.score(prompt) {
                    Some(s) => {
                        debug!("deep linguistic analysis score: {:.2}", s);
                        s
                    }
                    None => {
                        debug!("deep linguistic analysis faulted, falling back to lexical");
                        Self::lexical_score(prompt)
                    }
                }
            }
            _ => Self::lexical_score(prompt),
        };

        let regime = Regime::from_score(score);
        debug!(
            "complexity score {:.2} -> regime {}",
            score,
            regime.as_str()
        );
        (score, regime)
    }

    /// Keyword-based scoring: length 0.2, structure 0.4, domain 0.4.
    fn lexical_score(prompt: &str) -> f64 {
        let lower = prompt.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();

        let length_score = (words.len() as f64 / 5.0).min(40.0);

        let mut structural = 0.0;
        structural += count_occurrences(&lower, CONDITIONAL_PATTERNS) as f64 * 3.0;
        structural += words
            .iter()
            .filter(|w| HIERARCHY_WORDS.contains(w))
            .count() as f64
            * 2.0;
        structural += count_occurrences(&lower, CONSTRAINT_PATTERNS) as f64 * 4.0;
        let structure_score = structural.min(30.0);

        let mut domain: f64 = 0.0;
        if MATH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            domain += 15.0;
        }
        if PLANNING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            domain += 20.0;
        }
        if ANALYSIS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            domain += 15.0;
        }
        let domain_score = domain.min(30.0);

        let total = length_score * 0.2 + structure_score * 0.4 + domain_score * 0.4;
        total.clamp(0.0, 100.0)
    }
}

impl Default for ComplexityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn count_occurrences(haystack: &str, patterns: &[&str]) -> usize {
    patterns.iter().map(|p| haystack.matches(p).count()).sum()
}

static SENTENCE_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static NOUN_CHUNK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:the|a|an|this|that|these|those)\s+[a-z]+").unwrap()
});

static STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "of", "to", "in", "on", "for", "with", "at", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "it", "its", "this", "that", "these",
    "those", "i", "you", "he", "she", "we", "they", "my", "your", "their", "do", "does", "did",
    "not", "no", "so", "if", "then", "than", "will", "would", "can", "could", "should",
];

static ANALYTICAL_VERBS: &[&str] = &[
    "compare",
    "contrast",
    "analyze",
    "evaluate",
    "synthesize",
    "create",
    "argue",
    "derive",
    "prove",
];

/// Rule-based linguistic model for the deep analysis pass.
///
/// Approximates sentence structure, entity density and analytical demand
/// from surface features alone; no external model is loaded. Attach with
/// [`ComplexityAnalyzer::with_linguistics`] - availability is an explicit
/// construction choice, never probed at runtime.
#[derive(Debug, Clone, Default)]
pub struct LinguisticModel;

impl LinguisticModel {
    pub fn new() -> Self {
        Self
    }

    /// Deep complexity score in `[0, 100]`, or `None` on an internal fault
    /// (the caller falls back to the lexical heuristic).
    pub fn score(&self, prompt: &str) -> Option<f64> {
        let sentences: Vec<&str> = SENTENCE_SPLIT
            .split(prompt)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if sentences.is_empty() {
            return Some(5.0);
        }

        let tokens: Vec<&str> = prompt.split_whitespace().collect();
        let num_sentences = sentences.len() as f64;
        let avg_sentence_len = tokens.len() as f64 / num_sentences;

        // 1. Syntactic complexity: sentence count, mean length, noun phrases.
        let noun_chunks = NOUN_CHUNK.find_iter(prompt).count() as f64;
        let syntactic = num_sentences * 1.5 + avg_sentence_len * 0.5 + noun_chunks;
        let normalized_syntactic = (syntactic / 40.0).min(1.0) * 100.0;

        // 2. Lexical richness: entity density plus distinct content words.
        let (entity_count, entity_kinds) = count_entities(&sentences);
        let content_words = distinct_content_words(&tokens);
        let lexical =
            entity_count as f64 * 2.0 + entity_kinds as f64 * 3.0 + content_words as f64 * 0.2;
        let normalized_lexical = (lexical / 50.0).min(1.0) * 100.0;

        // 3. Cognitive demand: analytical verbs plus question-word bonus.
        let lower_tokens: Vec<String> = tokens
            .iter()
            .map(|t| normalize_token(t))
            .filter(|t| !t.is_empty())
            .collect();
        let verb_hits = ANALYTICAL_VERBS
            .iter()
            .filter(|kw| lower_tokens.iter().any(|t| lemma_matches(t, kw)))
            .count() as f64;
        let mut cognitive = verb_hits * 10.0;
        if lower_tokens.iter().any(|t| t == "why" || t == "how") {
            cognitive += 15.0;
        } else if lower_tokens
            .iter()
            .any(|t| matches!(t.as_str(), "what" | "which" | "who" | "where" | "when"))
        {
            cognitive += 5.0;
        }
        let normalized_cognitive = (cognitive / 30.0).min(1.0) * 100.0;

        let total = normalized_syntactic * 0.40
            + normalized_lexical * 0.35
            + normalized_cognitive * 0.25;
        let total = total.clamp(0.0, 100.0);

        total.is_finite().then_some(total)
    }
}

/// Entity heuristic: acronyms, mid-sentence capitalized words, numerics.
/// Returns (entity count, distinct entity kinds).
fn count_entities(sentences: &[&str]) -> (usize, usize) {
    let mut count = 0;
    let mut acronym = false;
    let mut title_case = false;
    let mut numeric = false;

    for sentence in sentences {
        for (i, raw) in sentence.split_whitespace().enumerate() {
            let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if token.len() < 2 {
                continue;
            }
            if token.chars().all(|c| c.is_ascii_uppercase()) {
                count += 1;
                acronym = true;
            } else if i > 0 && token.chars().next().is_some_and(|c| c.is_uppercase()) {
                count += 1;
                title_case = true;
            } else if token.chars().any(|c| c.is_ascii_digit()) {
                count += 1;
                numeric = true;
            }
        }
    }

    let kinds = [acronym, title_case, numeric].iter().filter(|b| **b).count();
    (count, kinds)
}

fn distinct_content_words(tokens: &[&str]) -> usize {
    let mut seen = std::collections::HashSet::new();
    for token in tokens {
        let word = normalize_token(token);
        if word.len() > 2 && !STOPWORDS.contains(&word.as_str()) {
            seen.insert(word);
        }
    }
    seen.len()
}

fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Crude lemma match: token equals the keyword directly or after stripping
/// a common inflection suffix ("analyzed" -> "analyze", "creating" -> "create").
fn lemma_matches(token: &str, keyword: &str) -> bool {
    if token == keyword {
        return true;
    }
    for suffix in ["s", "d", "ing"] {
        if let Some(stem) = token.strip_suffix(suffix) {
            if stem == keyword {
                return true;
            }
            let mut restored = stem.to_string();
            restored.push('e');
            if restored == keyword {
                return true;
            }
        }
    }
    false
}
