//! Канонизация входного текста перед синтезом.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Language-specific lexical normalization (numbers, dates, abbreviations).
///
/// Реализация внешняя; по умолчанию текст не меняется.
pub trait LanguageNormalizer: Send + Sync {
    fn normalize_language_text(&self, text: &str, language: &str) -> String;

    /// Languages the normalizer has rules for.
    fn supports(&self, _language: &str) -> bool {
        true
    }
}

/// Нормализатор, который ничего не делает
#[derive(Debug, Default, Clone)]
pub struct PassthroughNormalizer;

impl LanguageNormalizer for PassthroughNormalizer {
    fn normalize_language_text(&self, text: &str, _language: &str) -> String {
        text.to_string()
    }
}

/// Акроним, его произношение и язык, для которого составлена таблица
#[derive(Debug, Clone)]
pub struct Acronym {
    pattern: Regex,
    spoken: String,
    language: String,
}

impl Acronym {
    pub fn new(token: &str, spoken: &str, language: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!(r"\b{}\b", regex::escape(token)))?,
            spoken: spoken.to_string(),
            language: language.to_string(),
        })
    }
}

// Таблица составлена для вьетнамского
static DEFAULT_ACRONYMS: Lazy<Vec<Acronym>> =
    Lazy::new(|| vec![Acronym::new("AI", "Ây Ai", "vi").unwrap()]);

static DOT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([.,])").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

const QUOTES: [char; 5] = ['"', '“', '”', '«', '»'];

// Склейка после удаления пробелов может дать новые повторы, поэтому
// шаги повторяются до неподвижной точки
const MAX_PASSES: usize = 4;

pub struct TextNormalizer {
    language_normalizer: Arc<dyn LanguageNormalizer>,
    acronyms: Vec<Acronym>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(Arc::new(PassthroughNormalizer))
    }
}

impl TextNormalizer {
    pub fn new(language_normalizer: Arc<dyn LanguageNormalizer>) -> Self {
        Self {
            language_normalizer,
            acronyms: DEFAULT_ACRONYMS.clone(),
        }
    }

    pub fn with_acronyms(mut self, acronyms: Vec<Acronym>) -> Self {
        self.acronyms = acronyms;
        self
    }

    pub fn supports(&self, language: &str) -> bool {
        self.language_normalizer.supports(language)
    }

    /// Нормализует текст. Чистая функция от (text, language).
    pub fn normalize(&self, text: &str, language: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut current = self.language_normalizer.normalize_language_text(text, language);
        for _ in 0..MAX_PASSES {
            let next = self.clean(&current, language);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn clean(&self, text: &str, language: &str) -> String {
        let text = collapse_terminal_punctuation(text);
        let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
        let text: String = text.chars().filter(|c| !QUOTES.contains(c)).collect();
        let text = self.expand_acronyms(text, language);
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }

    fn expand_acronyms(&self, mut text: String, language: &str) -> String {
        for acronym in self.acronyms.iter().filter(|a| a.language == language) {
            text = acronym
                .pattern
                .replace_all(&text, regex::NoExpand(&acronym.spoken))
                .into_owned();
        }
        text
    }
}

fn collapse_terminal_punctuation(text: &str) -> String {
    let text = DOT_RUN.replace_all(text, ".");
    text.replace("!.", "!").replace("?.", "?")
}
