//! Разбиение нормализованного текста на чанки для синтеза.

use log::debug;

use crate::models::TextChunk;

/// Visual pause inserted after sentence-ending punctuation (thin space).
pub const PAUSE_MARKER: &str = "\u{2009}";
const PAUSE_CHAR: char = '\u{2009}';

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_word_like(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || !c.is_ascii()
}

fn has_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Вставляет паузу после конечной пунктуации, стоящей за словом.
///
/// The marker goes after the whole punctuation run and only when the run ends
/// the text or is followed by whitespace, so `3.14` and `e.g` stay intact.
pub fn insert_pause_markers(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;

        if is_terminal(c) && i >= 2 && is_word_like(chars[i - 2]) {
            while i < chars.len() && is_terminal(chars[i]) {
                out.push(chars[i]);
                i += 1;
            }
            let at_boundary = i == chars.len() || chars[i].is_whitespace();
            let already_marked = i < chars.len() && chars[i] == PAUSE_CHAR;
            if at_boundary && !already_marked {
                out.push_str(PAUSE_MARKER);
            }
        }
    }

    out
}

/// Removes inserted pause markers.
pub fn strip_pause_markers(text: &str) -> String {
    text.replace(PAUSE_MARKER, "")
}

/// Text handed to the backend: surrounding whitespace trimmed, the trailing
/// pause marker kept.
pub fn speakable_text(chunk: &TextChunk) -> &str {
    chunk
        .text
        .trim_matches(|c: char| c.is_whitespace() && c != PAUSE_CHAR)
}

/// Сегментатор предложений
#[derive(Debug, Clone, Default)]
pub struct SentenceSegmenter {
    /// Pack consecutive sentences into one chunk while they fit.
    max_chunk_chars: Option<usize>,
}

impl SentenceSegmenter {
    pub fn new(max_chunk_chars: Option<usize>) -> Self {
        Self { max_chunk_chars }
    }

    /// Делит текст на упорядоченные чанки.
    ///
    /// Chunks are exact spans of the marked text, so joining them and removing
    /// the pause markers gives back the input.
    pub fn segment(&self, text: &str, language: &str) -> Vec<TextChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let marked = insert_pause_markers(text);
        let sentences = fold_unspeakable(split_sentences(&marked));
        let pieces = match self.max_chunk_chars {
            Some(limit) if limit > 0 => pack(sentences, limit),
            _ => sentences,
        };

        debug!("Segmented {} chars into {} chunks", text.chars().count(), pieces.len());

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextChunk {
                index,
                text,
                language: language.to_string(),
            })
            .collect()
    }
}

// Граница стоит после паузы и следующих за ней пробелов
fn split_sentences(marked: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut after_marker = false;

    for c in marked.chars() {
        if after_marker && !c.is_whitespace() {
            sentences.push(std::mem::take(&mut current));
            after_marker = false;
        }
        current.push(c);
        if c == PAUSE_CHAR {
            after_marker = true;
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

// Фрагменты из одной пунктуации приклеиваются к соседям
fn fold_unspeakable(sentences: Vec<String>) -> Vec<String> {
    let mut folded: Vec<String> = Vec::with_capacity(sentences.len());
    let mut pending = String::new();

    for sentence in sentences {
        if !has_speakable(&sentence) {
            match folded.last_mut() {
                Some(last) => last.push_str(&sentence),
                None => pending.push_str(&sentence),
            }
            continue;
        }
        if pending.is_empty() {
            folded.push(sentence);
        } else {
            folded.push(std::mem::take(&mut pending) + &sentence);
        }
    }

    if !pending.is_empty() {
        folded.push(pending);
    }
    folded
}

fn pack(sentences: Vec<String>, limit: usize) -> Vec<String> {
    let mut packed: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let len = |s: &str| s.chars().filter(|&c| c != PAUSE_CHAR).count();
        if !current.is_empty() && len(&current) + len(&sentence) > limit {
            packed.push(std::mem::take(&mut current));
        }
        current.push_str(&sentence);
    }
    if !current.is_empty() {
        packed.push(current);
    }
    packed
}
