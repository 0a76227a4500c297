//! Input segmentation: line splitting and sentence-boundary detection

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::core::models::{SegmentBatch, SegmentPlan, Segmentation, SentenceLanguage};

/// Terminator run, optional closing punctuation, then the gap to the next sentence.
/// CJK full-width terminators need no trailing whitespace.
static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<end>[.!?؟۔]+["'”’»)\]]*)\s+|(?P<cjk>[。！？]+["'”’」』）]*)\s*"#)
        .expect("sentence boundary pattern is valid")
});

/// Dotted letter sequences such as "e.g", "U.S" or "z.B"; the final period is
/// the terminator itself and is not part of the word.
static DOTTED_LETTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\p{L}\.)+\p{L}$").expect("dotted abbreviation pattern is valid")
});

/// Line separators recognized in multi-line input, "\r\n" counting as one
const LINE_BREAKS: &[char] = &[
    '\n', '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

const OPENERS: &[char] = &['(', '[', '"', '\'', '“', '‘', '«', '¿', '¡'];

const ENGLISH_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "no", "vol", "fig", "approx", "dept", "est", "gen", "gov", "jan", "feb", "mar", "apr", "jun",
    "jul", "aug", "sep", "sept", "oct", "nov", "dec", "mt", "rev", "capt", "col", "lt", "sgt",
];

const GERMAN_ABBREVIATIONS: &[&str] = &[
    "dr", "prof", "hr", "fr", "nr", "str", "bzw", "usw", "ca", "vgl", "ggf", "evtl", "inkl",
    "bspw", "abs", "jh", "mio", "mrd", "tel", "dipl", "ing",
];

const FRENCH_ABBREVIATIONS: &[&str] = &[
    "m", "mm", "mme", "mlle", "dr", "pr", "st", "ste", "env", "etc", "cf", "av", "bd", "p",
    "vol", "chap", "tél",
];

const SPANISH_ABBREVIATIONS: &[&str] = &[
    "sr", "sra", "srta", "dr", "dra", "ud", "uds", "etc", "pág", "núm", "av", "avda", "dto",
    "aprox", "lic", "ing", "prof", "vol",
];

fn abbreviations(language: SentenceLanguage) -> &'static [&'static str] {
    match language {
        SentenceLanguage::English => ENGLISH_ABBREVIATIONS,
        SentenceLanguage::German => GERMAN_ABBREVIATIONS,
        SentenceLanguage::French => FRENCH_ABBREVIATIONS,
        SentenceLanguage::Spanish => SPANISH_ABBREVIATIONS,
        // Arabic script has no case and rarely abbreviates with a period;
        // Latin abbreviations still show up in mixed text.
        SentenceLanguage::Arabic => ENGLISH_ABBREVIATIONS,
    }
}

/// Rule-based sentence splitter tuned per language
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    language: SentenceLanguage,
}

impl SentenceSplitter {
    /// Splitter using the abbreviation rules for `language`
    pub fn new(language: SentenceLanguage) -> Self {
        Self { language }
    }

    /// Language the rules are tuned for
    pub fn language(&self) -> SentenceLanguage {
        self.language
    }

    /// Split a single paragraph into trimmed, non-empty sentences
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for caps in BOUNDARY.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let latin = caps.name("end");
            let Some(terminal) = latin.or_else(|| caps.name("cjk")) else {
                continue;
            };

            if latin.is_some()
                && !self.is_boundary(
                    &text[start..],
                    terminal.start() - start,
                    terminal.as_str(),
                    &text[whole.end()..],
                )
            {
                continue;
            }

            push_trimmed(&mut sentences, &text[start..terminal.end()]);
            start = whole.end();
        }

        push_trimmed(&mut sentences, &text[start..]);
        sentences
    }

    /// Decide whether a Latin-script terminator run really ends a sentence.
    ///
    /// `pending` is the text of the current sentence, `at` the byte offset of the
    /// terminator run inside it and `rest` whatever follows the whitespace gap.
    fn is_boundary(&self, pending: &str, at: usize, run: &str, rest: &str) -> bool {
        let terminators: String = run
            .chars()
            .take_while(|c| matches!(c, '.' | '!' | '?' | '؟' | '۔'))
            .collect();

        if terminators.chars().count() > 1 && terminators.chars().all(|c| c == '.') {
            // Ellipsis only ends a sentence when a new one visibly starts
            return !rest.chars().next().is_some_and(char::is_lowercase);
        }

        if terminators != "." {
            return true;
        }

        let word = pending[..at]
            .split_whitespace()
            .last()
            .unwrap_or("")
            .trim_start_matches(OPENERS);

        !self.is_abbreviation(word)
    }

    fn is_abbreviation(&self, word: &str) -> bool {
        if word.is_empty() {
            return false;
        }

        let mut chars = word.chars();
        if let (Some(first), None) = (chars.next(), chars.next()) {
            // Single-letter initial, as in "J. Smith"
            return first.is_alphabetic() && first.is_uppercase();
        }

        if DOTTED_LETTERS.is_match(word) {
            return true;
        }

        let lower = word.to_lowercase();
        abbreviations(self.language).contains(&lower.as_str())
    }
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self::new(SentenceLanguage::default())
    }
}

fn push_trimmed(out: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
}

/// Turns raw request text into a [`SegmentPlan`]
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    splitter: SentenceSplitter,
}

impl Segmenter {
    /// Segmenter with a sentence splitter for `language`
    pub fn new(language: SentenceLanguage) -> Self {
        Self {
            splitter: SentenceSplitter::new(language),
        }
    }

    /// Choose line or sentence mode and cut `text` into batches
    pub fn plan(&self, text: &str) -> SegmentPlan {
        let strategy = Segmentation::for_text(text);

        let batches = match strategy {
            Segmentation::PreSegmented => text
                .split(LINE_BREAKS)
                .filter(|line| !line.trim().is_empty())
                .map(|line| SegmentBatch::new(vec![line.to_string()]))
                .collect(),
            Segmentation::SentenceDetected => {
                let sentences = self.splitter.split(text);
                if sentences.is_empty() {
                    Vec::new()
                } else {
                    vec![SegmentBatch::new(sentences)]
                }
            }
        };

        let plan = SegmentPlan { strategy, batches };
        debug!(
            strategy = %plan.strategy,
            batches = plan.batches.len(),
            units = plan.unit_count(),
            "Segmented input"
        );
        plan
    }
}
