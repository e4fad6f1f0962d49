// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script-based detection of the language a question is written in.
//!
//! Hangul and kana are unique to Korean and Japanese, so they win at low
//! ratios; CJK ideographs alone count as Chinese only when no kana or Hangul
//! is present in meaningful amounts.

use strum::Display;

/// Language of a user message, as far as its script reveals it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Language {
    Korean,
    English,
    Japanese,
    Chinese,
    Unknown,
}

#[derive(Debug, Default)]
struct ScriptCounts {
    hangul: usize,
    latin: usize,
    kana: usize,
    han: usize,
    total: usize,
}

impl ScriptCounts {
    fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            counts.total += 1;
            match c {
                '\u{AC00}'..='\u{D7A3}' => counts.hangul += 1,
                'a'..='z' | 'A'..='Z' => counts.latin += 1,
                '\u{3041}'..='\u{3093}' | '\u{30A1}'..='\u{30F6}' | '\u{30FC}' => counts.kana += 1,
                '\u{4E00}'..='\u{9FFF}' => counts.han += 1,
                _ => {}
            }
        }
        counts
    }

    fn ratio(&self, n: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            n as f64 / self.total as f64
        }
    }
}

/// Detect the language of `text` from the share of each script among its
/// non-whitespace characters.
pub fn detect_language(text: &str) -> Language {
    let counts = ScriptCounts::of(text);
    if counts.total == 0 {
        return Language::Unknown;
    }

    let hangul = counts.ratio(counts.hangul);
    let kana = counts.ratio(counts.kana);
    let han = counts.ratio(counts.han);

    if hangul > 0.1 {
        return Language::Korean;
    }
    if kana > 0.05 {
        return Language::Japanese;
    }
    if han > 0.2 && hangul < 0.05 {
        return Language::Chinese;
    }
    if counts.ratio(counts.latin) > 0.3 {
        return Language::English;
    }

    // Low ratios: fall back to whichever script shows up at all.
    if counts.hangul > 0 {
        Language::Korean
    } else if counts.kana > 0 {
        Language::Japanese
    } else if counts.han > 2 {
        Language::Chinese
    } else if counts.latin > 0 {
        Language::English
    } else {
        Language::Unknown
    }
}

/// Instruction pinning the answer to `language`, or `None` when unknown.
pub fn response_instruction(language: Language) -> Option<String> {
    match language {
        Language::Unknown => None,
        language => Some(format!(
            "The user wrote in {language}. Respond only in {language}; translate or \
             summarize evidence written in other languages instead of quoting it \
             untranslated, and do not mix languages."
        )),
    }
}
