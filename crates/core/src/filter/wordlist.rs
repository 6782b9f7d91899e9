use std::fmt;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WordsConfig;
use crate::episode::Show;

const WORD_PREFIX: &str = r"(^|[\W_])";
const WORD_SUFFIX: &str = r"($|[\W_])";

/// Comma separated word list. A leading `regex:` marks every entry as a regex.
///
/// Plain words match case-insensitively as whole words, regex entries match
/// anywhere they apply. Patterns are compiled once when the list is built.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct WordList {
    words: Vec<String>,
    is_regex: bool,
    whole: Vec<Regex>,
    loose: Vec<Regex>,
}

impl WordList {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let (is_regex, body) = match trimmed.strip_prefix("regex:") {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        Self::new(
            body.split(',').map(str::trim).filter(|w| !w.is_empty()),
            is_regex,
        )
    }

    pub fn new<I, S>(words: I, is_regex: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words.into_iter().map(Into::into).collect();
        let mut whole = Vec::with_capacity(words.len());
        let mut loose = Vec::with_capacity(words.len());
        for word in &words {
            let compiled = if is_regex {
                compile(word, &format!("(?i){}", word)).map(|re| (re.clone(), re))
            } else {
                let escaped = regex_lite::escape(word);
                compile(word, &format!("(?i){}(?:{}){}", WORD_PREFIX, escaped, WORD_SUFFIX))
                    .zip(compile(word, &format!("(?i){}", escaped)))
            };
            if let Some((w, l)) = compiled {
                whole.push(w);
                loose.push(l);
            }
        }
        Self {
            words,
            is_regex,
            whole,
            loose,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// `None` for an empty list, otherwise whether any entry matches.
    ///
    /// Plain words must stand alone between non-word characters.
    pub fn contains_any(&self, subject: &str) -> Option<bool> {
        self.matches_with(&self.whole, subject)
    }

    /// Like [`contains_any`](Self::contains_any) but plain words may match
    /// inside other words.
    pub fn contains_any_loose(&self, subject: &str) -> Option<bool> {
        self.matches_with(&self.loose, subject)
    }

    fn matches_with(&self, patterns: &[Regex], subject: &str) -> Option<bool> {
        if self.is_empty() {
            return None;
        }
        Some(patterns.iter().any(|re| re.is_match(subject)))
    }
}

fn compile(word: &str, pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern = %word, error = %e, "Skipping invalid word pattern");
            None
        }
    }
}

impl fmt::Debug for WordList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordList")
            .field("words", &self.words)
            .field("is_regex", &self.is_regex)
            .finish()
    }
}

impl PartialEq for WordList {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words && self.is_regex == other.is_regex
    }
}

impl Eq for WordList {}

impl From<String> for WordList {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<WordList> for String {
    fn from(list: WordList) -> Self {
        let joined = list.words.join(",");
        if list.is_regex {
            format!("regex:{}", joined)
        } else {
            joined
        }
    }
}

/// Reject names containing an ignore word, or missing every require word.
pub fn passes_wordlist(name: &str, ignore: &WordList, require: &WordList) -> bool {
    if ignore.contains_any(name) == Some(true) {
        debug!(name = %name, "Ignoring result containing an ignore word");
        return false;
    }
    if require.contains_any(name) == Some(false) {
        debug!(name = %name, "Ignoring result missing every require word");
        return false;
    }
    true
}

/// Global lists first, then the show's own lists.
pub fn passes_show_wordlist(name: &str, words: &WordsConfig, show: &Show) -> bool {
    passes_wordlist(name, &words.ignore, &words.require)
        && passes_wordlist(name, &show.ignore_words, &show.require_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_regex() {
        let plain = WordList::parse(" german, dubbed ,,");
        assert_eq!(plain.words(), &["german".to_string(), "dubbed".to_string()]);
        assert!(!plain.is_regex());

        let regex = WordList::parse("regex:^foo,bar$");
        assert!(regex.is_regex());
        assert_eq!(regex.words().len(), 2);
    }

    #[test]
    fn test_word_boundaries() {
        let list = WordList::parse("sub");
        assert_eq!(list.contains_any("Show.S01E01.SUB.x264"), Some(true));
        assert_eq!(list.contains_any("Show_sub_x264"), Some(true));
        assert_eq!(list.contains_any("Show.S01E01.Subbed"), Some(false));
        assert_eq!(WordList::default().contains_any("anything"), None);
    }

    #[test]
    fn test_plain_words_are_escaped() {
        let list = WordList::parse("web.dl");
        assert_eq!(list.contains_any("Show.webxdl"), Some(false));
        assert_eq!(list.contains_any("Show.web.dl.x264"), Some(true));
    }

    #[test]
    fn test_regex_words() {
        let list = WordList::parse(r"regex:(h.?|x)265");
        assert_eq!(list.contains_any("Show.S01E01.x265-GRP"), Some(true));
        assert_eq!(list.contains_any("Show.S01E01.h.265-GRP"), Some(true));
        assert_eq!(list.contains_any("Show.S01E01.x264-GRP"), Some(false));
    }

    #[test]
    fn test_regex_words_are_not_anchored() {
        let list = WordList::parse(r"regex:x26[45]");
        assert_eq!(list.contains_any("Show.S01E01.x264HD-GRP"), Some(true));

        let start = WordList::parse(r"regex:^Show\.S01");
        assert_eq!(start.contains_any("Show.S01E01-GRP"), Some(true));
        assert_eq!(start.contains_any("The.Show.S01E01-GRP"), Some(false));

        let plain = WordList::parse("x264");
        assert_eq!(plain.contains_any("Show.S01E01.x264HD-GRP"), Some(false));
    }

    #[test]
    fn test_patterns_compiled_once() {
        let list = WordList::parse("regex:(unclosed,fine,other");
        assert_eq!(list.words().len(), 3);
        assert_eq!(list.whole.len(), 2);
        assert_eq!(list.loose.len(), 2);

        let copy = list.clone();
        assert_eq!(copy.whole.len(), 2);
        assert_eq!(copy, WordList::parse("regex:(unclosed,fine,other"));
        assert_ne!(copy, WordList::parse("(unclosed,fine,other"));
    }

    #[test]
    fn test_invalid_regex_is_skipped() {
        let list = WordList::parse("regex:(unclosed,fine");
        assert_eq!(list.contains_any("a fine name"), Some(true));
        assert_eq!(list.contains_any("nothing"), Some(false));
    }

    #[test]
    fn test_loose_matching() {
        let list = WordList::parse("grp");
        assert_eq!(list.contains_any_loose("Show.S01E01-MYGRPX"), Some(true));
        assert_eq!(list.contains_any("Show.S01E01-MYGRPX"), Some(false));
    }

    #[test]
    fn test_passes_wordlist() {
        let ignore = WordList::parse("german");
        let require = WordList::parse("720p,1080p");
        assert!(passes_wordlist("Show.S01E01.720p.HDTV", &ignore, &require));
        assert!(!passes_wordlist("Show.S01E01.German.720p", &ignore, &require));
        assert!(!passes_wordlist("Show.S01E01.HDTV", &ignore, &require));
        assert!(passes_wordlist("Show.S01E01.HDTV", &WordList::default(), &WordList::default()));
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let list: WordList = serde_json::from_str(r#""regex:a,b""#).unwrap();
        assert!(list.is_regex());
        assert_eq!(list.contains_any("xay"), Some(true));
        assert_eq!(serde_json::to_string(&list).unwrap(), r#""regex:a,b""#);
    }
}
