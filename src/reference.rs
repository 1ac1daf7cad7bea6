use crate::books::BookId;
use crate::error::{Result, VersificationError};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Verse labels: a number optionally decorated for split or merged
/// verses, e.g. "7", "6a", "1/2", "3-5", "12G".
pub(crate) fn verse_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[1-9][0-9,/.-]*[a-zG]?$").unwrap())
}

/// A single verse slot: book, chapter and verse label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    book: BookId,
    chapter: u32,
    verse: String,
}

impl Reference {
    pub fn new(book: BookId, chapter: u32, verse: impl Into<String>) -> Result<Self> {
        let verse = verse.into();
        if chapter < 1 {
            return Err(VersificationError::InvalidChapter { chapter });
        }
        if !verse_label_pattern().is_match(&verse) {
            return Err(VersificationError::InvalidVerseLabel { label: verse });
        }
        Ok(Reference {
            book,
            chapter,
            verse,
        })
    }

    /// Plain numeric verse. `chapter` and `verse` must both be >= 1.
    pub fn verse_n(book: BookId, chapter: u32, verse: u32) -> Self {
        debug_assert!(chapter >= 1 && verse >= 1);
        Reference {
            book,
            chapter,
            verse: verse.to_string(),
        }
    }

    /// Used where the label is already known to be valid (stored verse
    /// sets only hold validated labels).
    pub(crate) fn new_unchecked(book: BookId, chapter: u32, verse: String) -> Self {
        Reference {
            book,
            chapter,
            verse,
        }
    }

    pub fn book(&self) -> BookId {
        self.book
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn verse(&self) -> &str {
        &self.verse
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

impl FromStr for Reference {
    type Err = VersificationError;

    /// Parses `"<Book> <chapter>:<verse>"`. The book part accepts OSIS
    /// IDs, three-letter codes or english names, so book names with
    /// spaces ("1 Samuel 3:1") work too.
    fn from_str(s: &str) -> Result<Self> {
        let malformed = || VersificationError::MalformedLine {
            line: s.to_string(),
            detail: "expected '<Book> <chapter>:<verse>'".to_string(),
        };
        let (book_part, ref_part) = s.trim().rsplit_once(' ').ok_or_else(malformed)?;
        let (chapter_part, verse_part) = ref_part.split_once(':').ok_or_else(malformed)?;
        let book = BookId::parse(book_part).ok_or_else(|| VersificationError::UnknownBook {
            id: book_part.to_string(),
        })?;
        let chapter: u32 = chapter_part.parse().map_err(|_| malformed())?;
        Reference::new(book, chapter, verse_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen() -> BookId {
        BookId::from_osis("Gen").unwrap()
    }

    #[test]
    fn test_valid_labels() {
        for label in ["1", "7", "10", "6a", "1/2", "3-5", "12G", "1,2"] {
            assert!(
                Reference::new(gen(), 1, label).is_ok(),
                "label {} should be valid",
                label
            );
        }
    }

    #[test]
    fn test_invalid_labels() {
        for label in ["", "0", "07", "a", "1A", " 1", "1 "] {
            assert!(
                Reference::new(gen(), 1, label).is_err(),
                "label {} should be invalid",
                label
            );
        }
    }

    #[test]
    fn test_chapter_must_be_positive() {
        let err = Reference::new(gen(), 0, "1").unwrap_err();
        assert!(matches!(
            err,
            crate::error::VersificationError::InvalidChapter { chapter: 0 }
        ));
    }

    #[test]
    fn test_display() {
        let r = Reference::verse_n(gen(), 3, 14);
        assert_eq!(r.to_string(), "Gen 3:14");
        let r = Reference::new(BookId::from_osis("Ps").unwrap(), 119, "6a").unwrap();
        assert_eq!(r.to_string(), "Ps 119:6a");
    }

    #[test]
    fn test_parse_round_trip() {
        let r: Reference = "Gen 3:14".parse().unwrap();
        assert_eq!(r, Reference::verse_n(gen(), 3, 14));
        assert_eq!(r.to_string().parse::<Reference>().unwrap(), r);

        let r: Reference = "1 Samuel 3:1".parse().unwrap();
        assert_eq!(r.book(), BookId::from_osis("1Sam").unwrap());

        assert!("Gen 1".parse::<Reference>().is_err());
        assert!("Nope 1:1".parse::<Reference>().is_err());
        assert!("Gen x:1".parse::<Reference>().is_err());
    }
}
