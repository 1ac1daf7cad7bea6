use crate::books::BookId;
use crate::reference::Reference;
use thiserror::Error;

/// Error type for versification construction, lookup and persistence.
///
/// Lookup misses (`VersificationNotFound`, `MappingNotFound`) and
/// ambiguity (`AmbiguousMapping`) are distinct variants so callers can
/// tell "nothing there" apart from "more than one plausible answer".
#[derive(Error, Debug)]
pub enum VersificationError {
    // === Structural Errors (construction-time) ===
    /// Scheme names and aliases must match `[A-Za-z0-9._-]+`.
    #[error("invalid versification name '{name}'")]
    InvalidName { name: String },

    /// Chapters are numbered from 1.
    #[error("invalid chapter number {chapter}")]
    InvalidChapter { chapter: u32 },

    /// Verse labels must match `[1-9][0-9,/.-]*[a-zG]?`.
    #[error("invalid verse label '{label}'")]
    InvalidVerseLabel { label: String },

    /// A verse set must contain at least one verse.
    #[error("verse set contains no verses")]
    EmptyVerseSet,

    #[error("invalid primary verse range {from}-{to}")]
    InvalidVerseRange { from: u32, to: u32 },

    /// Exception verses sit strictly below a non-empty primary range,
    /// sorted and without duplicates.
    #[error("exception verse {verse} does not lie below the primary range")]
    InvalidException { verse: u32 },

    #[error("duplicate verse label '{label}'")]
    DuplicateVerseLabel { label: String },

    #[error("duplicate reference {reference}")]
    DuplicateReference { reference: Reference },

    #[error("book {book} has no chapters")]
    EmptyBook { book: BookId },

    #[error("book {book} appears more than once")]
    DuplicateBook { book: BookId },

    /// Interior chapters may be absent, the last one may not.
    #[error("last chapter of {book} is absent")]
    TrailingAbsentChapter { book: BookId },

    #[error("invalid reorder layer: {detail}")]
    InvalidReorder { detail: String },

    // === Mapping Construction Errors ===
    /// An empty destination list is not a valid way to say "no
    /// correspondence"; leave the source reference out instead.
    #[error("empty destination list for {reference}; leave the source absent instead")]
    EmptyMappingTarget { reference: Reference },

    #[error("more than one mapping given for {reference}")]
    DuplicateMappingSource { reference: Reference },

    #[error("source reference {reference} does not exist in versification '{versification}'")]
    SourceVerseNotFound {
        reference: Reference,
        versification: String,
    },

    #[error("destination reference {reference} does not exist in versification '{versification}'")]
    TargetVerseNotFound {
        reference: Reference,
        versification: String,
    },

    /// Composition requires the first mapping's destination scheme to
    /// be the second mapping's source scheme.
    #[error("cannot join mappings: '{left}' does not match '{right}'")]
    MappingEndpointMismatch { left: String, right: String },

    // === Lookup Errors ===
    /// `suggestion` is either empty or a pre-formatted closest-match
    /// hint.
    #[error("versification '{name}' not found{suggestion}")]
    VersificationNotFound { name: String, suggestion: String },

    #[error("no mapping from '{from}' to '{to}'")]
    MappingNotFound { from: String, to: String },

    #[error("mapping {index} from '{from}' to '{to}' does not exist")]
    MappingIndexNotFound {
        from: String,
        to: String,
        index: usize,
    },

    #[error("mapping from '{from}' to '{to}' is ambiguous")]
    AmbiguousMapping { from: String, to: String },

    #[error("versification '{name}' is already registered")]
    DuplicateVersification { name: String },

    /// Mapping keys look like `from/to`, `from/to/N` or `from/to/-1`.
    #[error("invalid mapping key '{key}': {detail}")]
    InvalidMappingKey { key: String, detail: String },

    #[error("unknown book id '{id}'")]
    UnknownBook { id: String },

    // === Persistence Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid versification set header: '{line}'")]
    InvalidHeader { line: String },

    #[error("malformed line '{line}': {detail}")]
    MalformedLine { line: String, detail: String },

    #[error("mapping '{mapping}' references versification '{name}' which is not being written")]
    DanglingMappingEndpoint { mapping: String, name: String },
}

pub type Result<T> = std::result::Result<T, VersificationError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::BookId;

    #[test]
    fn test_error_display() {
        let err = VersificationError::InvalidName {
            name: "bad name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid versification name 'bad name'");

        let err = VersificationError::VersificationNotFound {
            name: "KJVX".to_string(),
            suggestion: " (closest match: 'KJV')".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "versification 'KJVX' not found (closest match: 'KJV')"
        );
    }

    #[test]
    fn test_reference_in_error() {
        let gen = BookId::from_osis("Gen").unwrap();
        let r = Reference::verse_n(gen, 1, 1);
        let err = VersificationError::DuplicateReference { reference: r };
        assert_eq!(err.to_string(), "duplicate reference Gen 1:1");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VersificationError = io.into();
        assert!(matches!(err, VersificationError::Io(_)));
    }
}
