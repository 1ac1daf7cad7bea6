use crate::books::BookId;
use crate::error::{Result, VersificationError};
use crate::reference::Reference;
use crate::verse_set::VerseSet;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap())
}

/// Looks up the offset of the block containing `pos` in a sorted
/// `(block start, offset)` table. Identity (0) when the table has no
/// block at or below `pos`.
fn floor_offset(table: &[(usize, isize)], pos: usize) -> isize {
    let idx = table.partition_point(|&(start, _)| start <= pos);
    if idx == 0 {
        0
    } else {
        table[idx - 1].1
    }
}

#[derive(Debug, Clone)]
struct BookEntry {
    book: BookId,
    chapters: Vec<Option<VerseSet>>,
    first_index: usize,
    verse_count: usize,
}

/// A versification scheme: an ordered list of books, each with one
/// verse set per chapter (`None` = the tradition has no such chapter),
/// and a dense index space `[0, verse_count)` over all verses.
///
/// Book order in the index space is the order the books were given in,
/// not canon order. An optional reorder layer permutes contiguous
/// blocks of the natural order, so traditions that place passages
/// elsewhere still get the index order they define.
#[derive(Debug, Clone)]
pub struct Versification {
    name: String,
    description: Option<String>,
    aliases: Vec<String>,
    books: Vec<BookEntry>,
    book_lookup: HashMap<BookId, usize>,
    verse_count: usize,
    // external index -> natural position, and back; sorted by block
    // start for floor lookup
    forward_offsets: Vec<(usize, isize)>,
    backward_offsets: Vec<(usize, isize)>,
}

impl Versification {
    /// Builds a scheme where every chapter is plainly numbered
    /// `1..=n`.
    pub fn from_verse_counts(
        name: &str,
        description: Option<&str>,
        aliases: &[&str],
        counts: &[(BookId, Vec<u32>)],
    ) -> Result<Versification> {
        let mut book_sets = Vec::with_capacity(counts.len());
        for (book, chapter_counts) in counts {
            let mut chapters = Vec::with_capacity(chapter_counts.len());
            for &count in chapter_counts {
                chapters.push(Some(VerseSet::of_count(count)?));
            }
            book_sets.push((*book, chapters));
        }
        Self::assemble(name, description, to_owned_aliases(aliases), book_sets, None)
    }

    /// Builds a scheme from the exact verse sequence of a document.
    /// The reference order defines the index space; any discontinuity
    /// against natural book/chapter order becomes a reorder block.
    pub fn from_reference_list(
        name: &str,
        description: Option<&str>,
        aliases: &[&str],
        references: &[Reference],
    ) -> Result<Versification> {
        let mut seen: HashSet<&Reference> = HashSet::new();
        let mut grouped: Vec<(BookId, Vec<Vec<String>>)> = Vec::new();
        let mut slot_of: HashMap<BookId, usize> = HashMap::new();
        for reference in references {
            if !seen.insert(reference) {
                return Err(VersificationError::DuplicateReference {
                    reference: reference.clone(),
                });
            }
            let slot = match slot_of.get(&reference.book()) {
                Some(&slot) => slot,
                None => {
                    grouped.push((reference.book(), Vec::new()));
                    slot_of.insert(reference.book(), grouped.len() - 1);
                    grouped.len() - 1
                }
            };
            let chapters = &mut grouped[slot].1;
            while chapters.len() < reference.chapter() as usize {
                chapters.push(Vec::new());
            }
            chapters[reference.chapter() as usize - 1].push(reference.verse().to_string());
        }

        let mut book_sets = Vec::with_capacity(grouped.len());
        for (book, chapters) in grouped {
            let mut sets = Vec::with_capacity(chapters.len());
            for labels in &chapters {
                if labels.is_empty() {
                    sets.push(None);
                } else {
                    sets.push(Some(VerseSet::from_labels(labels)?));
                }
            }
            book_sets.push((book, sets));
        }

        let unordered = Self::assemble(name, None, Vec::new(), book_sets.clone(), None)?;
        let mut boundaries = Vec::new();
        let mut last_pos: isize = -2;
        for reference in references {
            let pos = unordered
                .index_of(reference)
                .expect("reference grouped above must resolve");
            if pos as isize != last_pos + 1 {
                boundaries.push(pos);
            }
            last_pos = pos as isize;
        }
        Self::assemble(
            name,
            description,
            to_owned_aliases(aliases),
            book_sets,
            Some(&boundaries),
        )
    }

    /// Parses the body lines of a scheme block (leading space already
    /// stripped): `=alias`, `~ b0 b1 ...`, or a book line with one
    /// chapter token per chapter.
    pub(crate) fn from_scheme_lines(
        name: &str,
        description: Option<&str>,
        lines: &[String],
    ) -> Result<Versification> {
        let malformed = |line: &str, detail: String| VersificationError::MalformedLine {
            line: line.to_string(),
            detail,
        };
        let mut aliases = Vec::new();
        let mut book_sets: Vec<(BookId, Vec<Option<VerseSet>>)> = Vec::new();
        let mut boundaries: Option<Vec<usize>> = None;
        for line in lines {
            if let Some(alias) = line.strip_prefix('=') {
                aliases.push(alias.to_string());
            } else if let Some(rest) = line.strip_prefix("~ ") {
                let mut parsed = Vec::new();
                for token in rest.split(' ') {
                    parsed.push(token.parse::<usize>().map_err(|_| {
                        malformed(line, format!("invalid block start '{}'", token))
                    })?);
                }
                boundaries = Some(parsed);
            } else {
                let mut parts = line.split(' ');
                let osis = parts.next().unwrap_or("");
                let book = BookId::from_osis(osis)
                    .ok_or_else(|| malformed(line, format!("unknown book id '{}'", osis)))?;
                let mut chapters = Vec::new();
                for token in parts {
                    chapters.push(
                        VerseSet::parse_token(token)
                            .map_err(|e| malformed(line, e.to_string()))?,
                    );
                }
                book_sets.push((book, chapters));
            }
        }
        Self::assemble(name, description, aliases, book_sets, boundaries.as_deref())
    }

    fn assemble(
        name: &str,
        description: Option<&str>,
        aliases: Vec<String>,
        book_sets: Vec<(BookId, Vec<Option<VerseSet>>)>,
        reorder_boundaries: Option<&[usize]>,
    ) -> Result<Versification> {
        if !name_pattern().is_match(name) {
            return Err(VersificationError::InvalidName {
                name: name.to_string(),
            });
        }
        for alias in &aliases {
            if !name_pattern().is_match(alias) {
                return Err(VersificationError::InvalidName {
                    name: alias.clone(),
                });
            }
        }

        let mut books = Vec::with_capacity(book_sets.len());
        let mut book_lookup = HashMap::new();
        let mut counter = 0usize;
        for (book, chapters) in book_sets {
            if chapters.is_empty() {
                return Err(VersificationError::EmptyBook { book });
            }
            if matches!(chapters.last(), Some(None)) {
                return Err(VersificationError::TrailingAbsentChapter { book });
            }
            if book_lookup.insert(book, books.len()).is_some() {
                return Err(VersificationError::DuplicateBook { book });
            }
            let verse_count: usize = chapters
                .iter()
                .flatten()
                .map(|vs| vs.verse_count() as usize)
                .sum();
            books.push(BookEntry {
                book,
                chapters,
                first_index: counter,
                verse_count,
            });
            counter += verse_count;
        }
        let verse_count = counter;

        let (forward_offsets, backward_offsets) = match reorder_boundaries {
            None => (vec![(0, 0)], vec![(0, 0)]),
            Some(bounds) => {
                let mut ceiling: BTreeSet<usize> = bounds.iter().copied().collect();
                if ceiling.len() != bounds.len() {
                    return Err(VersificationError::InvalidReorder {
                        detail: "duplicate block start".to_string(),
                    });
                }
                ceiling.insert(verse_count);
                let mut forward = Vec::with_capacity(bounds.len());
                let mut backward = Vec::with_capacity(bounds.len());
                let mut covered = 0usize;
                for &start in bounds {
                    if start >= verse_count {
                        return Err(VersificationError::InvalidReorder {
                            detail: format!("block start {} out of range", start),
                        });
                    }
                    let next = ceiling
                        .range(start + 1..)
                        .next()
                        .copied()
                        .unwrap_or(verse_count);
                    forward.push((covered, start as isize - covered as isize));
                    backward.push((start, covered as isize - start as isize));
                    covered += next - start;
                }
                if covered != verse_count {
                    return Err(VersificationError::InvalidReorder {
                        detail: format!(
                            "blocks cover {} of {} verses",
                            covered, verse_count
                        ),
                    });
                }
                backward.sort_by_key(|&(start, _)| start);
                (forward, backward)
            }
        };

        Ok(Versification {
            name: name.to_string(),
            description: description.map(|d| d.to_string()),
            aliases,
            books,
            book_lookup,
            verse_count,
            forward_offsets,
            backward_offsets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of this scheme under a different name. Everything else,
    /// aliases included, carries over.
    pub(crate) fn with_name(&self, name: &str) -> Result<Versification> {
        if !name_pattern().is_match(name) {
            return Err(VersificationError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(Versification {
            name: name.to_string(),
            ..self.clone()
        })
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn verse_count(&self) -> usize {
        self.verse_count
    }

    /// Index -> verse. Panics when `index` is outside
    /// `[0, verse_count)`; an out-of-range index is a caller bug, not
    /// a recoverable condition.
    pub fn reference(&self, index: usize) -> Reference {
        assert!(
            index < self.verse_count,
            "verse index {} out of range ({} verses)",
            index,
            self.verse_count
        );
        let natural = (index as isize + floor_offset(&self.forward_offsets, index)) as usize;
        let book_idx = self.books.partition_point(|b| b.first_index <= natural) - 1;
        let entry = &self.books[book_idx];
        let mut offset = natural - entry.first_index;
        let mut chapter = 0u32;
        for vs in &entry.chapters {
            chapter += 1;
            if let Some(vs) = vs {
                let count = vs.verse_count() as usize;
                if offset < count {
                    return Reference::new_unchecked(entry.book, chapter, vs.verse_at(offset as u32));
                }
                offset -= count;
            }
        }
        unreachable!("index {} not covered by book {}", index, entry.book)
    }

    /// Verse -> index; `None` when the scheme has no such verse.
    pub fn index_of(&self, reference: &Reference) -> Option<usize> {
        self.index_for(reference.book(), reference.chapter(), reference.verse())
    }

    pub fn index_for(&self, book: BookId, chapter: u32, verse: &str) -> Option<usize> {
        let &book_idx = self.book_lookup.get(&book)?;
        let entry = &self.books[book_idx];
        if chapter < 1 || chapter as usize > entry.chapters.len() {
            return None;
        }
        let vs = entry.chapters[chapter as usize - 1].as_ref()?;
        let local = vs.index_of_verse(verse)? as usize;
        let mut natural = entry.first_index + local;
        for prior in entry.chapters[..chapter as usize - 1].iter().flatten() {
            natural += prior.verse_count() as usize;
        }
        Some((natural as isize + floor_offset(&self.backward_offsets, natural)) as usize)
    }

    pub fn contains(&self, reference: &Reference) -> bool {
        self.index_of(reference).is_some()
    }

    pub fn contains_verse(&self, book: BookId, chapter: u32, verse: &str) -> bool {
        self.index_for(book, chapter, verse).is_some()
    }

    /// All verses in index order.
    pub fn references(&self) -> impl Iterator<Item = Reference> + '_ {
        (0..self.verse_count).map(move |i| self.reference(i))
    }

    pub fn books(&self) -> impl Iterator<Item = BookId> + '_ {
        self.books.iter().map(|b| b.book)
    }

    /// Number of chapter slots for a book (including absent ones); 0
    /// when the scheme lacks the book.
    pub fn chapter_count(&self, book: BookId) -> usize {
        self.book_lookup
            .get(&book)
            .map(|&i| self.books[i].chapters.len())
            .unwrap_or(0)
    }

    pub fn chapter_verses(&self, book: BookId, chapter: u32) -> Option<&VerseSet> {
        let &book_idx = self.book_lookup.get(&book)?;
        if chapter < 1 {
            return None;
        }
        self.books[book_idx]
            .chapters
            .get(chapter as usize - 1)?
            .as_ref()
    }

    pub fn book_verse_count(&self, book: BookId) -> usize {
        self.book_lookup
            .get(&book)
            .map(|&i| self.books[i].verse_count)
            .unwrap_or(0)
    }

    /// Serializes book lines and the reorder line in file format.
    /// Name, description and aliases are written by the registry.
    pub(crate) fn dump_scheme(&self, out: &mut String) {
        for entry in &self.books {
            out.push(' ');
            out.push_str(entry.book.osis_id());
            for vs in &entry.chapters {
                out.push(' ');
                match vs {
                    None => out.push('-'),
                    Some(vs) => vs.dump(out),
                }
            }
            out.push('\n');
        }
        if self.forward_offsets.len() > 1 {
            out.push_str(" ~");
            for &(start, offset) in &self.forward_offsets {
                out.push_str(&format!(" {}", (start as isize + offset) as usize));
            }
            out.push('\n');
        }
    }
}

fn to_owned_aliases(aliases: &[&str]) -> Vec<String> {
    aliases.iter().map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn book(osis: &str) -> BookId {
        BookId::from_osis(osis).unwrap()
    }

    #[test]
    fn test_verse_counts_scheme() {
        let s = Versification::from_verse_counts(
            "S",
            None,
            &[],
            &[(book("Gen"), vec![3, 2])],
        )
        .unwrap();
        assert_eq!(s.verse_count(), 5);
        assert_eq!(s.reference(0), Reference::verse_n(book("Gen"), 1, 1));
        assert_eq!(s.reference(4), Reference::verse_n(book("Gen"), 2, 2));
        assert_eq!(
            s.index_of(&Reference::verse_n(book("Gen"), 2, 1)),
            Some(3)
        );
        assert_eq!(s.index_of(&Reference::verse_n(book("Gen"), 2, 3)), None);
        assert_eq!(s.index_of(&Reference::verse_n(book("Exod"), 1, 1)), None);
    }

    #[test]
    fn test_round_trip_all_indices() {
        let s = Versification::from_verse_counts(
            "Two-Books",
            Some("two plain books"),
            &["TB"],
            &[(book("Gen"), vec![3, 2]), (book("Exod"), vec![4])],
        )
        .unwrap();
        assert_eq!(s.verse_count(), 9);
        for i in 0..s.verse_count() {
            assert_eq!(s.index_of(&s.reference(i)), Some(i), "index {}", i);
        }
        // book order follows the input, so Exod starts right after Gen
        assert_eq!(s.reference(5), Reference::verse_n(book("Exod"), 1, 1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_reference_out_of_range_panics() {
        let s = Versification::from_verse_counts("S", None, &[], &[(book("Gen"), vec![2])])
            .unwrap();
        s.reference(2);
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            Versification::from_verse_counts("bad name", None, &[], &[]).unwrap_err(),
            VersificationError::InvalidName { .. }
        ));
        assert!(matches!(
            Versification::from_verse_counts("S", None, &["bad alias"], &[]).unwrap_err(),
            VersificationError::InvalidName { .. }
        ));
        assert!(matches!(
            Versification::from_verse_counts("S", None, &[], &[(book("Gen"), vec![])])
                .unwrap_err(),
            VersificationError::EmptyBook { .. }
        ));
        assert!(matches!(
            Versification::from_verse_counts(
                "S",
                None,
                &[],
                &[(book("Gen"), vec![2]), (book("Gen"), vec![3])]
            )
            .unwrap_err(),
            VersificationError::DuplicateBook { .. }
        ));
        assert!(Versification::from_verse_counts("S", None, &[], &[(book("Gen"), vec![0])])
            .is_err());
    }

    #[test]
    fn test_reference_list_plain_order() {
        let gen = book("Gen");
        let refs = vec![
            Reference::verse_n(gen, 1, 1),
            Reference::verse_n(gen, 1, 2),
            Reference::verse_n(gen, 2, 1),
        ];
        let s = Versification::from_reference_list("Doc", None, &[], &refs).unwrap();
        assert_eq!(s.verse_count(), 3);
        let round: Vec<Reference> = s.references().collect();
        assert_eq!(round, refs);
        // no reorder layer, so no ~ line in the dump
        let mut dumped = String::new();
        s.dump_scheme(&mut dumped);
        assert!(!dumped.contains('~'));
    }

    #[test]
    fn test_reference_list_with_reorder() {
        let gen = book("Gen");
        let refs = vec![
            Reference::verse_n(gen, 2, 1),
            Reference::verse_n(gen, 1, 1),
            Reference::verse_n(gen, 1, 2),
        ];
        let s = Versification::from_reference_list("Reordered", None, &[], &refs).unwrap();
        assert_eq!(s.verse_count(), 3);
        let round: Vec<Reference> = s.references().collect();
        assert_eq!(round, refs, "index order must follow the document order");
        for (i, r) in refs.iter().enumerate() {
            assert_eq!(s.index_of(r), Some(i));
        }
        let mut dumped = String::new();
        s.dump_scheme(&mut dumped);
        assert!(dumped.contains(" ~ 2 0\n"));
    }

    #[test]
    fn test_reference_list_split_verse() {
        let gen = book("Gen");
        let refs = vec![
            Reference::verse_n(gen, 1, 1),
            Reference::new(gen, 1, "1a").unwrap(),
            Reference::verse_n(gen, 1, 2),
            Reference::verse_n(gen, 1, 3),
            Reference::verse_n(gen, 2, 1),
        ];
        let s = Versification::from_reference_list("Split", None, &[], &refs).unwrap();
        assert_eq!(s.verse_count(), 5);
        for i in 0..5 {
            assert_eq!(s.index_of(&s.reference(i)), Some(i));
        }
        assert!(s.contains(&Reference::new(gen, 1, "1a").unwrap()));
    }

    #[test]
    fn test_reference_list_duplicate() {
        let gen = book("Gen");
        let refs = vec![Reference::verse_n(gen, 1, 1), Reference::verse_n(gen, 1, 1)];
        assert!(matches!(
            Versification::from_reference_list("Dup", None, &[], &refs).unwrap_err(),
            VersificationError::DuplicateReference { .. }
        ));
    }

    #[test]
    fn test_interior_absent_chapter() {
        let gen = book("Gen");
        let refs = vec![Reference::verse_n(gen, 1, 1), Reference::verse_n(gen, 3, 1)];
        let s = Versification::from_reference_list("Gappy", None, &[], &refs).unwrap();
        assert_eq!(s.verse_count(), 2);
        assert_eq!(s.chapter_count(gen), 3);
        assert!(!s.contains_verse(gen, 2, "1"));
        assert_eq!(s.reference(1), Reference::verse_n(gen, 3, 1));
        let mut dumped = String::new();
        s.dump_scheme(&mut dumped);
        assert_eq!(dumped, " Gen 1 - 1\n");
    }

    #[test]
    fn test_scheme_lines_round_trip() {
        let lines = vec![
            "=Alias1".to_string(),
            "Gen 1-3 1-2".to_string(),
            "Exod 1,3-4+4a".to_string(),
        ];
        let s = Versification::from_scheme_lines("Parsed", Some("a parsed scheme"), &lines)
            .unwrap();
        assert_eq!(s.aliases(), &["Alias1".to_string()]);
        assert_eq!(s.verse_count(), 5 + 4);
        assert!(s.contains_verse(book("Exod"), 1, "4a"));
        assert!(!s.contains_verse(book("Exod"), 1, "2"));
        let mut dumped = String::new();
        s.dump_scheme(&mut dumped);
        assert_eq!(dumped, " Gen 1-3 1-2\n Exod 1,3-4+4a\n");
    }

    #[test]
    fn test_scheme_lines_errors() {
        assert!(matches!(
            Versification::from_scheme_lines("X", None, &["Nope 1-3".to_string()])
                .unwrap_err(),
            VersificationError::MalformedLine { .. }
        ));
        assert!(matches!(
            Versification::from_scheme_lines("X", None, &["~ 0 q".to_string()]).unwrap_err(),
            VersificationError::MalformedLine { .. }
        ));
        assert!(matches!(
            Versification::from_scheme_lines("X", None, &["Gen 1-3 -".to_string()])
                .unwrap_err(),
            VersificationError::TrailingAbsentChapter { .. }
        ));
        // reorder blocks must partition the index space
        assert!(matches!(
            Versification::from_scheme_lines("X", None, &["Gen 1-3".to_string(), "~ 1".to_string()])
                .unwrap_err(),
            VersificationError::InvalidReorder { .. }
        ));
        assert!(matches!(
            Versification::from_scheme_lines("X", None, &["Gen 1-3".to_string(), "~ 0 0".to_string()])
                .unwrap_err(),
            VersificationError::InvalidReorder { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_round_trip_verse_counts(counts in proptest::collection::vec(1u32..40, 1..12)) {
            let s = Versification::from_verse_counts(
                "Prop",
                None,
                &[],
                &[(BookId::from_osis("Gen").unwrap(), counts)],
            )
            .unwrap();
            for i in 0..s.verse_count() {
                prop_assert_eq!(s.index_of(&s.reference(i)), Some(i));
            }
        }

        #[test]
        fn prop_round_trip_swapped_chapters(a in 1u32..20, b in 1u32..20) {
            // chapter 2 placed before chapter 1
            let gen = BookId::from_osis("Gen").unwrap();
            let mut refs = Vec::new();
            for v in 1..=b {
                refs.push(Reference::verse_n(gen, 2, v));
            }
            for v in 1..=a {
                refs.push(Reference::verse_n(gen, 1, v));
            }
            let s = Versification::from_reference_list("PropSwap", None, &[], &refs).unwrap();
            prop_assert_eq!(s.verse_count(), (a + b) as usize);
            let round: Vec<Reference> = s.references().collect();
            prop_assert_eq!(round, refs);
        }
    }
}
