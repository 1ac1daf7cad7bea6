use crate::error::{Result, VersificationError};
use crate::reference::verse_label_pattern;
use std::collections::BTreeSet;

/// Per-chapter verse membership in three parts: exception verses
/// below the primary range, the primary contiguous range itself, and
/// extra non-numeric labels after it.
///
/// Local index order is exceptions ascending, then the range, then
/// extras in list order. An empty range is normalized to (1, 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseSet {
    exceptions: Vec<u32>,
    range_from: u32,
    range_to: u32,
    extras: Vec<String>,
}

impl VerseSet {
    pub fn new(
        exceptions: Vec<u32>,
        range_from: u32,
        range_to: u32,
        extras: Vec<String>,
    ) -> Result<Self> {
        if range_from < 1 || range_to < range_from - 1 {
            return Err(VersificationError::InvalidVerseRange {
                from: range_from,
                to: range_to,
            });
        }
        let (range_from, range_to) = if range_to < range_from {
            (1, 0)
        } else {
            (range_from, range_to)
        };
        let range_empty = range_to < range_from;
        let mut last = 0;
        for &verse in &exceptions {
            if verse < 1 || verse <= last || range_empty || verse >= range_from {
                return Err(VersificationError::InvalidException { verse });
            }
            last = verse;
        }
        for extra in &extras {
            if !verse_label_pattern().is_match(extra) || extra.parse::<u32>().is_ok() {
                return Err(VersificationError::InvalidVerseLabel {
                    label: extra.clone(),
                });
            }
        }
        let set = VerseSet {
            exceptions,
            range_from,
            range_to,
            extras,
        };
        if set.verse_count() == 0 {
            return Err(VersificationError::EmptyVerseSet);
        }
        Ok(set)
    }

    /// Plain chapter with verses `1..=count`.
    pub fn of_count(count: u32) -> Result<Self> {
        VerseSet::new(Vec::new(), 1, count, Vec::new())
    }

    /// Derives the densest encoding from an arbitrary label list: the
    /// maximal trailing contiguous run of the numeric labels becomes
    /// the primary range, lower numerics become exceptions, and
    /// non-numeric labels become extras in first-seen order.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let mut numeric = BTreeSet::new();
        let mut extras: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if !verse_label_pattern().is_match(label) {
                return Err(VersificationError::InvalidVerseLabel {
                    label: label.to_string(),
                });
            }
            match label.parse::<u32>() {
                Ok(n) => {
                    if !numeric.insert(n) {
                        return Err(VersificationError::DuplicateVerseLabel {
                            label: label.to_string(),
                        });
                    }
                }
                Err(_) => {
                    if extras.iter().any(|e| e == label) {
                        return Err(VersificationError::DuplicateVerseLabel {
                            label: label.to_string(),
                        });
                    }
                    extras.push(label.to_string());
                }
            }
        }
        let (mut range_from, mut range_to) = (1, 0);
        if let Some(&to) = numeric.iter().next_back() {
            let mut from = to;
            while from > 1 && numeric.contains(&(from - 1)) {
                from -= 1;
            }
            range_from = from;
            range_to = to;
        }
        let exceptions: Vec<u32> = numeric.range(..range_from).copied().collect();
        VerseSet::new(exceptions, range_from, range_to, extras)
    }

    pub fn verse_count(&self) -> u32 {
        self.exceptions.len() as u32 + (self.range_to + 1 - self.range_from)
            + self.extras.len() as u32
    }

    pub fn contains_verse(&self, verse: &str) -> bool {
        self.index_of_verse(verse).is_some()
    }

    /// Local index of a verse label, `None` when absent.
    pub fn index_of_verse(&self, verse: &str) -> Option<u32> {
        if let Ok(n) = verse.parse::<u32>() {
            if n >= self.range_from && n <= self.range_to {
                return Some(self.exceptions.len() as u32 + (n - self.range_from));
            }
            if n < self.range_from {
                if let Ok(pos) = self.exceptions.binary_search(&n) {
                    return Some(pos as u32);
                }
            }
            return None;
        }
        self.extras
            .iter()
            .position(|e| e == verse)
            .map(|pos| self.verse_count() - self.extras.len() as u32 + pos as u32)
    }

    /// Inverse of `index_of_verse`. Panics when `offset` is out of
    /// range.
    pub fn verse_at(&self, offset: u32) -> String {
        let exceptions = self.exceptions.len() as u32;
        if offset < exceptions {
            return self.exceptions[offset as usize].to_string();
        }
        let range_size = self.range_to + 1 - self.range_from;
        if offset < exceptions + range_size {
            return (self.range_from + offset - exceptions).to_string();
        }
        self.extras[(offset - exceptions - range_size) as usize].clone()
    }

    /// Serializes to the file-format chapter token: exception runs
    /// comma-joined, then the range, then `+extra` suffixes.
    pub(crate) fn dump(&self, out: &mut String) {
        let mut i = 0;
        while i < self.exceptions.len() {
            let start = self.exceptions[i];
            let mut end = start;
            while i + 1 < self.exceptions.len() && self.exceptions[i + 1] == end + 1 {
                i += 1;
                end += 1;
            }
            if start == end {
                out.push_str(&start.to_string());
            } else {
                out.push_str(&format!("{}-{}", start, end));
            }
            i += 1;
            if i < self.exceptions.len() {
                out.push(',');
            }
        }
        if !self.exceptions.is_empty() && self.range_to >= self.range_from {
            out.push(',');
        }
        if self.range_from == self.range_to {
            out.push_str(&self.range_from.to_string());
        } else if self.range_from < self.range_to {
            out.push_str(&format!("{}-{}", self.range_from, self.range_to));
        }
        for extra in &self.extras {
            out.push_str(&format!("+{}", extra));
        }
    }

    /// Parses a file-format chapter token. `-` means the chapter is
    /// absent. Exception pieces may be given as ranges and in any
    /// order; they are normalized.
    pub(crate) fn parse_token(token: &str) -> Result<Option<VerseSet>> {
        if token == "-" {
            return Ok(None);
        }
        let parse_number = |piece: &str| -> Result<u32> {
            piece
                .parse::<u32>()
                .map_err(|_| VersificationError::InvalidVerseLabel {
                    label: piece.to_string(),
                })
        };
        let mut pieces = token.split('+');
        let numeric_part = pieces.next().unwrap_or("");
        let extras: Vec<String> = pieces.map(|e| e.to_string()).collect();
        let mut exception_bits = BTreeSet::new();
        let (mut range_from, mut range_to) = (1, 0);
        if !numeric_part.is_empty() {
            let ranges: Vec<&str> = numeric_part.split(',').collect();
            for (i, piece) in ranges.iter().enumerate() {
                let (from, to) = match piece.split_once('-') {
                    Some((a, b)) => (parse_number(a)?, parse_number(b)?),
                    None => {
                        let n = parse_number(piece)?;
                        (n, n)
                    }
                };
                if i < ranges.len() - 1 {
                    exception_bits.extend(from..=to);
                } else {
                    range_from = from;
                    range_to = to;
                }
            }
        }
        let exceptions: Vec<u32> = exception_bits.into_iter().collect();
        VerseSet::new(exceptions, range_from, range_to, extras).map(Some)
    }
}
