use crate::reference::Reference;
use crate::registry::VersificationRegistry;
use crate::report::{DetectReport, SchemeScore, SCHEMA_VERSION};
use chrono::Utc;
use std::collections::HashSet;

/// Knobs for scheme detection.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Runners-up listed after the best match.
    pub limit: usize,
    /// Report scheme sizes counting only books present in the
    /// observed inventory.
    pub limit_books: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            limit: 10,
            limit_books: false,
        }
    }
}

/// Ranks every registered scheme by how well it covers an observed
/// verse inventory: fewest missing chapters, then fewest missing
/// verses, then smallest scheme.
pub struct VersificationDetector {
    config: DetectorConfig,
}

impl VersificationDetector {
    pub fn new(config: DetectorConfig) -> VersificationDetector {
        VersificationDetector { config }
    }

    /// `None` when the registry holds no schemes to rank. Duplicate
    /// observed references are counted once. Runners-up stop at the
    /// configured limit, or one past the scheme that falls behind the
    /// best by more than 2 chapters or 5 verses.
    pub fn detect(
        &self,
        registry: &VersificationRegistry,
        observed: &[Reference],
    ) -> Option<DetectReport> {
        let mut seen = HashSet::new();
        let observed: Vec<&Reference> = observed.iter().filter(|r| seen.insert(*r)).collect();
        let used_books: HashSet<_> = observed.iter().map(|r| r.book()).collect();

        let mut scores: Vec<SchemeScore> = registry
            .versifications()
            .iter()
            .map(|scheme| {
                let mut missing_chapters: Vec<String> = Vec::new();
                let mut missing_verses = Vec::new();
                for r in &observed {
                    if (r.chapter() as usize) > scheme.chapter_count(r.book()) {
                        let chapter = format!("{} {}", r.book(), r.chapter());
                        if !missing_chapters.contains(&chapter) {
                            missing_chapters.push(chapter);
                        }
                    } else if !scheme
                        .chapter_verses(r.book(), r.chapter())
                        .map_or(false, |set| set.contains_verse(r.verse()))
                    {
                        missing_verses.push(r.to_string());
                    }
                }
                let verse_count = if self.config.limit_books {
                    scheme
                        .books()
                        .filter(|b| used_books.contains(b))
                        .map(|b| scheme.book_verse_count(b))
                        .sum()
                } else {
                    scheme.verse_count()
                };
                SchemeScore {
                    name: scheme.name().to_string(),
                    missing_chapters,
                    missing_verses,
                    verse_count,
                }
            })
            .collect();
        scores.sort_by_key(|s| {
            (
                s.missing_chapters.len(),
                s.missing_verses.len(),
                s.verse_count,
            )
        });

        let mut scores = scores.into_iter();
        let best = scores.next()?;
        let mut runners_up = Vec::new();
        for score in scores {
            if runners_up.len() >= self.config.limit {
                break;
            }
            let over_cutoff = score.missing_chapters.len() > best.missing_chapters.len() + 2
                || score.missing_verses.len() > best.missing_verses.len() + 5;
            runners_up.push(score);
            if over_cutoff {
                break;
            }
        }
        Some(DetectReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            observed_verses: observed.len(),
            best,
            runners_up,
        })
    }
}
