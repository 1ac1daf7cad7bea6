use crate::logger::DiagnosticLogger;
use crate::registry::{MappingCell, VersificationRegistry};
use crate::report::{ClosureHealth, VerifyReport, SCHEMA_VERSION};
use anyhow::Result;
use chrono::Utc;

/// Runs the registry self-checks and folds the findings into a
/// [`VerifyReport`]. Every check logs its outcome through the shared
/// diagnostic logger.
pub struct RegistryValidator {
    logger: DiagnosticLogger,
}

impl RegistryValidator {
    pub fn new(logger: DiagnosticLogger) -> RegistryValidator {
        RegistryValidator { logger }
    }

    pub fn verify(&self, registry: &mut VersificationRegistry) -> Result<VerifyReport> {
        self.logger.info(format!(
            "Verifying {} versifications and {} mappings...",
            registry.versifications().len(),
            registry.mappings().len()
        ));

        let round_trip_failures = self.check_round_trips(registry);
        let mapping_failures = self.check_mappings(registry);
        let (canonical_sha256, save_load_deterministic) = self.check_save_load(registry)?;
        let closure = self.check_closure(registry)?;

        let report = VerifyReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            versifications: registry.versifications().len(),
            mappings: registry.mappings().len(),
            round_trip_failures,
            mapping_failures,
            closure,
            canonical_sha256,
            save_load_deterministic,
        };

        if report.is_clean() {
            self.logger.info("Registry verified successfully".to_string());
        } else {
            self.logger
                .error("Registry verification found problems".to_string(), None);
        }

        Ok(report)
    }

    /// Every ordinal must convert to a reference and back to itself, and
    /// the per-book totals must add up to the scheme total.
    fn check_round_trips(&self, registry: &VersificationRegistry) -> Vec<String> {
        let mut failures = Vec::new();

        for versification in registry.versifications() {
            let before = failures.len();

            for index in 0..versification.verse_count() {
                let reference = versification.reference(index);
                let back = versification.index_of(&reference);
                if back != Some(index) {
                    failures.push(format!(
                        "{}: {} resolves to {:?}, expected index {}",
                        versification.name(),
                        reference,
                        back,
                        index
                    ));
                }
            }

            let book_total: usize = versification
                .books()
                .map(|book| versification.book_verse_count(book))
                .sum();
            if book_total != versification.verse_count() {
                failures.push(format!(
                    "{}: book totals add up to {}, scheme reports {}",
                    versification.name(),
                    book_total,
                    versification.verse_count()
                ));
            }

            if failures.len() == before {
                self.logger.info(format!(
                    "✓ {} ordinal round trip ({} verses)",
                    versification.name(),
                    versification.verse_count()
                ));
            } else {
                self.logger.error(
                    format!(
                        "✗ {} failed {} round trip checks",
                        versification.name(),
                        failures.len() - before
                    ),
                    None,
                );
            }
        }

        failures
    }

    /// Every source verse of every stored mapping must produce a verdict,
    /// and every destination must exist in the target scheme.
    fn check_mappings(&self, registry: &VersificationRegistry) -> Vec<String> {
        let mut failures = Vec::new();

        for mapping in registry.mappings() {
            let before = failures.len();
            let label = format!("{}>{}", mapping.from().name(), mapping.to().name());

            for reference in mapping.from().references() {
                match mapping.get_mapping(&reference) {
                    None => {
                        failures.push(format!("{}: no verdict for {}", label, reference));
                    }
                    Some(targets) => {
                        for target in targets {
                            if mapping.to().index_of(&target).is_none() {
                                failures.push(format!(
                                    "{}: {} maps to {} outside the target scheme",
                                    label, reference, target
                                ));
                            }
                        }
                    }
                }
            }

            if failures.len() == before {
                self.logger.info(format!(
                    "✓ {} covers {} source verses ({} mapped)",
                    label,
                    mapping.from().verse_count(),
                    mapping.mapped_source_count()
                ));
            } else {
                self.logger
                    .error(format!("✗ {} failed integrity checks", label), None);
            }
        }

        failures
    }

    /// Saving, reloading and saving again must reproduce the same bytes.
    fn check_save_load(&self, registry: &VersificationRegistry) -> Result<(String, bool)> {
        let text = registry.save_to_string()?;

        let mut reloaded = VersificationRegistry::new();
        let deterministic = match reloaded.load_str(&text) {
            Ok(()) => reloaded.save_to_string()? == text,
            Err(e) => {
                self.logger.error(
                    format!("Reloading the saved registry failed: {}", e),
                    None,
                );
                false
            }
        };

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        self.logger.info(format!("Canonical hash: {}", hash));

        if !deterministic {
            self.logger.error(
                "save/load/save did not reproduce the same bytes".to_string(),
                None,
            );
        }

        Ok((hash, deterministic))
    }

    fn check_closure(&self, registry: &mut VersificationRegistry) -> Result<ClosureHealth> {
        let closure = registry.transitive_mappings()?;
        let mut health = ClosureHealth {
            known_pairs: 0,
            ambiguous_pairs: 0,
            unknown_pairs: 0,
        };

        for (i, row) in closure.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                match cell {
                    MappingCell::Known(_) => health.known_pairs += 1,
                    MappingCell::Ambiguous => health.ambiguous_pairs += 1,
                    MappingCell::Unknown => health.unknown_pairs += 1,
                }
            }
        }

        self.logger.info(format!(
            "Closure: {} known, {} ambiguous, {} unknown pairs",
            health.known_pairs, health.ambiguous_pairs, health.unknown_pairs
        ));

        Ok(health)
    }
}
