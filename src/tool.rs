use crate::books::BookId;
use crate::cli::{Cli, Commands};
use crate::detector::{DetectorConfig, VersificationDetector};
use crate::error::VersificationError;
use crate::logger::{DiagnosticLogger, RegistryStats};
use crate::mapping::VersificationMapping;
use crate::reference::Reference;
use crate::registry::VersificationRegistry;
use crate::report::{
    CompareReport, MappingComparison, SchemeComparison, SchemeRelation, SchemeScore,
    SCHEMA_VERSION,
};
use crate::schema::validate_json;
use crate::verify::RegistryValidator;
use crate::versification::Versification;
use anyhow::{Context, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One tool invocation over a versification database: loads the db,
/// runs a subcommand against it and saves when the subcommand changed
/// anything.
pub struct VersificationTool {
    db_path: PathBuf,
    registry: VersificationRegistry,
    logger: DiagnosticLogger,
    report_path: Option<PathBuf>,
    gzip_report: bool,
}

impl VersificationTool {
    pub fn new(cli: &Cli) -> Result<VersificationTool> {
        let log_dir = cli.log_dir.as_deref().unwrap_or_else(|| Path::new("logs"));
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        let logger =
            DiagnosticLogger::new(log_dir).context("Failed to create DiagnosticLogger")?;

        let registry = if cli.db.exists() {
            VersificationRegistry::from_file(&cli.db)
                .with_context(|| format!("Failed to load database {:?}", cli.db))?
        } else {
            VersificationRegistry::new()
        };

        Ok(VersificationTool {
            db_path: cli.db.clone(),
            registry,
            logger,
            report_path: cli.report.clone(),
            gzip_report: cli.gzip_report,
        })
    }

    pub fn run(&mut self, command: &Commands) -> Result<()> {
        match command {
            Commands::List { names } => self.run_list(names),
            Commands::Map {
                mapping,
                book,
                chapter,
                verse,
            } => self.run_map(mapping, book, *chapter, verse),
            Commands::Compare { left, right } => self.run_compare(left, right),
            Commands::Join { keys } => self.run_join(keys),
            Commands::Rename { name, new_name } => self.run_rename(name, new_name),
            Commands::Remove { names } => self.run_remove(names),
            Commands::Export { out_file, names } => self.run_export(out_file, names),
            Commands::Import { file } => self.run_import(file),
            Commands::Detect {
                refs_file,
                limit,
                limit_books,
            } => self.run_detect(refs_file, *limit, *limit_books),
            Commands::Verify => self.run_verify(),
            Commands::Schema { out } => self.run_schema(out),
        }
    }

    /// Writes the run summary to the log directory and trims old runs.
    pub fn finalize(&self) -> Result<()> {
        let stats = RegistryStats {
            versifications: self.registry.versifications().len(),
            mappings: self.registry.mappings().len(),
            verses: self
                .registry
                .versifications()
                .iter()
                .map(|v| v.verse_count())
                .sum(),
        };
        let report = self
            .logger
            .generate_report(stats)
            .context("Failed to generate diagnostic report")?;
        self.logger.rotate_logs(10).context("Failed to rotate logs")?;
        if report.summary.errors > 0 || report.summary.warnings > 0 {
            println!(
                "Errors: {}, Warnings: {}",
                report.summary.errors, report.summary.warnings
            );
        }
        Ok(())
    }

    fn run_list(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            for versification in self.registry.versifications() {
                print_versification_info(versification);
            }
            // Mappings have no name of their own; label them with a
            // per-pair running index so repeated pairs stay apart.
            let mut counters: HashMap<String, usize> = HashMap::new();
            for mapping in self.registry.mappings() {
                let prefix = format!("{}/{}/", mapping.from().name(), mapping.to().name());
                let count = counters.entry(prefix.clone()).or_insert(0);
                *count += 1;
                let label = format!("{}{}", prefix, count);
                print_mapping_info(&label, mapping);
            }
        } else {
            for name in names {
                if name.contains('/') {
                    let mapping = self.registry.find_mapping_key(name)?;
                    print_mapping_info(name, &mapping);
                } else {
                    let versification = self.registry.find(name)?;
                    print_versification_info(versification);
                }
            }
        }
        Ok(())
    }

    fn run_map(&mut self, key: &str, book: &str, chapter: u32, verse: &str) -> Result<()> {
        let book_id = BookId::from_osis(book).ok_or_else(|| VersificationError::UnknownBook {
            id: book.to_string(),
        })?;
        let reference = Reference::new(book_id, chapter, verse)?;
        let mapping = self.registry.find_mapping_key(key)?;

        match mapping.get_mapping(&reference) {
            None => println!("{} is not part of {}", reference, mapping.from().name()),
            Some(targets) if targets.is_empty() => {
                println!("{} has no counterpart in {}", reference, mapping.to().name())
            }
            Some(targets) => {
                for target in &targets {
                    println!("{}", target);
                }
            }
        }
        Ok(())
    }

    fn run_compare(&mut self, left: &str, right: &str) -> Result<()> {
        if left.contains('/') != right.contains('/') {
            anyhow::bail!("Cannot compare a versification with a mapping");
        }

        let mut report = CompareReport {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            left: left.to_string(),
            right: right.to_string(),
            schemes: None,
            mappings: None,
        };

        if left.contains('/') {
            let left_mapping = self.registry.find_mapping_key(left)?;
            let right_mapping = self.registry.find_mapping_key(right)?;
            let comparison = compare_mappings(&left_mapping, &right_mapping)?;
            print_mapping_comparison(&comparison);
            report.mappings = Some(comparison);
        } else {
            let left_scheme = Arc::clone(self.registry.find(left)?);
            let right_scheme = Arc::clone(self.registry.find(right)?);
            let comparison = compare_schemes(&left_scheme, &right_scheme);
            print_scheme_comparison(&comparison);
            report.schemes = Some(comparison);
        }

        self.write_report("compare", &report)
    }

    fn run_join(&mut self, keys: &[String]) -> Result<()> {
        if keys.len() < 2 {
            anyhow::bail!("join needs at least two mapping keys");
        }
        let mut joined = (*self.registry.find_mapping_key(&keys[0])?).clone();
        for key in &keys[1..] {
            let next = self.registry.find_mapping_key(key)?;
            joined = VersificationMapping::join(&joined, &next)
                .with_context(|| format!("Failed to join {}", key))?;
        }

        let label = format!("{}/{}", joined.from().name(), joined.to().name());
        let rules = joined.rule_count();
        self.logger
            .info(format!("Joined {} keys into {}", keys.len(), label));
        self.registry.add_mapping(joined);
        self.save()?;
        println!("Stored mapping {} ({} rules)", label, rules);
        Ok(())
    }

    fn run_rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        self.registry
            .rename_versification(name, new_name)
            .with_context(|| format!("Failed to rename {}", name))?;
        self.save()?;
        println!("Renamed {} to {}", name, new_name);
        Ok(())
    }

    fn run_remove(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            if name.contains('/') {
                self.registry.remove_mapping(name)?;
                self.logger.info(format!("Removed mapping {}", name));
            } else {
                self.registry.remove_versification(name)?;
                self.logger.info(format!("Removed versification {}", name));
            }
        }
        self.save()?;
        println!("Removed {} entries", names.len());
        Ok(())
    }

    fn run_export(&mut self, out_file: &Path, names: &[String]) -> Result<()> {
        let text = self.registry.save_selection(names)?;
        fs::write(out_file, text).with_context(|| format!("Failed to write {:?}", out_file))?;
        println!("Exported to {}", out_file.display());
        Ok(())
    }

    fn run_import(&mut self, file: &Path) -> Result<()> {
        let other = VersificationRegistry::from_file(file)
            .with_context(|| format!("Failed to load {:?}", file))?;
        let schemes = other.versifications().len();
        let mappings = other.mappings().len();
        self.registry.merge(other)?;
        self.save()?;
        println!("Imported {} versifications and {} mappings", schemes, mappings);
        Ok(())
    }

    fn run_detect(&mut self, refs_file: &Path, limit: usize, limit_books: bool) -> Result<()> {
        let text = fs::read_to_string(refs_file)
            .with_context(|| format!("Failed to read {:?}", refs_file))?;
        let mut observed = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let reference = line.parse::<Reference>().with_context(|| {
                format!("{}:{}: bad reference '{}'", refs_file.display(), number + 1, line)
            })?;
            observed.push(reference);
        }
        self.logger
            .info(format!("Detecting over {} observed references", observed.len()));

        let detector = VersificationDetector::new(DetectorConfig { limit, limit_books });
        match detector.detect(&self.registry, &observed) {
            None => println!("No versifications in database"),
            Some(report) => {
                print!("Best match:  ");
                print_scheme_score(&report.best, report.observed_verses);
                if !report.runners_up.is_empty() {
                    println!("Other options:");
                    for runner in &report.runners_up {
                        print_scheme_score(runner, report.observed_verses);
                    }
                }
                self.write_report("detect", &report)?;
            }
        }
        Ok(())
    }

    fn run_verify(&mut self) -> Result<()> {
        let validator = RegistryValidator::new(self.logger.clone());
        let report = validator.verify(&mut self.registry)?;

        println!(
            "{} versifications, {} mappings",
            report.versifications, report.mappings
        );
        println!("Canonical SHA-256: {}", report.canonical_sha256);
        if report.is_clean() {
            println!("Registry OK");
        } else {
            for failure in &report.round_trip_failures {
                println!("Round trip: {}", failure);
            }
            for failure in &report.mapping_failures {
                println!("Mapping: {}", failure);
            }
            if !report.save_load_deterministic {
                println!("save/load/save is not deterministic");
            }
        }

        self.write_report("verify", &report)?;
        if !report.is_clean() {
            anyhow::bail!("Registry verification failed");
        }
        Ok(())
    }

    fn run_schema(&self, out: &Path) -> Result<()> {
        fs::create_dir_all(out).context("Failed to create schema directory")?;
        crate::schema::generate_schemas(out)
            .map_err(|e| anyhow::anyhow!("Schema generation failed: {}", e))?;
        println!("Schemas written to {}", out.display());
        Ok(())
    }

    fn save(&self) -> Result<()> {
        self.registry
            .save_to_file(&self.db_path)
            .with_context(|| format!("Failed to save database {:?}", self.db_path))
    }

    /// Writes the JSON report when `--report` was given, gzipped when
    /// `--gzip-report` was set, and validates it against a previously
    /// generated schema when one sits next to it.
    fn write_report<T: Serialize>(&self, kind: &str, report: &T) -> Result<()> {
        let Some(path) = &self.report_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create report directory {:?}", parent))?;
            }
        }

        if self.gzip_report {
            let gz_path = path.with_extension("json.gz");
            let mut encoder = GzEncoder::new(
                fs::File::create(&gz_path)
                    .with_context(|| format!("Failed to create {:?}", gz_path))?,
                Compression::default(),
            );
            encoder
                .write_all(json.as_bytes())
                .context("Failed to write compressed report")?;
            encoder.finish().context("Failed to finalize compression")?;
            self.logger
                .info(format!("Report written to {}", gz_path.display()));
        } else {
            fs::write(path, &json).with_context(|| format!("Failed to write {:?}", path))?;
            self.logger
                .info(format!("Report written to {}", path.display()));
        }

        let schema_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("schema")
            .join(format!("{}-report-{}.json", kind, SCHEMA_VERSION));
        if schema_path.exists() {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("Failed to reparse report")?;
            match validate_json(&value, &schema_path) {
                Ok(()) => self.logger.info(format!("✓ {} report validated", kind)),
                Err(e) => self.logger.warning(
                    format!("✗ {} report failed schema validation: {}", kind, e),
                    None,
                ),
            }
        }
        Ok(())
    }
}

fn print_versification_info(versification: &Versification) {
    println!(
        "{}: {} ({} verses)",
        versification.name(),
        versification.description().unwrap_or("(No description)"),
        versification.verse_count()
    );
    for alias in versification.aliases() {
        println!("\tAlias: {}", alias);
    }
}

fn print_mapping_info(label: &str, mapping: &VersificationMapping) {
    println!("{}: {} rules", label, mapping.rule_count());

    let mut occurrence_from: HashMap<Reference, usize> = HashMap::new();
    let mut occurrence_to: HashMap<Reference, usize> = HashMap::new();
    for reference in mapping.from().references() {
        if let Some(targets) = mapping.get_mapping(&reference) {
            for target in targets {
                *occurrence_from.entry(reference.clone()).or_insert(0) += 1;
                *occurrence_to.entry(target).or_insert(0) += 1;
            }
        }
    }

    println!(
        "\t{}: {} of {} verses",
        mapping.from().name(),
        mapped_verse_info(&occurrence_from),
        mapping.from().verse_count()
    );
    println!(
        "\t{}: {} of {} verses",
        mapping.to().name(),
        mapped_verse_info(&occurrence_to),
        mapping.to().verse_count()
    );
}

/// `"12 (10+2)"` reads as 12 verses mapped, 10 of them once and 2 of
/// them twice.
fn mapped_verse_info(occurrences: &HashMap<Reference, usize>) -> String {
    let max = occurrences.values().copied().max().unwrap_or(0);
    let mut groups = vec![0usize; max];
    for &count in occurrences.values() {
        groups[count - 1] += 1;
    }
    let sum: usize = groups.iter().sum();
    let breakdown = groups
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join("+");
    format!("{} ({})", sum, breakdown)
}

fn compare_schemes(left: &Versification, right: &Versification) -> SchemeComparison {
    let left_set: HashSet<Reference> = left.references().collect();
    let right_set: HashSet<Reference> = right.references().collect();
    let common = left_set.intersection(&right_set).count();

    let relation = if left.verse_count() == right.verse_count() && left_set == right_set {
        let same_order =
            (0..left.verse_count()).all(|i| left.reference(i) == right.reference(i));
        if same_order {
            SchemeRelation::SameOrder
        } else {
            SchemeRelation::SameVerses
        }
    } else if right_set.is_subset(&left_set) {
        SchemeRelation::RightSubsetOfLeft
    } else if left_set.is_subset(&right_set) {
        SchemeRelation::LeftSubsetOfRight
    } else if common == 0 {
        SchemeRelation::Disjoint
    } else {
        SchemeRelation::Overlapping
    };

    SchemeComparison {
        left_verses: left.verse_count(),
        right_verses: right.verse_count(),
        common_verses: common,
        relation,
    }
}

fn print_scheme_comparison(comparison: &SchemeComparison) {
    match comparison.relation {
        SchemeRelation::SameOrder => {
            println!("Versifications contain same verses in same order")
        }
        SchemeRelation::SameVerses => println!("Versifications contain same verses"),
        SchemeRelation::RightSubsetOfLeft => {
            println!("Right versification is a subset of left versification")
        }
        SchemeRelation::LeftSubsetOfRight => {
            println!("Left versification is a subset of right versification")
        }
        SchemeRelation::Disjoint => println!("Versifications are disjoint"),
        SchemeRelation::Overlapping => println!(
            "Versifications have {} verses in common",
            comparison.common_verses
        ),
    }
}

/// Classifies every source verse of two mappings over the same scheme
/// pair. Two single-verse verdicts that disagree count as disjoint
/// without looking at sets.
fn compare_mappings(
    left: &VersificationMapping,
    right: &VersificationMapping,
) -> Result<MappingComparison> {
    if left.from().name() != right.from().name() || left.to().name() != right.to().name() {
        anyhow::bail!("Mappings must share source and destination versifications to be compared");
    }

    let mut comparison = MappingComparison {
        compared_verses: left.from().verse_count(),
        ..MappingComparison::default()
    };

    for reference in left.from().references() {
        let left_targets = left.get_mapping(&reference).unwrap_or_default();
        let right_targets = right.get_mapping(&reference).unwrap_or_default();

        if left_targets.is_empty() && right_targets.is_empty() {
            comparison.both_unmapped += 1;
        } else if left_targets.is_empty() {
            comparison.left_unmapped += 1;
        } else if right_targets.is_empty() {
            comparison.right_unmapped += 1;
        } else if left_targets == right_targets {
            if left_targets.len() == 1 {
                comparison.same_single_verse += 1;
            } else {
                comparison.same_order += 1;
            }
        } else if left_targets.len() == 1 && right_targets.len() == 1 {
            comparison.disjoint += 1;
        } else {
            let left_set: HashSet<&Reference> = left_targets.iter().collect();
            let right_set: HashSet<&Reference> = right_targets.iter().collect();
            if left_set == right_set {
                comparison.same_verses += 1;
            } else if right_set.is_subset(&left_set) {
                comparison.right_subset += 1;
            } else if left_set.is_subset(&right_set) {
                comparison.left_subset += 1;
            } else if left_set.is_disjoint(&right_set) {
                comparison.disjoint += 1;
            } else {
                comparison.intersecting += 1;
            }
        }
    }

    Ok(comparison)
}

fn print_mapping_comparison(comparison: &MappingComparison) {
    let rows = [
        ("Both unmapped", comparison.both_unmapped),
        ("Left unmapped", comparison.left_unmapped),
        ("Right unmapped", comparison.right_unmapped),
        ("Same single verse", comparison.same_single_verse),
        ("Same order", comparison.same_order),
        ("Same verses", comparison.same_verses),
        ("Left subset", comparison.left_subset),
        ("Right subset", comparison.right_subset),
        ("Intersecting", comparison.intersecting),
        ("Disjoint", comparison.disjoint),
    ];
    for (label, count) in rows {
        if count > 0 {
            println!("{}: {}", label, count);
        }
    }
}

fn print_scheme_score(score: &SchemeScore, observed: usize) {
    if !score.missing_chapters.is_empty() {
        println!(
            "{} (Missing chapters+verses: {}+{} [{}] [{}])",
            score.name,
            score.missing_chapters.len(),
            score.missing_verses.len(),
            score.missing_chapters.join(", "),
            score.missing_verses.join(", ")
        );
    } else if !score.missing_verses.is_empty() {
        println!(
            "{} (Missing verses: {} [{}])",
            score.name,
            score.missing_verses.len(),
            score.missing_verses.join(", ")
        );
    } else {
        println!(
            "{} (All verses covered, and {} more)",
            score.name,
            score.verse_count - observed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DetectReport, VerifyReport};
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn gen() -> BookId {
        BookId::from_osis("Gen").unwrap()
    }

    fn scheme(name: &str, chapters: Vec<u32>) -> Versification {
        Versification::from_verse_counts(name, None, &[], &[(gen(), chapters)]).unwrap()
    }

    fn seed_db(path: &Path) {
        let mut registry = VersificationRegistry::new();
        registry.add_versification(scheme("Alpha", vec![3, 2])).unwrap();
        registry.add_versification(scheme("Beta", vec![3, 2])).unwrap();
        registry.add_versification(scheme("Gamma", vec![3, 2])).unwrap();
        let a = Arc::clone(registry.find("Alpha").unwrap());
        let b = Arc::clone(registry.find("Beta").unwrap());
        let c = Arc::clone(registry.find("Gamma").unwrap());
        let ab: Vec<_> = a.references().map(|r| (r.clone(), vec![r])).collect();
        registry.add_mapping(VersificationMapping::build(&a, &b, &ab).unwrap());
        let bc: Vec<_> = b.references().map(|r| (r.clone(), vec![r])).collect();
        registry.add_mapping(VersificationMapping::build(&b, &c, &bc).unwrap());
        registry.save_to_file(path).unwrap();
    }

    fn cli_for(temp: &TempDir, command: Commands) -> Cli {
        Cli {
            db: temp.path().join("test.vdb"),
            log_dir: Some(temp.path().join("logs")),
            report: None,
            gzip_report: false,
            command,
        }
    }

    #[test]
    fn test_list_and_map_run() {
        let temp = TempDir::new().unwrap();
        let cli = cli_for(&temp, Commands::List { names: vec![] });
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        tool.run(&Commands::Map {
            mapping: "Alpha/Beta".to_string(),
            book: "Gen".to_string(),
            chapter: 1,
            verse: "2".to_string(),
        })
        .unwrap();

        let err = tool.run(&Commands::Map {
            mapping: "Alpha/Beta".to_string(),
            book: "NoSuchBook".to_string(),
            chapter: 1,
            verse: "1".to_string(),
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_join_stores_and_saves() {
        let temp = TempDir::new().unwrap();
        let cli = cli_for(
            &temp,
            Commands::Join {
                keys: vec!["Alpha/Beta".to_string(), "Beta/Gamma".to_string()],
            },
        );
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let reloaded = VersificationRegistry::from_file(&cli.db).unwrap();
        assert_eq!(reloaded.mappings().len(), 3);
        let joined = reloaded.mappings().last().unwrap();
        assert_eq!(joined.from().name(), "Alpha");
        assert_eq!(joined.to().name(), "Gamma");
    }

    #[test]
    fn test_remove_scheme_drops_mappings() {
        let temp = TempDir::new().unwrap();
        let cli = cli_for(
            &temp,
            Commands::Remove {
                names: vec!["Beta".to_string()],
            },
        );
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let reloaded = VersificationRegistry::from_file(&cli.db).unwrap();
        assert_eq!(reloaded.versifications().len(), 2);
        assert!(reloaded.mappings().is_empty());
    }

    #[test]
    fn test_rename_updates_database() {
        let temp = TempDir::new().unwrap();
        let cli = cli_for(
            &temp,
            Commands::Rename {
                name: "Alpha".to_string(),
                new_name: "Primary".to_string(),
            },
        );
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let reloaded = VersificationRegistry::from_file(&cli.db).unwrap();
        assert!(reloaded.find("Primary").is_ok());
        assert_eq!(reloaded.mappings()[0].from().name(), "Primary");
    }

    #[test]
    fn test_export_subset_is_standalone() {
        let temp = TempDir::new().unwrap();
        let out_file = temp.path().join("subset.vdb");
        let cli = cli_for(
            &temp,
            Commands::Export {
                out_file: out_file.clone(),
                names: vec!["Alpha/Beta".to_string()],
            },
        );
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let subset = VersificationRegistry::from_file(&out_file).unwrap();
        assert_eq!(subset.versifications().len(), 2);
        assert_eq!(subset.mappings().len(), 1);
    }

    #[test]
    fn test_detect_writes_report() {
        let temp = TempDir::new().unwrap();
        let refs_file = temp.path().join("observed.txt");
        fs::write(&refs_file, "Gen 1:1\nGen 1:2\n\nGen 2:1\n").unwrap();
        let mut cli = cli_for(
            &temp,
            Commands::Detect {
                refs_file: refs_file.clone(),
                limit: 10,
                limit_books: false,
            },
        );
        cli.report = Some(temp.path().join("out").join("detect.json"));
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let json = fs::read_to_string(cli.report.as_ref().unwrap()).unwrap();
        let report: DetectReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.observed_verses, 3);
        assert_eq!(report.best.name, "Alpha");
        assert!(report.best.covers_all());
    }

    #[test]
    fn test_verify_gzip_report() {
        let temp = TempDir::new().unwrap();
        let mut cli = cli_for(&temp, Commands::Verify);
        cli.report = Some(temp.path().join("verify.json"));
        cli.gzip_report = true;
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();
        tool.finalize().unwrap();

        let gz_path = temp.path().join("verify.json.gz");
        let mut decoder = GzDecoder::new(fs::File::open(gz_path).unwrap());
        let mut json = String::new();
        decoder.read_to_string(&mut json).unwrap();
        let report: VerifyReport = serde_json::from_str(&json).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_compare_schemes_report() {
        let temp = TempDir::new().unwrap();
        let mut cli = cli_for(
            &temp,
            Commands::Compare {
                left: "Alpha".to_string(),
                right: "Beta".to_string(),
            },
        );
        cli.report = Some(temp.path().join("compare.json"));
        seed_db(&cli.db);
        let mut tool = VersificationTool::new(&cli).unwrap();
        tool.run(&cli.command).unwrap();

        let json = fs::read_to_string(cli.report.as_ref().unwrap()).unwrap();
        let report: CompareReport = serde_json::from_str(&json).unwrap();
        let schemes = report.schemes.unwrap();
        assert_eq!(schemes.relation, SchemeRelation::SameOrder);
        assert!(report.mappings.is_none());
    }
}
