use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub context: Option<serde_json::Value>,
}

/// Summary of one tool run, assembled when the run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub run_id: String,
    pub timestamp: String,
    pub summary: ReportSummary,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub errors: usize,
    pub warnings: usize,
    pub registry: RegistryStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryStats {
    pub versifications: usize,
    pub mappings: usize,
    pub verses: usize,
}

/// JSONL diagnostics for one tool run. Cheap to clone; all clones
/// share the same counters and sink.
#[derive(Clone)]
pub struct DiagnosticLogger {
    log_dir: PathBuf,
    log_file: Arc<Mutex<Option<BufWriter<File>>>>,
    run_id: String,
    entries: Arc<Mutex<Vec<LogEntry>>>,
    error_count: Arc<Mutex<usize>>,
    warning_count: Arc<Mutex<usize>>,
}

impl DiagnosticLogger {
    pub fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {:?}", log_dir))?;

        let run_id = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let log_file_path = log_dir.join(format!("run-{}.jsonl", run_id));

        let log_file = Some(BufWriter::new(
            File::create(&log_file_path)
                .with_context(|| format!("Failed to create log file: {:?}", log_file_path))?,
        ));

        Ok(DiagnosticLogger {
            log_dir: log_dir.to_path_buf(),
            log_file: Arc::new(Mutex::new(log_file)),
            run_id,
            entries: Arc::new(Mutex::new(Vec::new())),
            error_count: Arc::new(Mutex::new(0)),
            warning_count: Arc::new(Mutex::new(0)),
        })
    }

    pub fn log(&self, level: LogLevel, message: String, context: Option<serde_json::Value>) {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            level: level.clone(),
            message: message.clone(),
            context,
        };

        match level {
            LogLevel::Error => {
                *self.error_count.lock().unwrap() += 1;
                eprintln!("error: {}", message);
            }
            LogLevel::Warning => {
                *self.warning_count.lock().unwrap() += 1;
                eprintln!("warning: {}", message);
            }
            LogLevel::Info => {}
        }

        self.entries.lock().unwrap().push(entry.clone());

        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                if let Ok(json) = serde_json::to_string(&entry) {
                    let _ = writeln!(file, "{}", json);
                }
            }
        }
    }

    pub fn info(&self, message: String) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warning(&self, message: String, context: Option<serde_json::Value>) {
        self.log(LogLevel::Warning, message, context);
    }

    pub fn error(&self, message: String, context: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, context);
    }

    pub fn generate_report(&self, stats: RegistryStats) -> Result<DiagnosticReport> {
        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                file.flush()
                    .context("Failed to flush log file before generating report")?;
            }
        }

        Ok(DiagnosticReport {
            run_id: self.run_id.clone(),
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            summary: ReportSummary {
                errors: *self.error_count.lock().unwrap(),
                warnings: *self.warning_count.lock().unwrap(),
                registry: stats,
            },
            entries: self.entries.lock().unwrap().clone(),
        })
    }

    /// Keeps the newest `max_runs` JSONL files in the log directory.
    pub fn rotate_logs(&self, max_runs: usize) -> Result<()> {
        let mut run_files: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();

        for entry in WalkDir::new(&self.log_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Some(file_name) = entry.file_name().to_str() {
                if file_name.starts_with("run-") && file_name.ends_with(".jsonl") {
                    if let Ok(metadata) = entry.metadata() {
                        if let Ok(modified) = metadata.modified() {
                            let datetime: DateTime<Utc> = modified.into();
                            run_files.push((entry.path().to_path_buf(), datetime));
                        }
                    }
                }
            }
        }

        if run_files.len() > max_runs {
            run_files.sort_by(|a, b| a.1.cmp(&b.1));

            let to_delete = run_files.len() - max_runs;
            for (path, _) in run_files.iter().take(to_delete) {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to delete old log file: {:?}", path))?;
            }
        }

        Ok(())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Drop for DiagnosticLogger {
    fn drop(&mut self) {
        if let Ok(mut file_opt) = self.log_file.lock() {
            if let Some(ref mut file) = *file_opt {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_logger_creation() {
        let temp_dir = TempDir::new().unwrap();
        let logger = DiagnosticLogger::new(temp_dir.path()).unwrap();
        assert!(!logger.run_id().is_empty());
    }

    #[test]
    fn test_logging_levels() {
        let temp_dir = TempDir::new().unwrap();
        let logger = DiagnosticLogger::new(temp_dir.path()).unwrap();

        logger.info("registry loaded".to_string());
        logger.warning("alias shadows a name".to_string(), None);
        logger.error("mapping endpoint missing".to_string(), None);

        assert_eq!(*logger.error_count.lock().unwrap(), 1);
        assert_eq!(*logger.warning_count.lock().unwrap(), 1);
        assert_eq!(logger.entries.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_log_rotation() {
        let temp_dir = TempDir::new().unwrap();
        let logger = DiagnosticLogger::new(temp_dir.path()).unwrap();

        for i in 0..15 {
            let log_file = temp_dir.path().join(format!("run-{}.jsonl", i));
            fs::File::create(&log_file).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        logger.rotate_logs(10).unwrap();

        let remaining_logs: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().unwrap().starts_with("run-"))
            .collect();

        assert!(remaining_logs.len() <= 10);
    }

    #[test]
    fn test_generate_report() {
        let temp_dir = TempDir::new().unwrap();
        let logger = DiagnosticLogger::new(temp_dir.path()).unwrap();

        logger.info("loaded db".to_string());
        logger.warning("no mappings registered".to_string(), None);
        logger.error("closure ambiguous".to_string(), None);

        let stats = RegistryStats {
            versifications: 4,
            mappings: 3,
            verses: 31102,
        };

        let report = logger.generate_report(stats).unwrap();

        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.registry.versifications, 4);
        assert_eq!(report.entries.len(), 3);
    }
}
