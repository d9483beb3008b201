//! Resolves ingress paths into typed ingest sources
//!
//! Paths are tested against a fixed set of file-name patterns. A path that
//! matches nothing is silently excluded; unreadable workbooks still yield an
//! error source so the failure surfaces as a structural issue.

use super::shape::ContentShape;
use super::source::{source_table_name, stem_table_name, IngestSource, SheetKind};
use crate::domain::Result;
use calamine::{open_workbook_auto, Reader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Shape of a CSV file from its name, if it is one we ingest
///
/// Matching is case-insensitive and checked in a fixed precedence so a file
/// such as `screening-A_admin.csv` resolves to demographics rather than
/// screening.
pub fn csv_shape(path: &Path) -> Option<ContentShape> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if !name.ends_with(".csv") {
        return None;
    }
    if name.contains("qe_admin_data") {
        Some(ContentShape::QeAdminData)
    } else if name.contains("demographic_data") || name.ends_with("_admin.csv") {
        Some(ContentShape::AdminDemographic)
    } else if name.contains("screening") {
        Some(ContentShape::Screening)
    } else {
        None
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_lowercase();
            ext == "xlsx" || ext == "xls"
        })
        .unwrap_or(false)
}

/// One source per worksheet, or a single error source if the workbook can't be read
pub fn workbook_sources(path: &Path) -> Vec<IngestSource> {
    let uri = path.to_string_lossy().into_owned();
    let stem = stem_table_name(path);

    let sheet_names = match open_workbook_auto(path) {
        Ok(workbook) => workbook.sheet_names(),
        Err(e) => {
            tracing::warn!(fs_path = %uri, error = %e, "Unable to read workbook");
            return vec![IngestSource::Error {
                uri,
                table_name: stem,
                message: format!("Unable to read Excel workbook: {e}"),
            }];
        }
    };

    sheet_names
        .into_iter()
        .map(|sheet| {
            let table_name = source_table_name(&format!("{stem}_{sheet}"));
            match SheetKind::from_sheet_name(&sheet) {
                Some(kind) => IngestSource::ExcelSheet {
                    uri: uri.clone(),
                    sheet,
                    table_name,
                    kind,
                },
                None => IngestSource::ExcelSheetTodo {
                    uri: uri.clone(),
                    sheet,
                    table_name,
                },
            }
        })
        .collect()
}

/// Sources for a single path; empty when the path matches no pattern
pub fn resolve_path(path: &Path) -> Vec<IngestSource> {
    if let Some(shape) = csv_shape(path) {
        vec![IngestSource::csv(path, shape)]
    } else if is_workbook(path) {
        workbook_sources(path)
    } else {
        tracing::debug!(fs_path = %path.display(), "No ingest pattern matched");
        Vec::new()
    }
}

/// Supplies the potential ingest sources of a session
pub trait IngestSourcesSupplier: Send + Sync {
    fn sources(&self) -> Result<Vec<IngestSource>>;

    /// Roots walked to discover sources, recorded in diagnostics
    fn walk_root_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Recursively walks root directories
#[derive(Debug, Clone)]
pub struct WalkFsSources {
    pub roots: Vec<PathBuf>,
}

impl WalkFsSources {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl IngestSourcesSupplier for WalkFsSources {
    fn sources(&self) -> Result<Vec<IngestSource>> {
        let mut sources = Vec::new();
        for root in &self.roots {
            let mut files: Vec<PathBuf> = WalkDir::new(root)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unreadable path during walk");
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect();
            files.sort();
            for file in files {
                sources.extend(resolve_path(&file));
            }
        }
        Ok(sources)
    }

    fn walk_root_paths(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

/// Already-identified paths from the watcher or grouping engine
#[derive(Debug, Clone)]
pub struct WatchFsSources {
    pub paths: Vec<PathBuf>,
}

impl WatchFsSources {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl IngestSourcesSupplier for WatchFsSources {
    fn sources(&self) -> Result<Vec<IngestSource>> {
        Ok(self.paths.iter().flat_map(|p| resolve_path(p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_csv_precedence() {
        assert_eq!(
            csv_shape(Path::new("/x/screening-A_admin.csv")),
            Some(ContentShape::AdminDemographic)
        );
        assert_eq!(
            csv_shape(Path::new("/x/SCREENING-A_questions.CSV")),
            Some(ContentShape::Screening)
        );
        assert_eq!(
            csv_shape(Path::new("/x/qe_admin_data_2024.csv")),
            Some(ContentShape::QeAdminData)
        );
        assert_eq!(
            csv_shape(Path::new("/x/demographic_data.csv")),
            Some(ContentShape::AdminDemographic)
        );
        assert_eq!(csv_shape(Path::new("/x/notes.csv")), None);
        assert_eq!(csv_shape(Path::new("/x/screening.txt")), None);
    }

    #[test]
    fn test_unreadable_workbook_becomes_error_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partner.xlsx");
        fs::write(&path, b"not a workbook").unwrap();

        let sources = resolve_path(&path);
        assert_eq!(sources.len(), 1);
        assert!(matches!(sources[0], IngestSource::Error { .. }));
        assert_eq!(sources[0].table_name(), "partner");
    }

    #[test]
    fn test_walk_skips_unmatched_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("readme.md"), "x").unwrap();
        fs::write(dir.path().join("nested/screening_1.csv"), "x").unwrap();
        fs::write(dir.path().join("qe_admin_data.csv"), "x").unwrap();

        let supplier = WalkFsSources::new(vec![dir.path().to_path_buf()]);
        let sources = supplier.sources().unwrap();
        let tables: Vec<_> = sources.iter().map(|s| s.table_name().to_string()).collect();
        assert_eq!(tables, vec!["screening_1", "src_qe_admin_data"]);
        assert_eq!(supplier.walk_root_paths(), vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_watch_sources_resolve_given_paths() {
        let supplier = WatchFsSources::new(vec![
            PathBuf::from("/in/screening-B_admin.csv"),
            PathBuf::from("/in/unrelated.bin"),
        ]);
        let sources = supplier.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].shape(), Some(ContentShape::AdminDemographic));
    }
}
