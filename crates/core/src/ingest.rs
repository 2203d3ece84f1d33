use crate::models::{ExtractionWarning, PdfSource};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct LoadedSources {
    pub sources: Vec<PdfSource>,
    pub unreadable: Vec<ExtractionWarning>,
}

/// Reads each path into a named source. Files that cannot be read are
/// reported alongside, so they surface the same way parse failures do.
pub fn load_pdf_sources(paths: &[PathBuf]) -> LoadedSources {
    let mut sources = Vec::new();
    let mut unreadable = Vec::new();

    for path in paths {
        let name = display_name(path);
        match fs::read(path) {
            Ok(bytes) => sources.push(PdfSource { name, bytes }),
            Err(error) => unreadable.push(ExtractionWarning {
                file_name: name,
                reason: error.to_string(),
            }),
        }
    }

    LoadedSources {
        sources,
        unreadable,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
