use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::types::Document;

/// Reads extracted `.txt` files from a directory tree into [`Document`]s.
#[derive(Debug, Default)]
pub struct DocumentLoader {
    limit: Option<usize>,
}

impl DocumentLoader {
    pub fn new() -> Self { Self::default() }

    /// Only load the first `limit` files (in sorted path order).
    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn load_dir(&self, data_dir: &Path) -> Result<Vec<Document>> {
        let mut files = list_txt_files(data_dir);
        if files.is_empty() {
            info!("No .txt files found under {}", data_dir.display());
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit {
                files.truncate(limit);
                info!("Limited to first {} files", limit);
            }
        }
        let mut docs = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            let text = read_file_content(file_path)?;
            docs.push(Document { id: doc_id_for(file_path), text });
        }
        info!("Loaded {} documents from {}", docs.len(), data_dir.display());
        Ok(docs)
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn doc_id_for(file_path: &Path) -> String {
    file_path
        .file_stem()
        .map_or_else(|| file_path.to_string_lossy().to_string(), |s| s.to_string_lossy().to_string())
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}
