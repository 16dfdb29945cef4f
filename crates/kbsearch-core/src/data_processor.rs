use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::chunker::{chunk, ChunkingConfig};
use crate::config::IndexingSettings;
use crate::types::Chunk;
use crate::Result;

fn source_banner() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s+Source:\s*\S+\s*\n\n").expect("banner pattern is valid"))
}

/// Turns a directory of crawled Markdown pages into chunks tagged with their
/// section and public source URL.
pub struct DocumentProcessor {
    chunking_config: ChunkingConfig,
    source_base_url: String,
}

impl DocumentProcessor {
    pub fn new(chunking_config: ChunkingConfig, source_base_url: impl Into<String>) -> Self {
        let source_base_url = source_base_url.into().trim_end_matches('/').to_string();
        Self { chunking_config, source_base_url }
    }

    pub fn from_settings(settings: &IndexingSettings) -> Result<Self> {
        let chunking = ChunkingConfig::new(settings.chunk_size, settings.chunk_overlap)?;
        Ok(Self::new(chunking, settings.source_base_url.clone()))
    }

    pub fn process_directory(&self, docs_dir: &Path) -> Result<Vec<Chunk>> {
        let files = self.list_md_files(docs_dir);
        if files.is_empty() {
            tracing::warn!(dir = %docs_dir.display(), "no .md files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            let raw = self.read_file_content(file_path)?;
            let (section, source) = self.section_and_source(file_path, docs_dir);
            all_chunks.extend(self.process_document(&raw, &section, &source)?);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "documents chunked");
        Ok(all_chunks)
    }

    /// Chunks one page body, dropping a leading `# Source: <url>` banner.
    pub fn process_document(&self, raw: &str, section: &str, source: &str) -> Result<Vec<Chunk>> {
        let body = match source_banner().find(raw) {
            Some(banner) => &raw[banner.end()..],
            None => raw,
        };
        let chunks = chunk(body, self.chunking_config.target_size, self.chunking_config.overlap)?;
        Ok(chunks
            .into_iter()
            .map(|c| Chunk { section: section.to_string(), source: source.to_string(), ..c })
            .collect())
    }

    /// `section` is the relative parent directory (or the file stem at the top
    /// level); `source` is the public URL of the page.
    pub fn section_and_source(&self, file_path: &Path, docs_dir: &Path) -> (String, String) {
        let relative = file_path.strip_prefix(docs_dir).unwrap_or(file_path);
        let file_name = relative.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let parent = relative
            .parent()
            .map(|p| p.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect::<Vec<_>>().join("/"))
            .unwrap_or_default();
        let section = if parent.is_empty() {
            relative.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
        } else {
            parent
        };
        let source = if file_name == "index.md" {
            format!("{}/{}", self.source_base_url, section)
        } else {
            format!("{}/{}/{}", self.source_base_url, section, file_name)
        };
        (section, source)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_md_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut md_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("md"))
            .collect();
        md_files.sort();
        md_files
    }
}
