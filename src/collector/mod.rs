//! 파일 수집 모듈
//!
//! 규칙서/裁定/卡牌 파일이나 폴더를 모아 지식베이스 재구축에 넘깁니다.
//! .gitignore 패턴을 존중하고 `.pdf .txt .md .json`만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// 카드 스크래퍼 출력 파일명 접두사 (제목에서 제거)
const CARD_FILE_PREFIX: &str = "digimon_cards_";

// ============================================================================
// File Kinds
// ============================================================================

/// 지원하는 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// 일반 텍스트 (txt, md)
    Text,
    /// JSON (용어표, 카드 목록 등)
    Json,
    /// PDF
    Pdf,
}

impl FileKind {
    /// 확장자로 종류 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "txt" => Some(FileKind::Text),
            "json" => Some(FileKind::Json),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub path: PathBuf,
    pub kind: FileKind,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 지원하지 않는 확장자나 파일이 아니면 `None`
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let kind = match FileKind::from_path(&path) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;
        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            kind,
            size: metadata.len(),
        }))
    }

    /// 문서 제목 (파일명에서 확장자와 카드 파일 접두사 제거)
    pub fn title(&self) -> String {
        document_title(&self.path)
    }
}

/// 경로 → 문서 제목
pub fn document_title(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.strip_prefix(CARD_FILE_PREFIX).unwrap_or(stem).to_string()
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB (규칙서 PDF)
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 단일 파일 수집 (지원하지 않는 형식이면 `None`)
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        if !path.exists() {
            anyhow::bail!("File not found: {:?}", path);
        }
        if !path.is_file() {
            anyhow::bail!("Not a file: {:?}", path);
        }

        Ok(CollectedFile::from_path(path.to_path_buf())?.filter(|f| self.should_include(f)))
    }

    /// 폴더 재귀 수집 (경로 순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        if !path.exists() {
            anyhow::bail!("Directory not found: {:?}", path);
        }
        if !path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", path);
        }

        let walker = WalkBuilder::new(path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} files from {:?}", files.len(), path);
        Ok(files)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }
        true
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileStats {
    pub total_files: usize,
    pub text_files: usize,
    pub json_files: usize,
    pub pdf_files: usize,
    pub total_size: u64,
}

impl FileStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();
        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;
            match file.kind {
                FileKind::Text => stats.text_files += 1,
                FileKind::Json => stats.json_files += 1,
                FileKind::Pdf => stats.pdf_files += 1,
            }
        }
        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
