//! 콘텐츠 추출 모듈
//!
//! 수집 대상 파일에서 임베딩할 텍스트를 뽑습니다.
//! - 텍스트 파일: 직접 읽기
//! - JSON 파일: 모양별 렌더링 (카드 목록, 용어 대조표, 객체 목록)
//! - PDF 파일: pdf-extract로 텍스트 추출

pub mod json;
pub mod pdf;

use std::path::Path;

use crate::collector::FileKind;
use crate::knowledge::IngestError;

pub use json::{json_to_text, EntryShape, JsonShape};

/// 파일에서 텍스트 추출
///
/// 읽기 실패는 `Unreadable`, 추출 결과가 비어 있으면 `EmptyContent`.
pub async fn extract_file(path: &Path, kind: FileKind) -> Result<String, IngestError> {
    let text = match kind {
        FileKind::Text => read_utf8(path).await?,
        FileKind::Json => json_to_text(&read_utf8(path).await?),
        FileKind::Pdf => {
            // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
                .await
                .map_err(|e| unreadable(path, e))?
                .map_err(|e| unreadable(path, format!("{:#}", e)))?
        }
    };

    if text.trim().is_empty() {
        return Err(IngestError::EmptyContent(path.display().to_string()));
    }
    Ok(text)
}

/// 확장자로 종류를 정해서 추출
pub async fn extract_path(path: &Path) -> Result<String, IngestError> {
    let kind = FileKind::from_path(path)
        .ok_or_else(|| IngestError::UnsupportedFormat(path.display().to_string()))?;
    extract_file(path, kind).await
}

async fn read_utf8(path: &Path) -> Result<String, IngestError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| unreadable(path, e))
}

fn unreadable(path: &Path, reason: impl ToString) -> IngestError {
    IngestError::Unreadable {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
