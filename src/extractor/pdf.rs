//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트로 텍스트를 뽑고, 페이지 사이를 빈 줄로 잇습니다.
//! 규칙서 PDF는 페이지 끝에서 문단이 끊기는 경우가 많아서
//! 빈 줄이 청커의 첫 번째 분할 지점이 되도록 합니다.

use std::path::Path;

use anyhow::{Context, Result};

/// PDF에서 텍스트 추출 (텍스트 레이어가 없으면 빈 문자열)
pub fn extract_text_from_pdf(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(String::new());
    }

    let pages = split_pdf_pages(&text);
    tracing::debug!("Extracted {} pages from {:?}", pages.len(), path);
    Ok(pages.join("\n\n"))
}

/// 폼피드(`\x0c`) 기준으로 페이지 분리, 빈 페이지 제외
fn split_pdf_pages(text: &str) -> Vec<String> {
    text.split('\x0c')
        .map(|page| page.trim().to_string())
        .filter(|page| !page.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
