//! CLI 모듈
//!
//! dtcg-judge CLI 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::cards::CardCorpus;
use crate::collector::{CollectedFile, FileCollector, FileKind, FileStats};
use crate::config::JudgeConfig;
use crate::embedding::LazyEmbedder;
use crate::extractor::extract_file;
use crate::judge::{self, JudgeError, JudgeService};
use crate::knowledge::{
    DocType, DocumentMetadata, IngestError, IngestReport, LanceVectorStore, MatchOrigin,
    RetrievalEngine,
};
use crate::llm::create_generator;
use crate::query::QueryProcessor;
use crate::terminology::TerminologyTranslator;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "dtcg-judge")]
#[command(version, about = "DTCG 룰 판정 RAG (중일 용어 변환 + LanceDB 검색)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 텍스트, 파일, 또는 폴더를 지식베이스에 추가
    Ingest {
        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로 (.pdf .txt .md .json)
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 문서 타입 (컬렉션)
        #[arg(long = "doc-type", value_enum, default_value_t = DocType::Rule)]
        doc_type: DocType,

        /// 문서 제목 (기본값: 파일명)
        #[arg(long)]
        title: Option<String>,

        /// 태그 (쉼표 구분)
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// 출처
        #[arg(long)]
        source: Option<String>,

        /// 규칙서 버전
        #[arg(long = "doc-version")]
        doc_version: Option<String>,

        /// 시행일
        #[arg(long)]
        effective_date: Option<String>,

        /// 같은 doc_id의 기존 청크를 지우고 다시 수집
        #[arg(long)]
        replace: bool,
    },

    /// 판정 질문
    Query {
        /// 질문
        question: String,

        /// 검색할 문서 타입 (여러 번 지정 가능, 기본값: 전체)
        #[arg(short = 't', long = "doc-type", value_enum)]
        doc_types: Vec<DocType>,

        /// 의미 검색 결과 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 답변 생성 없이 검색 결과만 출력
        #[arg(long)]
        retrieve_only: bool,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 저장된 문서 목록
    List {
        /// 문서 타입 필터
        #[arg(long = "doc-type", value_enum)]
        doc_type: Option<DocType>,
    },

    /// 문서의 청크 보기
    Chunks {
        /// 문서 ID
        doc_id: String,
    },

    /// 문서 삭제
    Delete {
        /// 삭제할 문서 ID
        #[arg(short, long)]
        id: String,

        /// 문서 타입
        #[arg(long = "doc-type", value_enum)]
        doc_type: DocType,
    },

    /// 질문 전처리 결과 보기 (카드 번호, 수치 힌트, 용어 확장)
    Expand {
        /// 질문
        text: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = JudgeConfig::from_env().context("설정 읽기 실패")?;

    match cli.command {
        Commands::Ingest {
            text,
            file,
            dir,
            doc_type,
            title,
            tags,
            source,
            doc_version,
            effective_date,
            replace,
        } => {
            let template = DocumentMetadata {
                doc_type,
                title: title.unwrap_or_default(),
                version: doc_version,
                effective_date,
                source,
                tags,
            };
            cmd_ingest(&config, text, file, dir, template, replace).await
        }
        Commands::Query {
            question,
            doc_types,
            top_k,
            retrieve_only,
            json,
        } => cmd_query(&config, &question, &doc_types, top_k, retrieve_only, json).await,
        Commands::List { doc_type } => cmd_list(&config, doc_type).await,
        Commands::Chunks { doc_id } => cmd_chunks(&config, &doc_id).await,
        Commands::Delete { id, doc_type } => cmd_delete(&config, &id, doc_type).await,
        Commands::Expand { text } => cmd_expand(&config, &text),
        Commands::Status => cmd_status(&config).await,
    }
}

// ============================================================================
// Setup
// ============================================================================

/// 용어집 로드
fn load_translator(config: &JudgeConfig) -> Result<TerminologyTranslator> {
    let files = config.glossary_files()?;
    TerminologyTranslator::load(&files).context("용어집 로드 실패")
}

/// 검색 엔진 구성 (임베딩 모델은 첫 사용 시 초기화)
async fn open_engine(config: &JudgeConfig) -> Result<Arc<RetrievalEngine>> {
    let store = LanceVectorStore::open(&config.lance_path())
        .await
        .context("LanceDB 열기 실패")?;
    let translator = load_translator(config)?;
    let cards = CardCorpus::load(&config.cards_path).context("카드 코퍼스 로드 실패")?;

    Ok(Arc::new(RetrievalEngine::new(
        Arc::new(store),
        Arc::new(LazyEmbedder::from_config(config)),
        Arc::new(translator),
        Arc::new(cards),
    )))
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(
    config: &JudgeConfig,
    text: Option<String>,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    template: DocumentMetadata,
    replace: bool,
) -> Result<()> {
    let engine = open_engine(config).await?;

    if let Some(text) = text {
        let mut metadata = template;
        if metadata.title.is_empty() {
            metadata.title = "direct-input".to_string();
        }

        println!("[*] 청킹 및 임베딩 생성 중...");
        let report = ingest(&engine, &text, metadata, replace)
            .await
            .context("문서 추가 실패")?;
        print_report(&report);
        return Ok(());
    }

    let collector = FileCollector::with_defaults();
    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        collector.collect_directory(dir_path)?
    } else {
        bail!("--text, --file, --dir 중 하나를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let stats = FileStats::from_files(&files);
    println!(
        "[*] 수집 대상: {} 파일 ({} 컬렉션)",
        stats.total_files,
        template.doc_type.collection_name()
    );
    println!(
        "    텍스트: {}, JSON: {}, PDF: {}",
        stats.text_files, stats.json_files, stats.pdf_files
    );
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    // 단일 파일일 때만 --title 적용
    let single = files.len() == 1;
    let mut success_count = 0;
    let mut error_count = 0;
    let mut chunk_total = 0;

    for (i, collected) in files.iter().enumerate() {
        let file_name = collected
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        print!(
            "[{}/{}] [{}] {}... ",
            i + 1,
            files.len(),
            kind_label(collected.kind),
            file_name
        );

        let mut metadata = template.clone();
        if !(single && !metadata.title.is_empty()) {
            metadata.title = collected.title();
        }
        if metadata.source.is_none() {
            metadata.source = Some(collected.path.display().to_string());
        }

        match ingest_file(&engine, collected, metadata, replace).await {
            Ok(report) => {
                println!("완료 ({} 청크, {})", report.chunk_count, report.doc_id);
                success_count += 1;
                chunk_total += report.chunk_count;
            }
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
            }
        }
    }

    println!();
    println!(
        "[OK] 완료: 성공 {}, 실패 {}, 청크 {}",
        success_count, error_count, chunk_total
    );

    Ok(())
}

async fn ingest(
    engine: &RetrievalEngine,
    content: &str,
    metadata: DocumentMetadata,
    replace: bool,
) -> Result<IngestReport, IngestError> {
    if replace {
        engine.upsert_document(content, metadata).await
    } else {
        engine.add_document(content, metadata).await
    }
}

async fn ingest_file(
    engine: &RetrievalEngine,
    file: &CollectedFile,
    metadata: DocumentMetadata,
    replace: bool,
) -> Result<IngestReport, IngestError> {
    let content = extract_file(&file.path, file.kind).await?;
    ingest(engine, &content, metadata, replace).await
}

fn print_report(report: &IngestReport) {
    println!("[OK] 문서가 추가되었습니다 (ID: {})", report.doc_id);
    println!("     제목: {}", report.title);
    println!(
        "     컬렉션: {} ({} 청크)",
        report.doc_type.collection_name(),
        report.chunk_count
    );
}

/// 판정 질문 명령어 (query)
async fn cmd_query(
    config: &JudgeConfig,
    question: &str,
    doc_types: &[DocType],
    top_k: Option<usize>,
    retrieve_only: bool,
    json: bool,
) -> Result<()> {
    let engine = open_engine(config).await?;
    let top_k = top_k.unwrap_or(config.top_k);

    if retrieve_only {
        let retrieval = judge::retrieve(&engine, question, doc_types, top_k)
            .await
            .context("검색 실패")?;

        if json {
            println!("{}", serde_json::to_string_pretty(&retrieval.docs)?);
            return Ok(());
        }

        if retrieval.docs.is_empty() {
            println!("[!] 검색 결과가 없습니다.");
            return Ok(());
        }

        println!("[OK] 검색 결과 ({} 건):\n", retrieval.docs.len());
        for (i, doc) in retrieval.docs.iter().enumerate() {
            let origin = match doc.origin {
                MatchOrigin::Exact => "EXACT",
                MatchOrigin::Semantic => "SEM",
            };
            println!(
                "{}. [{}] [{}] [거리: {:.4}] {}",
                i + 1,
                origin,
                doc.doc_type.label(),
                doc.score,
                doc.title
            );
            println!("   내용: {}", truncate_text(&doc.content, 200));
            println!();
        }
        return Ok(());
    }

    let generator = create_generator(config)?;
    let service = JudgeService::new(engine, generator, top_k);

    println!("[*] 판정 중: \"{}\"", question);
    let response = match service.query(question, doc_types, Some(top_k)).await {
        Ok(response) => response,
        Err(JudgeError::Generation(e)) => {
            println!("[!] {}", e.hint());
            return Err(e).context("답변 생성 실패");
        }
        Err(e) => return Err(e).context("검색 실패"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!();
    println!("{}", response.answer);

    if !response.cards.is_empty() {
        println!("\n[카드]");
        for card in &response.cards {
            println!("  {} {}", card.card_no, card.title);
        }
    }

    if !response.sources.is_empty() {
        println!("\n[출처]");
        for (i, source) in response.sources.iter().enumerate() {
            println!("  {}. {} ({})", i + 1, source.title, source.doc_type.label());
            println!("     {}", truncate_text(&source.excerpt, 120));
        }
    }

    Ok(())
}

/// 목록 명령어 (list)
async fn cmd_list(config: &JudgeConfig, doc_type: Option<DocType>) -> Result<()> {
    let engine = open_engine(config).await?;
    let docs = engine
        .list_documents(doc_type)
        .await
        .context("문서 목록 조회 실패")?;

    if docs.is_empty() {
        println!("[!] 저장된 문서가 없습니다.");
        return Ok(());
    }

    println!("[OK] 저장된 문서 ({} 건):\n", docs.len());

    for doc in docs {
        let tags = if doc.tags.is_empty() {
            "-".to_string()
        } else {
            doc.tags.join(",")
        };

        println!(
            "  {} [{}] {}",
            doc.doc_id,
            doc.doc_type.label(),
            truncate_text(&doc.title, 40)
        );
        println!(
            "        {} | {} 청크 | 태그: {}",
            doc.created_at.format("%Y-%m-%d %H:%M"),
            doc.chunk_count,
            tags
        );
        println!();
    }

    Ok(())
}

/// 청크 명령어 (chunks)
async fn cmd_chunks(config: &JudgeConfig, doc_id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let chunks = engine
        .get_document_chunks(doc_id)
        .await
        .context("청크 조회 실패")?;

    if chunks.is_empty() {
        println!("[!] 문서 {}의 청크가 없습니다.", doc_id);
        return Ok(());
    }

    println!(
        "[OK] {} ({} 청크)\n",
        chunks[0].metadata.title,
        chunks.len()
    );
    for chunk in &chunks {
        println!(
            "--- #{} ({}자) ---",
            chunk.metadata.chunk_index,
            chunk.text.chars().count()
        );
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

/// 삭제 명령어 (delete)
async fn cmd_delete(config: &JudgeConfig, doc_id: &str, doc_type: DocType) -> Result<()> {
    let engine = open_engine(config).await?;

    if engine.delete_document(doc_id, doc_type).await {
        println!("[OK] 문서 {} 삭제됨 ({})", doc_id, doc_type.collection_name());
    } else {
        println!(
            "[!] {}에서 삭제할 문서를 찾을 수 없습니다: {}",
            doc_type.collection_name(),
            doc_id
        );
    }

    Ok(())
}

/// 전처리 확인 명령어 (expand)
fn cmd_expand(config: &JudgeConfig, text: &str) -> Result<()> {
    let translator = load_translator(config)?;
    let entity = QueryProcessor::new().analyze(text);

    println!("[*] 카드 번호: {:?}", entity.card_numbers);
    println!("[*] 메모리: {:?}", entity.memory_values());
    println!("[*] 레벨: {:?}", entity.levels());

    let (_, substitutions) = translator.translate_query(text);
    for sub in &substitutions {
        println!("    {} → {}", sub.from, sub.to);
    }
    println!("[*] 확장 질문: {}", translator.expand_query(text));

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &JudgeConfig) -> Result<()> {
    println!("dtcg-judge v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 임베딩: {:?}", config.embedding);
    println!("[*] LLM: {:?}", config.llm);

    if config.gemini_api_key.is_some() {
        println!("[OK] Gemini API 키: 설정됨");
    } else {
        println!("[!] Gemini API 키: 미설정");
    }

    match load_translator(config) {
        Ok(translator) => println!(
            "[OK] 용어집: 정방향 {} / 역방향 {}",
            translator.forward_len(),
            translator.backward_len()
        ),
        Err(e) => println!("[!] 용어집 로드 실패: {:#}", e),
    }

    let engine = match open_engine(config).await {
        Ok(engine) => engine,
        Err(e) => {
            println!("[!] 지식베이스 열기 실패: {:#}", e);
            return Ok(());
        }
    };
    println!("[OK] 카드 코퍼스: {} 장", engine.cards().len());

    match engine.stats().await {
        Ok(stats) => {
            for stat in stats {
                if stat.exists {
                    println!(
                        "[OK] {}: {} 청크",
                        stat.doc_type.collection_name(),
                        stat.chunk_count
                    );
                } else {
                    println!("[ ] {}: 없음", stat.doc_type.collection_name());
                }
            }
        }
        Err(e) => println!("[!] 컬렉션 통계 조회 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn kind_label(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Text => "TXT",
        FileKind::Json => "JSON",
        FileKind::Pdf => "PDF",
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest_options() {
        let cli = Cli::parse_from([
            "dtcg-judge",
            "ingest",
            "--file",
            "rules.pdf",
            "--doc-type",
            "ruling",
            "--tags",
            "进化,安防",
            "--replace",
        ]);
        match cli.command {
            Commands::Ingest {
                doc_type,
                tags,
                replace,
                file,
                ..
            } => {
                assert_eq!(doc_type, DocType::Ruling);
                assert_eq!(tags, vec!["进化", "安防"]);
                assert!(replace);
                assert_eq!(file, Some(PathBuf::from("rules.pdf")));
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_parse_query_doc_types() {
        let cli = Cli::parse_from([
            "dtcg-judge",
            "query",
            "BT1-010的效果",
            "-t",
            "rule",
            "-t",
            "card",
            "-k",
            "3",
        ]);
        match cli.command {
            Commands::Query {
                question,
                doc_types,
                top_k,
                ..
            } => {
                assert_eq!(question, "BT1-010的效果");
                assert_eq!(doc_types, vec![DocType::Rule, DocType::Card]);
                assert_eq!(top_k, Some(3));
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("安防检查\n处理", 20), "安防检查 处理");
        assert_eq!(truncate_text("安防检查处理", 4), "安防检查...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
