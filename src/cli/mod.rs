//! CLI 모듈
//!
//! book-reader CLI 명령어 정의 및 구현

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::{normalize_ollama_host, AppConfig};
use crate::embedding::OllamaEmbedding;
use crate::extractor::{extract_page, extract_upload};
use crate::generation::OllamaGenerator;
use crate::knowledge::{ChunkConfig, RecursiveChunker};
use crate::qa::QaEngine;
use crate::upload::UploadedDocument;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "book-reader")]
#[command(version, about = "PDF 북 리더 - 텍스트 추출과 로컬 RAG 질의응답", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 모든 명령어에 공통인 설정 덮어쓰기
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Ollama 주소 (기본: OLLAMA_HOST 또는 http://localhost:11434)
    #[arg(long, global = true)]
    pub ollama_url: Option<String>,

    /// 임베딩 모델
    #[arg(long, global = true)]
    pub embed_model: Option<String>,

    /// 답변 생성 모델
    #[arg(long, global = true)]
    pub llm_model: Option<String>,

    /// 검색할 청크 수
    #[arg(long, global = true)]
    pub top_k: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 웹 UI 서버 실행
    Serve {
        /// 바인드 주소
        #[arg(long)]
        host: Option<String>,

        /// 포트
        #[arg(short, long)]
        port: Option<u16>,

        /// 질의응답 비활성화 (뷰어/추출만)
        #[arg(long)]
        no_qa: bool,
    },

    /// PDF 텍스트 추출
    Extract {
        /// PDF 파일 경로
        file: PathBuf,

        /// 한 페이지만 추출 (1부터)
        #[arg(short, long)]
        page: Option<usize>,

        /// 결과를 파일로 저장
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// PDF에 질문하기
    Ask {
        /// PDF 파일 경로
        file: PathBuf,

        /// 질문
        question: String,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.global)?;

    match cli.command {
        Commands::Serve { host, port, no_qa } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if no_qa {
                config.qa.enabled = false;
            }
            cmd_serve(config).await
        }
        Commands::Extract { file, page, output } => cmd_extract(&file, page, output).await,
        Commands::Ask { file, question } => cmd_ask(config, &file, &question).await,
        Commands::Status => cmd_status(&config).await,
    }
}

/// 기본값 → 환경변수 → CLI 플래그
fn load_config(args: &GlobalArgs) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("설정 로드 실패")?;

    if let Some(ref url) = args.ollama_url {
        config.ollama.base_url = normalize_ollama_host(url).context("잘못된 --ollama-url")?;
    }
    if let Some(ref model) = args.embed_model {
        config.ollama.embed_model = model.clone();
    }
    if let Some(ref model) = args.llm_model {
        config.ollama.generate_model = model.clone();
    }
    if let Some(top_k) = args.top_k {
        config.qa.top_k = top_k;
    }

    config.validate().context("설정 검증 실패")?;
    Ok(config)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 서버 명령어 (serve)
async fn cmd_serve(config: AppConfig) -> Result<()> {
    println!("book-reader v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "[*] http://{}:{} 에서 대기 중 (Ctrl+C로 종료)",
        config.server.host, config.server.port
    );
    if !config.qa.enabled {
        println!("[*] 질의응답 비활성화됨");
    }

    crate::server::serve(config).await.context("서버 실행 실패")
}

/// 추출 명령어 (extract)
///
/// 한 페이지 또는 페이지 구분자가 포함된 전체 텍스트를 출력합니다.
async fn cmd_extract(file: &Path, page: Option<usize>, output: Option<PathBuf>) -> Result<()> {
    let upload = UploadedDocument::from_path(file)
        .with_context(|| format!("파일 읽기 실패: {}", file.display()))?;

    println!("[*] 추출 중: {} ({})", upload.filename, format_bytes(upload.size() as u64));

    let text = match page {
        Some(page) => {
            let (page_text, num_pages) = extract_page(&upload, page).context("페이지 추출 실패")?;
            println!("[OK] 페이지 {}/{}", page_text.number, num_pages);
            if let Some(warning) = page_text.warning() {
                println!("[!] {}", warning);
            }
            page_text.text
        }
        None => {
            let doc = extract_upload(&upload).await.context("텍스트 추출 실패")?;
            println!(
                "[OK] {} 페이지 (텍스트 있음: {})",
                doc.page_count(),
                doc.pages_with_text()
            );
            if !doc.has_text() {
                println!("[!] 추출된 텍스트가 없습니다. 스캔 문서라면 OCR 도구를 먼저 사용하세요.");
            }
            doc.full_text()
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &text)
                .with_context(|| format!("파일 저장 실패: {}", path.display()))?;
            println!("[OK] 저장됨: {} ({} chars)", path.display(), text.chars().count());
        }
        None => {
            println!();
            println!("{}", text);
        }
    }

    Ok(())
}

/// 질문 명령어 (ask)
///
/// 웹 UI와 같은 파이프라인으로 한 번 질의응답합니다.
async fn cmd_ask(config: AppConfig, file: &Path, question: &str) -> Result<()> {
    let upload = UploadedDocument::from_path(file)
        .with_context(|| format!("파일 읽기 실패: {}", file.display()))?;

    println!("[*] 추출 중: {}", upload.filename);
    let doc = extract_upload(&upload).await.context("텍스트 추출 실패")?;

    println!(
        "[*] 인덱싱 중: {} 페이지 (임베딩 모델: {})",
        doc.page_count(),
        config.ollama.embed_model
    );

    let chunker = RecursiveChunker::new(ChunkConfig::from(&config.chunking))?;
    let embedder = Arc::new(OllamaEmbedding::new(&config.ollama)?);
    let llm = Arc::new(OllamaGenerator::new(&config.ollama)?);

    let engine = QaEngine::build(&doc.plain_text(), &chunker, embedder, llm, config.qa.clone())
        .await
        .context("인덱스 구축 실패")?;

    println!("[OK] {} 청크 인덱싱 완료", engine.chunk_count());
    println!("[*] 답변 생성 중 ({})...", config.ollama.generate_model);

    let answer = engine.ask(question).await.context("답변 생성 실패")?;

    println!("\n[OK] 답변:\n");
    println!("{}", answer.answer);
    println!("\n출처 ({} 건):\n", answer.sources.len());

    for source in &answer.sources {
        println!(
            "{}. [점수: {:.4}] 청크 #{}",
            source.rank, source.score, source.chunk_index
        );
        println!("   내용: {}", truncate_text(&source.text, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
///
/// 설정과 Ollama 연결 상태를 확인합니다.
async fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("book-reader v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] Ollama: {}", config.ollama.base_url);
    println!(
        "[*] 청킹: {}자 / 오버랩 {}자, top-k {}",
        config.chunking.chunk_size, config.chunking.chunk_overlap, config.qa.top_k
    );

    let generator = OllamaGenerator::new(&config.ollama)?;
    let models = match generator.list_models().await {
        Ok(models) => {
            println!("[OK] Ollama 연결됨 (모델 {} 개)", models.len());
            models
        }
        Err(e) => {
            println!("[!] Ollama 연결 실패: {}", e);
            println!("    실행: ollama serve");
            return Ok(());
        }
    };

    for (role, wanted) in [
        ("임베딩", &config.ollama.embed_model),
        ("생성", &config.ollama.generate_model),
    ] {
        match models.iter().find(|m| m.matches(wanted)) {
            Some(model) => println!(
                "[OK] {} 모델: {} ({})",
                role,
                model.name,
                format_bytes(model.size)
            ),
            None => {
                println!("[!] {} 모델 없음: {}", role, wanted);
                println!("    설치: ollama pull {}", wanted);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전, 줄바꿈은 공백으로)
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
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
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
