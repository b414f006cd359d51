//! 통합 테스트 공용 도구
//!
//! - lopdf로 테스트 시점에 PDF 생성 (텍스트 페이지 / 이미지 전용 페이지)
//! - 호출 횟수를 기록하는 임베딩/LLM 목(mock)

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::encryption::{decrypt_object, get_encryption_key};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use parking_lot::Mutex;

use book_reader::{EmbeddingProvider, LanguageModel, Result};

// ============================================================================
// PDF Fixtures
// ============================================================================

/// 페이지 하나: `Some(lines)`는 텍스트, `None`은 이미지 전용(텍스트 없음)
pub type PageSpec<'a> = Option<&'a [&'a str]>;

/// 주어진 페이지들로 PDF 바이트 생성
pub fn build_pdf(pages: &[PageSpec<'_>]) -> Vec<u8> {
    save(&mut build_document(pages))
}

fn build_document(pages: &[PageSpec<'_>]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let operations = match page {
            Some(lines) => text_operations(lines),
            None => image_operations(),
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

/// RC4 40비트(V1/R2) 표준 보안 핸들러로 암호화된 PDF
///
/// `user_password`가 빈 문자열이면 소유자 암호만 걸린 문서(인쇄 제한 등)입니다.
pub fn build_encrypted_pdf(pages: &[PageSpec<'_>], user_password: &str) -> Vec<u8> {
    let mut doc = build_document(pages);
    let stream_ids: Vec<_> = doc
        .objects
        .iter()
        .filter(|(_, obj)| matches!(obj, Object::Stream(_)))
        .map(|(id, _)| *id)
        .collect();

    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "Length" => 40,
        "O" => hex_string(vec![0x4f; 32]),
        "P" => -4,
    });
    let file_id = hex_string(b"book-reader-test".to_vec());
    doc.trailer.set("ID", vec![file_id.clone(), file_id]);
    doc.trailer.set("Encrypt", encrypt_id);

    let key = get_encryption_key(&doc, user_password, false).expect("encryption key");
    let user_check = rc4(&key, &PASSWORD_PAD);
    doc.get_object_mut(encrypt_id)
        .and_then(Object::as_dict_mut)
        .expect("encrypt dictionary")
        .set("U", hex_string(user_check));

    for id in stream_ids {
        // RC4는 대칭이므로 복호화 함수로 암호화
        let encrypted = decrypt_object(&key, id, doc.get_object(id).expect("stream"))
            .expect("encrypt stream");
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(id) {
            stream.set_content(encrypted);
        }
    }

    save(&mut doc)
}

const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn hex_string(bytes: Vec<u8>) -> Object {
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn rc4(key: &[u8], input: &[u8]) -> Vec<u8> {
    let mut state: Vec<u8> = (0..=255).collect();
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
        state.swap(i, j as usize);
    }

    let (mut i, mut j) = (0u8, 0u8);
    input
        .iter()
        .map(|byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(state[i as usize]);
            state.swap(i as usize, j as usize);
            let k = state[state[i as usize].wrapping_add(state[j as usize]) as usize];
            byte ^ k
        })
        .collect()
}

/// 줄마다 BT/ET 블록 하나
fn text_operations(lines: &[&str]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 800 - (i as i64) * 14;
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        ops.push(Operation::new("Td", vec![50.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

/// 스캔 페이지 흉내: 그래픽 연산만 있고 텍스트 없음
fn image_operations() -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new("re", vec![50.into(), 50.into(), 495.into(), 742.into()]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// 3페이지 책: 1-2쪽 텍스트, 3쪽 스캔 이미지
pub fn three_page_book() -> Vec<u8> {
    build_pdf(&[
        Some(&["Chapter One", "The whale was first seen at dawn."][..]),
        Some(&["Chapter Two", "The ship sailed north for many days."][..]),
        None,
    ])
}

/// 모든 페이지가 스캔 이미지인 문서
pub fn scanned_only() -> Vec<u8> {
    build_pdf(&[None, None])
}

/// 소유자 암호만 걸린 문서 (빈 사용자 암호로 열림)
pub fn owner_restricted_book() -> Vec<u8> {
    build_encrypted_pdf(&[Some(&["Hello encrypted book"][..])], "")
}

/// 사용자 암호가 필요한 문서
pub fn password_protected_book() -> Vec<u8> {
    build_encrypted_pdf(&[Some(&["Top secret chapter"][..])], "hunter2")
}

// ============================================================================
// Mock Providers
// ============================================================================

/// 주제 단어 등장 횟수로 임베딩하는 결정적 임베더
#[derive(Default)]
pub struct CountingEmbedder {
    /// embed/embed_batch 호출 횟수
    pub calls: AtomicUsize,
    /// 임베딩한 텍스트 수
    pub texts: AtomicUsize,
}

pub const TOPICS: [&str; 4] = ["whale", "ship", "chapter", "dawn"];

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        TOPICS
            .iter()
            .map(|t| lower.matches(t).count() as f32 + 0.01)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// 고정 답변을 돌려주고 받은 프롬프트를 기록하는 LLM
pub struct ScriptedModel {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.answer.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
