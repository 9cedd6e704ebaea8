//! Stock ContentGenerator 実装
//!
//! API キーなしでもゲームを一通り遊べるよう、組み込みのお題からランダムに選び、
//! 画像はプロンプトごとに異なるプレースホルダー URL を返します。

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use uuid::Uuid;

use crate::domain::{ContentError, ContentGenerator};

const QUESTIONS: &[&str] = &[
    "The real reason the dinosaurs went extinct",
    "What the cat is actually plotting",
    "The worst thing to bring to a job interview",
    "A new flavour of ice cream nobody asked for",
    "What aliens think our cars are",
    "The secret ingredient in grandma's soup",
    "The most useless superpower",
    "What really lives under the bed",
    "A terrible idea for a theme park",
    "The last thing you want to see on a first date",
];

#[derive(Debug, Default)]
pub struct StockContentGenerator;

impl StockContentGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentGenerator for StockContentGenerator {
    async fn generate_question(&self) -> Result<String, ContentError> {
        QUESTIONS
            .choose(&mut rand::rng())
            .map(|question| question.to_string())
            .ok_or_else(|| ContentError::InvalidResponse("no stock questions".to_string()))
    }

    async fn generate_picture(&self, prompt: &str) -> Result<String, ContentError> {
        if prompt.trim().is_empty() {
            return Err(ContentError::Request("empty prompt".to_string()));
        }
        Ok(format!(
            "https://picsum.photos/seed/{}/512",
            Uuid::new_v4().simple()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_question_from_stock() {
        // テスト項目: 組み込みのお題から 1 つ返す
        // given (前提条件):
        let generator = StockContentGenerator::new();

        // when (操作):
        let question = generator.generate_question().await.unwrap();

        // then (期待する結果):
        assert!(QUESTIONS.contains(&question.as_str()));
    }

    #[tokio::test]
    async fn test_generate_picture_urls_are_distinct() {
        // テスト項目: 同じプロンプトでも画像 URL は毎回異なる（投票候補が重複しない）
        // given (前提条件):
        let generator = StockContentGenerator::new();

        // when (操作):
        let first = generator.generate_picture("a cat").await.unwrap();
        let second = generator.generate_picture("a cat").await.unwrap();

        // then (期待する結果):
        assert_ne!(first, second);
        assert!(first.starts_with("https://picsum.photos/seed/"));
    }

    #[tokio::test]
    async fn test_generate_picture_rejects_blank_prompt() {
        // テスト項目: 空のプロンプトはエラーになる
        // given (前提条件):
        let generator = StockContentGenerator::new();

        // when (操作):
        let result = generator.generate_picture("   ").await;

        // then (期待する結果):
        assert!(result.is_err());
    }
}
