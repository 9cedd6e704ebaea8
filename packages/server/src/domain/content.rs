//! ContentGenerator trait 定義
//!
//! お題と画像を生成する外部サービス（AI）への不透明なインターフェース。
//! 調停ロジックの正しさには関与せず、コンテンツかエラーを返すだけです。

use async_trait::async_trait;

use super::error::ContentError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// 次のラウンドのお題を生成
    async fn generate_question(&self) -> Result<String, ContentError>;

    /// プロンプトから画像を生成し、その URL を返す
    async fn generate_picture(&self, prompt: &str) -> Result<String, ContentError>;
}
