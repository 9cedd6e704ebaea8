//! StateStore trait 定義
//!
//! ルームとセッションの共有状態を保持する外部 Key-Value ストアへのインターフェース。
//! 具体的な実装（InMemory / Redis）は Infrastructure 層が提供します（依存性の逆転）。
//!
//! ## 契約
//!
//! - キー単位の操作はそれぞれアトミックに実行される
//! - 複数キーにまたがるトランザクションは使わない
//! - 書き込みのたびにキーの有効期限（復旧ウィンドウ）が更新される
//!
//! `bool` を返す書き込みは「この呼び出しが状態を変えたか」を返します。複数プロセスが
//! 同じイベントを処理する場合、`true` を受け取った 1 プロセスだけが副作用を実行します。

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StoreError;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// スカラー値を取得
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// スカラー値を設定
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// スカラー値に `delta` を加算し、加算後の値を返す（未設定は 0 として扱う）
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// キーを削除（存在しなくてもエラーにしない）
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// ハッシュのフィールドを取得
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// ハッシュのフィールドを設定し、新規作成だったかを返す
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;

    /// ハッシュのフィールドを削除し、削除したかを返す
    async fn hash_delete(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    /// ハッシュの全フィールドを取得
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// セットにメンバーを追加し、新規追加だったかを返す
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// セットからメンバーを削除し、削除したかを返す
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// セットのメンバーかを判定
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// セットの全メンバーを取得
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// ソート済みセットに存在しない場合のみ追加し、追加したかを返す（既存スコアは上書きしない）
    async fn sorted_set_add_new(&self, key: &str, member: &str, score: i64)
    -> Result<bool, StoreError>;

    /// ソート済みセットのスコアに `delta` を加算し、加算後のスコアを返す
    async fn sorted_set_incr(&self, key: &str, member: &str, delta: i64)
    -> Result<i64, StoreError>;

    /// ソート済みセットからメンバーを削除し、削除したかを返す
    async fn sorted_set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// ソート済みセットの全メンバーをスコアの降順で取得
    async fn sorted_set_range_with_scores(&self, key: &str)
    -> Result<Vec<(String, i64)>, StoreError>;
}
