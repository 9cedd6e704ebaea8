//! FragmentRenderer trait 定義
//!
//! クライアントに送る画面断片（フラグメント）の生成を抽象化します。
//! 描画技術（HTML テンプレートなど）はこの trait の実装側の関心事です。

use super::{
    entity::ScoreLine,
    value_object::{RoomId, Username},
};

pub trait FragmentRenderer: Send + Sync {
    /// ユーザー名入力画面
    fn choose_username(&self) -> String;

    /// 待合室画面
    fn waiting_room(&self, room_id: &RoomId) -> String;

    /// 参加者一覧（待合室の一部を差し替える）
    fn player_list(&self, players: &[Username]) -> String;

    /// お題画面
    fn game_page(&self, question: &str) -> String;

    /// 生成画像のプレビュー（本人のみ）
    fn picture_preview(&self, url: &str) -> String;

    /// 投票画面
    fn voting_page(&self, candidates: &[String]) -> String;

    /// ラウンドスコアと累計スコア
    fn leaderboard(&self, lines: &[ScoreLine]) -> String;

    /// エラー通知（本人のみ）
    fn notice(&self, message: &str) -> String;
}
