//! HTMX 向け HTML フラグメントの生成
//!
//! 各フラグメントは `hx-swap-oob` で差し替える要素を 1 つ持ちます。フォームは
//! htmx の `ws-send` で送信され、hidden の `event` と入力 `msg` がそのまま
//! `GameMessage` になります。ユーザー入力由来の文字列は必ずエスケープします。

use std::fmt::Write;

use crate::domain::{FragmentRenderer, RoomId, ScoreLine, Username};

/// HTML の特殊文字をエスケープ
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `event` を送るボタン 1 つだけのフォーム
fn event_button(event: &str, value: &str, label: &str) -> String {
    format!(
        r#"<form ws-send><input type="hidden" name="event" value="{}"><input type="hidden" name="msg" value="{}"><button type="submit">{}</button></form>"#,
        event,
        escape(value),
        label
    )
}

#[derive(Debug, Default, Clone)]
pub struct HtmlFragmentRenderer;

impl HtmlFragmentRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl FragmentRenderer for HtmlFragmentRenderer {
    fn choose_username(&self) -> String {
        r#"<div id="content" hx-swap-oob="true"><form ws-send><input type="hidden" name="event" value="set-username"><label for="msg">Choose a username</label><input id="msg" name="msg" maxlength="24" required autofocus><button type="submit">Enter</button></form></div>"#
            .to_string()
    }

    fn waiting_room(&self, room_id: &RoomId) -> String {
        format!(
            r#"<div id="content" hx-swap-oob="true"><h2>Room {}</h2><ul id="player-list"></ul>{}</div>"#,
            escape(room_id.as_str()),
            event_button("ready", "", "Ready")
        )
    }

    fn player_list(&self, players: &[Username]) -> String {
        let mut html = String::from(r#"<ul id="player-list" hx-swap-oob="true">"#);
        for player in players {
            let _ = write!(html, "<li>{}</li>", escape(player.as_str()));
        }
        html.push_str("</ul>");
        html
    }

    fn game_page(&self, question: &str) -> String {
        format!(
            r#"<div id="content" hx-swap-oob="true"><h2 id="question">{}</h2><form ws-send><input type="hidden" name="event" value="prompt"><input name="msg" placeholder="Describe a picture" required><button type="submit">Generate</button></form><div id="picture-preview"></div></div>"#,
            escape(question)
        )
    }

    fn picture_preview(&self, url: &str) -> String {
        format!(
            r#"<div id="picture-preview" hx-swap-oob="true"><img src="{}" alt="preview">{}</div>"#,
            escape(url),
            event_button("pick-picture", url, "Pick this picture")
        )
    }

    fn voting_page(&self, candidates: &[String]) -> String {
        let mut html = String::from(r#"<div id="content" hx-swap-oob="true"><h2>Vote</h2>"#);
        for candidate in candidates {
            let _ = write!(
                html,
                r#"<figure><img src="{}" alt="candidate">{}</figure>"#,
                escape(candidate),
                event_button("vote", candidate, "Vote")
            );
        }
        html.push_str("</div>");
        html
    }

    fn leaderboard(&self, lines: &[ScoreLine]) -> String {
        let mut html = String::from(
            r#"<div id="content" hx-swap-oob="true"><h2>Leaderboard</h2><table><tr><th>Player</th><th>Round</th><th>Total</th></tr>"#,
        );
        for line in lines {
            let _ = write!(
                html,
                "<tr><td>{}</td><td>+{}</td><td>{}</td></tr>",
                escape(&line.username),
                line.round_score,
                line.total
            );
        }
        html.push_str("</table>");
        html.push_str(&event_button("ready", "", "Next round"));
        html.push_str("</div>");
        html
    }

    fn notice(&self, message: &str) -> String {
        format!(
            r#"<div id="notice" hx-swap-oob="true">{}</div>"#,
            escape(message)
        )
    }
}
