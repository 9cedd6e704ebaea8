//! Logging setup for the Easel binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive: every listed target at `default_log_level`.
///
/// Crate names are normalised the same way rustc names their modules
/// (`easel-server` becomes `easel_server`).
pub fn default_directive(targets: &[&str], default_log_level: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise every target in `targets` logs at
/// `default_log_level` and everything else stays silent.
///
/// # Examples
///
/// ```no_run
/// use easel_shared::logger::setup_logger;
///
/// setup_logger(&["easel-server", "tower_http"], "info");
/// ```
pub fn setup_logger(targets: &[&str], default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(targets, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_normalises_crate_names() {
        // テスト項目: クレート名のハイフンがアンダースコアに変換される
        // given (前提条件):
        let targets = ["easel-server", "tower_http"];

        // when (操作):
        let directive = default_directive(&targets, "debug");

        // then (期待する結果):
        assert_eq!(directive, "easel_server=debug,tower_http=debug");
    }

    #[test]
    fn test_default_directive_with_no_targets() {
        // テスト項目: 対象が空の場合は空文字列になる
        // given (前提条件):
        let targets: [&str; 0] = [];

        // when (操作):
        let directive = default_directive(&targets, "info");

        // then (期待する結果):
        assert!(directive.is_empty());
    }
}
