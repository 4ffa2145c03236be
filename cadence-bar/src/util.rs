use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Read before `RUST_LOG`, so the bar can be tuned from an i3/sway config
/// line without touching other programs.
pub const LOG_ENV: &str = "CADENCE_LOG";

/// Our crates at info, everything else (tokio, chrono) only when it warns.
pub const DEFAULT_FILTER: &str = "warn,cadence_bar=info,cadence_core=info,cadence_blocks=info";

/// The directives in effect: `CADENCE_LOG`, then `RUST_LOG`, then the default.
/// Blank values count as unset.
pub fn filter_directives(lookup: impl Fn(&str) -> Option<String>) -> String {
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Logs go to stderr; stdout belongs to the bar protocol. i3bar and swaybar
/// usually send stderr to a log file, so colors only when it is a terminal.
pub fn init_tracing() {
    // CADENCE_LOG=cadence_core::runner=debug,cadence_blocks=trace
    let directives = filter_directives(|key| std::env::var(key).ok());
    let (filter, rejected) = match EnvFilter::try_new(&directives) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e)),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_line_number(true)
        .compact()
        .try_init();

    if let Some(e) = rejected {
        tracing::warn!(%directives, error = %e, "bad log filter, using the default");
    }
}

/// Block panics are caught and shown on the bar; this makes sure the
/// message and location also reach the log, tagged with the thread.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        let thread = std::thread::current();
        tracing::error!(
            target: "cadence_bar::panic",
            %location,
            %payload,
            thread = thread.name().unwrap_or("<unnamed>"),
            "panic"
        );
    }));
}
