use std::sync::Arc;
use std::time::Duration;

use cadence_blocks::{ClockBlock, CommandBlock, TextBlock, threshold};
use cadence_core::{
    Block, BlockContext, ClickEvent, Color, Hook, Registry, Schedule, State,
};

/// Register `block` alone and hand back a context bound to its entry.
fn detached<B: Block>(block: Arc<B>) -> BlockContext {
    let mut registry = Registry::new();
    let id = registry.register(block, []).unwrap();
    BlockContext::detached(registry.resolve(&id).unwrap().clone())
}

// ============================================================================
// Threshold Tests
// ============================================================================

#[test]
fn test_threshold_colors() {
    let colors = [
        (0.0, Color::NEUTRAL),
        (75.0, Some(Color::WARN)),
        (90.0, Some(Color::URGENT)),
    ];
    assert_eq!(threshold(&colors, 10.0), Some(&None));
    assert_eq!(threshold(&colors, 75.0), Some(&Some(Color::WARN)));
    assert_eq!(threshold(&colors, 99.9), Some(&Some(Color::URGENT)));
    assert_eq!(threshold(&colors, -3.0), None);
}

#[test]
fn test_threshold_empty() {
    let empty: [(u8, &str); 0] = [];
    assert_eq!(threshold(&empty, 5), None);
}

// ============================================================================
// TextBlock Tests
// ============================================================================

#[tokio::test]
async fn test_text_block_publishes_text() {
    let block = Arc::new(TextBlock::new("hi"));
    let ctx = detached(block.clone());

    assert_eq!(block.name(), "TextBlock");
    assert_eq!(block.schedule(), Schedule::Once);
    block.run(&ctx).await.unwrap();
    assert_eq!(ctx.current().full_text(), "hi");
    assert_eq!(ctx.current().name, "TextBlock");
}

#[tokio::test]
async fn test_text_block_styled() {
    let block = Arc::new(TextBlock::styled(
        State::text("ok").with_color(Color::GOOD).with_urgent(false),
    ));
    let ctx = detached(block.clone());

    block.run(&ctx).await.unwrap();
    let snapshot = ctx.current();
    assert_eq!(snapshot.state.color.as_deref(), Some(Color::GOOD));
    assert_eq!(snapshot.state.urgent, Some(false));
}

// ============================================================================
// ClockBlock Tests
// ============================================================================

#[tokio::test]
async fn test_clock_default_format() {
    let block = Arc::new(ClockBlock::default());
    let ctx = detached(block.clone());

    assert_eq!(block.schedule(), Schedule::Every(Duration::from_secs(1)));
    block.run(&ctx).await.unwrap();

    let text = ctx.current().full_text().to_string();
    assert!(chrono::NaiveTime::parse_from_str(&text, "%H:%M:%S").is_ok(), "got {text}");
}

#[tokio::test]
async fn test_clock_click_toggles_format() {
    let block = Arc::new(ClockBlock::default());
    let ctx = detached(block.clone());
    assert_eq!(block.hooks().click, Hook::Custom);

    let click = ClickEvent::new(ctx.instance(), 1, 0, 0);
    block.click_handler(&ctx, &click).await.unwrap();
    assert!(block.showing_alt());
    let text = ctx.current().full_text().to_string();
    assert!(chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok(), "got {text}");

    block.click_handler(&ctx, &click).await.unwrap();
    assert!(!block.showing_alt());
}

#[tokio::test]
async fn test_clock_bad_format_is_an_error() {
    let block = Arc::new(ClockBlock::new("%Q%", "%Y"));
    let ctx = detached(block.clone());
    assert!(block.run(&ctx).await.is_err());
}

// ============================================================================
// CommandBlock Tests
// ============================================================================

#[tokio::test]
async fn test_command_first_line() {
    let block = Arc::new(CommandBlock::new("printf 'one\\ntwo\\n'"));
    let ctx = detached(block.clone());

    block.run(&ctx).await.unwrap();
    assert_eq!(ctx.current().full_text(), "one");
    assert_eq!(ctx.current().state.urgent, None);
}

#[tokio::test]
async fn test_command_failure_is_urgent() {
    let block = Arc::new(CommandBlock::new("echo partial; exit 3"));
    let ctx = detached(block.clone());

    block.run(&ctx).await.unwrap();
    assert_eq!(ctx.current().full_text(), "partial");
    assert_eq!(ctx.current().state.urgent, Some(true));
}

#[tokio::test]
async fn test_command_threshold_color() {
    let block = Arc::new(
        CommandBlock::new("echo 2.50 1.00 0.50")
            .colored([(0.0, Color::NEUTRAL), (2.0, Some(Color::WARN))]),
    );
    let ctx = detached(block.clone());

    block.run(&ctx).await.unwrap();
    assert_eq!(ctx.current().state.color.as_deref(), Some(Color::WARN));
}

#[tokio::test]
async fn test_command_empty_is_an_error() {
    let block = Arc::new(CommandBlock::new("   "));
    let ctx = detached(block.clone());

    let result = block.run(&ctx).await;
    assert!(result.unwrap_err().to_string().contains("Empty"));
}

#[test]
fn test_command_hooks_refresh() {
    let block = CommandBlock::new("true").every(Duration::from_secs(30));
    assert_eq!(block.hooks().click, Hook::Refresh);
    assert_eq!(block.hooks().signal, Hook::Refresh);
    assert_eq!(block.schedule(), Schedule::Every(Duration::from_secs(30)));
}

// ============================================================================
// Runner Scenario
// ============================================================================

#[tokio::test]
async fn test_text_and_clock_on_the_bar() {
    use cadence_core::{Runner, RunnerConfig};
    use serde_json::{Value, json};
    use tokio::io::AsyncBufReadExt;

    let mut runner = Runner::new(RunnerConfig {
        termination_signals: false,
        ..RunnerConfig::default()
    });
    let text_id = runner.register(TextBlock::new("hi"), []).unwrap();
    let clock_id = runner.register(ClockBlock::default(), []).unwrap();
    let shutdown = runner.shutdown_handle();

    let (_clicks, input) = tokio::io::duplex(1024);
    let (output, bar) = tokio::io::duplex(64 * 1024);
    let task = tokio::spawn(async move { runner.run(input, output).await });
    let mut lines = tokio::io::BufReader::new(bar).lines();

    let header = lines.next_line().await.unwrap().unwrap();
    assert_eq!(header, r#"{"version":1,"click_events":true}"#);

    let items = loop {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Some(body) = line.strip_prefix(',') else {
            continue;
        };
        let items: Vec<Value> = serde_json::from_str(body).unwrap();
        if items[0]["full_text"] == "hi" && items[1]["full_text"] != "" {
            break items;
        }
    };

    assert_eq!(
        items[0],
        json!({"name": "TextBlock", "instance": text_id, "full_text": "hi"})
    );
    assert_eq!(items[1]["name"], "ClockBlock");
    assert_eq!(items[1]["instance"], clock_id.as_str());
    let time = items[1]["full_text"].as_str().unwrap();
    assert!(chrono::NaiveTime::parse_from_str(time, "%H:%M:%S").is_ok());

    assert!(shutdown.request());
    while lines.next_line().await.unwrap().is_some() {}
    assert!(task.await.unwrap().is_ok());
}
