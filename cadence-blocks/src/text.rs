use async_trait::async_trait;
use cadence_core::{Block, BlockContext, State};

/// Fixed text. Runs once.
#[derive(Debug, Clone)]
pub struct TextBlock {
    state: State,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: State::text(text),
        }
    }

    /// Text with styling, e.g. `State::text("hi").with_color(Color::GOOD)`.
    pub fn styled(state: State) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Block for TextBlock {
    fn name(&self) -> &str {
        "TextBlock"
    }

    async fn run(&self, ctx: &BlockContext) -> anyhow::Result<()> {
        ctx.update(self.state.clone());
        Ok(())
    }
}
