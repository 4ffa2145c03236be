pub mod clock;
pub mod command;
pub mod text;
pub mod threshold;

pub use clock::ClockBlock;
pub use command::CommandBlock;
pub use text::TextBlock;
pub use threshold::threshold;
