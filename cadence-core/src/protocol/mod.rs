//! The i3bar JSON protocol.
//!
//! Output: a header object, then an endless array of status lines.
//! Input: an endless array of click objects. Both directions put one
//! element per line, with a leading comma on every element but the first.

pub mod click;
pub mod decoder;
pub mod encoder;

pub use click::{ClickEvent, MouseButton};
pub use decoder::Decoder;
pub use encoder::{Encoder, Header};
