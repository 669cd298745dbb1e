//! Workers that turn the screen and the chat log into bus events.

mod chatlog;
pub use chatlog::{is_depletion, parse_chat_line, ChatLine, ChatLogListener};
mod deed;
pub use deed::{DeedScanner, DeedTrigger};
mod position;
pub use position::PositionScanner;
