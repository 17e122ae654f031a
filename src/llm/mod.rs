pub mod tokens;
pub mod types;

pub use tokens::{EstimatingTokenCounter, FnTokenCounter, TokenCounter};
pub use types::{Message, get_buffer_string};
