pub mod client;
pub mod content;
pub mod credentials;
pub mod resolver;
pub mod search;
pub mod wbi;
