//! Console host for the hackerspace bot: wires the per-user scheduler and the
//! streaming generation client together behind a line-based interface.

pub mod config;
pub mod console;
pub mod logging;
pub mod state;

pub use spacebot_llm as llm;
pub use spacebot_throttle as throttle;

pub use config::Config;
pub use console::{parse_line, print_replies, render, Command, Incoming, ParseError};
pub use state::{Bot, Reply};
