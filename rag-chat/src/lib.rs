pub mod app;
pub mod config;
pub mod repl;

pub use app::{startup_exit_code, AppContext};
pub use config::ChatConfig;
pub use repl::{classify_input, LoopAction, LoopState, Repl};
