//! Execution-risk engine — book walking, slippage policy, and the window gate.
//!
//! Everything in here is pure: no I/O, deterministic given its inputs.

pub mod book;
pub mod risk;

pub use book::{walk_book, BookFill};
pub use risk::{check_window, evaluate, SlippagePolicy, SlippageVerdict, INSUFFICIENT_FILL_RATIO};
