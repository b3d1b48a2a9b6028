#![warn(missing_docs)]

//! Light weight helpers shared by the authzn crates. Everything in here has to
//! work the same way on native targets and on `wasm32-unknown-unknown`, where
//! the credential ceremonies ultimately run inside a browser.

mod sync;
pub use sync::*;

mod r#async;
pub use r#async::*;

pub mod time;
