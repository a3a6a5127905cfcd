// ABOUTME: Command module aggregator for the manifest-pin CLI.
// ABOUTME: Re-exports the extract, resolve, replace and pin handlers.

mod extract;
mod pin;
mod replace;
mod resolve;
mod resolver_setup;

pub use extract::extract;
pub use pin::pin;
pub use replace::replace;
pub use resolve::resolve;
