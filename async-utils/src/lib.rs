//! Timers and cancellation helpers shared by the client-side crates.
//!
//! [`Debouncer`] keeps free-text inputs from issuing a request per
//! keystroke; [`or_cancel`] is the primitive it is built on.

mod cancel;
mod debounce;

pub use cancel::Cancelled;
pub use cancel::or_cancel;
pub use debounce::Debouncer;
