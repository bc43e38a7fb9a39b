//! Audio output path
//!
//! - [`callback`]: hardware-independent callback body and fault accounting
//! - [`output`]: cpal device and stream lifecycle

pub mod callback;
pub mod output;

pub use callback::{render_callback, AudioSource, CallbackCounters, CallbackStats, SynthSource};
pub use output::AudioOutput;
