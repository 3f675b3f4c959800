// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Wire fields are fixed-width; values are bounded by the format
    clippy::cast_possible_wrap,       // Batch numbers and lengths stay far below i32::MAX
    clippy::cast_sign_loss,           // Safe where values are known non-negative
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. CodecError in codec module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod buffer;
pub mod codec;
pub mod domain;
pub mod pipeline;
pub mod profile;
pub mod reliability;
pub mod sender;

// Re-export main types for easy access
pub use app::{DispatcherConfig, TuningConfig};
pub use domain::{CustomEventDef, CustomEventType, EventKind, EventRecord, Item, Payload};
pub use pipeline::{DispatcherError, EventDispatcher};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
