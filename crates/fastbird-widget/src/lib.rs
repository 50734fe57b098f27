//! The embedded assistant widget: state machine, persona, and reply rendering.

pub mod engine;
pub mod markup;
pub mod persona;

pub use engine::{ChatWidget, RejectReason, SubmitOutcome, VoiceSettings, WidgetPhase};
pub use markup::{parse_markup, MessageNode};
