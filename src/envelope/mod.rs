//! Versioned envelopes: the persisted text form of one encrypted record.
//!
//! - `format` parses and renders the three wire layouts
//! - `codec` turns plaintext into envelopes and back

pub mod codec;
pub mod format;

pub use codec::{decode, encode, encode_export, encode_legacy, seal_v3};
pub use format::{Envelope, SchemeVersion};
