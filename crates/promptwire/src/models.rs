//! These models represent the values flowing through the engine
//!
//! There are three related groups:
//! - conversation state handed to the formatter (turns, context configuration, build parameters)
//! - channels produced by the parser for one generation pass
//! - tool definitions, requests and responses shared by both directions
//!
//! Everything here is plain serde-able value data so a persistence layer can store it as-is.
//! Channels belong to the turn that lists them and never point back at it.
pub mod channel;
pub mod message;
pub mod tool;
