//! Configuration sections for Scribe.
//!
//! The web server deserializes these from its TOML file and hands each
//! section to the component that needs it.

pub mod settings;
