//! VoiceCapture - per-speaker voice capture with remote audio conversion
//!
//! This crate buffers the voice packets of each connected speaker in a
//! bounded ring buffer and uploads selected packets as a multipart form to
//! a remote conversion service, streaming the converted audio back.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Ring buffer, multipart encoding, token lifecycle and config values
//! - **Application**: Capture registry, conversion client and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (reqwest, XDG config file, packet files)
//! - **CLI**: Command-line interface, argument parsing, and interrupt handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
