//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::capture::SpeakerId;

/// VoiceCapture - per-speaker voice packet capture and conversion
#[derive(Parser, Debug)]
#[command(name = "voice-capture")]
#[command(version)]
#[command(about = "Capture voice packets and convert them through a remote audio service")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload packet files to the conversion service and save the audio
    Convert(ConvertArgs),
    /// Write the multipart upload body for packet files without sending it
    Encode(EncodeArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `convert`
#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Packet files, one raw voice packet each, in arrival order
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Where to write the converted audio ("-" for stdout)
    #[arg(short = 'o', long, value_name = "OUT")]
    pub output: PathBuf,

    /// Speaker the packets belong to
    #[arg(short = 's', long, value_name = "ID", default_value_t = SpeakerId::new(1))]
    pub speaker: SpeakerId,

    /// Seconds between consecutive packets
    #[arg(short = 'i', long, value_name = "SECS", default_value_t = 0.02)]
    pub interval: f64,

    /// Only convert packets at or after this many seconds into the capture
    #[arg(long, value_name = "SECS")]
    pub since: Option<f64>,

    /// Conversion service base URI (overrides config and environment)
    #[arg(long, value_name = "URI")]
    pub base_uri: Option<String>,

    /// Minimum ring buffer capacity in bytes
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,
}

/// Options for `encode`
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Packet files, one raw voice packet each, in arrival order
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Where to write the multipart body ("-" for stdout)
    #[arg(short = 'o', long, value_name = "OUT")]
    pub output: PathBuf,

    /// Minimum ring buffer capacity in bytes
    #[arg(long, value_name = "BYTES")]
    pub buffer_size: Option<usize>,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &["base_uri", "username", "password", "buffer_size"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_convert() {
        let cli = Cli::parse_from(["voice-capture", "convert", "a.pkt", "b.pkt", "-o", "out.wav"]);
        let Commands::Convert(args) = cli.command else {
            panic!("Expected convert command");
        };
        assert_eq!(args.files, vec![PathBuf::from("a.pkt"), PathBuf::from("b.pkt")]);
        assert_eq!(args.output, PathBuf::from("out.wav"));
        assert_eq!(args.speaker, SpeakerId::new(1));
        assert_eq!(args.interval, 0.02);
        assert!(args.since.is_none());
        assert!(args.base_uri.is_none());
    }

    #[test]
    fn cli_parses_convert_options() {
        let cli = Cli::parse_from([
            "voice-capture",
            "convert",
            "a.pkt",
            "-o",
            "-",
            "--speaker",
            "42",
            "--interval",
            "0.5",
            "--since",
            "1.5",
            "--base-uri",
            "http://localhost:9000",
        ]);
        let Commands::Convert(args) = cli.command else {
            panic!("Expected convert command");
        };
        assert_eq!(args.speaker, SpeakerId::new(42));
        assert_eq!(args.interval, 0.5);
        assert_eq!(args.since, Some(1.5));
        assert_eq!(args.base_uri.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn convert_requires_files_and_output() {
        assert!(Cli::try_parse_from(["voice-capture", "convert", "-o", "out.wav"]).is_err());
        assert!(Cli::try_parse_from(["voice-capture", "convert", "a.pkt"]).is_err());
    }

    #[test]
    fn invalid_speaker_is_rejected() {
        let result = Cli::try_parse_from([
            "voice-capture",
            "convert",
            "a.pkt",
            "-o",
            "out.wav",
            "--speaker",
            "alice",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_encode() {
        let cli = Cli::parse_from(["voice-capture", "encode", "a.pkt", "-o", "body.bin"]);
        let Commands::Encode(args) = cli.command else {
            panic!("Expected encode command");
        };
        assert_eq!(args.files, vec![PathBuf::from("a.pkt")]);
        assert_eq!(args.output, PathBuf::from("body.bin"));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["voice-capture", "config", "set", "username", "relay"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "username");
            assert_eq!(value, "relay");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("base_uri"));
        assert!(is_valid_config_key("buffer_size"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
