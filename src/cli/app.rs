//! Command runners for `convert` and `encode`

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::application::ports::{ConfigStore, TransportError};
use crate::application::{
    CancellationToken, CaptureRegistry, ConversionClient, ConvertError, ConvertRequest,
    RecordingConverter, SharedRegistry,
};
use crate::domain::capture::SpeakerId;
use crate::domain::config::AppConfig;
use crate::domain::conversion::ConvertResult;
use crate::domain::multipart::Boundary;
use crate::infrastructure::{load_packet_files, PacketFileError, ReqwestTransport, XdgConfigStore};

use super::args::{ConvertArgs, EncodeArgs};
use super::presenter::{format_size, Presenter};
use super::signals::InterruptHandler;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variables read by [`load_merged_config`]
pub const ENV_BASE_URI: &str = "VOICE_CAPTURE_BASE_URI";
pub const ENV_USERNAME: &str = "VOICE_CAPTURE_USERNAME";
pub const ENV_PASSWORD: &str = "VOICE_CAPTURE_PASSWORD";
pub const ENV_BUFFER_SIZE: &str = "VOICE_CAPTURE_BUFFER_SIZE";

/// Output path meaning standard output
const STDOUT_PATH: &str = "-";

/// Errors from running a command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid argument: {0}")]
    Usage(String),

    #[error(transparent)]
    Packets(#[from] PacketFileError),

    #[error("Failed to set up HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to write {path}: {message}")]
    Output { path: String, message: String },

    #[error("Failed to set up signal handler: {0}")]
    Signal(String),
}

impl CommandError {
    /// Exit code reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => EXIT_USAGE_ERROR,
            _ => EXIT_ERROR,
        }
    }
}

/// Run `convert`: load packets, upload them and save the converted audio
pub async fn run_convert(args: ConvertArgs) -> ExitCode {
    let mut presenter = Presenter::new();
    match convert(args, &mut presenter).await {
        Ok(ConvertResult::Success) => ExitCode::from(EXIT_SUCCESS),
        Ok(_) => ExitCode::from(EXIT_ERROR),
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn convert(args: ConvertArgs, presenter: &mut Presenter) -> Result<ConvertResult, CommandError> {
    validate_timing(&args)?;

    let cli_config = AppConfig {
        base_uri: args.base_uri.clone(),
        buffer_size: args.buffer_size,
        ..Default::default()
    };
    let config = load_merged_config(cli_config).await;

    let packets = load_packet_files(&args.files).await?;
    let registry = CaptureRegistry::shared(config.buffer_size_or_default());
    feed_registry(&registry, args.speaker, &packets, args.interval);

    let client = ConversionClient::from_config(ReqwestTransport::new()?, &config);
    let converter = RecordingConverter::new(Arc::new(client), registry);

    let mut request = ConvertRequest::new(vec![args.speaker]);
    if let Some(since) = args.since {
        request = request.since(since);
    }

    let cancel = CancellationToken::new();
    let _interrupt =
        InterruptHandler::install(cancel.clone()).map_err(|e| CommandError::Signal(e.to_string()))?;

    let mut output = open_output(&args.output).await?;
    let total: usize = packets.iter().map(Vec::len).sum();
    presenter.start_spinner(&format!(
        "Converting {} packets ({})...",
        packets.len(),
        format_size(total)
    ));

    let outcome = converter
        .convert(request, output.as_mut(), false, &cancel)
        .await;

    let result = match outcome {
        Ok(ConvertResult::Success) => {
            presenter.spinner_success(&format!("Converted audio written to {}", args.output.display()));
            ConvertResult::Success
        }
        Ok(result) => {
            presenter.spinner_fail(&describe_failure(result));
            result
        }
        Err(ConvertError::Cancelled) => {
            presenter.spinner_fail("Conversion cancelled");
            ConvertResult::UnknownError
        }
        Err(e) => {
            presenter.spinner_fail(&e.to_string());
            e.as_result().unwrap_or(ConvertResult::UnknownError)
        }
    };

    if result != ConvertResult::Success {
        discard_output(&args.output).await;
    }
    Ok(result)
}

/// Run `encode`: write the multipart body for the packet files
pub async fn run_encode(args: EncodeArgs) -> ExitCode {
    let presenter = Presenter::new();
    match encode(args, &presenter).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn encode(args: EncodeArgs, presenter: &Presenter) -> Result<(), CommandError> {
    let cli_config = AppConfig {
        buffer_size: args.buffer_size,
        ..Default::default()
    };
    let config = load_merged_config(cli_config).await;

    let packets = load_packet_files(&args.files).await?;
    let registry = CaptureRegistry::shared(config.buffer_size_or_default());
    let speaker = SpeakerId::new(1);
    feed_registry(&registry, speaker, &packets, 0.0);

    let body = registry
        .lock()
        .select(&[speaker], None, Boundary::generate(&mut rand::rng()));

    let output_error = |e: std::io::Error| CommandError::Output {
        path: args.output.display().to_string(),
        message: e.to_string(),
    };
    let mut output = open_output(&args.output).await?;
    output.write_all(body.bytes()).await.map_err(output_error)?;
    output.shutdown().await.map_err(output_error)?;

    presenter.info(&format!(
        "Encoded {} packets ({})",
        body.packet_count(),
        format_size(body.len())
    ));
    presenter.output(&body.content_type());
    Ok(())
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load_or_empty().await;

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Configuration taken from `VOICE_CAPTURE_*` environment variables
pub fn env_config() -> AppConfig {
    let var = |name: &str| env::var(name).ok().filter(|s| !s.trim().is_empty());

    let buffer_size = var(ENV_BUFFER_SIZE).and_then(|raw| match raw.trim().parse::<usize>() {
        Ok(size) => Some(size),
        Err(e) => {
            warn!(value = %raw, error = %e, "ignoring {}", ENV_BUFFER_SIZE);
            None
        }
    });

    AppConfig {
        base_uri: var(ENV_BASE_URI),
        username: var(ENV_USERNAME),
        password: var(ENV_PASSWORD),
        buffer_size,
    }
}

fn validate_timing(args: &ConvertArgs) -> Result<(), CommandError> {
    if !args.interval.is_finite() || args.interval < 0.0 {
        return Err(CommandError::Usage(format!(
            "--interval must be a non-negative number of seconds, got {}",
            args.interval
        )));
    }
    if args.since.is_some_and(|since| !since.is_finite()) {
        return Err(CommandError::Usage("--since must be a finite number of seconds".to_string()));
    }
    Ok(())
}

/// Push packets for one speaker with evenly spaced timestamps
fn feed_registry(registry: &SharedRegistry, speaker: SpeakerId, packets: &[Vec<u8>], interval: f64) {
    let mut registry = registry.lock();
    for (i, packet) in packets.iter().enumerate() {
        registry.push_packet(speaker, packet, i as f64 * interval);
    }
}

type Output = Box<dyn AsyncWrite + Unpin + Send>;

async fn open_output(path: &Path) -> Result<Output, CommandError> {
    if path.as_os_str() == STDOUT_PATH {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| CommandError::Output {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(Box::new(file))
}

/// Remove a partially written output file
async fn discard_output(path: &Path) {
    if path.as_os_str() == STDOUT_PATH {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove output file");
    }
}

fn describe_failure(result: ConvertResult) -> String {
    match result {
        ConvertResult::Disabled => format!(
            "Conversion is disabled. Set base_uri, username and password (config or {}, {}, {})",
            ENV_BASE_URI, ENV_USERNAME, ENV_PASSWORD
        ),
        ConvertResult::NoData => "No packets matched the request".to_string(),
        ConvertResult::Unauthorized => "The conversion service rejected the credentials".to_string(),
        ConvertResult::ConnectionError => "Could not reach the conversion service".to_string(),
        ConvertResult::InvalidFormat => "The conversion service rejected the packet format".to_string(),
        other => format!("Conversion failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn convert_args() -> ConvertArgs {
        ConvertArgs {
            files: vec![PathBuf::from("a.pkt")],
            output: PathBuf::from("out.wav"),
            speaker: SpeakerId::new(1),
            interval: 0.02,
            since: None,
            base_uri: None,
            buffer_size: None,
        }
    }

    #[test]
    fn negative_interval_is_usage_error() {
        let args = ConvertArgs {
            interval: -1.0,
            ..convert_args()
        };
        let err = validate_timing(&args).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE_ERROR);
    }

    #[test]
    fn non_finite_since_is_usage_error() {
        let args = ConvertArgs {
            since: Some(f64::NAN),
            ..convert_args()
        };
        assert!(validate_timing(&args).is_err());
        assert!(validate_timing(&convert_args()).is_ok());
    }

    #[test]
    fn feed_spaces_timestamps() {
        let registry = CaptureRegistry::shared(64);
        let speaker = SpeakerId::new(3);
        feed_registry(&registry, speaker, &[b"a".to_vec(), b"b".to_vec(), b"c".to_vec()], 0.5);

        let registry = registry.lock();
        let timestamps: Vec<f64> = registry
            .buffer(speaker)
            .unwrap()
            .packets()
            .map(|packet| packet.timestamp)
            .collect();
        assert_eq!(timestamps, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn disabled_message_names_env_vars() {
        let message = describe_failure(ConvertResult::Disabled);
        assert!(message.contains(ENV_BASE_URI));
    }

    #[test]
    fn packet_errors_exit_with_error() {
        let err = CommandError::from(PacketFileError::Empty(PathBuf::from("x")));
        assert_eq!(err.exit_code(), EXIT_ERROR);
    }
}
