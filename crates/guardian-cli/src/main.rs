// crates/guardian-cli/src/main.rs
// ============================================================================
// Module: Capability Guardian CLI Entry Point
// Description: Command dispatcher for serving, key minting, and invocation.
// Purpose: Provide one binary for operating and exercising the guardian.
// Dependencies: clap, guardian-config, guardian-core, guardian-service, reqwest, tokio
// ============================================================================

//! ## Overview
//! The `guardian` binary starts the HTTP server, validates configuration,
//! manages capability keys in durable stores, and acts as a minimal client:
//! it can seal an operation into a capability request and POST it to a
//! running guardian. Security posture: key material is only ever printed
//! when the operator asks for it.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use guardian_config::CapabilityStoreType;
use guardian_config::GuardianConfig;
use guardian_config::config_toml_example;
use guardian_core::AeadSecretChannel;
use guardian_core::CapabilityKey;
use guardian_core::MintedIdentity;
use guardian_service::GuardianServer;
use guardian_service::server::PROCESS_CAPABILITY_ROUTE;
use guardian_store_sqlite::SqliteCapabilityStore;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a `--params` JSON argument.
const MAX_PARAMS_BYTES: usize = 64 * 1024;
/// Request timeout for `invoke`.
const INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "guardian", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the capability guardian HTTP server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Capability key administration.
    Capability {
        /// Selected capability subcommand.
        #[command(subcommand)]
        command: CapabilityCommand,
    },
    /// Secret envelope utilities.
    Envelope {
        /// Selected envelope subcommand.
        #[command(subcommand)]
        command: EnvelopeCommand,
    },
    /// Seal an operation and send it to a running guardian.
    Invoke(InvokeCommand),
}

/// Shared config path argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to guardian.toml or `GUARDIAN_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a guardian configuration file.
    Validate(ConfigArgs),
    /// Print a canonical example configuration.
    Example,
}

/// Capability subcommands.
#[derive(Subcommand, Debug)]
enum CapabilityCommand {
    /// Mint a fresh key for an identity.
    Mint(CapabilityIdentityCommand),
    /// Revoke the key of an identity (sqlite stores only).
    Revoke(CapabilityIdentityCommand),
    /// List identities with keys (sqlite stores only).
    List(ConfigArgs),
}

/// Arguments naming one identity in the configured store.
#[derive(Args, Debug)]
struct CapabilityIdentityCommand {
    /// Config selecting the capability store.
    #[command(flatten)]
    config: ConfigArgs,
    /// Minted identity.
    #[arg(long, value_name = "IDENTITY")]
    identity: String,
}

/// Envelope subcommands.
#[derive(Subcommand, Debug)]
enum EnvelopeCommand {
    /// Print a sealed capability request.
    Seal(OperationArgs),
}

/// Arguments describing one sealed operation.
#[derive(Args, Debug, Clone)]
struct OperationArgs {
    /// Capability key (base64).
    #[arg(long, value_name = "BASE64")]
    key: String,
    /// Minted identity owning the key.
    #[arg(long, value_name = "IDENTITY")]
    identity: String,
    /// Operation name.
    #[arg(long, value_name = "NAME")]
    method: String,
    /// Operation parameters as a JSON object.
    #[arg(long, value_name = "JSON")]
    params: Option<String>,
    /// Optional caller nonce.
    #[arg(long, value_name = "NONCE")]
    nonce: Option<String>,
}

/// Configuration for the `invoke` command.
#[derive(Args, Debug)]
struct InvokeCommand {
    /// Guardian base URL (for example `http://127.0.0.1:8080`).
    #[arg(long, value_name = "URL")]
    url: String,
    /// Operation to seal and send.
    #[command(flatten)]
    operation: OperationArgs,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("guardian {version}"))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        write_stdout_line("usage: guardian <serve|config|capability|envelope|invoke> --help")?;
        return Ok(ExitCode::SUCCESS);
    };
    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Capability {
            command,
        } => command_capability(command),
        Commands::Envelope {
            command,
        } => command_envelope(&command),
        Commands::Invoke(command) => command_invoke(command).await,
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let server = tokio::task::spawn_blocking(move || GuardianServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("guardian listening on {}", server.bind_addr()))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(args) => {
            let config = load_config(args.config.as_deref())?;
            let module = config.operations_module().unwrap_or_default();
            write_stdout_line(&format!("config ok (operations module: {module})"))?;
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<GuardianConfig> {
    GuardianConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

// ============================================================================
// SECTION: Capability Commands
// ============================================================================

/// Dispatches capability subcommands.
fn command_capability(command: CapabilityCommand) -> CliResult<ExitCode> {
    match command {
        CapabilityCommand::Mint(command) => {
            let config = load_config(command.config.config.as_deref())?;
            let identity = parse_identity(&command.identity)?;
            let (key, persisted) = match open_sqlite_store(&config)? {
                Some(store) => {
                    let key = store
                        .mint(&identity)
                        .map_err(|err| CliError::new(format!("mint failed: {err}")))?;
                    (key, true)
                }
                None => (CapabilityKey::generate(), false),
            };
            if !persisted {
                write_stderr_line(
                    "memory store: add this key under [[capability_store.keys]] to use it",
                )?;
            }
            write_json(&minted_key_document(&identity, &key, persisted))?;
            Ok(ExitCode::SUCCESS)
        }
        CapabilityCommand::Revoke(command) => {
            let config = load_config(command.config.config.as_deref())?;
            let identity = parse_identity(&command.identity)?;
            let store = require_sqlite_store(&config)?;
            let revoked = store
                .revoke(&identity)
                .map_err(|err| CliError::new(format!("revoke failed: {err}")))?;
            write_json(&json!({ "identity": identity.as_str(), "revoked": revoked }))?;
            Ok(ExitCode::SUCCESS)
        }
        CapabilityCommand::List(args) => {
            let config = load_config(args.config.as_deref())?;
            let store = require_sqlite_store(&config)?;
            let identities = store
                .identities()
                .map_err(|err| CliError::new(format!("list failed: {err}")))?;
            let names: Vec<&str> = identities.iter().map(MintedIdentity::as_str).collect();
            write_json(&json!({ "identities": names }))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Opens the configured sqlite store, or returns `None` for memory stores.
fn open_sqlite_store(config: &GuardianConfig) -> CliResult<Option<SqliteCapabilityStore>> {
    if config.capability_store.store_type != CapabilityStoreType::Sqlite {
        return Ok(None);
    }
    let sqlite_config = config
        .capability_store
        .sqlite_config()
        .ok_or_else(|| CliError::new("sqlite capability_store requires path".to_string()))?;
    SqliteCapabilityStore::new(&sqlite_config)
        .map(Some)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))
}

/// Opens the configured sqlite store, failing for memory stores.
fn require_sqlite_store(config: &GuardianConfig) -> CliResult<SqliteCapabilityStore> {
    open_sqlite_store(config)?.ok_or_else(|| {
        CliError::new("command requires capability_store.type = \"sqlite\"".to_string())
    })
}

/// Builds the output document for a minted key.
fn minted_key_document(identity: &MintedIdentity, key: &CapabilityKey, persisted: bool) -> Value {
    json!({
        "identity": identity.as_str(),
        "key": key.to_base64(),
        "persisted": persisted,
    })
}

// ============================================================================
// SECTION: Envelope Commands
// ============================================================================

/// Dispatches envelope subcommands.
fn command_envelope(command: &EnvelopeCommand) -> CliResult<ExitCode> {
    match command {
        EnvelopeCommand::Seal(args) => {
            let request = build_request(args)?;
            write_json(&request)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Seals the operation described by `args` into a capability request.
fn build_request(args: &OperationArgs) -> CliResult<Value> {
    let key = CapabilityKey::from_base64(args.key.trim())
        .map_err(|err| CliError::new(format!("invalid key: {err}")))?;
    let identity = parse_identity(&args.identity)?;
    let parameters = parse_params(args.params.as_deref())?;
    let mut operation = Map::new();
    if let Some(nonce) = &args.nonce {
        operation.insert("nonce".to_string(), Value::String(nonce.clone()));
    }
    operation.insert("method_name".to_string(), Value::String(args.method.clone()));
    operation.insert("parameters".to_string(), Value::Object(parameters));
    let envelope = AeadSecretChannel
        .seal(&key, &Value::Object(operation))
        .map_err(|err| CliError::new(format!("seal failed: {err}")))?;
    Ok(json!({
        "minted_identity": identity.as_str(),
        "operation": envelope,
    }))
}

/// Parses `--params` as a JSON object; absent means empty.
fn parse_params(raw: Option<&str>) -> CliResult<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    if raw.len() > MAX_PARAMS_BYTES {
        return Err(CliError::new(format!("--params exceeds {MAX_PARAMS_BYTES} bytes")));
    }
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CliError::new("--params must be a JSON object".to_string())),
        Err(err) => Err(CliError::new(format!("--params is not valid JSON: {err}"))),
    }
}

/// Parses a non-empty identity.
fn parse_identity(raw: &str) -> CliResult<MintedIdentity> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::new("--identity must be non-empty".to_string()));
    }
    Ok(MintedIdentity::new(trimmed))
}

// ============================================================================
// SECTION: Invoke Command
// ============================================================================

/// Executes the `invoke` command.
async fn command_invoke(command: InvokeCommand) -> CliResult<ExitCode> {
    let request = build_request(&command.operation)?;
    let body = serde_json::to_vec(&request)
        .map_err(|err| CliError::new(format!("request encoding failed: {err}")))?;
    let url = process_capability_url(&command.url);
    let client = Client::builder()
        .redirect(Policy::none())
        .timeout(INVOKE_TIMEOUT)
        .build()
        .map_err(|err| CliError::new(format!("http client init failed: {err}")))?;
    let response = client
        .post(&url)
        .body(body)
        .send()
        .await
        .map_err(|err| CliError::new(format!("request to {url} failed: {err}")))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| CliError::new(format!("response read failed: {err}")))?;
    if !status.is_success() {
        let message = String::from_utf8_lossy(&bytes);
        return Err(CliError::new(format!("guardian returned {status}: {message}")));
    }
    let mut output = bytes.to_vec();
    output.push(b'\n');
    write_stdout_bytes(&output)?;
    Ok(ExitCode::SUCCESS)
}

/// Appends the capability route to a base URL unless already present.
fn process_capability_url(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.ends_with(PROCESS_CAPABILITY_ROUTE) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{PROCESS_CAPABILITY_ROUTE}")
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes pretty JSON to stdout.
fn write_json(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("output encoding failed: {err}")))?;
    write_stdout_line(&rendered)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| output_error("stdout", &err))
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes).map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}").map_err(|err| output_error("stderr", &err))
}

/// Formats an output error.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = writeln!(std::io::stderr(), "{message}");
    ExitCode::FAILURE
}
