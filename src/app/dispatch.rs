use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result, bail};
use std::time::Duration;
use studentio::Config;
use studentio::security::{LaunchVerifier, extract_user_id, sign_launch_data};
use studentio::stream::{
    ChatMessage, CliTurnSink, SharedTranscript, StreamClient, Transcript, TurnState,
};
use tokio_util::sync::CancellationToken;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Verify { init_data, secret } => run_verify(&config, &init_data, secret),
        Commands::Sign { fields, secret } => run_sign(&config, &fields, secret),
        Commands::Chat {
            message,
            system,
            endpoint,
            model,
        } => run_chat(config, message, system, endpoint, model).await,
        Commands::Serve { host, port } => run_serve(config, host, port).await,
    }
}

// Priority: --secret flag > STUDENTIO_BOT_TOKEN > config file.
fn resolve_secret(flag: Option<String>, config: &Config) -> Result<String> {
    flag.or_else(|| config.launch.bot_token.clone())
        .map(|secret| secret.trim().to_string())
        .filter(|secret| !secret.is_empty())
        .context("no bot token: pass --secret, set STUDENTIO_BOT_TOKEN or [launch] bot_token")
}

fn run_verify(config: &Config, init_data: &str, secret: Option<String>) -> Result<()> {
    let verifier = LaunchVerifier::new(resolve_secret(secret, config)?)
        .with_max_age(Duration::from_secs(config.launch.max_age_secs));

    if !verifier.verify(init_data) {
        println!("verified: false");
        bail!("launch data rejected");
    }

    println!("verified: true");
    if let Some(user_id) = extract_user_id(init_data) {
        println!("user_id: {user_id}");
    }
    Ok(())
}

fn run_sign(config: &Config, fields: &[(String, String)], secret: Option<String>) -> Result<()> {
    let secret = resolve_secret(secret, config)?;
    let signed = sign_launch_data(
        fields.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        &secret,
    )?;
    println!("{signed}");
    Ok(())
}

async fn run_chat(
    config: Config,
    message: String,
    system: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let mut stream_config = config.stream;
    if let Some(endpoint) = endpoint {
        stream_config.endpoint = endpoint;
    }
    if let Some(model) = model {
        stream_config.model = model;
    }
    let client = StreamClient::from_config(&stream_config);

    let mut transcript = Transcript::new();
    if let Some(system) = system {
        transcript.push(ChatMessage::system(system));
    }
    transcript.push(ChatMessage::user(message));
    let transcript = SharedTranscript::new(transcript);

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let report = client
        .run_turn(&transcript, &CliTurnSink::new(), &cancel)
        .await;
    println!("state: {:?}", report.state);

    match report.state {
        TurnState::Failed => bail!(
            "stream failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

async fn run_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    studentio::gateway::run_gateway(&config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
