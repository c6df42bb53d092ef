use clap::{Parser, Subcommand};

/// `Studentio` - launch-data verification and streamed chat turns.
#[derive(Parser, Debug)]
#[command(name = "studentio")]
#[command(version = "0.1.0")]
#[command(about = "Tutoring assistant core: signed launch data and streamed replies.", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify signed launch data handed over by the host
    Verify {
        /// Raw query-string encoded launch data
        #[arg(long)]
        init_data: String,

        /// Bot token (defaults to STUDENTIO_BOT_TOKEN or [launch] bot_token)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Produce signed launch data the way a host would
    Sign {
        /// Field as key=value, repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Bot token (defaults to STUDENTIO_BOT_TOKEN or [launch] bot_token)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Stream one assistant reply to a message
    Chat {
        /// User message
        #[arg(short, long)]
        message: String,

        /// Optional system prompt placed before the message
        #[arg(long)]
        system: Option<String>,

        /// Stream endpoint (overrides [stream] endpoint)
        #[arg(long)]
        endpoint: Option<String>,

        /// Model name forwarded to the endpoint
        #[arg(long)]
        model: Option<String>,
    },

    /// Run the HTTP gateway (demo stream + launch verification)
    Serve {
        /// Bind host (overrides [gateway] host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides [gateway] port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err("field name must not be empty".into());
    }
    Ok((key.to_string(), value.to_string()))
}
