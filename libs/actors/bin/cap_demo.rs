//! Demo network: one echo actor, a few request/reply rounds, then shutdown
//!
//! Usage:
//!   cap-demo --rounds 3
//!   cap-demo --config config/network.toml --log-level debug

use anyhow::{Context, Result};
use cap_actors::{
    decode_proto, ActorBehavior, ActorConnector, ActorContext, ActorNetwork, LocalActor, ProtoMessage,
};
use cap_config::{load_config, TERMINATE_MSG_TYPE, TEXT_MSG_TYPE};
use cap_transport::Envelope;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cap-demo")]
#[command(about = "Run a small actor network and exchange a few requests")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Request/reply round trips to perform
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    from: String,
    round: u32,
}

impl ProtoMessage for Greeting {
    const MSG_TYPE: &'static str = "Greeting";
}

/// Answers pings with their payload and greetings with a text line
struct Echo {
    handled: u64,
}

impl ActorBehavior for Echo {
    fn on_txt_msg(&mut self, ctx: &ActorContext<'_>, text: &str, msg: &Envelope) -> bool {
        self.handled += 1;
        info!(agent = ctx.agent_name(), text, "Echo got text");
        if let Err(e) = ctx.reply(msg, TEXT_MSG_TYPE, text.as_bytes().to_vec()) {
            warn!(agent = ctx.agent_name(), error = %e, "Failed to echo text");
        }
        true
    }

    fn on_stop(&mut self, ctx: &ActorContext<'_>) {
        info!(agent = ctx.agent_name(), handled = self.handled, "Echo stopping");
    }

    fn on_bin_msg(&mut self, ctx: &ActorContext<'_>, msg: &Envelope) -> bool {
        self.handled += 1;
        let answered = match msg.msg_type.as_str() {
            "Ping" => ctx.reply(msg, "Pong", msg.payload.clone()),
            Greeting::MSG_TYPE => match decode_proto::<Greeting>(&msg.payload) {
                Ok(greeting) => {
                    let line = format!("hello {}, round {}", greeting.from, greeting.round);
                    ctx.reply(msg, TEXT_MSG_TYPE, line.into_bytes())
                }
                Err(e) => {
                    warn!(agent = ctx.agent_name(), error = %e, "Undecodable greeting");
                    Ok(false)
                }
            },
            other => {
                warn!(agent = ctx.agent_name(), msg_type = other, "Unhandled message type");
                Ok(false)
            }
        };
        if let Err(e) = answered {
            error!(agent = ctx.agent_name(), error = %e, "Reply failed");
        }
        true
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = load_config(args.config.as_deref()).context("Failed to load network configuration")?;
    let attempts = config.connector.num_attempts;
    info!(network = %config.network.name, endpoint = %config.broker.endpoint, "Starting CAP demo");

    let mut network = ActorNetwork::from_config(config);
    network.register(LocalActor::new("echo", Echo { handled: 0 }));
    network.connect();
    info!(broker = network.has_broker(), "Network connected");

    let echo = network
        .lookup_actor("echo")
        .context("echo actor missing from the network")?;
    echo.send_txt_msg("demo starting")?;

    for round in 1..=args.rounds {
        let payload = format!("ping #{round}");
        match echo.send_recv_msg("Ping", payload.as_bytes(), attempts)? {
            Some(reply) => info!(round, reply = ?reply.payload_str(), "Ping answered"),
            None => warn!(round, "Ping went unanswered"),
        }

        let greeting = Greeting {
            from: "cap-demo".to_string(),
            round,
        };
        match echo.send_recv_proto_msg(&greeting, attempts)? {
            Some(reply) => info!(round, reply = ?reply.payload_str(), "Greeting answered"),
            None => warn!(round, "Greeting went unanswered"),
        }
    }
    echo.close();

    let termination = network.lookup_termination();
    termination.send_bin_msg(TERMINATE_MSG_TYPE, &[])?;
    termination.close();

    network.disconnect();
    info!("CAP demo finished");
    Ok(())
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
