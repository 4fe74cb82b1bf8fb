//! NCLink CLI - ground-station link for telemetry and flight commands.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::signal;

use nclink::cli::*;
use nclink::command::{CommandDispatcher, PositionTarget};
use nclink::config::{init_logging, Config, LoggingConfig};
use nclink::error::{CommandError, Result};
use nclink::protocol::{FuncCode, Message, StreamFramer};
use nclink::transport::{PortConfig, TransportConfig, UdpTransport};
use nclink::{PortRole, VERSION};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_config = LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.format.as_str().to_string(),
        color: !cli.no_color,
    };
    init_logging(&log_config)?;

    // Load config if specified
    let mut config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };
    config.apply_env_overrides()?;

    match cli.command {
        Commands::Listen(args) => run_listen(args, config).await,
        Commands::Send(args) => run_send(args, config).await,
        Commands::Decode(args) => run_decode(&args, &config),
        Commands::Config(args) => run_config(&args),
    }
}

/// Print decoded messages until Ctrl-C
async fn run_listen(args: ListenArgs, mut config: Config) -> Result<()> {
    if !args.port.is_empty() {
        config.transport.ports = args.port;
    }
    config.validate()?;

    let json = args.json;
    let transport = UdpTransport::new(
        config.transport,
        config.protocol,
        config.target,
        move |msg: Message| print_message(&msg, json),
    );
    transport.start().await?;

    if !json {
        println!("{} {}", "NCLink".bright_white().bold(), VERSION.dimmed());
        for (role, addr) in transport.local_addrs() {
            println!("  {} {} ({})", "●".green(), addr, role.to_string().cyan());
        }
        println!("{}", "Press Ctrl-C to stop".dimmed());
    }

    signal::ctrl_c().await?;
    transport.stop().await;

    if json {
        let stats = serde_json::to_string(&transport.stats()).map_err(anyhow::Error::from)?;
        println!("{stats}");
    } else {
        println!();
        println!("{}", "Framing statistics:".bright_white().bold());
        for port in transport.stats() {
            println!(
                "  {:>5} {:<17} datagrams {:>7}  frames {:>7}  checksum {:>4}  discarded {:>7}",
                port.port,
                port.role.to_string(),
                port.datagrams,
                port.framer.frames,
                port.framer.checksum_failures,
                port.framer.discarded_bytes,
            );
        }
    }
    Ok(())
}

/// Send one command from an ephemeral socket
async fn run_send(args: SendArgs, mut config: Config) -> Result<()> {
    if let Some(ref target) = args.target {
        let (host, port) = parse_target(target).map_err(CommandError::InvalidArgument)?;
        config.target.host = host;
        if let Some(port) = port {
            config.target.command_port = port;
        }
    }

    let transport = Arc::new(UdpTransport::new(
        TransportConfig::with_ports([PortConfig::with_role(0, PortRole::CommandResponse)]),
        config.protocol.clone(),
        config.target.clone(),
        |_: Message| {},
    ));
    transport.start().await?;
    let dispatcher = CommandDispatcher::new(transport.clone(), config.command.clone());

    let result = tokio::select! {
        result = send_action(&dispatcher, &args.action) => result,
        _ = signal::ctrl_c() => {
            transport.stop().await;
            Err(CommandError::Cancelled { sent: 0 }.into())
        }
    };
    transport.stop().await;
    result?;

    println!(
        "{} sent to {}",
        "✓".green(),
        format!("{}:{}", config.target.host, config.target.command_port).cyan()
    );
    Ok(())
}

async fn send_action(dispatcher: &CommandDispatcher, action: &SendAction) -> Result<()> {
    if let Some(command) = action.discrete() {
        return dispatcher.send_discrete(command).await;
    }
    match action {
        SendAction::CmdIdx { index } => {
            let sent = dispatcher.send_indexed(*index).await?;
            println!("  {} datagrams", sent.to_string().bright_white());
            Ok(())
        }
        SendAction::Mission { id, value } => dispatcher.send_mission(*id, *value).await,
        SendAction::SetPid { gains } => {
            dispatcher
                .set_parameters(gains.iter().map(|(name, value)| (name.as_str(), *value)))
                .await
        }
        SendAction::Goto { x, y, z, speed } => {
            let target = PositionTarget::new(*x, *y, *z)
                .with_speed(speed.unwrap_or(dispatcher.config().cruise_speed));
            dispatcher.goto(target).await
        }
        SendAction::Waypoints { points, speed } => dispatcher.upload_waypoints(points, *speed).await,
        _ => Ok(()),
    }
}

/// Decode hex bytes offline
fn run_decode(args: &DecodeArgs, config: &Config) -> Result<()> {
    let text: String = args.hex.concat().chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&text).map_err(|e| CommandError::InvalidArgument(format!("hex: {e}")))?;

    let mut framer = StreamFramer::new(args.role, config.protocol.clone());
    let messages = framer.feed(&bytes);
    for msg in &messages {
        print_message(msg, args.json);
    }

    if messages.is_empty() && !args.json {
        println!(
            "{} no complete frame ({} bytes buffered, {} discarded)",
            "!".yellow(),
            framer.buffered(),
            framer.stats().discarded_bytes
        );
    }
    Ok(())
}

/// Show example configuration
fn run_config(args: &ConfigArgs) -> Result<()> {
    let config = Config::example();

    if let Some(ref path) = args.output {
        config.save(path)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            path.display()
        );
    } else {
        let output = toml::to_string_pretty(&config).map_err(anyhow::Error::from)?;
        println!("{output}");
    }

    Ok(())
}

fn print_message(msg: &Message, json: bool) {
    if json {
        match serde_json::to_string(msg) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("{} {e}", "serialize:".red()),
        }
        return;
    }

    let check = if msg.checksum_valid {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{} {} {} {}",
        check,
        format!("[{}]", msg.role).dimmed(),
        msg.kind.name().cyan().bold(),
        FuncCode(msg.func_code).to_string().dimmed(),
    );
    if let Ok(body) = serde_json::to_string(&msg.payload) {
        println!("    {body}");
    }
    for warning in &msg.warnings {
        println!("    {} {warning:?}", "warning:".yellow());
    }
}
