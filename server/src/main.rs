use arena_server::config::{parse_spawn_point, spawn_ring, ArenaConfig};
use arena_server::network::Server;
use arena_shared::Vec3;
use clap::Parser;
use log::{error, info};
use std::net::SocketAddr;

/// Authoritative server for the dash arena
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
    /// Tick interval (ms)
    #[arg(short, long, default_value = "33")]
    tick_rate_ms: u64,
    /// Maximum number of connected clients
    #[arg(short, long, default_value = "8")]
    max_clients: usize,
    /// Silence before a client is dropped (ms)
    #[arg(long, default_value = "5000")]
    client_timeout_ms: u64,
    /// Score that wins the round
    #[arg(short, long, default_value = "3")]
    win_score: u32,
    /// Delay between round end and the next round (ms)
    #[arg(long, default_value = "5000")]
    restart_delay_ms: u64,
    /// Full dash cooldown (ms)
    #[arg(long, default_value = "1500")]
    dash_cooldown_ms: u64,
    /// Part of the cooldown in which a dash scores hits (ms)
    #[arg(long, default_value = "400")]
    dash_performing_ms: u64,
    /// Impulse applied by a dash
    #[arg(long, default_value = "12.0")]
    dash_power: f32,
    /// Post-hit invincibility (ms)
    #[arg(long, default_value = "2000")]
    invincibility_ms: u64,
    #[arg(long, default_value = "6.0")]
    moving_speed: f32,
    /// Degrees per second
    #[arg(long, default_value = "720.0")]
    rotation_speed: f32,
    /// Spawn point as x,y,z; repeat for more. Defaults to a ring of eight.
    #[arg(long = "spawn-point", value_parser = parse_spawn_point)]
    spawn_points: Vec<Vec3>,
    /// Only accept contact reports from this address
    #[arg(long)]
    physics_addr: Option<SocketAddr>,
}

impl Args {
    fn arena_config(&self) -> ArenaConfig {
        let spawn_points = if self.spawn_points.is_empty() {
            spawn_ring(8, 10.0)
        } else {
            self.spawn_points.clone()
        };

        ArenaConfig {
            win_score: self.win_score,
            restart_delay_ms: self.restart_delay_ms,
            dash_cooldown_ms: self.dash_cooldown_ms,
            dash_performing_ms: self.dash_performing_ms,
            dash_power: self.dash_power,
            invincibility_ms: self.invincibility_ms,
            moving_speed: self.moving_speed,
            rotation_speed: self.rotation_speed,
            spawn_points,
            tick_interval_ms: self.tick_rate_ms,
            max_clients: self.max_clients,
            client_timeout_ms: self.client_timeout_ms,
            physics_addr: self.physics_addr,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.arena_config();
    config.validate()?;

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting arena server on {} with {}ms ticks (win score {}, {} spawn points)",
        address,
        config.tick_interval_ms,
        config.win_score,
        config.spawn_points.len()
    );

    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
