use arena_shared::{Delta, Packet, Vec3, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use bincode::{deserialize, serialize};
use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};

/// Headless client that joins the arena, wanders and dashes, and prints the
/// replicated deltas it receives
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Display name to join with
    #[arg(short, long)]
    name: Option<String>,
    /// How long to play before disconnecting (seconds)
    #[arg(short, long, default_value = "30")]
    duration: u64,
    /// Time between dash attempts (ms)
    #[arg(long, default_value = "2000")]
    dash_interval: u64,
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Bot socket bound to {}", socket.local_addr()?);

    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        display_name: args.name.clone(),
    };
    println!("Sending connection request to {}", args.server);
    send(&socket, &connect, args.server).await?;

    let mut rng = rand::thread_rng();
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let mut last_seq: u64 = 0;
    let mut synced = false;
    let mut sequence: u32 = 0;
    let mut heading: f32 = rng.gen_range(0.0..std::f32::consts::TAU);

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut move_timer = interval(Duration::from_millis(250));
    let mut dash_timer = interval(Duration::from_millis(args.dash_interval.max(1)));
    let mut heartbeat_timer = interval(Duration::from_secs(1));

    while Instant::now() < deadline {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                let packet = match deserialize::<Packet>(&buf[0..len]) {
                    Ok(packet) => packet,
                    Err(e) => {
                        println!("Failed to deserialize packet: {}", e);
                        continue;
                    }
                };

                match packet {
                    Packet::Connected { connection_id } => {
                        println!("Connected as connection {}", connection_id);
                    }
                    Packet::Welcome { participant, roster, round, as_of_seq, .. } => {
                        println!(
                            "Welcome at seq {}: {} in arena, round {:?}, playing as {:?}",
                            as_of_seq,
                            roster.len(),
                            round.phase,
                            participant.map(|p| p.display_name)
                        );
                        last_seq = as_of_seq;
                        synced = true;
                    }
                    Packet::Delta { seq, delta } => {
                        if !synced || seq <= last_seq {
                            continue;
                        }
                        if seq != last_seq + 1 {
                            println!("Missed deltas {}..{}, requesting resync", last_seq + 1, seq);
                            synced = false;
                            send(&socket, &Packet::ResyncRequest, args.server).await?;
                            continue;
                        }
                        last_seq = seq;
                        print_delta(seq, &delta);
                    }
                    Packet::Motion(_) => {}
                    Packet::Disconnected { reason } => {
                        println!("Disconnected by server: {}", reason);
                        return Ok(());
                    }
                    other => println!("Unexpected packet: {:?}", other),
                }
            }

            _ = move_timer.tick() => {
                heading += rng.gen_range(-0.5..0.5);
                sequence += 1;
                let direction = Vec3::new(heading.sin(), 0.0, heading.cos());
                send(&socket, &Packet::Move { sequence, direction }, args.server).await?;
            }

            _ = dash_timer.tick() => {
                sequence += 1;
                let direction = Vec3::new(heading.sin(), 0.0, heading.cos());
                send(&socket, &Packet::Dash { sequence, direction }, args.server).await?;
            }

            _ = heartbeat_timer.tick() => {
                send(&socket, &Packet::Heartbeat, args.server).await?;
            }
        }
    }

    println!("Sending disconnect request");
    send(&socket, &Packet::Disconnect, args.server).await?;
    println!("Bot finished");

    Ok(())
}

fn print_delta(seq: u64, delta: &Delta) {
    match delta {
        Delta::ParticipantJoined(info) => {
            println!("[{}] {} joined (id {})", seq, info.display_name, info.id)
        }
        Delta::ParticipantLeft { id } => println!("[{}] participant {} left", seq, id),
        Delta::ParticipantReplaced {
            connection,
            participant,
            ..
        } => println!(
            "[{}] connection {} respawned as {}",
            seq, connection, participant.id
        ),
        Delta::ScoreChanged { id, new_score } => {
            println!("[{}] participant {} scored ({})", seq, id, new_score)
        }
        Delta::RoundEnded {
            winner_name,
            winner_score,
            restart_delay_ms,
            ..
        } => println!(
            "[{}] {} won with {} points, next round in {}ms",
            seq, winner_name, winner_score, restart_delay_ms
        ),
        Delta::RoundStarted => println!("[{}] round started", seq),
        other => println!("[{}] {:?}", seq, other),
    }
}
