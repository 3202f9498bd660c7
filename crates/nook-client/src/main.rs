//! Command-line client for a nook server.

use clap::{Parser, Subcommand};

use nook_client::Client;

/// Nook — tiny chat over HTTP.
#[derive(Parser)]
#[command(name = "nook", version, about)]
struct Cli {
    /// Base URL of the nook server.
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a room.
    Send {
        #[arg(long, default_value = "general")]
        room: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        message: String,
    },
    /// List messages in a room, oldest first.
    List {
        #[arg(long, default_value = "general")]
        room: String,
    },
    /// List available rooms.
    Rooms,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.url)?;

    match cli.command {
        Commands::Send {
            room,
            user,
            message,
        } => {
            client.send_message(&room, &user, &message).await?;
            println!("Message sent");
        }
        Commands::List { room } => {
            for msg in client.get_messages(&room).await? {
                println!(
                    "[{}] {}: {}",
                    msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    msg.user,
                    msg.content
                );
            }
        }
        Commands::Rooms => {
            println!("Available rooms:");
            for room in client.get_rooms().await? {
                println!("  - {}", room.name);
            }
        }
    }

    Ok(())
}
