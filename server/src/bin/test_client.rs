//! Scripted chat client for poking at a running server.
//!
//! Logs in, optionally says something, then prints everything it receives
//! and answers each quiz question it can solve.

use clap::Parser;
use log::{error, info, warn};
use shared::{encode_frame, solve_question, ClientMessage, ServerMessage, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Name to log in with
    #[arg(short = 'n', long, default_value = "bot")]
    name: String,

    /// Chat message to send after logging in
    #[arg(long)]
    say: Option<String>,

    /// Quiz rounds to answer before disconnecting
    #[arg(short = 'r', long, default_value = "3")]
    rounds: u32,
}

async fn send(writer: &mut OwnedWriteHalf, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
    writer.write_all(&encode_frame(message)?).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    send(
        &mut writer,
        &ClientMessage::Login {
            username: args.name.clone(),
        },
    )
    .await?;

    let mut rounds_answered = 0;

    while let Some(line) = lines.next_line().await? {
        let message = match ServerMessage::decode(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unreadable frame: {}", e);
                continue;
            }
        };

        match message {
            ServerMessage::Login { success: true, .. } => {
                info!("Logged in as {}", args.name);
                if let Some(text) = &args.say {
                    send(&mut writer, &ClientMessage::Message { text: text.clone() }).await?;
                }
            }
            ServerMessage::Login { success: false, reason } => {
                error!("Login failed: {}", reason.unwrap_or_default());
                break;
            }
            ServerMessage::NewUser { username } => info!("{} joined", username),
            ServerMessage::UserDisconnected { username } => info!("{} left", username),
            ServerMessage::Message { text, sender } => info!("<{}> {}", sender, text),
            ServerMessage::Result { result } => {
                info!("Last answer was {}", if result { "right" } else { "wrong" });
                if rounds_answered >= args.rounds {
                    break;
                }
            }
            ServerMessage::QuestionArrive { question } => {
                info!("Question: {}", question);
                if let Some(answer) = solve_question(&question) {
                    send(
                        &mut writer,
                        &ClientMessage::Answer {
                            answer: answer.to_string(),
                        },
                    )
                    .await?;
                    rounds_answered += 1;
                }
            }
        }
    }

    info!("Test client finished");
    Ok(())
}
