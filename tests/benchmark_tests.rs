//! Performance benchmarks for the hot paths of the chat server

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::client_manager::{ClientManager, Outgoing};
use server::quiz::{Puzzle, QuizMaster};
use shared::{encode_frame, ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Benchmarks puzzle generation and rendering
#[test]
fn benchmark_puzzle_generation() {
    let mut rng = StdRng::seed_from_u64(42);
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let puzzle = Puzzle::generate(&mut rng);
        let _ = puzzle.question();
        let _ = puzzle.answer();
    }

    let duration = start.elapsed();
    println!(
        "Puzzle generation: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks inbound frame parsing
#[test]
fn benchmark_client_message_parsing() {
    let frames = [
        r#"{"type":"login","username":"Alice"}"#,
        r#"{"type":"message","text":"hello everyone, how is the quiz going?"}"#,
        r#"{"type":"answer","answer":"42"}"#,
        r#"{"type":"bogus"}"#,
    ];

    let iterations = 50_000;
    let start = Instant::now();

    for i in 0..iterations {
        let _ = ClientMessage::parse(frames[i % frames.len()]);
    }

    let duration = start.elapsed();
    println!(
        "Client message parsing: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks outbound frame encoding
#[test]
fn benchmark_server_message_encoding() {
    let message = ServerMessage::Message {
        text: "hello everyone, how is the quiz going?".to_string(),
        sender: "Alice".to_string(),
    };

    let iterations = 50_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = encode_frame(&message);
    }

    let duration = start.elapsed();
    println!(
        "Server message encoding: {} iterations in {:?}",
        iterations, duration
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks broadcast fan-out and quiz ticks with many sessions
#[test]
fn benchmark_broadcast_fan_out() {
    let addr: SocketAddr = "127.0.0.1:1967".parse().unwrap();
    let session_count = 200;
    let mut clients = ClientManager::new(session_count);
    let mut receivers: Vec<mpsc::UnboundedReceiver<Outgoing>> = Vec::new();

    for _ in 0..session_count {
        let (tx, rx) = mpsc::unbounded_channel();
        clients.add_client(addr, tx).unwrap();
        receivers.push(rx);
    }

    let message = ServerMessage::Message {
        text: "ping".to_string(),
        sender: "Alice".to_string(),
    };

    let broadcasts = 200;
    let start = Instant::now();

    for _ in 0..broadcasts {
        assert_eq!(clients.broadcast(&message, Some(1)), session_count - 1);
    }

    let mut quiz = QuizMaster::new(Some(7));
    for _ in 0..50 {
        quiz.tick(&mut clients);
    }

    let duration = start.elapsed();
    println!(
        "Broadcast: {} messages to {} sessions plus 50 quiz ticks in {:?}",
        broadcasts, session_count, duration
    );

    for rx in &mut receivers {
        while rx.try_recv().is_ok() {}
    }

    assert!(duration.as_millis() < 3000);
}
