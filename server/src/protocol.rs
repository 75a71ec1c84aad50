//! Login / chat / answer state machine
//!
//! Handlers never touch the network. They update the registry and return the
//! [`Action`]s that should follow, which [`dispatch`] then delivers.

use crate::client_manager::ClientManager;
use log::{debug, info};
use shared::{simplify_whitespace, ClientMessage, ServerMessage, DUPLICATE_USERNAME};

/// Outbound work produced by the protocol handler and the quiz scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendTo {
        client_id: u32,
        message: ServerMessage,
    },
    Broadcast {
        message: ServerMessage,
        exclude: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingLogin,
    LoggedIn,
}

/// Current protocol state of a session, or None if it is not registered
pub fn session_state(clients: &ClientManager, client_id: u32) -> Option<SessionState> {
    clients.get(&client_id).map(|session| {
        if session.is_logged_in() {
            SessionState::LoggedIn
        } else {
            SessionState::AwaitingLogin
        }
    })
}

/// Interprets one inbound message against the sender's state
pub fn handle_message(
    clients: &mut ClientManager,
    client_id: u32,
    message: ClientMessage,
) -> Vec<Action> {
    match session_state(clients, client_id) {
        Some(SessionState::AwaitingLogin) => handle_logged_out(clients, client_id, message),
        Some(SessionState::LoggedIn) => handle_logged_in(clients, client_id, message),
        None => {
            debug!("Dropping message from unknown client {}", client_id);
            Vec::new()
        }
    }
}

fn handle_logged_out(
    clients: &mut ClientManager,
    client_id: u32,
    message: ClientMessage,
) -> Vec<Action> {
    let username = match message {
        ClientMessage::Login { username } => username,
        other => {
            debug!("Client {} is not logged in, ignoring {:?}", client_id, other);
            return Vec::new();
        }
    };

    let user_name = simplify_whitespace(&username);
    if user_name.is_empty() {
        return Vec::new();
    }

    if clients.is_name_taken(&user_name, Some(client_id)) {
        info!(
            "Client {} login as '{}' rejected: name in use",
            client_id, user_name
        );
        return vec![Action::SendTo {
            client_id,
            message: ServerMessage::login_rejected(DUPLICATE_USERNAME),
        }];
    }

    let Some(session) = clients.get_mut(&client_id) else {
        return Vec::new();
    };
    session.user_name = Some(user_name.clone());
    info!("Client {} logged in as '{}'", client_id, user_name);

    vec![
        Action::SendTo {
            client_id,
            message: ServerMessage::login_accepted(),
        },
        Action::Broadcast {
            message: ServerMessage::NewUser {
                username: user_name,
            },
            exclude: Some(client_id),
        },
    ]
}

fn handle_logged_in(
    clients: &mut ClientManager,
    client_id: u32,
    message: ClientMessage,
) -> Vec<Action> {
    let Some(session) = clients.get_mut(&client_id) else {
        return Vec::new();
    };

    match message {
        ClientMessage::Message { text } => {
            let text = text.trim();
            let Some(sender) = session.user_name.clone() else {
                return Vec::new();
            };
            if text.is_empty() {
                return Vec::new();
            }

            vec![Action::Broadcast {
                message: ServerMessage::Message {
                    text: text.to_string(),
                    sender,
                },
                exclude: Some(client_id),
            }]
        }
        ClientMessage::Answer { answer } => {
            session.last_answer = Some(answer.trim().to_string());
            Vec::new()
        }
        ClientMessage::Login { .. } => {
            debug!("Client {} is already logged in", client_id);
            Vec::new()
        }
    }
}

/// Deregisters a session and announces the departure if it had logged in
pub fn handle_disconnect(clients: &mut ClientManager, client_id: u32) -> Vec<Action> {
    let Some(session) = clients.remove_client(&client_id) else {
        return Vec::new();
    };

    match session.user_name {
        Some(username) => {
            info!("{} disconnected", username);
            vec![Action::Broadcast {
                message: ServerMessage::UserDisconnected { username },
                exclude: None,
            }]
        }
        None => Vec::new(),
    }
}

/// Delivers actions in order through the registry's outbound queues
pub fn dispatch(clients: &ClientManager, actions: Vec<Action>) {
    for action in actions {
        match action {
            Action::SendTo { client_id, message } => {
                clients.send_to(client_id, message);
            }
            Action::Broadcast { message, exclude } => {
                clients.broadcast(&message, exclude);
            }
        }
    }
}
