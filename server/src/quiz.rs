//! Arithmetic quiz rounds
//!
//! Every tick grades the answers submitted for the round that just ended and
//! opens a new one. A puzzle is `a + b + c * d = r` with exactly one of the
//! five slots replaced by `?`.

use crate::client_manager::ClientManager;
use crate::protocol::Action;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ServerMessage, OPERAND_MAX, OPERAND_MIN};

pub const SLOT_COUNT: usize = 5;

const OPERATORS: [&str; 4] = ["+", "+", "*", "="];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    /// a, b, c, d and the result
    values: [u32; SLOT_COUNT],
    masked_slot: usize,
}

impl Puzzle {
    /// Builds the puzzle for the given operands, hiding `masked_slot`
    /// (0..=3 for an operand, 4 for the result).
    pub fn new(operands: [u32; 4], masked_slot: usize) -> Option<Self> {
        if masked_slot >= SLOT_COUNT {
            return None;
        }

        let [a, b, c, d] = operands;
        Some(Self {
            values: [a, b, c, d, a + b + c * d],
            masked_slot,
        })
    }

    /// Draws four operands uniformly from `OPERAND_MIN..=OPERAND_MAX` and a
    /// uniformly random slot to hide.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut operands = [0u32; 4];
        for operand in &mut operands {
            *operand = rng.gen_range(OPERAND_MIN..=OPERAND_MAX);
        }
        let [a, b, c, d] = operands;

        Self {
            values: [a, b, c, d, a + b + c * d],
            masked_slot: rng.gen_range(0..SLOT_COUNT),
        }
    }

    pub fn operands(&self) -> [u32; 4] {
        [self.values[0], self.values[1], self.values[2], self.values[3]]
    }

    pub fn result(&self) -> u32 {
        self.values[4]
    }

    pub fn masked_slot(&self) -> usize {
        self.masked_slot
    }

    /// Decimal value of the hidden slot
    pub fn answer(&self) -> String {
        self.values[self.masked_slot].to_string()
    }

    /// Renders the question, e.g. `5 + 3 + ? * 2 = 22`
    pub fn question(&self) -> String {
        let mut question = String::new();
        for (slot, value) in self.values.iter().enumerate() {
            if slot == self.masked_slot {
                question.push('?');
            } else {
                question.push_str(&value.to_string());
            }

            if let Some(operator) = OPERATORS.get(slot) {
                question.push(' ');
                question.push_str(operator);
                question.push(' ');
            }
        }
        question
    }
}

/// A puzzle that has been sent to clients
#[derive(Debug, Clone)]
pub struct Round {
    pub number: u64,
    pub puzzle: Puzzle,
    /// Fixed when the round opens
    pub answer: String,
}

/// Drives quiz rounds on behalf of the server's coordinator loop
pub struct QuizMaster {
    rng: StdRng,
    current: Option<Round>,
    rounds_started: u64,
}

impl QuizMaster {
    /// Creates a quiz master, optionally with a fixed seed for reproducible
    /// puzzles.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            rng,
            current: None,
            rounds_started: 0,
        }
    }

    /// The round currently waiting for answers, if any has been opened
    pub fn current(&self) -> Option<&Round> {
        self.current.as_ref()
    }

    /// Grades the open round, then opens a new random one
    pub fn tick(&mut self, clients: &mut ClientManager) -> Vec<Action> {
        let puzzle = Puzzle::generate(&mut self.rng);
        self.advance(puzzle, clients)
    }

    /// Same as [`QuizMaster::tick`] with a caller-chosen puzzle
    pub fn advance(&mut self, puzzle: Puzzle, clients: &mut ClientManager) -> Vec<Action> {
        let mut actions = self.grade(clients);
        actions.push(self.open_round(puzzle, clients));
        actions
    }

    /// Produces one `result` per session that was sent the open round's
    /// question, then clears every stored answer.
    ///
    /// Does nothing before the first round has been opened.
    pub fn grade(&self, clients: &mut ClientManager) -> Vec<Action> {
        let Some(round) = &self.current else {
            return Vec::new();
        };

        let mut actions = Vec::new();
        let mut correct = 0;
        for session in clients.sessions_mut() {
            if session.seen_round == Some(round.number) {
                let result = session.last_answer.as_deref() == Some(round.answer.as_str());
                if result {
                    correct += 1;
                }
                actions.push(Action::SendTo {
                    client_id: session.id,
                    message: ServerMessage::Result { result },
                });
            }
            session.last_answer = None;
        }

        info!(
            "Round {} graded: {}/{} correct",
            round.number,
            correct,
            actions.len()
        );
        actions
    }

    fn open_round(&mut self, puzzle: Puzzle, clients: &mut ClientManager) -> Action {
        self.rounds_started += 1;
        let round = Round {
            number: self.rounds_started,
            answer: puzzle.answer(),
            puzzle,
        };

        for session in clients.sessions_mut() {
            session.seen_round = Some(round.number);
        }

        let question = round.puzzle.question();
        info!("Round {} started: {}", round.number, question);
        debug!("Round {} expects '{}'", round.number, round.answer);

        self.current = Some(round);
        Action::Broadcast {
            message: ServerMessage::QuestionArrive { question },
            exclude: None,
        }
    }
}
