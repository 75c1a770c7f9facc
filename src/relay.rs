//! Reference match server.
//!
//! One task per participant connection plus one tick loop that owns the match
//! state. Participants send JSON state frames; every tick the loop folds the
//! pending updates into the state and broadcasts a snapshot to everybody.
//! A participant that cannot keep up simply misses snapshots.

use bytes::Bytes;
use futures::SinkExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::lobby_errors::LobbyErr;
use crate::packet::FrameCodec;

pub const TICK_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_MATCH_DURATION: Duration = Duration::from_secs(300);

/// Frames queued per participant before snapshots start being dropped.
const OUTBOX_CAPACITY: usize = 32;

pub type ParticipantId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    pub room_id: u64,
    pub duration: Duration,
    pub tick: Duration,
}

impl RelayConfig {
    /// Parse `<port> <room_id> [<duration_secs>]`.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, LobbyErr> {
        let mut args = args.into_iter();
        let port = parse_arg(args.next(), "port")?;
        let room_id = parse_arg(args.next(), "room_id")?;
        let duration = match args.next() {
            Some(raw) => Duration::from_secs(parse_arg(Some(raw), "duration_secs")?),
            None => DEFAULT_MATCH_DURATION,
        };
        Ok(Self {
            port,
            room_id,
            duration,
            tick: TICK_INTERVAL,
        })
    }
}

fn parse_arg<T: std::str::FromStr>(raw: Option<String>, name: &str) -> Result<T, LobbyErr> {
    let raw = raw.ok_or_else(|| LobbyErr::Internal(format!("missing argument <{}>", name)))?;
    raw.parse()
        .map_err(|_| LobbyErr::Internal(format!("invalid <{}>: {:?}", name, raw)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub ticks: u64,
    pub participants: u64,
}

#[derive(Debug)]
enum MatchEvent {
    Joined {
        pid: ParticipantId,
        outbox: mpsc::Sender<Bytes>,
    },
    State {
        pid: ParticipantId,
        state: Value,
    },
    Left {
        pid: ParticipantId,
    },
}

struct Participant {
    state: Value,
    outbox: mpsc::Sender<Bytes>,
}

/// Run one match on `listener` until the deadline passes or everyone who
/// joined has left again.
pub async fn run_match(listener: TcpListener, config: RelayConfig) -> Result<MatchSummary, LobbyErr> {
    let (events_tx, mut events_rx) = mpsc::channel::<MatchEvent>(256);
    let room_id = config.room_id;

    let acceptor = tokio::spawn(async move {
        let mut next_pid: ParticipantId = 0;
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let pid = next_pid;
                    next_pid += 1;
                    debug!(target: "match", "Participant {} connected from {}", pid, peer);
                    tokio::spawn(handle_participant(socket, pid, room_id, events_tx.clone()));
                }
                Err(err) => warn!(target: "match", "Failed to accept participant: {}", err),
            }
        }
    });

    let deadline = Instant::now() + config.duration;
    let mut interval = tokio::time::interval(config.tick);
    let mut participants: BTreeMap<ParticipantId, Participant> = BTreeMap::new();
    let mut summary = MatchSummary {
        ticks: 0,
        participants: 0,
    };

    loop {
        interval.tick().await;

        while let Ok(event) = events_rx.try_recv() {
            match event {
                MatchEvent::Joined { pid, outbox } => {
                    summary.participants += 1;
                    participants.insert(
                        pid,
                        Participant {
                            state: Value::Null,
                            outbox,
                        },
                    );
                }
                MatchEvent::State { pid, state } => {
                    if let Some(participant) = participants.get_mut(&pid) {
                        participant.state = state;
                    }
                }
                MatchEvent::Left { pid } => {
                    participants.remove(&pid);
                }
            }
        }

        if Instant::now() >= deadline {
            info!(target: "match", "Room {}: deadline reached", room_id);
            break;
        }
        if summary.participants > 0 && participants.is_empty() {
            info!(target: "match", "Room {}: every participant left", room_id);
            break;
        }
        if participants.is_empty() {
            continue;
        }

        summary.ticks += 1;
        let players: BTreeMap<String, &Value> = participants
            .iter()
            .map(|(pid, participant)| (pid.to_string(), &participant.state))
            .collect();
        let snapshot = Bytes::from(serde_json::to_vec(&json!({
            "room_id": room_id,
            "tick": summary.ticks,
            "players": players,
        }))?);

        for participant in participants.values() {
            // A full or closed outbox just misses this snapshot
            let _ = participant.outbox.try_send(snapshot.clone());
        }
    }

    acceptor.abort();
    Ok(summary)
}

async fn handle_participant(
    socket: TcpStream,
    pid: ParticipantId,
    room_id: u64,
    events: mpsc::Sender<MatchEvent>,
) {
    let _ = socket.set_nodelay(true);
    let (read_half, write_half) = socket.into_split();
    let mut reader = FramedRead::new(read_half, FrameCodec::new());
    let mut writer = FramedWrite::new(write_half, FrameCodec::new());

    let (outbox, mut outbox_rx) = mpsc::channel::<Bytes>(OUTBOX_CAPACITY);
    let greeting = json!({"pid": pid, "room_id": room_id}).to_string();
    let _ = outbox.try_send(Bytes::from(greeting));
    if events
        .send(MatchEvent::Joined {
            pid,
            outbox: outbox.clone(),
        })
        .await
        .is_err()
    {
        return;
    }
    drop(outbox);

    tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if writer.send(frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = reader.next().await {
        match serde_json::from_slice::<Value>(&frame) {
            Ok(state) => {
                if events.send(MatchEvent::State { pid, state }).await.is_err() {
                    return;
                }
            }
            Err(err) => debug!(target: "match", "Participant {} sent junk: {}", pid, err),
        }
    }

    debug!(target: "match", "Participant {} left", pid);
    let _ = events.send(MatchEvent::Left { pid }).await;
}
