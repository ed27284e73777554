//! Plays one game of Kutob with scripted bots.
//!
//! Everything runs in-process: in-memory store, broadcast hub and presence
//! map. Phase countdowns are compressed so a whole game takes seconds.
//! Every room broadcast (countdown ticks aside) is printed as the JSON
//! frame a client would receive.
//!
//! ```text
//! cargo run -p village-sim
//! RUST_LOG=kutob_engine=debug cargo run -p village-sim
//! ```

use std::time::Duration;

use kutob::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

type Server = GameServer<InMemoryStore, BroadcastHub, PresenceMap>;

const VILLAGERS: [&str; 7] = [
    "amihan", "bayani", "dalisay", "habagat", "ligaya", "mayumi", "tala",
];

const SEED: u64 = 2024;

/// Nights after which the demo gives up and aborts.
const MAX_NIGHTS: u32 = 12;

#[tokio::main]
async fn main() -> Result<(), KutobError> {
    kutob::init_tracing("info");

    let server = GameServer::builder()
        .engine_config(EngineConfig {
            timings: PhaseTimings::uniform(3),
            tick_interval_ms: 100,
            rng_seed: Some(SEED),
            ..EngineConfig::default()
        })
        .build_in_memory();

    let code = RoomCode::new("BARYO1");
    let owner = Username::new(VILLAGERS[0]);
    server
        .store()
        .create_room(code.clone(), owner, VILLAGERS.len())
        .await?;
    for name in &VILLAGERS[1..] {
        server.store().join(&code, Username::new(*name)).await?;
    }

    // Bots subscribe before the start so nobody misses their role.
    for (i, name) in VILLAGERS.iter().enumerate() {
        let me = Username::new(*name);
        let rx = server
            .broadcaster()
            .subscribe(&Topic::player(&me, &code))
            .await;
        tokio::spawn(night_bot(server.clone(), code.clone(), me, rx, SEED + i as u64));
    }
    let mut room_rx = server.broadcaster().subscribe(&Topic::room(&code)).await;

    server.start_game(&code).await?;
    let outcome = narrate(&server, &code, &mut room_rx).await?;
    tracing::info!(room = %code, %outcome, "demo finished");

    server.close_room(&code).await;
    server.broadcaster().close_room(&code).await;
    Ok(())
}

/// Prints room broadcasts and casts the village's votes until the game
/// ends. Returns a one-line summary.
async fn narrate(
    server: &Server,
    code: &RoomCode,
    room_rx: &mut Receiver<GameEvent>,
) -> Result<String, KutobError> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut phase = Phase::Lobby;

    loop {
        let event = match room_rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "narrator fell behind");
                continue;
            }
            Err(RecvError::Closed) => return Ok("room closed".into()),
        };

        if !matches!(event, GameEvent::Countdown { .. }) {
            let frame = server.codec().encode(&event)?;
            println!("{}", String::from_utf8_lossy(&frame));
        }

        match event {
            GameEvent::NextPhase { phase: next } => phase = next,
            GameEvent::NightCount { count } if count > MAX_NIGHTS => {
                server.abort_game(code).await?;
            }
            GameEvent::AlivePlayersList { player_list } if phase == Phase::Voting => {
                cast_votes(server, code, &player_list, &mut rng).await;
            }
            GameEvent::AnnounceWinners { winners } => {
                return Ok(format!("{winners} win"));
            }
            GameEvent::GameAborted { message } => return Ok(message),
            _ => {}
        }
    }
}

/// Every living player votes for someone else at random.
async fn cast_votes(server: &Server, code: &RoomCode, alive: &[Username], rng: &mut StdRng) {
    for voter in alive {
        let others: Vec<&Username> = alive.iter().filter(|u| *u != voter).collect();
        let Some(target) = others.choose(rng) else {
            continue;
        };
        if let Err(err) = server.vote(code, voter.clone(), (*target).clone()).await {
            tracing::warn!(%voter, %err, "vote refused");
        }
    }
}

/// Listens on one player's private topic and plays their night turns.
async fn night_bot(
    server: Server,
    code: RoomCode,
    me: Username,
    mut rx: Receiver<GameEvent>,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    loop {
        match rx.recv().await {
            Ok(GameEvent::RoleShow { role }) => {
                tracing::info!(player = %me, %role, "role dealt");
            }
            Ok(GameEvent::PlayerSelectTarget { role, targets }) => {
                let Some(target) = targets.choose(&mut rng).cloned() else {
                    continue;
                };
                // Give the narrator a moment to print the turn.
                tokio::time::sleep(Duration::from_millis(150)).await;
                if let Err(err) = server.select_target(&code, me.clone(), role, target).await {
                    tracing::warn!(player = %me, %err, "night action refused");
                }
            }
            Ok(GameEvent::GuessPicked { message, .. }) => {
                tracing::info!(player = %me, %message, "seer vision");
            }
            Ok(GameEvent::TurnSkipped { message }) => {
                tracing::info!(player = %me, %message, "turn skipped");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}
