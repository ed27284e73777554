//! Room controller: one Tokio task per room that owns its countdown.
//!
//! The controller is the only writer of its room. Commands arrive on a
//! bounded mpsc channel and countdown ticks come from [`Countdown`]; both
//! are raced with `tokio::select!`, so actions and disconnects are handled
//! while a phase timer is pending.
//!
//! Every command and every elapsed countdown is one read-modify-write:
//! load the [`Game`], run the [`cycle`](crate::cycle) function, save, and
//! only then flush the [`Outbox`]. A rejected command returns before the
//! save, so it neither mutates nor publishes anything.

use std::sync::Arc;

use kutob_presence::{PresenceStatus, PresenceTracker};
use kutob_protocol::{GameEvent, Role, RoomCode, Topic, Username};
use kutob_tick::{Countdown, CountdownTick};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::cycle::{self, Schedule};
use crate::{Broadcaster, EngineConfig, Game, GameError, Outbox, PlayerQuery, RoomStore, Turn};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Commands sent to a room controller through its channel.
pub(crate) enum RoomCommand {
    Start {
        reply: Reply<()>,
    },
    SelectTarget {
        actor: Username,
        role: Role,
        target: Username,
        reply: Reply<Option<Turn>>,
    },
    Vote {
        voter: Username,
        target: Username,
        reply: Reply<()>,
    },
    Disconnected {
        username: Username,
        reply: Reply<()>,
    },
    Reconnected {
        username: Username,
        reply: Reply<()>,
    },
    Left {
        username: Username,
        reply: Reply<()>,
    },
    Abort {
        reply: Reply<()>,
    },
    Shutdown,
}

impl RoomCommand {
    /// Answers the command with `err` without running it.
    fn reject(self, err: GameError) {
        match self {
            RoomCommand::Start { reply }
            | RoomCommand::Vote { reply, .. }
            | RoomCommand::Disconnected { reply, .. }
            | RoomCommand::Reconnected { reply, .. }
            | RoomCommand::Left { reply, .. }
            | RoomCommand::Abort { reply } => {
                let _ = reply.send(Err(err));
            }
            RoomCommand::SelectTarget { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            RoomCommand::Shutdown => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running room controller.
///
/// Cheap to clone. Every method fails with [`GameError::Unavailable`] once
/// the controller has stopped.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the controller task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| GameError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.code.clone()))?
    }

    /// Deals roles and starts the lobby countdown.
    pub async fn start_game(&self) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Start { reply }).await
    }

    /// Submits a night action. Returns the turn that follows, or `None`
    /// if the night is over.
    pub async fn select_target(
        &self,
        actor: Username,
        role: Role,
        target: Username,
    ) -> Result<Option<Turn>, GameError> {
        self.request(|reply| RoomCommand::SelectTarget {
            actor,
            role,
            target,
            reply,
        })
        .await
    }

    pub async fn vote(&self, voter: Username, target: Username) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Vote {
            voter,
            target,
            reply,
        })
        .await
    }

    /// Marks `username` disconnected and skips their night turn if they
    /// hold it.
    pub async fn player_disconnected(&self, username: Username) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Disconnected { username, reply })
            .await
    }

    /// Marks `username` connected and re-sends their private state.
    pub async fn player_reconnected(&self, username: Username) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Reconnected { username, reply })
            .await
    }

    /// Removes `username` from the room for good.
    pub async fn player_left(&self, username: Username) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Left { username, reply })
            .await
    }

    /// Ends the game early with no winner.
    pub async fn abort_game(&self) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Abort { reply }).await
    }

    /// Stops the controller. Its countdown is dropped with it.
    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| GameError::Unavailable(self.code.clone()))
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// What woke the controller up.
enum Wake {
    Command(Option<RoomCommand>),
    Tick(CountdownTick),
}

/// Ticks between attempts to record a failed game while the store is down.
const FAILURE_RETRY_TICKS: u32 = 5;

struct RoomController<S, B, P> {
    code: RoomCode,
    store: Arc<S>,
    broadcaster: Arc<B>,
    presence: Arc<P>,
    config: Arc<EngineConfig>,
    countdown: Countdown,
    rng: StdRng,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Set while a failed game could not be saved as a tie yet. The
    /// countdown then only paces retries.
    failure: Option<String>,
}

impl<S, B, P> RoomController<S, B, P>
where
    S: RoomStore,
    B: Broadcaster,
    P: PresenceTracker,
{
    async fn run(mut self) {
        tracing::info!(room = %self.code, "room controller started");

        loop {
            let wake = tokio::select! {
                command = self.receiver.recv() => Wake::Command(command),
                tick = self.countdown.wait_for_tick() => Wake::Tick(tick),
            };

            match wake {
                Wake::Command(None) | Wake::Command(Some(RoomCommand::Shutdown)) => break,
                Wake::Command(Some(command)) => self.handle(command).await,
                Wake::Tick(CountdownTick::Remaining(_)) if self.failure.is_some() => {}
                Wake::Tick(CountdownTick::Remaining(seconds)) => {
                    tracing::debug!(room = %self.code, seconds, "countdown");
                    self.broadcaster
                        .publish(
                            &Topic::room(&self.code),
                            GameEvent::Countdown { countdown: seconds },
                        )
                        .await;
                }
                Wake::Tick(CountdownTick::Elapsed) => match self.failure.clone() {
                    Some(reason) => self.fail(&reason).await,
                    None => self.on_elapsed().await,
                },
            }
        }

        tracing::info!(room = %self.code, "room controller stopped");
    }

    async fn handle(&mut self, command: RoomCommand) {
        if self.failure.is_some() {
            command.reject(GameError::Unavailable(self.code.clone()));
            return;
        }

        match command {
            RoomCommand::Start { reply } => {
                let result = self.start_game().await;
                self.answer(reply, result);
            }
            RoomCommand::SelectTarget {
                actor,
                role,
                target,
                reply,
            } => {
                let result = self.select_target(&actor, role, &target).await;
                self.answer(reply, result);
            }
            RoomCommand::Vote {
                voter,
                target,
                reply,
            } => {
                let result = self.vote(&voter, &target).await;
                self.answer(reply, result);
            }
            RoomCommand::Disconnected { username, reply } => {
                let result = self.disconnected(&username).await;
                self.answer(reply, result);
            }
            RoomCommand::Reconnected { username, reply } => {
                let result = self.reconnected(&username).await;
                self.answer(reply, result);
            }
            RoomCommand::Left { username, reply } => {
                let result = self.left(&username).await;
                self.answer(reply, result);
            }
            RoomCommand::Abort { reply } => {
                let result = self.abort().await;
                self.answer(reply, result);
            }
            // Handled by the run loop.
            RoomCommand::Shutdown => {}
        }
    }

    /// Sends `result` back. A room that has disappeared from the store
    /// also stops its controller.
    fn answer<T>(&mut self, reply: Reply<T>, result: Result<T, GameError>) {
        if matches!(result, Err(GameError::RoomNotFound(_))) {
            self.stop();
        }
        let _ = reply.send(result);
    }

    // -- commands ----------------------------------------------------------

    async fn start_game(&mut self) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        let schedule = cycle::start_game(&mut game, &self.config, &mut self.rng, &mut out)?;
        self.commit(&game, out).await?;
        self.apply(schedule);
        Ok(())
    }

    async fn select_target(
        &mut self,
        actor: &Username,
        role: Role,
        target: &Username,
    ) -> Result<Option<Turn>, GameError> {
        let (mut game, mut out) = self.load().await?;
        let result = cycle::submit_action(&mut game, &self.config, actor, role, target, &mut out);
        let schedule = result.inspect_err(|err| {
            tracing::debug!(room = %self.code, player = %actor, %role, %err, "night action rejected");
        })?;
        let schedule = self.pass_disconnected(&mut game, schedule, &mut out).await?;
        self.commit(&game, out).await?;
        self.apply(schedule);
        Ok(cycle::current_turn(&game))
    }

    async fn vote(&mut self, voter: &Username, target: &Username) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        cycle::vote(&mut game, voter, target, &mut out).inspect_err(|err| {
            tracing::debug!(room = %self.code, %voter, %err, "vote rejected");
        })?;
        self.commit(&game, out).await
    }

    async fn disconnected(&mut self, username: &Username) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        if game.player(username).is_none() {
            return Err(GameError::PlayerNotFound(username.clone()));
        }
        self.presence
            .set_status(&self.code, username, PresenceStatus::Disconnected)
            .await?;
        tracing::info!(room = %self.code, player = %username, "player disconnected");

        if let Some(schedule) = cycle::skip_current_turn(&mut game, username, &self.config, &mut out)
        {
            let schedule = self.pass_disconnected(&mut game, schedule, &mut out).await?;
            self.commit(&game, out).await?;
            self.apply(schedule);
        }
        Ok(())
    }

    async fn reconnected(&mut self, username: &Username) -> Result<(), GameError> {
        let (game, mut out) = self.load().await?;
        if game.player(username).is_none() {
            return Err(GameError::PlayerNotFound(username.clone()));
        }
        self.presence
            .set_status(&self.code, username, PresenceStatus::Connected)
            .await?;
        tracing::info!(room = %self.code, player = %username, "player reconnected");

        cycle::resend_private_state(&game, username, &mut out);
        out.flush(self.broadcaster.as_ref()).await;
        Ok(())
    }

    async fn left(&mut self, username: &Username) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        let (player, schedule) = cycle::leave(&mut game, username, &self.config, &mut out)?;
        let schedule = match schedule {
            Some(schedule) => Some(self.pass_disconnected(&mut game, schedule, &mut out).await?),
            None => None,
        };
        self.store.save_player(&player).await?;
        self.commit(&game, out).await?;
        self.presence
            .set_status(&self.code, username, PresenceStatus::Unknown)
            .await?;
        if let Some(schedule) = schedule {
            self.apply(schedule);
        }
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        let schedule = cycle::abort(&mut game, &mut out)?;
        self.commit(&game, out).await?;
        self.apply(schedule);
        Ok(())
    }

    /// Skips night turns handed to players who are already disconnected,
    /// until a connected player holds the turn or the night is over.
    async fn pass_disconnected(
        &self,
        game: &mut Game,
        mut schedule: Schedule,
        out: &mut Outbox,
    ) -> Result<Schedule, GameError> {
        while schedule == Schedule::AwaitActions {
            let Some(actor) = game.room.current_actor.clone() else {
                break;
            };
            let status = self.presence.get_status(&self.code, &actor).await?;
            if status != PresenceStatus::Disconnected {
                break;
            }
            tracing::info!(room = %self.code, player = %actor, "turn passed to a disconnected player");
            match cycle::skip_current_turn(game, &actor, &self.config, out) {
                Some(next) => schedule = next,
                None => break,
            }
        }
        Ok(schedule)
    }

    // -- timer -------------------------------------------------------------

    async fn on_elapsed(&mut self) {
        let (mut game, mut out) = match self.load().await {
            Ok(loaded) => loaded,
            Err(GameError::RoomNotFound(_)) => {
                tracing::debug!(room = %self.code, "room is gone, countdown ignored");
                self.stop();
                return;
            }
            Err(err) => {
                self.fail(&err.to_string()).await;
                return;
            }
        };
        if !game.room.is_running() {
            tracing::debug!(room = %self.code, "game not running, countdown ignored");
            return;
        }

        let schedule = cycle::on_countdown_elapsed(&mut game, &self.config, &mut out);
        let settled = match self.pass_disconnected(&mut game, schedule, &mut out).await {
            Ok(schedule) => self.commit(&game, out).await.map(|()| schedule),
            Err(err) => Err(err),
        };
        match settled {
            Ok(schedule) => self.apply(schedule),
            Err(err) => self.fail(&err.to_string()).await,
        }
    }

    /// Ends the room as a tie after a transition could not be carried out.
    ///
    /// While the store stays unreachable the attempt is repeated every
    /// [`FAILURE_RETRY_TICKS`] ticks, and commands are refused.
    async fn fail(&mut self, reason: &str) {
        self.countdown.cancel();
        match self.record_failure(reason).await {
            Ok(()) => self.failure = None,
            Err(GameError::RoomNotFound(_)) => {
                tracing::debug!(room = %self.code, "room is gone, failure not recorded");
                self.stop();
            }
            Err(err) => {
                tracing::error!(room = %self.code, %err, reason, "could not record failed game, retrying");
                self.failure = Some(reason.to_string());
                self.countdown.start(FAILURE_RETRY_TICKS);
            }
        }
    }

    async fn record_failure(&self, reason: &str) -> Result<(), GameError> {
        let (mut game, mut out) = self.load().await?;
        if !game.room.is_running() {
            return Ok(());
        }
        cycle::fail(&mut game, reason, &mut out);
        self.commit(&game, out).await
    }

    /// Stops taking commands. Queued ones are still answered, then the
    /// run loop ends.
    fn stop(&mut self) {
        self.countdown.cancel();
        self.failure = None;
        self.receiver.close();
        tracing::info!(room = %self.code, "room controller stopping");
    }

    // -- plumbing ----------------------------------------------------------

    async fn load(&self) -> Result<(Game, Outbox), GameError> {
        let room = self
            .store
            .get_room(&self.code)
            .await?
            .ok_or_else(|| GameError::RoomNotFound(self.code.clone()))?;
        let players = self
            .store
            .query_players(&self.code, PlayerQuery::Members)
            .await?;
        Ok((Game::new(room, players), Outbox::new(&self.code)))
    }

    async fn commit(&self, game: &Game, out: Outbox) -> Result<(), GameError> {
        self.store.save_room(&game.room).await?;
        for player in game.players.values() {
            self.store.save_player(player).await?;
        }
        out.flush(self.broadcaster.as_ref()).await;
        Ok(())
    }

    fn apply(&mut self, schedule: Schedule) {
        match schedule {
            Schedule::Countdown(seconds) => self.countdown.start(seconds),
            Schedule::AwaitActions | Schedule::Halt => {
                self.countdown.cancel();
            }
        }
    }
}

/// Spawns a controller for `code` and returns its handle.
pub(crate) fn spawn_room<S, B, P>(
    code: RoomCode,
    store: Arc<S>,
    broadcaster: Arc<B>,
    presence: Arc<P>,
    config: Arc<EngineConfig>,
) -> RoomHandle
where
    S: RoomStore,
    B: Broadcaster,
    P: PresenceTracker,
{
    let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));
    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let controller = RoomController {
        code: code.clone(),
        store,
        broadcaster,
        presence,
        countdown: Countdown::new(config.countdown_config()),
        config,
        rng,
        receiver: rx,
        failure: None,
    };
    tokio::spawn(controller.run());

    RoomHandle { code, sender: tx }
}

// =========================================================================
// Tests
// =========================================================================
