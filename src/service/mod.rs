mod commands;
mod context;
mod options;
mod store;

use std::collections::HashSet;
use std::io::BufRead;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub use commands::{COMMANDS, CommandSpec};
pub use context::RequestContext;
pub use options::ServerOptions;
pub use store::{Store, Version};

use crate::agent::Strategist;
use crate::mnk_game::prelude::*;
use commands::{listing, lookup, maybe, optional, require};
use context::{clear_session_cookie, session_cookie};

/// One request line of the external dispatch layer: a command name, its
/// named arguments, and whatever the session/identity collaborators know
/// about the caller.
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    cmd: String,
    #[serde(default)]
    args: Map<String, Value>,
    session: Option<String>,
    user: Option<String>,
    #[serde(rename = "logUrl")]
    log_url: Option<String>,
}

/// The working copies one command mutates. Everything is persisted at the
/// end in the fixed order players, rule set, game; the first stale write
/// fails the command with `ConcurrentUpdate` and nothing after it runs.
struct Workspace {
    game_id: GameId,
    game: Game,
    game_version: Version,
    rules: RuleSet,
    rules_version: Version,
    roster: Vec<(PlayerId, Player, Version)>,
    completed: bool,
}

/// The service facade: resolves the caller, translates externally supplied
/// commands into operations on the core, runs the CPU opponents, and wraps
/// every result into a JSON envelope.
pub struct GameService {
    store: Store,
    strategist: Strategist,
    rng: Mutex<StdRng>,
}

impl GameService {
    pub fn new(options: &ServerOptions) -> GameService {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        GameService {
            store: Store::new(),
            strategist: Strategist::new(options.cleverness),
            rng: Mutex::new(rng),
        }
    }

    /// Serves the line protocol: one JSON request per stdin line, one JSON
    /// envelope per stdout line, until the stream closes.
    pub fn run(&self) -> Result<()> {
        for line in std::io::stdin().lock().lines() {
            let line =
                line.map_err(|e| Error::InvalidArgument(format!("broken input stream: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            println!("{}", self.serve_line(&line));
        }
        Ok(())
    }

    /// Handles one request line and produces one envelope.
    pub fn serve_line(&self, line: &str) -> Value {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("unparseable request: {e}");
                return json!({
                    "status": "error",
                    "response": {
                        "type": "InvalidArgument",
                        "message": "request is not a JSON command object",
                    },
                });
            }
        };

        let mut ctx = RequestContext {
            user: request.user.map(Identity::new),
            session: request.session,
            log_url: request.log_url,
            set_cookie: None,
        };
        let mut envelope = self.dispatch(&mut ctx, &request.cmd, &request.args);
        if let Some(cookie) = ctx.set_cookie {
            envelope["set_cookie"] = Value::String(cookie);
        }
        envelope
    }

    /// Runs a command and wraps the outcome. An empty command returns the
    /// registry listing, mirroring the surface's self-description.
    pub fn dispatch(&self, ctx: &mut RequestContext, cmd: &str, args: &Map<String, Value>) -> Value {
        if cmd.is_empty() {
            return json!({ "status": "list", "response": listing() });
        }
        match self.handle(ctx, cmd, args) {
            Ok(response) => {
                log::debug!("command {cmd} completed");
                json!({ "status": "success", "response": response })
            }
            Err(err) => {
                log::warn!("command {cmd} failed: {err}");
                json!({
                    "status": "error",
                    "response": { "type": err.kind(), "message": err.to_string() },
                })
            }
        }
    }

    fn handle(&self, ctx: &mut RequestContext, cmd: &str, args: &Map<String, Value>) -> Result<Value> {
        if lookup(cmd).is_none() {
            return Err(Error::InvalidArgument(format!("unknown command {cmd}")));
        }
        match cmd {
            | "create" => self.create(ctx, require(args, "ruleSetId")?),
            | "join" => self.join(ctx, require(args, "gameId")?),
            | "leave" => self.leave(ctx, require(args, "gameId")?),
            | "addCpuPlayer" => self.add_cpu_player(ctx, require(args, "gameId")?),
            | "cpuBattle" => self.cpu_battle(ctx, require(args, "ruleSetId")?),
            | "move" => {
                self.make_move(ctx, require(args, "gameId")?, require(args, "x")?, require(args, "y")?)
            }
            | "status" => self.status(ctx, require(args, "gameId")?, maybe(args, "turn")?),
            | "list" => self.list(ctx, require(args, "mode")?),
            | "getPlayerInfo" => self.get_player_info(ctx),
            | "changeNickname" => self.change_nickname(ctx, require(args, "name")?),
            | "createRuleSet" => self.create_rule_set(ctx, args),
            | "getRuleSets" => self.get_rule_sets(),
            | "register" => {
                self.register(ctx, require(args, "nickname")?, require(args, "password")?)
            }
            | "logIn" => self.log_in(ctx, require(args, "nickname")?, require(args, "password")?),
            | "logOut" => self.log_out(ctx),
            | _ => unreachable!("the registry covers every dispatched command"),
        }
    }

    // caller resolution

    /// Resolves the caller to a player row: an authenticated identity
    /// first (created with its default nickname on first sight), then an
    /// unexpired session token, and finally a freshly minted anonymous
    /// player carrying a new week-long session.
    fn current_player(&self, ctx: &mut RequestContext) -> Result<(PlayerId, Player, Version)> {
        let now = Utc::now();

        if let Some(user) = ctx.user.clone() {
            if let Some(row) = self.store.find_player(|_, p| p.user == user) {
                return Ok(row);
            }
            let player = Player::new(user.clone(), user.default_nickname());
            let (id, version) = self.store.insert_player(player.clone());
            log::info!("created player {id} for identity {}", user.as_str());
            return Ok((id, player, version));
        }

        if let Some(token) = ctx.session.clone() {
            if let Some(row) = self.store.find_player(|_, p| p.session_matches(&token, now)) {
                return Ok(row);
            }
        }

        let mut player = Player::new(Identity::anonymous(), ANONYMOUS_NICKNAME);
        {
            let mut rng = self.rng.lock().unwrap();
            player.start_session(&mut *rng, now);
        }
        ctx.session = player.session.clone();
        ctx.set_cookie =
            Some(session_cookie(player.session.as_deref().unwrap(), player.expires.unwrap()));
        let (id, version) = self.store.insert_player(player.clone());
        Ok((id, player, version))
    }

    // game commands

    fn create(&self, ctx: &mut RequestContext, rule_set_id: RuleSetId) -> Result<Value> {
        let (player_id, player, _) = self.current_player(ctx)?;
        let (rules, _) = self.store.rule_set(rule_set_id)?;

        let mut game = Game::new(rule_set_id, &rules, Utc::now());
        {
            let mut rng = self.rng.lock().unwrap();
            game.add_player(player_id, &player.nickname, &rules, &mut *rng)?;
        }
        let (game_id, _) = self.store.insert_game(game);
        log::info!("player {player_id} created game {game_id} under rule set {rule_set_id}");
        Ok(json!(game_id))
    }

    fn join(&self, ctx: &mut RequestContext, game_id: GameId) -> Result<Value> {
        let (player_id, player, _) = self.current_player(ctx)?;
        let (mut game, game_version) = self.store.game(game_id)?;
        let (rules, rules_version) = self.store.rule_set(game.rule_set)?;

        {
            let mut rng = self.rng.lock().unwrap();
            game.add_player(player_id, &player.nickname, &rules, &mut *rng)?;
        }

        // The final seat may have started the game with a CPU first to act.
        let roster = self.load_roster(&game.players)?;
        let mut ws =
            Workspace { game_id, game, game_version, rules, rules_version, roster, completed: false };
        self.run_cpu(&mut ws)?;
        let game = self.persist(ws)?;
        Ok(self.status_payload(&game, player_id))
    }

    fn leave(&self, ctx: &mut RequestContext, game_id: GameId) -> Result<Value> {
        let (player_id, _, _) = self.current_player(ctx)?;
        let (mut game, version) = self.store.game(game_id)?;

        let roster = self.load_roster(&game.players)?;
        let cpu_seats: HashSet<PlayerId> =
            roster.iter().filter(|(_, p, _)| p.is_cpu()).map(|(id, _, _)| *id).collect();

        match game.remove_player(player_id, |id| cpu_seats.contains(&id))? {
            LeaveOutcome::Deleted => {
                log::info!("game {game_id} emptied of humans; deleting");
                self.store.delete_game(game_id);
            }
            LeaveOutcome::Left | LeaveOutcome::Aborted => {
                game.touch(Utc::now());
                self.store.put_game(game_id, game, version)?;
            }
        }
        Ok(Value::Null)
    }

    fn add_cpu_player(&self, ctx: &mut RequestContext, game_id: GameId) -> Result<Value> {
        let (player_id, _, _) = self.current_player(ctx)?;
        let (mut game, game_version) = self.store.game(game_id)?;
        if game.seat_of(player_id).is_none() {
            return Err(Error::InvalidArgument(
                "only a seated player can add a CPU opponent".into(),
            ));
        }
        let (rules, rules_version) = self.store.rule_set(game.rule_set)?;

        let cpu_id = self.recruit_cpu(&game);
        {
            let mut rng = self.rng.lock().unwrap();
            game.add_player(cpu_id, CPU_NICKNAME, &rules, &mut *rng)?;
        }

        let roster = self.load_roster(&game.players)?;
        let mut ws =
            Workspace { game_id, game, game_version, rules, rules_version, roster, completed: false };
        self.run_cpu(&mut ws)?;
        let game = self.persist(ws)?;
        Ok(self.status_payload(&game, player_id))
    }

    fn cpu_battle(&self, ctx: &mut RequestContext, rule_set_id: RuleSetId) -> Result<Value> {
        let _ = self.current_player(ctx)?;
        let (rules, _) = self.store.rule_set(rule_set_id)?;

        let mut game = Game::new(rule_set_id, &rules, Utc::now());
        for _ in 0..rules.num_players {
            let cpu_id = self.recruit_cpu(&game);
            let mut rng = self.rng.lock().unwrap();
            game.add_player(cpu_id, CPU_NICKNAME, &rules, &mut *rng)?;
        }
        let (game_id, _) = self.store.insert_game(game);

        // An all-CPU table plays itself out before the id is returned;
        // the loop is bounded by the board area.
        let mut ws = self.load_workspace(game_id)?;
        self.run_cpu(&mut ws)?;
        self.persist(ws)?;
        log::info!("cpu battle {game_id} complete");
        Ok(json!(game_id))
    }

    fn make_move(&self, ctx: &mut RequestContext, game_id: GameId, x: i32, y: i32) -> Result<Value> {
        let (player_id, _, _) = self.current_player(ctx)?;
        let mut ws = self.load_workspace(game_id)?;
        self.advance(&mut ws, player_id, Coord::new(x, y))?;
        self.run_cpu(&mut ws)?;
        let game = self.persist(ws)?;
        Ok(self.status_payload(&game, player_id))
    }

    fn status(&self, ctx: &mut RequestContext, game_id: GameId, turn: Option<i32>) -> Result<Value> {
        let (player_id, _, _) = self.current_player(ctx)?;
        let (game, _) = self.store.game(game_id)?;

        // A caller already holding the current turn gets a cheap "nothing
        // changed" answer instead of the whole status object.
        if turn == Some(game.turn) {
            return Ok(Value::Bool(false));
        }
        Ok(self.status_payload(&game, player_id))
    }

    fn list(&self, ctx: &mut RequestContext, mode: String) -> Result<Value> {
        let (player_id, _, _) = self.current_player(ctx)?;
        if !matches!(mode.as_str(), "play" | "view" | "past") {
            return Err(Error::InvalidArgument(format!("unknown list mode {mode}")));
        }

        self.sweep(Utc::now());

        let mut games = self.store.games_snapshot();
        games.sort_by(|a, b| b.1.last_update.cmp(&a.1.last_update));

        let summaries: Vec<Value> = games
            .into_iter()
            .filter(|(_, game, _)| match mode.as_str() {
                | "play" => {
                    game.state == GameState::Waiting
                        || (game.state == GameState::Playing && game.seat_of(player_id).is_some())
                }
                | "view" => game.state == GameState::Playing,
                | _ => game.state.is_terminal(),
            })
            .take(MAX_LISTED_GAMES)
            .map(|(id, game, _)| {
                json!({
                    "id": id,
                    "players": game.player_names,
                    "state": game.state,
                    "turn": game.turn,
                    "rule_set_id": game.rule_set,
                })
            })
            .collect();
        Ok(Value::Array(summaries))
    }

    // player commands

    fn get_player_info(&self, ctx: &mut RequestContext) -> Result<Value> {
        let (_, player, _) = self.current_player(ctx)?;
        Ok(self.player_info(&player, ctx))
    }

    fn change_nickname(&self, ctx: &mut RequestContext, name: String) -> Result<Value> {
        let (player_id, mut player, version) = self.current_player(ctx)?;
        if name == player.nickname {
            return Ok(self.player_info(&player, ctx));
        }

        // Reserved names stay reserved, except for the identity they belong to.
        if !(name == ANONYMOUS_NICKNAME && player.is_anonymous()) {
            Player::validate_nickname(&name)?;
            if self.store.find_player(|id, p| id != player_id && p.nickname == name).is_some() {
                return Err(PlayerNameError::Taken.into());
            }
        }

        player.nickname = name.clone();
        self.store.put_player(player_id, player.clone(), version)?;

        // Rewrite the nickname cache of every game the player sits in, or
        // older games would keep showing the old name. Slow on big stores.
        for (id, mut game, game_version) in self.store.games_snapshot() {
            if game.seat_of(player_id).is_some() {
                game.update_player_name(player_id, &name);
                if self.store.put_game(id, game, game_version).is_err() {
                    log::warn!("nickname propagation to game {id} lost a concurrent update");
                }
            }
        }

        Ok(self.player_info(&player, ctx))
    }

    fn register(&self, ctx: &mut RequestContext, nickname: String, password: String) -> Result<Value> {
        Player::validate_nickname(&nickname).map_err(RegisterError::BadNickname)?;
        if self.store.find_player(|_, p| p.nickname == nickname).is_some() {
            return Err(RegisterError::BadNickname(PlayerNameError::Taken).into());
        }
        if password.chars().count() < 4 {
            return Err(RegisterError::PasswordTooShort.into());
        }

        let mut player = Player::new(Identity::registered(), &nickname);
        player.password = Some(Player::hash_password(&password));
        self.open_session(ctx, &mut player);
        let (id, _) = self.store.insert_player(player.clone());
        log::info!("registered player {id} ({nickname})");
        Ok(self.player_info(&player, ctx))
    }

    fn log_in(&self, ctx: &mut RequestContext, nickname: String, password: String) -> Result<Value> {
        // One generic error for every mismatch; a failed login must not
        // reveal which part of the credentials was wrong.
        let (id, mut player, version) = self
            .store
            .find_player(|_, p| p.nickname == nickname)
            .ok_or(LogInError::BadCredentials)?;
        if !player.is_registered() {
            return Err(LogInError::BadCredentials.into());
        }
        if player.password.as_deref() != Some(Player::hash_password(&password).as_str()) {
            return Err(LogInError::BadCredentials.into());
        }

        self.open_session(ctx, &mut player);
        self.store.put_player(id, player.clone(), version)?;
        Ok(self.player_info(&player, ctx))
    }

    fn log_out(&self, ctx: &mut RequestContext) -> Result<Value> {
        let (id, mut player, version) = self.current_player(ctx)?;
        player.end_session();
        self.store.put_player(id, player, version)?;
        ctx.session = None;
        ctx.set_cookie = Some(clear_session_cookie());
        Ok(Value::Null)
    }

    // rule set commands

    fn create_rule_set(&self, ctx: &mut RequestContext, args: &Map<String, Value>) -> Result<Value> {
        let _ = self.current_player(ctx)?;
        let rules = RuleSet::new(
            &require::<String>(args, "name")?,
            require(args, "m")?,
            require(args, "n")?,
            require(args, "k")?,
            optional(args, "p", 1)?,
            optional(args, "q", 1)?,
            optional(args, "numPlayers", 2)?,
        )?;
        let (id, _) = self.store.insert_rule_set(rules);
        Ok(json!(id))
    }

    fn get_rule_sets(&self) -> Result<Value> {
        let summaries: Vec<Value> = self
            .store
            .rule_sets_snapshot()
            .into_iter()
            .map(|(id, rules)| {
                json!({
                    "id": id,
                    "name": rules.name,
                    "num_players": rules.num_players,
                    "num_games": rules.num_games,
                    "m": rules.m,
                    "n": rules.n,
                    "k": rules.k,
                    "p": rules.p,
                    "q": rules.q,
                })
            })
            .collect();
        Ok(Value::Array(summaries))
    }

    // internals

    fn load_roster(&self, ids: &[PlayerId]) -> Result<Vec<(PlayerId, Player, Version)>> {
        let mut roster = vec![];
        for &id in ids {
            let (player, version) = self.store.player(id)?;
            roster.push((id, player, version));
        }
        Ok(roster)
    }

    fn load_workspace(&self, game_id: GameId) -> Result<Workspace> {
        let (game, game_version) = self.store.game(game_id)?;
        let (rules, rules_version) = self.store.rule_set(game.rule_set)?;
        let roster = self.load_roster(&game.players)?;
        Ok(Workspace { game_id, game, game_version, rules, rules_version, roster, completed: false })
    }

    /// Commits one move and applies its effects to the working copies: the
    /// mover's win and everyone else's loss, or a draw all round, plus the
    /// rule set's completed-games counter.
    fn advance(&self, ws: &mut Workspace, mover: PlayerId, at: Coord) -> Result<()> {
        match ws.game.play(mover, at, &ws.rules)? {
            MoveOutcome::Won => {
                for (id, player, _) in ws.roster.iter_mut() {
                    if *id == mover {
                        player.wins += 1;
                    } else {
                        player.losses += 1;
                    }
                }
                ws.rules.num_games += 1;
                ws.completed = true;
            }
            MoveOutcome::Drawn => {
                for (_, player, _) in ws.roster.iter_mut() {
                    player.draws += 1;
                }
                ws.rules.num_games += 1;
                ws.completed = true;
            }
            MoveOutcome::Placed => {}
        }
        Ok(())
    }

    /// While the player to act is a CPU, the strategist takes the turn
    /// through the same arbitration path as a human. Terminates because
    /// every committed move grows `turn` toward the board area.
    fn run_cpu(&self, ws: &mut Workspace) -> Result<()> {
        while ws.game.state == GameState::Playing {
            let seat = ws.game.current_player;
            let id = ws.game.players[seat as usize - 1];
            let Some((_, player, _)) = ws.roster.iter().find(|(pid, _, _)| *pid == id) else {
                break;
            };
            if !player.is_cpu() {
                break;
            }

            let turn = ws.game.turn;
            let at = {
                let mut rng = self.rng.lock().unwrap();
                let board = ws.game.board(&ws.rules)?;
                self.strategist.choose(board, seat, &ws.rules, turn, &mut *rng)?
            };
            log::debug!("cpu seat {seat} of game {} plays ({}, {})", ws.game_id, at.x, at.y);
            self.advance(ws, id, at)?;
        }
        Ok(())
    }

    /// Writes the command's working copies back in the fixed order
    /// players, rule set, game. Rating counters only change on completed
    /// games, so untouched rows are skipped entirely.
    fn persist(&self, ws: Workspace) -> Result<Game> {
        let Workspace { game_id, mut game, game_version, rules, rules_version, roster, completed } =
            ws;

        if completed {
            for (id, player, version) in roster {
                self.store.put_player(id, player, version)?;
            }
            self.store.put_rule_set(game.rule_set, rules, rules_version)?;
        }

        game.touch(Utc::now());
        let snapshot = game.clone();
        self.store.put_game(game_id, game, game_version)?;
        Ok(snapshot)
    }

    /// Picks a CPU player not already seated in the game, growing the pool
    /// when every existing CPU is busy.
    fn recruit_cpu(&self, game: &Game) -> PlayerId {
        if let Some((id, _, _)) =
            self.store.find_player(|id, p| p.is_cpu() && game.seat_of(id).is_none())
        {
            return id;
        }
        let (id, _) = self.store.insert_player(Player::new(Identity::cpu(), CPU_NICKNAME));
        id
    }

    /// Aborts at most one stale game per listing, spreading the cleanup
    /// cost across requests. A lost race just means another request swept
    /// it first.
    fn sweep(&self, now: DateTime<Utc>) {
        let stale = self.store.games_snapshot().into_iter().find(|(_, g, _)| g.is_stale(now));
        let Some((id, mut game, version)) = stale else {
            return;
        };

        log::info!("sweeping stale game {id}");
        match game.abort() {
            Ok(AbortOutcome::Deleted) => self.store.delete_game(id),
            Ok(AbortOutcome::Aborted) => {
                game.touch(now);
                if self.store.put_game(id, game, version).is_err() {
                    log::debug!("stale game {id} changed under the sweep; skipping");
                }
            }
            Err(_) => {}
        }
    }

    fn status_payload(&self, game: &Game, caller: PlayerId) -> Value {
        json!({
            "players": game.player_names,
            "board": game.data,
            "playing_as": game.seat_of(caller).unwrap_or(0),
            "current_player": game.current_player,
            "state": game.state,
            "turn": game.turn,
            "rule_set_id": game.rule_set,
        })
    }

    fn player_info(&self, player: &Player, ctx: &RequestContext) -> Value {
        json!({
            "nickname": player.nickname,
            "anonymous": player.is_anonymous(),
            "logUrl": ctx.log_url,
            "wins": player.wins,
            "losses": player.losses,
            "draws": player.draws,
        })
    }

    fn open_session(&self, ctx: &mut RequestContext, player: &mut Player) {
        {
            let mut rng = self.rng.lock().unwrap();
            player.start_session(&mut *rng, Utc::now());
        }
        ctx.session = player.session.clone();
        ctx.set_cookie =
            Some(session_cookie(player.session.as_deref().unwrap(), player.expires.unwrap()));
    }
}
