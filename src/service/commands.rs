use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::mnk_game::prelude::*;

/// Schema row for one externally callable command.
pub struct CommandSpec {
    pub name: &'static str,
    pub params: &'static [&'static str],
}

/// The whole command surface as an explicit table. Dispatch consults this
/// before touching a handler, so there is no way to reach code that is
/// not declared here.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "create", params: &["ruleSetId"] },
    CommandSpec { name: "join", params: &["gameId"] },
    CommandSpec { name: "leave", params: &["gameId"] },
    CommandSpec { name: "addCpuPlayer", params: &["gameId"] },
    CommandSpec { name: "cpuBattle", params: &["ruleSetId"] },
    CommandSpec { name: "move", params: &["gameId", "x", "y"] },
    CommandSpec { name: "status", params: &["gameId", "turn"] },
    CommandSpec { name: "list", params: &["mode"] },
    CommandSpec { name: "getPlayerInfo", params: &[] },
    CommandSpec { name: "changeNickname", params: &["name"] },
    CommandSpec { name: "createRuleSet", params: &["name", "m", "n", "k", "p", "q", "numPlayers"] },
    CommandSpec { name: "getRuleSets", params: &[] },
    CommandSpec { name: "register", params: &["nickname", "password"] },
    CommandSpec { name: "logIn", params: &["nickname", "password"] },
    CommandSpec { name: "logOut", params: &[] },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// The self-description payload: command name to parameter names.
pub fn listing() -> Value {
    let mut out = Map::new();
    for spec in COMMANDS {
        let params = spec.params.iter().map(|p| Value::String((*p).to_owned())).collect();
        out.insert(spec.name.to_owned(), Value::Array(params));
    }
    Value::Object(out)
}

/// Pulls a required argument out of a request's argument map.
pub fn require<T: DeserializeOwned>(args: &Map<String, Value>, name: &str) -> Result<T> {
    match args.get(name) {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| Error::InvalidArgument(format!("malformed argument {name}"))),
        None => Err(Error::InvalidArgument(format!("missing argument {name}"))),
    }
}

/// Pulls an optional argument, substituting `default` when absent or null.
pub fn optional<T: DeserializeOwned>(args: &Map<String, Value>, name: &str, default: T) -> Result<T> {
    maybe(args, name).map(|value| value.unwrap_or(default))
}

/// Pulls an optional argument with no default.
pub fn maybe<T: DeserializeOwned>(args: &Map<String, Value>, name: &str) -> Result<Option<T>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| Error::InvalidArgument(format!("malformed argument {name}"))),
    }
}
