use thiserror::Error;

/// The result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Player is already in the game.")]
    AlreadySeated,

    #[error("Game is full.")]
    GameFull,

    #[error("Game is not accepting new players.")]
    NotAccepting,
}

#[derive(Error, Debug)]
pub enum LeaveError {
    #[error("Player is not in the game.")]
    NotSeated,

    #[error("Cannot leave a game that has already been completed.")]
    Completed,
}

#[derive(Error, Debug)]
pub enum MoveError {
    #[error("Player is not in the game.")]
    NotInGame,

    #[error("Game is not in play.")]
    NotPlaying,

    #[error("It is not the player's turn.")]
    NotYourTurn,

    #[error("Invalid stone position.")]
    InvalidPosition,
}

#[derive(Error, Debug)]
pub enum AbortError {
    #[error("Cannot abort a game that has already been completed.")]
    Completed,
}

#[derive(Error, Debug)]
pub enum CpuError {
    #[error("Cannot move before being assigned a seat.")]
    NoSeat,

    #[error("No legal move is available.")]
    NoMove,
}

#[derive(Error, Debug)]
pub enum LogInError {
    #[error("Invalid nickname or password.")]
    BadCredentials,
}

#[derive(Error, Debug)]
pub enum RegisterError {
    #[error("Could not use nickname ({0})")]
    BadNickname(PlayerNameError),

    #[error("Password should be at least 4 characters long.")]
    PasswordTooShort,
}

#[derive(Error, Debug)]
pub enum PlayerNameError {
    #[error("{0} is a reserved nickname.")]
    Reserved(String),

    #[error(
        "Nickname should start with a letter, followed by letters and/or digits, \
         optionally with dashes, periods, underscores or spaces inbetween."
    )]
    Malformed,

    #[error("Nickname should be at least three characters long.")]
    TooShort,

    #[error("Nickname must not be any longer than 20 characters.")]
    TooLong,

    #[error("Nickname is already in use.")]
    Taken,
}

/// Top-level error of the core. The facade serializes `kind()` as the wire
/// `type` field and the display impl as the `message` field.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Join(#[from] JoinError),

    #[error(transparent)]
    Leave(#[from] LeaveError),

    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Abort(#[from] AbortError),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error(transparent)]
    LogIn(#[from] LogInError),

    #[error(transparent)]
    Register(#[from] RegisterError),

    #[error(transparent)]
    PlayerName(#[from] PlayerNameError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotSupported(String),

    #[error("The entity was modified concurrently; retry the command.")]
    ConcurrentUpdate,
}

impl Error {
    /// The wire name for the error family.
    pub fn kind(&self) -> &'static str {
        match self {
            | Error::Join(_) => "JoinError",
            | Error::Leave(_) => "LeaveError",
            | Error::Move(_) => "MoveError",
            | Error::Abort(_) => "AbortError",
            | Error::Cpu(_) => "CpuError",
            | Error::LogIn(_) => "LogInError",
            | Error::Register(_) => "RegisterError",
            | Error::PlayerName(_) => "PlayerNameError",
            | Error::InvalidArgument(_) => "InvalidArgument",
            | Error::NotSupported(_) => "NotSupported",
            | Error::ConcurrentUpdate => "ConcurrentUpdate",
        }
    }
}
