/// Reserved identity backing every CPU seat.
pub const CPU_USER: &str = "cpu@mnk";

/// Reserved identity backing every unauthenticated session.
pub const ANONYMOUS_USER: &str = "anonymous@mnk";

/// Identity for players registered directly with the application.
pub const REGISTERED_USER: &str = "player@mnk";

/// Nickname carried by all CPU players.
pub const CPU_NICKNAME: &str = "CPU";

/// Nickname carried by unauthenticated players until they rename.
pub const ANONYMOUS_NICKNAME: &str = "Anonymous";

/// Default strictness of the CPU's move ordering. Scores are bucketed by
/// `(score * cleverness) as i64` before sorting, so a higher value leaves
/// less room for random tie-breaking.
pub const DEFAULT_CLEVERNESS: f64 = 10.0;

/// Sessions are valid for a week from issue.
pub const SESSION_TTL_DAYS: i64 = 7;

/// A waiting game this stale is removed by the next listing sweep.
pub const WAITING_TIMEOUT_HOURS: i64 = 6;

/// A playing game this stale is aborted by the next listing sweep.
pub const PLAYING_TIMEOUT_HOURS: i64 = 48;

/// The most seats any rule set may declare; bounded by the single-digit
/// packed board encoding.
pub const MAX_PLAYERS: u8 = 9;

/// Listings return at most this many game summaries.
pub const MAX_LISTED_GAMES: usize = 25;
