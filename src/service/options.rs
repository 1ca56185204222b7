use clap::Parser;

use crate::mnk_game::consts::DEFAULT_CLEVERNESS;

#[derive(Clone, Debug, Parser)]
pub struct ServerOptions {
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Strictness of the CPU's move ordering; higher leaves less room for
    /// random tie-breaking between similarly scored moves.
    #[arg(long, default_value_t = DEFAULT_CLEVERNESS)]
    pub cleverness: f64,

    /// Seed for the server RNG. Seat shuffles and CPU tie-breaks become
    /// reproducible; omit for entropy.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions { log_level: None, cleverness: DEFAULT_CLEVERNESS, seed: None }
    }
}
