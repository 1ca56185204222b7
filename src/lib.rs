pub mod agent;
pub mod mnk_game;
pub mod service;

pub mod utils {
    pub mod prelude {
        pub use std::collections::{BTreeMap, HashMap, HashSet};
    }
}

pub mod prelude {
    pub use super::agent::*;
    pub use super::mnk_game::prelude::*;
    pub use super::service::*;
    pub use super::utils::prelude::*;
}
