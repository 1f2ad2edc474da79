#![allow(dead_code)]

pub mod checkpoint;
pub mod coordinator;
pub mod eternity;
pub mod solver;

pub mod utils {
    pub mod prelude {
        pub use anyhow::{Context, Error, anyhow, bail};
        pub type Result<T> = anyhow::Result<T, Error>;

        pub use std::{
            collections::{BTreeSet, HashMap, HashSet, VecDeque},
            time::{Duration, Instant},
        };
    }
}

pub mod prelude {
    pub use super::checkpoint::*;
    pub use super::coordinator::*;
    pub use super::eternity::prelude::*;
    pub use super::solver::*;
    pub use super::utils::prelude::*;
}
