//! Conway's Game of Life on a toroidal board.
//!
//! The board evolves either in one process ([`engine::Engine`], optionally
//! spreading every generation over a rayon pool) or split into row bands
//! across ranks ([`distributed::Worker`]) that exchange ghost rows over a
//! [`comm::Communicator`]. Both paths produce bit-identical boards from the
//! same seed or input file.

pub mod board_io;
pub mod chunk;
pub mod comm;
pub mod config;
pub mod display;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod grid;
pub mod log;
pub mod partition;
pub mod rules;
pub mod utils;

pub use config::{Backend, LifeConfig};
pub use engine::{Engine, RunReport};
pub use error::{LifeError, Result};
pub use grid::Grid;
pub use rules::{Cell, ALIVE, DEAD};
