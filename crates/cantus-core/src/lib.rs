//! Timeline foundation for cantus.
//!
//! # Primary API
//!
//! - [`Session`] / [`SessionBuilder`]: tempo map + transport state shared by all sources
//! - [`TimePos`]: a position in either the audio (sample) or music (beat) domain
//! - [`LoopRange`]: transport loop with Ardour-style position squishing
//! - [`TempoMap`] / [`TempoMapSnapshot`]: beat <-> sample conversion
//!
//! # Example
//!
//! ```ignore
//! use cantus_core::{Session, TimePos};
//!
//! let session = Session::builder().sample_rate(48000.0).tempo(120.0).build()?;
//! let tempo = session.tempo();
//! assert_eq!(TimePos::Beats(1.0).samples(&tempo), 24000);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::SessionConfig;

pub(crate) mod lockfree;
pub use lockfree::AtomicFlag;

mod session;
pub use session::{Session, SessionBuilder};

pub mod tempo_map;
pub use tempo_map::{TempoMap, TempoMapSnapshot};

pub mod time;
pub use time::{LoopRange, TimeDomain, TimePos, MAX_BEATS};
