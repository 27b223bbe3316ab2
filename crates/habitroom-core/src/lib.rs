//! # Habitroom Core Library
//!
//! Core logic for seven-day habit challenges. An owner enrolls in a challenge
//! with one to three routine names; every name is scheduled once per day and
//! the owner checks instances off as the week goes by. A per-challenge
//! progress aggregate tracks completion and derives a level from it.
//!
//! Everything is available through the `habitroom-cli` binary, which is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Challenges**: schedule generation and the date window rules
//! - **Progress**: completion percentage, level policies and the two
//!   aggregation strategies (push-delta and pull-recount)
//! - **Services**: [`ChallengeService`] for wall-clock challenges and
//!   [`SimulatedChallengeService`] for challenges driven by a virtual cursor
//! - **Storage**: SQLite persistence with optimistic version checks, and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ChallengeService`]: enrollment, toggles, batch updates, extensions
//! - [`ChallengeDb`]: challenge, routine and aggregate persistence
//! - [`Config`]: application limits
//! - [`Clock`]: injectable source of "today"

pub mod challenge;
pub mod cheer;
pub mod clock;
pub mod directory;
pub mod error;
pub mod progress;
pub mod service;
pub mod simulation;
pub mod storage;

pub use challenge::{
    generate_schedule, Challenge, ChallengeCategory, ChallengeMode, ChallengeStatus,
    PlannedRoutine, RoutineInstance,
};
pub use cheer::{CheerMessages, DefaultCheers};
pub use clock::{Clock, FixedClock, SystemClock};
pub use directory::{OpenDirectory, StaticDirectory, UserDirectory};
pub use error::{ConfigError, CoreError, DatabaseError, ErrorBody, ValidationError};
pub use progress::{
    AggregationStrategy, LevelPolicy, ProgressAggregate, PullRecount, PushDelta,
};
pub use service::{
    BatchItem, BatchResult, ChallengeDetail, ChallengeService, ChallengeSummary,
    CreatedChallengeView, DayAdvance, ExtensionResult, FinishedChallenge, RoutineView, ServiceContext, ToggleResult,
};
pub use simulation::SimulatedChallengeService;
pub use storage::{ChallengeDb, Config, LimitsConfig};
