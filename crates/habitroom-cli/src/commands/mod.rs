//! Subcommand handlers and the plumbing they share.

pub mod challenge;
pub mod config;
pub mod owner;
pub mod routine;
pub mod sim;

use std::sync::Arc;

use chrono::NaiveDate;
use habitroom_core::error::ErrorBody;
use habitroom_core::{
    ChallengeDb, ChallengeService, Config, CoreError, FixedClock, ServiceContext,
    SimulatedChallengeService, ValidationError,
};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Global options every challenge command needs.
pub struct Session {
    owner: Option<String>,
    today: Option<NaiveDate>,
}

impl Session {
    pub fn new(owner: Option<String>, today: Option<NaiveDate>) -> Self {
        Self { owner, today }
    }

    pub fn owner(&self) -> Result<&str, CoreError> {
        match self.owner.as_deref().map(str::trim) {
            Some(owner) if !owner.is_empty() => Ok(owner),
            _ => Err(ValidationError::InvalidValue {
                field: "owner".to_string(),
                message: "pass --owner or set HABITROOM_OWNER".to_string(),
            }
            .into()),
        }
    }

    fn context(&self) -> Result<ServiceContext, CoreError> {
        let config = Config::load()?;
        let mut ctx = ServiceContext::default().with_limits(config.limits);
        if let Some(today) = self.today {
            ctx = ctx.with_clock(Arc::new(FixedClock::new(today)));
        }
        Ok(ctx)
    }

    pub fn service(&self) -> Result<ChallengeService, CoreError> {
        Ok(ChallengeService::new(ChallengeDb::open()?, self.context()?))
    }

    pub fn simulated(&self) -> Result<SimulatedChallengeService, CoreError> {
        Ok(SimulatedChallengeService::new(
            ChallengeDb::open()?,
            self.context()?,
        ))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write a failure to stderr, as an `ErrorBody` when it came from the core.
pub fn report_error(err: &(dyn std::error::Error + 'static)) {
    let body = match err.downcast_ref::<CoreError>() {
        Some(core) => core.to_body(),
        None => ErrorBody {
            code: "INTERNAL",
            message: err.to_string(),
            retryable: false,
        },
    };
    match serde_json::to_string(&body) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("error: {err}"),
    }
}
