use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::lockout::LockoutGuard;
use crate::domain::ports::{Clock, DocumentStore};
use crate::domain::query::QueryCompiler;
use crate::domain::token::TokenCodec;
use crate::use_cases::login::AdminAccount;

// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub codec: TokenCodec,
    pub guard: LockoutGuard,
    pub admin: AdminAccount,
    pub session_ttl_secs: u64,
    pub compiler: QueryCompiler,
}

// System clock adapter used by the use cases.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
