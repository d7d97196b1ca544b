use cabinet_types::Ticket;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Default number of mint attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 8;

/// Mints tickets that are not already live.
///
/// Each attempt draws a fresh UUID v7. `issue` gives up after
/// `max_attempts` collisions.
#[derive(Clone, Debug)]
pub struct TicketIssuer {
    max_attempts: usize,
}

impl TicketIssuer {
    pub fn new() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }

    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Mint a ticket for which `is_live` returns `false`.
    pub fn issue(&self, is_live: impl Fn(&Ticket) -> bool) -> StoreResult<Ticket> {
        for attempt in 1..=self.max_attempts {
            let ticket = Ticket::new();
            if !is_live(&ticket) {
                return Ok(ticket);
            }
            warn!(%ticket, attempt, "minted ticket already live; retrying");
        }
        Err(StoreError::TicketSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for TicketIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn issue_returns_free_ticket() {
        let issuer = TicketIssuer::new();
        assert!(issuer.issue(|_| false).is_ok());
    }

    #[test]
    fn issue_retries_until_free() {
        let calls = Cell::new(0);
        let issuer = TicketIssuer::with_max_attempts(5);
        let ticket = issuer.issue(|_| {
            calls.set(calls.get() + 1);
            calls.get() < 3
        });
        assert!(ticket.is_ok());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn issue_gives_up_after_bound() {
        let issuer = TicketIssuer::with_max_attempts(4);
        let err = issuer.issue(|_| true).unwrap_err();
        assert!(matches!(err, StoreError::TicketSpaceExhausted { attempts: 4 }));
    }

    #[test]
    fn zero_attempts_is_clamped() {
        let issuer = TicketIssuer::with_max_attempts(0);
        assert!(issuer.issue(|_| false).is_ok());
    }
}
