//! User registration (the referral bonus engine), reads, and admin
//! balance adjustments.

use crate::config::BonusConfig;
use crate::errors::{ApiError, Result};
use crate::metrics;
use crate::models::{AdjustBalanceRequest, RegisterUserRequest};
use ledger_core::{Error as LedgerError, Ledger, NewUser, TxKind, User, UserId};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a registration call
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    /// False when the id was already registered (or lost a creation race)
    pub created: bool,
}

pub struct UserService {
    ledger: Arc<Ledger>,
    bonuses: BonusConfig,
}

impl UserService {
    pub fn new(ledger: Arc<Ledger>, bonuses: BonusConfig) -> Self {
        UserService { ledger, bonuses }
    }

    /// Register a user, crediting the one-time welcome bonus and, when the
    /// referrer exists, the one-time referral bonus.
    ///
    /// The `welcome:{id}` and `referral:{id}` idempotency keys keep both
    /// bonuses at-most-once even when registration is retried or raced, so a
    /// re-registration replays them as no-ops and a retry that previously
    /// failed between user creation and the credits heals itself.
    pub fn register_user(&self, request: RegisterUserRequest) -> Result<Registration> {
        validator::Validate::validate(&request)
            .map_err(|e| ApiError::Validation(e.to_string()))?;

        let user_id = UserId::new(request.user_id);

        // Self-referral never pays out
        let requested_referrer = request
            .referrer_id
            .map(UserId::new)
            .filter(|id| *id != user_id);

        let (created, referrer_id) = match self.ledger.create_user(NewUser {
            user_id,
            username: request.username.clone(),
            first_name: request.first_name.clone(),
            referrer_id: requested_referrer,
        }) {
            Ok(user) => (true, user.referrer_id),
            // Already registered, or lost a concurrent registration race.
            // The stored referrer wins over the request's on replays.
            Err(LedgerError::Conflict(_)) => {
                let existing = self.ledger.get_user(user_id)?;
                (false, existing.referrer_id)
            }
            Err(e) => return Err(e.into()),
        };

        self.ledger.apply_transaction(
            user_id,
            TxKind::Bonus,
            self.bonuses.welcome,
            "Welcome bonus",
            Some(&format!("welcome:{}", user_id)),
        )?;

        if let Some(referrer) = referrer_id {
            match self.ledger.lookup_user(referrer)? {
                Some(_) => {
                    self.ledger.apply_transaction(
                        referrer,
                        TxKind::Referral,
                        self.bonuses.referral,
                        &format!("Referral bonus for {}", request.first_name),
                        Some(&format!("referral:{}", user_id)),
                    )?;
                    if created {
                        metrics::REFERRAL_BONUSES_PAID.inc();
                        info!("Credited referral bonus to {} for {}", referrer, user_id);
                    }
                }
                None => {
                    warn!(
                        "Referrer {} not found for user {}, skipping referral bonus",
                        referrer, user_id
                    );
                }
            }
        }

        if created {
            metrics::USERS_REGISTERED.inc();
            info!("Registered user {}", user_id);
        }

        let user = self.ledger.get_user(user_id)?;
        Ok(Registration { user, created })
    }

    /// Get a user record
    pub fn get_user(&self, user_id: i64) -> Result<User> {
        Ok(self.ledger.get_user(UserId::new(user_id))?)
    }

    /// Admin balance adjustment: a direct ledger transaction with a parsed
    /// kind. Rejected before any side effect when the kind is unknown.
    pub fn adjust_balance(&self, user_id: i64, request: AdjustBalanceRequest) -> Result<User> {
        let kind = TxKind::parse(&request.kind).ok_or_else(|| {
            ApiError::Validation(format!("unknown transaction type: {}", request.kind))
        })?;

        let user_id = UserId::new(user_id);
        self.ledger.apply_transaction(
            user_id,
            kind,
            request.amount,
            request.description.as_deref().unwrap_or_default(),
            None,
        )?;

        Ok(self.ledger.get_user(user_id)?)
    }
}
