//! Authorization status of this device with respect to the vault.
//!
//! The status is not driven by transitions. It is recomputed from scratch
//! after every registry mutation by [`evaluate`], with one exception: a fatal
//! refresh error pins it to [`AuthorizationStatus::EstablishingFailed`] until
//! the vault is reset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Derived relationship between this device and the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// No refresh has completed yet.
    Establishing,
    /// A refresh hit an unrecoverable store or crypto fault. Only reset leaves this state.
    EstablishingFailed,
    /// This device has not enrolled.
    None,
    /// Enrolled and alone: this device should mint the vault secret.
    MissingSecretCreateStrategy,
    /// Enrolled alongside others: this device must ask a trusted peer.
    MissingSecretRequestStrategy,
    /// The vault secret is held in memory.
    Authorized,
}

impl AuthorizationStatus {
    /// Whether the vault secret is available.
    pub fn is_authorized(self) -> bool {
        self == Self::Authorized
    }

    /// Whether an action is valid from this status.
    pub fn permits(self, action: Action) -> bool {
        match action {
            Action::Reset => true,
            Action::Enroll => self == Self::None,
            Action::MintSecret => self == Self::MissingSecretCreateStrategy,
            Action::Trust | Action::Deny => self == Self::Authorized,
        }
    }

    /// Actions valid from this status.
    pub fn actions(self) -> Vec<Action> {
        Action::ALL
            .iter()
            .copied()
            .filter(|action| self.permits(*action))
            .collect()
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Establishing => "establishing",
            Self::EstablishingFailed => "establishing_failed",
            Self::None => "none",
            Self::MissingSecretCreateStrategy => "missing_secret_create",
            Self::MissingSecretRequestStrategy => "missing_secret_request",
            Self::Authorized => "authorized",
        };
        write!(f, "{s}")
    }
}

/// User-facing actions gated by the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Enroll,
    MintSecret,
    Trust,
    Deny,
    Reset,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Enroll,
        Action::MintSecret,
        Action::Trust,
        Action::Deny,
        Action::Reset,
    ];
}

/// Compute the status from the reconciled registry view.
///
/// `registry_size` counts distinct devices after duplicate reconciliation.
pub fn evaluate(self_present: bool, secret_held: bool, registry_size: usize) -> AuthorizationStatus {
    match (self_present, secret_held, registry_size) {
        (false, _, _) => AuthorizationStatus::None,
        (true, true, _) => AuthorizationStatus::Authorized,
        (true, false, n) if n <= 1 => AuthorizationStatus::MissingSecretCreateStrategy,
        (true, false, _) => AuthorizationStatus::MissingSecretRequestStrategy,
    }
}
