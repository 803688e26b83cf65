use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a source is completed by the customer.
///
/// Only [`SourceFlow::Redirect`] sends the customer to an external page; every
/// other flow resolves immediately with the created source.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SourceFlow {
    /// The customer authenticates on an external page and comes back through the return URL.
    Redirect,
    /// The customer pushes funds to a receiver.
    Receiver,
    /// The customer confirms with a verification code.
    CodeVerification,
    /// Nothing else is required.
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Immediate,
}

/// Lifecycle status of a source as reported by the payment SDK.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Waiting for the customer to finish authentication.
    Pending,
    /// Ready to be charged.
    Chargeable,
    /// Already used by a charge.
    Consumed,
    /// Canceled by the customer or expired.
    Canceled,
    /// Authentication failed.
    Failed,
    /// Any status this bridge does not know about.
    Unknown,
}

impl SourceStatus {
    /// Parses the SDK's status string. Unrecognized values map to [`SourceStatus::Unknown`].
    #[must_use]
    pub fn from_sdk(status: &str) -> Self {
        status.parse().unwrap_or(Self::Unknown)
    }
}

/// Maps the payment SDK's raw status string onto a [`SourceStatus`].
///
/// Hosts use this when building the [`Source`] they return from
/// [`crate::PaymentSdk::retrieve_source`], so every binding reads SDK statuses
/// the same way. Matching ignores case; anything unrecognized, such as
/// `expired`, becomes [`SourceStatus::Unknown`] and rejects the caller with
/// `redirectFailed`.
#[uniffi::export]
#[must_use]
pub fn source_status_from_sdk(status: &str) -> SourceStatus {
    SourceStatus::from_sdk(status.trim())
}

/// The kind of source to create.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    /// Alipay wallet.
    Alipay,
    /// Bancontact bank redirect.
    Bancontact,
    /// Giropay bank redirect.
    Giropay,
    /// iDEAL bank redirect.
    Ideal,
    /// SEPA direct debit.
    SepaDebit,
    /// Sofort bank redirect.
    Sofort,
    /// 3D Secure card authentication.
    ThreeDSecure,
    /// Plain card.
    Card,
}

/// Test-mode helper that forces the outcome of the charge made with the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, uniffi::Enum)]
#[strum(serialize_all = "snake_case")]
pub enum ChargeMimic {
    /// The charge will succeed.
    SucceedingCharge,
    /// The charge will fail.
    FailingCharge,
}

impl ChargeMimic {
    /// The owner name the payment SDK recognizes for this mimic.
    #[must_use]
    pub const fn owner_name(self) -> &'static str {
        match self {
            Self::SucceedingCharge => "succeeding_charge",
            Self::FailingCharge => "failing_charge",
        }
    }
}

/// Parameters for source creation.
///
/// The core only looks at `mimic`; everything else is handed to the payment SDK untouched.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SourceParams {
    /// Which kind of source to create.
    pub source_type: SourceType,
    /// Amount in the smallest currency unit.
    pub amount: Option<i64>,
    /// Three-letter ISO currency code.
    pub currency: Option<String>,
    /// Where the external page sends the customer back to.
    pub return_url: Option<String>,
    /// Owner name attached to the source.
    pub owner_name: Option<String>,
    /// Test-mode outcome override.
    pub mimic: Option<ChargeMimic>,
    /// Type-specific fields (bank, iban, statement descriptor, ...).
    pub fields: HashMap<String, String>,
}

impl SourceParams {
    /// Creates parameters for `source_type` with every optional field empty.
    #[must_use]
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            amount: None,
            currency: None,
            return_url: None,
            owner_name: None,
            mimic: None,
            fields: HashMap::new(),
        }
    }

    /// Applies `mimic`, overriding the owner name when set.
    pub(crate) fn with_mimic_applied(mut self) -> Self {
        if let Some(mimic) = self.mimic {
            self.owner_name = Some(mimic.owner_name().to_string());
        }
        self
    }
}

/// A snapshot of a payment source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Identifier assigned by the payment SDK.
    pub id: String,
    /// Per-source secret authorizing status queries. Never logged.
    pub client_secret: String,
    /// How the customer completes the source.
    pub flow: SourceFlow,
    /// Current status.
    pub status: SourceStatus,
    /// External authentication page. Present iff `flow` is [`SourceFlow::Redirect`].
    pub redirect_url: Option<String>,
    /// The SDK's source type string.
    pub source_type: Option<String>,
    /// Amount in the smallest currency unit.
    pub amount: Option<i64>,
    /// Three-letter ISO currency code.
    pub currency: Option<String>,
}

impl Source {
    /// Whether completing this source requires the external redirect.
    #[must_use]
    pub const fn requires_redirect(&self) -> bool {
        matches!(self.flow, SourceFlow::Redirect)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id)
            .field("client_secret", &"<redacted>")
            .field("flow", &self.flow)
            .field("status", &self.status)
            .field("redirect_url", &self.redirect_url)
            .field("source_type", &self.source_type)
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .finish()
    }
}
