//! Typed wrappers for the suite's coordination channels.
//!
//! Each capability is an `invoke` on a well-known channel with a typed
//! response. The channel keys double as debounce/timeout override keys in the
//! settings file.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use beacon_core::errors::InvokeError;

use crate::client::BeaconClient;

/// Well-known channel keys.
pub mod channels {
    /// Live email format/deliverability validation during signup.
    pub const EMAIL_VALIDATION: &str = "email-validation";
    /// Password strength scoring as the user types.
    pub const PASSWORD_STRENGTH: &str = "password-strength";
    /// Tenant code availability check.
    pub const TENANT_CODE: &str = "tenant-code";
    /// Phone number format/carrier validation during signup.
    pub const PHONE_VALIDATION: &str = "phone-validation";
    /// Company name availability and restricted-word screening.
    pub const COMPANY_NAME: &str = "company-name";
    /// Subscription price recalculation on plan changes.
    pub const PRICE_CALCULATION: &str = "price-calculation";
}

/// Result of a live email validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailValidation {
    /// Whether the address passed validation.
    pub is_valid: bool,
    /// Human-readable verdict, suitable for inline display.
    #[serde(default)]
    pub message: String,
    /// A corrected address, when the service detected a likely typo.
    #[serde(default)]
    pub suggestion: Option<String>,
}

/// Result of a password strength check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    /// Strength score, 0 (unusable) to 100 (excellent).
    pub score: u8,
    /// Coarse level, e.g. `"weak"`, `"fair"`, `"strong"`.
    pub level: String,
    /// Concrete improvement hints.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Result of a tenant code availability check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCodeAvailability {
    /// Whether the requested code is free.
    pub available: bool,
    /// Human-readable verdict.
    #[serde(default)]
    pub message: String,
    /// Free alternatives, when the requested code is taken.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Result of a phone number validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneValidation {
    /// Whether the number is valid for the given country.
    pub is_valid: bool,
    /// Human-readable verdict.
    #[serde(default)]
    pub message: String,
    /// Country the number was validated against (ISO 3166-1 alpha-2).
    #[serde(default)]
    pub country_code: String,
    /// Canonical display form, e.g. `"+90 532 123 45 67"`.
    #[serde(default)]
    pub formatted_number: Option<String>,
    /// Line classification, e.g. `"Mobile"`.
    #[serde(default)]
    pub number_type: Option<String>,
    /// Detected carrier, when the prefix is recognized.
    #[serde(default)]
    pub carrier: Option<String>,
}

/// Result of a company name check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyNameAvailability {
    /// Whether the name is acceptable and free.
    pub is_valid: bool,
    /// Human-readable verdict.
    #[serde(default)]
    pub message: String,
    /// Whether the name is not yet registered.
    #[serde(default)]
    pub is_unique: bool,
    /// Whether the name contains a blocked word.
    #[serde(default)]
    pub contains_restricted_words: bool,
    /// Close matches among registered names, for typo warnings.
    #[serde(default)]
    pub similar_names: Vec<String>,
}

/// Billing cadence for a price calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    /// Billed every month.
    Monthly,
    /// Billed yearly, usually discounted.
    Annual,
}

/// Inputs to a subscription price calculation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    /// Selected module identifiers.
    pub modules: Vec<String>,
    /// Seat count.
    pub users: u32,
    /// Billing cadence.
    pub billing_cycle: BillingCycle,
}

/// One line of a price quote breakdown.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceLineItem {
    /// What this line covers.
    pub label: String,
    /// Line amount, in `currency`.
    pub amount: f64,
}

/// A computed subscription price.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Total for the selected cadence.
    pub total: f64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Per-line breakdown, when the service provides one.
    #[serde(default)]
    pub breakdown: Vec<PriceLineItem>,
}

impl BeaconClient {
    /// Validate an email address as the user types. Debounced.
    pub async fn validate_email(&self, value: &str) -> Result<EmailValidation, InvokeError> {
        let payload = self
            .invoke_debounced(
                channels::EMAIL_VALIDATION,
                "ValidateEmail",
                json!({ "value": value }),
                "EmailValidationResult",
            )
            .await?;
        decode("ValidateEmail", payload)
    }

    /// Score a candidate password. Debounced.
    pub async fn check_password_strength(
        &self,
        value: &str,
    ) -> Result<PasswordStrength, InvokeError> {
        let payload = self
            .invoke_debounced(
                channels::PASSWORD_STRENGTH,
                "CheckPasswordStrength",
                json!({ "value": value }),
                "PasswordStrengthResult",
            )
            .await?;
        decode("CheckPasswordStrength", payload)
    }

    /// Check whether a tenant code is still available. Debounced.
    pub async fn check_tenant_code(
        &self,
        code: &str,
    ) -> Result<TenantCodeAvailability, InvokeError> {
        let payload = self
            .invoke_debounced(
                channels::TENANT_CODE,
                "CheckTenantCode",
                json!({ "code": code }),
                "TenantCodeResult",
            )
            .await?;
        decode("CheckTenantCode", payload)
    }

    /// Validate a phone number for the given country. Debounced.
    pub async fn validate_phone(
        &self,
        value: &str,
        country_code: &str,
    ) -> Result<PhoneValidation, InvokeError> {
        let payload = self
            .invoke_debounced(
                channels::PHONE_VALIDATION,
                "ValidatePhone",
                json!({ "value": value, "countryCode": country_code }),
                "PhoneValidationResult",
            )
            .await?;
        decode("ValidatePhone", payload)
    }

    /// Check a company name for availability and restricted words. Debounced.
    pub async fn check_company_name(
        &self,
        value: &str,
    ) -> Result<CompanyNameAvailability, InvokeError> {
        let payload = self
            .invoke_debounced(
                channels::COMPANY_NAME,
                "CheckCompanyName",
                json!({ "value": value }),
                "CompanyNameResult",
            )
            .await?;
        decode("CheckCompanyName", payload)
    }

    /// Price a module/seat/cadence selection.
    ///
    /// The default settings give this channel a zero debounce window (plan
    /// changes are discrete clicks), so it invokes immediately; it is still
    /// subject to the one-pending-per-channel rule.
    pub async fn calculate_price(&self, request: &PriceRequest) -> Result<PriceQuote, InvokeError> {
        let args = serde_json::to_value(request).map_err(|e| InvokeError::TransportError {
            reason: format!("encode: {e}"),
        })?;
        let payload = self
            .invoke_debounced(
                channels::PRICE_CALCULATION,
                "CalculatePrice",
                args,
                "PriceCalculationResult",
            )
            .await?;
        decode("CalculatePrice", payload)
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, payload: Value) -> Result<T, InvokeError> {
    serde_json::from_value(payload).map_err(|e| InvokeError::MalformedResponse {
        method: method.to_owned(),
        reason: e.to_string(),
    })
}
