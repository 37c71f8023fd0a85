use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::IntegrationError;

/// A charge presented to the patient. `copy_paste_code` is the PIX-style
/// string the app shows for manual payment.
#[derive(Debug, Clone)]
pub struct PaymentCharge {
    pub charge_id: String,
    pub amount: f64,
    pub copy_paste_code: String,
}

/// Where a charge stands at the gateway. `Approved` is what lets the
/// webhook drive the payment edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Pending,
    Approved,
    Failed,
}

pub trait PaymentGateway: Send + Sync {
    fn create_charge(&self, request_id: &Uuid, amount: f64)
        -> Result<PaymentCharge, IntegrationError>;

    fn check_status(&self, charge_id: &str) -> Result<ChargeStatus, IntegrationError>;
}

/// Development gateway: every charge succeeds instantly with a fake code.
pub struct SimulatedPayment;

impl PaymentGateway for SimulatedPayment {
    fn create_charge(
        &self,
        request_id: &Uuid,
        amount: f64,
    ) -> Result<PaymentCharge, IntegrationError> {
        let charge_id = format!("SIM-{}", Uuid::new_v4().simple());
        debug!(request_id = %request_id, amount, "simulated charge created");
        Ok(PaymentCharge {
            copy_paste_code: format!("renova-pix:{charge_id}:{amount:.2}"),
            charge_id,
            amount,
        })
    }

    fn check_status(&self, _charge_id: &str) -> Result<ChargeStatus, IntegrationError> {
        Ok(ChargeStatus::Approved)
    }
}

#[derive(Deserialize)]
struct ChargeResponse {
    charge_id: String,
    copy_paste_code: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

pub struct LivePayment {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl LivePayment {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("RENOVA_PAYMENT_URL").unwrap_or_default(),
            std::env::var("RENOVA_PAYMENT_API_KEY").unwrap_or_default(),
        )
    }
}

impl PaymentGateway for LivePayment {
    fn create_charge(
        &self,
        request_id: &Uuid,
        amount: f64,
    ) -> Result<PaymentCharge, IntegrationError> {
        if self.api_key.is_empty() {
            return Err(IntegrationError::Rejected {
                service: "payment",
                reason: "missing API key".into(),
            });
        }
        let response = self
            .client
            .post(format!("{}/charges", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "external_reference": request_id.to_string(),
                "amount": amount,
            }))
            .send()?;
        if !response.status().is_success() {
            return Err(IntegrationError::Rejected {
                service: "payment",
                reason: format!("status {}", response.status()),
            });
        }
        let charge: ChargeResponse = response.json()?;
        Ok(PaymentCharge {
            charge_id: charge.charge_id,
            amount,
            copy_paste_code: charge.copy_paste_code,
        })
    }

    fn check_status(&self, charge_id: &str) -> Result<ChargeStatus, IntegrationError> {
        let response = self
            .client
            .get(format!("{}/charges/{charge_id}", self.endpoint))
            .bearer_auth(&self.api_key)
            .send()?;
        if !response.status().is_success() {
            return Err(IntegrationError::Rejected {
                service: "payment",
                reason: format!("status {}", response.status()),
            });
        }
        let status: StatusResponse = response.json()?;
        Ok(match status.status.as_str() {
            "approved" | "paid" => ChargeStatus::Approved,
            "failed" | "cancelled" | "expired" => ChargeStatus::Failed,
            _ => ChargeStatus::Pending,
        })
    }
}
