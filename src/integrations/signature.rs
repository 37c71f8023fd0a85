use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::db::repository;
use crate::models::{Request, SignatureData};

use super::IntegrationError;

pub trait SignatureService: Send + Sync {
    /// Sign the document derived from a request on behalf of the named
    /// clinician. The returned blob is stored as-is on the request.
    fn sign(&self, request: &Request, signer_name: &str)
        -> Result<SignatureData, IntegrationError>;
}

/// Hash of the content a signature covers: the request id plus its
/// structured payload, so any payload change yields a new hash.
fn document_hash(request: &Request) -> Result<String, IntegrationError> {
    let payload = serde_json::to_vec(&request.payload).map_err(|e| IntegrationError::Rejected {
        service: "signature",
        reason: format!("unserializable payload: {e}"),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(request.id.as_bytes());
    hasher.update(&payload);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Development signer: real hash, fabricated reference.
pub struct SimulatedSignature;

impl SignatureService for SimulatedSignature {
    fn sign(
        &self,
        request: &Request,
        signer_name: &str,
    ) -> Result<SignatureData, IntegrationError> {
        let hash = document_hash(request)?;
        debug!(request_id = %request.id, signer = signer_name, "simulated signature issued");
        Ok(SignatureData {
            signature_reference: format!("SIM-{}", &hash[..12]),
            document_hash: hash,
            signer_name: signer_name.to_string(),
            signed_at: repository::now(),
        })
    }
}

#[derive(Deserialize)]
struct SignResponse {
    reference: String,
}

pub struct LiveSignature {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl LiveSignature {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            std::env::var("RENOVA_SIGNATURE_URL").unwrap_or_default(),
            std::env::var("RENOVA_SIGNATURE_API_KEY").unwrap_or_default(),
        )
    }
}

impl SignatureService for LiveSignature {
    fn sign(
        &self,
        request: &Request,
        signer_name: &str,
    ) -> Result<SignatureData, IntegrationError> {
        if self.api_key.is_empty() {
            return Err(IntegrationError::Rejected {
                service: "signature",
                reason: "missing API key".into(),
            });
        }
        let hash = document_hash(request)?;
        let response = self
            .client
            .post(format!("{}/signatures", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "document_hash": hash,
                "signer_name": signer_name,
            }))
            .send()?;
        if !response.status().is_success() {
            return Err(IntegrationError::Rejected {
                service: "signature",
                reason: format!("status {}", response.status()),
            });
        }
        let signed: SignResponse = response.json()?;
        Ok(SignatureData {
            signature_reference: signed.reference,
            document_hash: hash,
            signer_name: signer_name.to_string(),
            signed_at: repository::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{RequestStatus, RequestType};
    use crate::models::{MedicationItem, RequestPayload};
    use uuid::Uuid;

    fn prescription() -> Request {
        Request {
            id: Uuid::new_v4(),
            request_type: RequestType::Prescription,
            status: RequestStatus::Paid,
            patient_id: Uuid::new_v4(),
            patient_name: "João".into(),
            assigned_clinician: None,
            price: Some(49.90),
            payload: RequestPayload::Prescription {
                medications: vec![MedicationItem {
                    name: "Losartana".into(),
                    dose: Some("50mg".into()),
                    instructions: None,
                }],
                prescription_images: vec![],
            },
            notes: None,
            rejection_reason: None,
            signature: None,
            video_room: None,
            created_at: repository::now(),
            assigned_at: None,
            approved_at: None,
            paid_at: None,
            signed_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn simulated_signature_hashes_the_document() {
        let request = prescription();
        let signature = SimulatedSignature.sign(&request, "Dra. Ana").unwrap();
        assert_eq!(signature.document_hash.len(), 64);
        assert_eq!(signature.signer_name, "Dra. Ana");
        assert!(signature.signature_reference.starts_with("SIM-"));

        // Same document, same hash.
        let again = SimulatedSignature.sign(&request, "Dra. Ana").unwrap();
        assert_eq!(signature.document_hash, again.document_hash);
    }

    #[test]
    fn different_payloads_hash_differently() {
        let a = prescription();
        let mut b = prescription();
        b.payload = RequestPayload::Prescription {
            medications: vec![],
            prescription_images: vec![],
        };
        let sig_a = SimulatedSignature.sign(&a, "Dra. Ana").unwrap();
        let sig_b = SimulatedSignature.sign(&b, "Dra. Ana").unwrap();
        assert_ne!(sig_a.document_hash, sig_b.document_hash);
    }
}
