//! Message templates. Keys form a closed set; substitution values travel
//! in one typed struct, so a template can never be paired with the wrong
//! payload shape at a call site.

use tracing::warn;

use crate::models::enums::NotificationCategory;

/// Every message the engine can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKey {
    NewRequest,
    RequestReceived,
    RequestAccepted,
    RequestApproved,
    RequestRejected,
    PaymentConfirmed,
    ExamForwarded,
    PrescriptionReady,
    ConsultationStarted,
    RequestDelivered,
    NewChatMessage,
}

impl TemplateKey {
    fn title(&self) -> &'static str {
        match self {
            Self::NewRequest => "Nova Solicitação",
            Self::RequestReceived => "Solicitação Recebida",
            Self::RequestAccepted => "Solicitação em Análise",
            Self::RequestApproved => "Pagamento Pendente",
            Self::RequestRejected => "Solicitação Recusada",
            Self::PaymentConfirmed => "Pagamento Confirmado",
            Self::ExamForwarded => "Exame Encaminhado",
            Self::PrescriptionReady => "Receita Pronta!",
            Self::ConsultationStarted => "Consulta Iniciada",
            Self::RequestDelivered => "Documento Disponível",
            Self::NewChatMessage => "Nova Mensagem",
        }
    }

    fn body(&self) -> &'static str {
        match self {
            Self::NewRequest => "Nova solicitação de {request_label} aguardando atendimento.",
            Self::RequestReceived => {
                "Sua solicitação de {request_label} foi recebida e entrou na fila de atendimento."
            }
            Self::RequestAccepted => {
                "Sua solicitação de {request_label} está sendo analisada por {clinician_name}."
            }
            Self::RequestApproved => {
                "Sua solicitação de {request_label} foi aprovada. Valor: R$ {price}."
            }
            Self::RequestRejected => "Sua solicitação de {request_label} foi recusada: {reason}",
            Self::PaymentConfirmed => {
                "O pagamento de {patient_name} foi confirmado. Você já pode prosseguir."
            }
            Self::ExamForwarded => "Um pedido de exame foi encaminhado para avaliação médica.",
            Self::PrescriptionReady => {
                "Sua receita assinada por {clinician_name} já está disponível."
            }
            Self::ConsultationStarted => "Sua consulta começou. Entre na sala: {url}",
            Self::RequestDelivered => {
                "Sua solicitação de {request_label} foi concluída. O documento está disponível."
            }
            Self::NewChatMessage => "Você recebeu uma nova mensagem de {sender_name}.",
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::NewRequest | Self::RequestReceived | Self::RequestAccepted | Self::NewChatMessage => {
                NotificationCategory::Info
            }
            Self::RequestApproved | Self::PaymentConfirmed => NotificationCategory::Payment,
            Self::RequestRejected => NotificationCategory::Error,
            Self::ExamForwarded => NotificationCategory::Exam,
            Self::PrescriptionReady => NotificationCategory::Prescription,
            Self::ConsultationStarted => NotificationCategory::Consultation,
            Self::RequestDelivered => NotificationCategory::Success,
        }
    }
}

/// Substitution values. Fill what the template needs; extras are ignored.
#[derive(Debug, Default, Clone)]
pub struct TemplateData {
    pub patient_name: Option<String>,
    pub clinician_name: Option<String>,
    /// Human label for the request type, e.g. "receita".
    pub request_label: Option<String>,
    pub price: Option<f64>,
    pub reason: Option<String>,
    pub url: Option<String>,
    pub sender_name: Option<String>,
}

impl TemplateData {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "patient_name" => self.patient_name.clone(),
            "clinician_name" => self.clinician_name.clone(),
            "request_label" => self.request_label.clone(),
            "price" => self.price.map(|p| format!("{p:.2}")),
            "reason" => self.reason.clone(),
            "url" => self.url.clone(),
            "sender_name" => self.sender_name.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub title: String,
    pub body: String,
}

/// Render a template. When a value the template needs is missing, the
/// message falls back to the unformatted template text rather than being
/// dropped; the recipient still learns something happened.
pub fn render(key: TemplateKey, data: &TemplateData) -> RenderedMessage {
    let template = key.body();
    match substitute(template, data) {
        Some(body) => RenderedMessage {
            title: key.title().to_string(),
            body,
        },
        None => {
            warn!(template = ?key, "missing template value, sending unformatted text");
            RenderedMessage {
                title: key.title().to_string(),
                body: template.to_string(),
            }
        }
    }
}

/// Replace every `{name}` token. None when any token has no value.
fn substitute(template: &str, data: &TemplateData) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}')?;
        let name = &after[..close];
        out.push_str(&data.lookup(name)?);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_all_values() {
        let msg = render(
            TemplateKey::RequestApproved,
            &TemplateData {
                request_label: Some("receita".into()),
                price: Some(49.90),
                ..Default::default()
            },
        );
        assert_eq!(msg.title, "Pagamento Pendente");
        assert_eq!(
            msg.body,
            "Sua solicitação de receita foi aprovada. Valor: R$ 49.90."
        );
    }

    #[test]
    fn prescription_ready_names_the_signer() {
        let msg = render(
            TemplateKey::PrescriptionReady,
            &TemplateData {
                clinician_name: Some("Dra. Ana".into()),
                ..Default::default()
            },
        );
        assert_eq!(msg.title, "Receita Pronta!");
        assert!(msg.body.contains("Dra. Ana"));
    }

    #[test]
    fn missing_value_falls_back_to_raw_template() {
        let msg = render(TemplateKey::RequestRejected, &TemplateData::default());
        assert_eq!(
            msg.body,
            "Sua solicitação de {request_label} foi recusada: {reason}"
        );
        assert_eq!(msg.title, "Solicitação Recusada");
    }

    #[test]
    fn template_without_placeholders_needs_no_data() {
        let msg = render(TemplateKey::ExamForwarded, &TemplateData::default());
        assert!(msg.body.contains("encaminhado"));
    }

    #[test]
    fn categories_follow_the_message() {
        assert_eq!(
            TemplateKey::RequestApproved.category(),
            NotificationCategory::Payment
        );
        assert_eq!(
            TemplateKey::PrescriptionReady.category(),
            NotificationCategory::Prescription
        );
        assert_eq!(
            TemplateKey::RequestRejected.category(),
            NotificationCategory::Error
        );
    }
}
