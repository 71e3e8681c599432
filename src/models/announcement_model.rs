use serde::{Deserialize, Serialize};

/// Anuncio a notificar. No se modifica una vez iniciado el despacho.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Destinatario con sus direcciones por canal.
/// Una dirección ausente deshabilita ese canal para este destinatario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub whatsapp_address: Option<String>,
    #[serde(default)]
    pub phone_address: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

impl Recipient {
    pub fn whatsapp(&self) -> Option<&str> {
        non_empty(self.whatsapp_address.as_deref())
    }

    /// Teléfono para SMS; si falta se usa la dirección de WhatsApp.
    pub fn sms(&self) -> Option<&str> {
        non_empty(self.phone_address.as_deref()).or_else(|| self.whatsapp())
    }

    pub fn email(&self) -> Option<&str> {
        non_empty(self.email_address.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Mensaje ya armado que recibe cada gateway.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn from_announcement(announcement: &Announcement) -> Self {
        Self {
            subject: announcement.title.clone(),
            body: announcement.body.clone(),
        }
    }

    /// Texto plano para canales sin asunto (WhatsApp, SMS).
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.subject, self.body)
    }
}
