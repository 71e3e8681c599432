//! config/dispatch_config.rs
//! Configuración del despacho leída del entorno (.env vía dotenv).
//! La presencia de cada bloque de proveedor decide gateway real o mock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_COUNTRY_CODE: &str = "91";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/deliveries.db";
pub const DEFAULT_SERVER_PORT: u16 = 5022;

/// Credenciales de la cuenta Twilio, compartidas por WhatsApp y SMS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwilioAccount {
    pub account_sid: String,
    #[serde(skip_serializing)]
    pub auth_token: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhatsAppProviderConfig {
    pub account: TwilioAccount,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsProviderConfig {
    pub account: TwilioAccount,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub mail_from: String,
}

/// Ventana de espera de la confirmación de WhatsApp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            timeout: Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub whatsapp: Option<WhatsAppProviderConfig>,
    pub sms: Option<SmsProviderConfig>,
    pub smtp: Option<SmtpConfig>,
    pub poll: PollSettings,
    pub default_country_code: String,
    /// Máximo de destinatarios procesándose a la vez (None = sin límite)
    pub max_in_flight: Option<usize>,
    pub database_url: String,
    pub server_port: u16,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            whatsapp: None,
            sms: None,
            smtp: None,
            poll: PollSettings::default(),
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            max_in_flight: None,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Arma la config a partir de una función de búsqueda de claves.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let account = match (get("TWILIO_ACCOUNT_SID"), get("TWILIO_AUTH_TOKEN")) {
            (Some(account_sid), Some(auth_token)) => Some(TwilioAccount {
                account_sid,
                auth_token,
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            _ => None,
        };

        let whatsapp = match (&account, get("TWILIO_WHATSAPP_FROM")) {
            (Some(account), Some(from)) => Some(WhatsAppProviderConfig {
                account: account.clone(),
                from,
            }),
            _ => None,
        };

        let sms = match (&account, get("TWILIO_SMS_FROM")) {
            (Some(account), Some(from)) => Some(SmsProviderConfig {
                account: account.clone(),
                from,
            }),
            _ => None,
        };

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(host), Some(user), Some(pass)) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT),
                mail_from: get("MAIL_FROM").unwrap_or_else(|| user.clone()),
                user,
                pass,
            }),
            _ => None,
        };

        let poll = PollSettings {
            timeout: Duration::from_secs(parse_or(
                "WHATSAPP_POLL_TIMEOUT_SECS",
                get("WHATSAPP_POLL_TIMEOUT_SECS"),
                DEFAULT_POLL_TIMEOUT_SECS,
            )),
            interval: Duration::from_secs(positive_or(
                "WHATSAPP_POLL_INTERVAL_SECS",
                get("WHATSAPP_POLL_INTERVAL_SECS"),
                DEFAULT_POLL_INTERVAL_SECS,
            )),
        };

        let max_in_flight = get("DISPATCH_MAX_IN_FLIGHT")
            .and_then(|raw| match raw.parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    log::warn!(
                        "(from_lookup) DISPATCH_MAX_IN_FLIGHT='{}' no es válido, sin límite.",
                        raw
                    );
                    None
                }
            })
            .filter(|n| *n > 0);

        DispatchConfig {
            whatsapp,
            sms,
            smtp,
            poll,
            default_country_code: get("DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string()),
            max_in_flight,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), DEFAULT_SERVER_PORT),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!(
                "(parse_or) Valor inválido para {}='{}', usando {}",
                key,
                raw,
                default
            );
            default
        }),
    }
}

/// Como `parse_or`, pero un 0 también cae al valor por defecto.
fn positive_or(key: &str, raw: Option<String>, default: u64) -> u64 {
    match parse_or(key, raw, default) {
        0 => {
            log::warn!("(positive_or) {}=0 no es válido, usando {}", key, default);
            default
        }
        n => n,
    }
}
