//! Failure taxonomy for backend calls and its mapping to user-facing text.

use thiserror::Error;

const MSG_GENERIC: &str =
    "Lo siento, hubo un error al procesar tu solicitud. Por favor, intenta nuevamente.";
const MSG_CONNECTIVITY: &str =
    "🌐 No se pudo conectar con el servidor. Verifica tu conexión a internet.";
const MSG_NOT_FOUND: &str =
    "❌ No se pudo procesar tu solicitud. El servicio no está disponible en este momento.";
const MSG_BAD_INPUT: &str =
    "⚠️ Hubo un problema con la información enviada. Por favor, verifica los datos.";
const MSG_SERVER: &str =
    "🔧 Hay un problema temporal con nuestros servidores. Intenta nuevamente en unos minutos.";
const MSG_UNAVAILABLE: &str =
    "⏰ El servicio está temporalmente no disponible. Por favor, intenta más tarde.";

/// A failed backend call.
///
/// A 2xx response whose body carries `error` or `status: "error"` is a
/// failure too ([`ApiError::Rejected`]), whatever the transport reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}")]
    Status {
        status: u16,
        error: Option<String>,
        message: Option<String>,
    },

    #[error("backend reported an error: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Coarse classification used to pick the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connectivity,
    NotFound,
    BadInput,
    ServerError,
    Unavailable,
    Unexpected,
}

impl ApiError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Timeout | ApiError::Transport(_) => ErrorKind::Connectivity,
            ApiError::Status { status, .. } => match status {
                404 => ErrorKind::NotFound,
                400 => ErrorKind::BadInput,
                500 => ErrorKind::ServerError,
                503 => ErrorKind::Unavailable,
                _ => ErrorKind::Unexpected,
            },
            ApiError::Rejected(_) | ApiError::Decode(_) => ErrorKind::Unexpected,
        }
    }

    /// Text shown in the conversation. A human-readable backend message wins
    /// over the status-specific default.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Timeout | ApiError::Transport(_) => MSG_CONNECTIVITY.to_string(),
            ApiError::Status {
                status,
                error,
                message,
            } => {
                if let Some(error) = error {
                    return format!("❌ {}", error);
                }
                if let Some(message) = message {
                    return format!("⚠️ {}", message);
                }
                match self.kind() {
                    ErrorKind::NotFound => MSG_NOT_FOUND.to_string(),
                    ErrorKind::BadInput => MSG_BAD_INPUT.to_string(),
                    ErrorKind::ServerError => MSG_SERVER.to_string(),
                    ErrorKind::Unavailable => MSG_UNAVAILABLE.to_string(),
                    _ => format!(
                        "💥 Ocurrió un error inesperado ({}). Por favor, intenta nuevamente.",
                        status
                    ),
                }
            }
            ApiError::Rejected(message) => format!("❌ {}", message),
            ApiError::Decode(_) => MSG_GENERIC.to_string(),
        }
    }
}

// ── Tests ──
