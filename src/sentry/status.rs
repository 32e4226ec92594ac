//! Narrative status of the sentry.

use serde::{Deserialize, Serialize};

/// The one active narrative status. `Standby` is initial; there is no
/// terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Standby,
    Alerting,
    Scanning,
    Generating,
    Identified,
    Chatting,
}

impl Status {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Standby => "EN ESPERA",
            Status::Alerting => "¡ALERTA!",
            Status::Scanning => "ESCANEANDO",
            Status::Generating => "GENERANDO ANIMACIÓN...",
            Status::Identified => "IDENTIFICADO",
            Status::Chatting => "CHAT ACTIVO",
        }
    }

    /// Whether `next` is reachable from `self` in one transition.
    ///
    /// Any status may reset to standby; scanning may also fall back to
    /// standby when the capture fails.
    pub fn can_enter(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Standby, Alerting)
                | (Alerting, Scanning)
                | (Scanning, Generating)
                | (Generating, Identified)
                | (Identified, Chatting)
                | (Chatting, Identified)
                | (_, Standby)
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Standby => "standby",
            Status::Alerting => "alerting",
            Status::Scanning => "scanning",
            Status::Generating => "generating",
            Status::Identified => "identified",
            Status::Chatting => "chatting",
        };
        write!(f, "{name}")
    }
}
