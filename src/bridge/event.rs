//! Typed notifications from the automation application
//!
//! The application reports state changes through named callbacks. A client
//! implementation decodes each callback once at the boundary into one of these
//! variants and queues it; the pump applies them in delivery order.

use serde::{Deserialize, Serialize};

/// A single notification queued by the automation application
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A configuration finished loading (`OnOpen`)
    Opened { full_name: String },
    /// The application confirmed shutdown (`OnQuit`)
    Quit,
    /// Measurement initialized; fires once per start, strictly before
    /// `MeasurementStarted` (`OnInit`)
    MeasurementInit,
    /// Measurement is running (`OnStart`)
    MeasurementStarted,
    /// Measurement stopped (`OnStop`)
    MeasurementStopped,
    /// The application is exiting mid-measurement (`OnExit`)
    MeasurementExit,
    /// A test module began executing (`OnStart`)
    ModuleStarted { module: String },
    /// A test module execution was paused (`OnPause`)
    ModulePaused { module: String },
    /// A test module stopped with the given raw reason code (`OnStop`)
    ModuleStopped { module: String, reason: i32 },
    /// An HTML report was generated, successfully or not, from a module's
    /// XML report (`OnReportGenerated`)
    ReportGenerated {
        module: String,
        success: bool,
        source_path: String,
        generated_path: String,
    },
    /// A variable changed value (`OnChange`)
    VariableChanged { variable: String, value: VariableValue },
    /// A variable changed value, with the split 64-bit timestamp notification
    /// form (`OnChangeAndTime`)
    VariableChangedAt {
        variable: String,
        value: VariableValue,
        time_high: i32,
        time_low: i32,
    },
    /// A diagnostic response arrived (`OnResponse`)
    DiagResponse { payload: Vec<u8> },
    /// The diagnostic layer reported a request timeout (`OnTimeout`)
    DiagRequestTimeout,
    /// A diagnostic request completed (`OnCompletion`)
    DiagCompletion,
    /// A diagnostic request was confirmed sent (`OnConfirmation`)
    DiagConfirmation,
}

/// Value of an automation variable
///
/// Mirrors the variable types the application knows: integer, float, string
/// and raw data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableValue {
    Int(i64),
    Float(f64),
    Text(String),
    Data(Vec<u8>),
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Data(v) => write!(f, "{:02x?}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_values_serialize_tagged() {
        let json = serde_json::to_string(&VariableValue::Int(42)).unwrap();
        assert_eq!(json, r#"{"int":42}"#);

        let back: VariableValue = serde_json::from_str(r#"{"text":"idle"}"#).unwrap();
        assert_eq!(back, VariableValue::Text("idle".to_string()));
    }

    #[test]
    fn display_is_log_friendly() {
        assert_eq!(VariableValue::Int(7).to_string(), "7");
        assert_eq!(
            VariableValue::Data(vec![0xAB, 0x01]).to_string(),
            "[ab, 01]"
        );
    }
}
