use serde::Deserialize;

use crate::models::MealContext;

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceInterpretation {
    Glucose {
        value: f64,
        meal_context: Option<MealContext>,
        notes: Option<String>,
    },
    Insulin {
        units: f64,
        insulin_type: String,
        notes: Option<String>,
    },
    Medication {
        name: String,
        dosage: Option<String>,
    },
    Activity {
        activity_type: String,
        duration_minutes: i32,
        intensity: Option<String>,
    },
    Unrecognized {
        transcript: Option<String>,
    },
    ParseError {
        message: String,
    },
}

impl VoiceInterpretation {
    pub fn is_loggable(&self) -> bool {
        !matches!(
            self,
            VoiceInterpretation::Unrecognized { .. } | VoiceInterpretation::ParseError { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            VoiceInterpretation::Glucose {
                value,
                meal_context,
                ..
            } => match meal_context {
                Some(context) => format!("glucose reading of {value} mg/dL ({context})"),
                None => format!("glucose reading of {value} mg/dL"),
            },
            VoiceInterpretation::Insulin {
                units,
                insulin_type,
                ..
            } => format!("{units} units of {insulin_type} insulin"),
            VoiceInterpretation::Medication { name, dosage } => match dosage {
                Some(dosage) => format!("medication {name} ({dosage})"),
                None => format!("medication {name}"),
            },
            VoiceInterpretation::Activity {
                activity_type,
                duration_minutes,
                ..
            } => format!("{duration_minutes} minutes of {activity_type}"),
            VoiceInterpretation::Unrecognized { transcript } => match transcript {
                Some(text) => format!("unrecognized note: \"{text}\""),
                None => "unrecognized note".to_string(),
            },
            VoiceInterpretation::ParseError { message } => {
                format!("could not read interpretation: {message}")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInterpretation {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<f64>,
    meal_context: Option<String>,
    notes: Option<String>,
    units: Option<f64>,
    insulin_type: Option<String>,
    name: Option<String>,
    dosage: Option<String>,
    activity_type: Option<String>,
    duration_minutes: Option<f64>,
    intensity: Option<String>,
    transcript: Option<String>,
}

pub fn interpret(raw_json: &str) -> VoiceInterpretation {
    let raw: RawInterpretation = match serde_json::from_str(raw_json) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("rejected voice interpretation payload: {err}");
            return VoiceInterpretation::ParseError {
                message: err.to_string(),
            };
        }
    };

    match validate(raw) {
        Ok(interpretation) => interpretation,
        Err(message) => {
            log::warn!("voice interpretation failed validation: {message}");
            VoiceInterpretation::ParseError { message }
        }
    }
}

fn validate(raw: RawInterpretation) -> Result<VoiceInterpretation, String> {
    let kind = raw
        .kind
        .as_deref()
        .map(|kind| kind.trim().to_ascii_lowercase())
        .ok_or_else(|| "missing field `type`".to_string())?;

    match kind.as_str() {
        "glucose" => {
            let value = positive(raw.value, "value")?;
            let meal_context = match raw.meal_context.as_deref() {
                Some(context) if !context.trim().is_empty() => {
                    Some(context.parse::<MealContext>().map_err(|err| err.to_string())?)
                }
                _ => None,
            };
            Ok(VoiceInterpretation::Glucose {
                value,
                meal_context,
                notes: non_empty(raw.notes),
            })
        }
        "insulin" => Ok(VoiceInterpretation::Insulin {
            units: positive(raw.units, "units")?,
            insulin_type: required(raw.insulin_type, "insulin_type")?,
            notes: non_empty(raw.notes),
        }),
        "medication" => Ok(VoiceInterpretation::Medication {
            name: required(raw.name, "name")?,
            dosage: non_empty(raw.dosage),
        }),
        "activity" => {
            let minutes = positive(raw.duration_minutes, "duration_minutes")?;
            if minutes.fract() != 0.0 || minutes > f64::from(i32::MAX) {
                return Err(format!("duration_minutes must be a whole number, got {minutes}"));
            }
            Ok(VoiceInterpretation::Activity {
                activity_type: required(raw.activity_type, "activity_type")?,
                duration_minutes: minutes as i32,
                intensity: non_empty(raw.intensity),
            })
        }
        _ => Ok(VoiceInterpretation::Unrecognized {
            transcript: non_empty(raw.transcript),
        }),
    }
}

fn positive(value: Option<f64>, field: &str) -> Result<f64, String> {
    let value = value.ok_or_else(|| format!("missing field `{field}`"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("`{field}` must be a positive number, got {value}"));
    }
    Ok(value)
}

fn required(value: Option<String>, field: &str) -> Result<String, String> {
    non_empty(value).ok_or_else(|| format!("missing field `{field}`"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_glucose_entry() {
        let parsed = interpret(
            r#"{"type": "glucose", "value": 142, "meal_context": "after meal", "notes": " lunch "}"#,
        );
        assert_eq!(
            parsed,
            VoiceInterpretation::Glucose {
                value: 142.0,
                meal_context: Some(MealContext::AfterMeal),
                notes: Some("lunch".to_string()),
            }
        );
        assert!(parsed.is_loggable());
    }

    #[test]
    fn reads_insulin_and_activity() {
        let insulin = interpret(r#"{"type": "insulin", "units": 4.5, "insulin_type": "rapid"}"#);
        assert!(matches!(
            insulin,
            VoiceInterpretation::Insulin { units, .. } if units == 4.5
        ));

        let activity = interpret(
            r#"{"type": "Activity", "activity_type": "walking", "duration_minutes": 30}"#,
        );
        assert_eq!(
            activity,
            VoiceInterpretation::Activity {
                activity_type: "walking".to_string(),
                duration_minutes: 30,
                intensity: None,
            }
        );
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let parsed = interpret(r#"{"type": "unrecognized", "transcript": "call mom later"}"#);
        assert_eq!(
            parsed,
            VoiceInterpretation::Unrecognized {
                transcript: Some("call mom later".to_string())
            }
        );
        assert!(!parsed.is_loggable());

        let other = interpret(r#"{"type": "weather"}"#);
        assert_eq!(other, VoiceInterpretation::Unrecognized { transcript: None });
    }

    #[test]
    fn malformed_payloads_become_parse_errors() {
        assert!(matches!(
            interpret("not json"),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"value": 120}"#),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"type": "glucose"}"#),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"type": "glucose", "value": -5}"#),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"type": "glucose", "value": 110, "meal_context": "brunch"}"#),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"type": "activity", "activity_type": "yoga", "duration_minutes": 12.5}"#),
            VoiceInterpretation::ParseError { .. }
        ));
        assert!(matches!(
            interpret(r#"{"type": "medication", "name": "  "}"#),
            VoiceInterpretation::ParseError { .. }
        ));
    }

    #[test]
    fn describe_is_human_readable() {
        let parsed = VoiceInterpretation::Medication {
            name: "metformin".to_string(),
            dosage: Some("500 mg".to_string()),
        };
        assert_eq!(parsed.describe(), "medication metformin (500 mg)");
    }
}
