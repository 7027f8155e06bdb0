//! Simulated weather forecast tool
//!
//! The session declares one tool, `get_weather_forecast`. When the model
//! calls it we answer locally with plausible monsoon conditions; there is
//! no external weather service.

use crate::llm::{FunctionResponse, ToolCall};
use crate::persona;
use rand::{Rng, RngCore};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Mutex;

pub const WEATHER_CONDITION: &str = "Light rain with misty conditions and cool breezes";

/// Celsius, inclusive lower and exclusive upper bound
const TEMPERATURE_RANGE: std::ops::Range<u32> = 20..25;
/// Percent, inclusive lower and exclusive upper bound
const HUMIDITY_RANGE: std::ops::Range<u32> = 85..95;

/// Forecast returned to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeatherReport {
    pub location: String,
    /// e.g. `22°C`
    pub temperature: String,
    pub condition: String,
    /// e.g. `88%`
    pub humidity: String,
}

impl WeatherReport {
    pub fn simulate<R: Rng + ?Sized>(location: &str, rng: &mut R) -> Self {
        let temperature = rng.gen_range(TEMPERATURE_RANGE);
        let humidity = rng.gen_range(HUMIDITY_RANGE);
        Self {
            location: location.to_string(),
            temperature: format!("{temperature}°C"),
            condition: WEATHER_CONDITION.to_string(),
            humidity: format!("{humidity}%"),
        }
    }

    /// Structured payload sent back as the function response
    pub fn to_response(&self) -> Value {
        json!({ "result": self })
    }
}

/// How a tool call was answered
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResolution {
    /// Status line to show the user while the follow-up reply streams
    pub status: Option<String>,
    pub response: FunctionResponse,
}

/// Answers weather tool calls from an injected random source
pub struct WeatherTool<R> {
    rng: Mutex<R>,
}

impl<R: RngCore> WeatherTool<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn forecast(&self, location: &str) -> WeatherReport {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        WeatherReport::simulate(location, &mut *rng)
    }

    /// Answer a single tool call.
    ///
    /// Calls naming another tool, or lacking a string `location`, get an
    /// error payload so the model can still finish its reply.
    pub fn resolve(&self, call: &ToolCall) -> ToolResolution {
        if call.name != persona::WEATHER_TOOL_NAME {
            tracing::warn!(tool = %call.name, call_id = %call.id, "Model called an undeclared tool");
            return ToolResolution {
                status: None,
                response: error_response(call, &format!("unknown tool: {}", call.name)),
            };
        }

        let Some(location) = call.str_arg("location").filter(|l| !l.trim().is_empty()) else {
            tracing::warn!(call_id = %call.id, args = %call.args, "Weather call without a location");
            return ToolResolution {
                status: None,
                response: error_response(call, "missing required argument: location"),
            };
        };

        let report = self.forecast(location);
        tracing::info!(
            call_id = %call.id,
            location = %report.location,
            temperature = %report.temperature,
            humidity = %report.humidity,
            "Answered weather tool call"
        );

        ToolResolution {
            status: Some(persona::weather_status(location)),
            response: FunctionResponse {
                id: call.id.clone(),
                name: call.name.clone(),
                response: report.to_response(),
            },
        }
    }
}

fn error_response(call: &ToolCall, error: &str) -> FunctionResponse {
    FunctionResponse {
        id: call.id.clone(),
        name: call.name.clone(),
        response: json!({ "error": error }),
    }
}

/// Keep the first tool call of a reply; later ones are logged and dropped
pub fn select_call(calls: Vec<ToolCall>) -> Option<ToolCall> {
    let mut calls = calls.into_iter();
    let first = calls.next()?;
    for extra in calls {
        tracing::warn!(
            tool = %extra.name,
            call_id = %extra.id,
            kept = %first.id,
            "Ignoring additional tool call; one call is handled per reply"
        );
    }
    Some(first)
}
