//! Turn orchestration
//!
//! A turn is one user message and everything the bot sends back for it:
//! the first reply stream and, when that reply asks for the weather, a
//! status line plus a second reply stream answering with the forecast.

use super::error::{SubmitError, TurnError};
use super::message::{new_message_id, Message, Role};
use super::store::ConversationStore;
use super::stream::{send_and_stream, TurnLimits};
use super::weather::{select_call, WeatherTool};
use crate::llm::{ChatSession, SessionInput};
use crate::persona;
use rand::rngs::StdRng;
use rand::RngCore;
use std::sync::Arc;
use std::time::Instant;

/// Runtime used by the server
pub type ProductionRuntime = ChatRuntime<Arc<dyn ChatSession>, StdRng>;

/// Drives turns against one session, one at a time
pub struct ChatRuntime<S, R> {
    session: S,
    store: Arc<ConversationStore>,
    weather: WeatherTool<R>,
    limits: TurnLimits,
}

/// Summary of a turn that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSummary {
    pub used_tool: bool,
}

/// An accepted user message whose reply has not been produced yet.
///
/// Dropping the ticket clears the busy flag, so an abandoned turn never
/// leaves input locked.
pub struct TurnTicket {
    message: Message,
    store: Arc<ConversationStore>,
}

impl TurnTicket {
    pub fn message(&self) -> &Message {
        &self.message
    }
}

impl Drop for TurnTicket {
    fn drop(&mut self) {
        self.store.finish_turn();
    }
}

impl<S: ChatSession, R: RngCore> ChatRuntime<S, R> {
    pub fn new(
        session: S,
        store: Arc<ConversationStore>,
        weather: WeatherTool<R>,
        limits: TurnLimits,
    ) -> Self {
        Self {
            session,
            store,
            weather,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn model_id(&self) -> &str {
        self.session.model_id()
    }

    /// Accept a user message, or reject it without changing anything
    pub fn begin_turn(&self, text: &str) -> Result<TurnTicket, SubmitError> {
        let message = self.store.begin_turn(text)?;
        tracing::info!(message_id = %message.id, "Turn accepted");
        Ok(TurnTicket {
            message,
            store: Arc::clone(&self.store),
        })
    }

    /// Produce the bot's reply for an accepted message.
    ///
    /// Failures are already reported to the user as an apology message by
    /// the time this returns; the error is handed back for logging.
    pub async fn complete_turn(&self, ticket: TurnTicket) -> Result<TurnSummary, TurnError> {
        let start = Instant::now();
        let message_id = ticket.message.id.clone();
        let result = self.run_turn(ticket.message.text.clone()).await;

        match &result {
            Ok(summary) => {
                tracing::info!(
                    message_id = %message_id,
                    used_tool = summary.used_tool,
                    duration_ms = %start.elapsed().as_millis(),
                    "Turn complete"
                );
            }
            Err(e) => {
                tracing::error!(
                    message_id = %message_id,
                    error = %e,
                    kind = e.kind(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Turn failed"
                );
                self.store.push_bot(Message::bot(persona::APOLOGY));
            }
        }

        drop(ticket);
        result
    }

    async fn run_turn(&self, text: String) -> Result<TurnSummary, TurnError> {
        let first = send_and_stream(
            &self.session,
            SessionInput::Message(text),
            &self.store,
            &self.limits,
        )
        .await?;
        tracing::debug!(
            reply_id = ?first.message_id,
            tool_calls = first.tool_calls.len(),
            "First reply streamed"
        );

        let Some(call) = select_call(first.tool_calls) else {
            return Ok(TurnSummary { used_tool: false });
        };

        let resolution = self.weather.resolve(&call);
        if let Some(status) = resolution.status {
            self.store
                .push_bot(Message::new(new_message_id("bot-tool"), Role::Bot, status));
        }

        let follow_up = send_and_stream(
            &self.session,
            SessionInput::ToolResponse(vec![resolution.response]),
            &self.store,
            &self.limits,
        )
        .await?;

        if !follow_up.tool_calls.is_empty() {
            tracing::warn!(
                count = follow_up.tool_calls.len(),
                "Ignoring tool calls in follow-up reply; one tool round-trip per turn"
            );
        }

        Ok(TurnSummary { used_tool: true })
    }
}

#[cfg(test)]
impl<S: ChatSession, R: RngCore> ChatRuntime<S, R> {
    /// Accept and complete a turn in one call
    pub async fn send_message(
        &self,
        text: &str,
    ) -> Result<Result<TurnSummary, TurnError>, SubmitError> {
        let ticket = self.begin_turn(text)?;
        Ok(self.complete_turn(ticket).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::store::ChatEvent;
    use crate::chat::testing::{ScriptedReply, ScriptedSession};
    use crate::llm::{LlmError, StreamFragment, ToolCall};
    use rand::SeedableRng;
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn runtime_with(
        session: ScriptedSession,
        timeout: Duration,
    ) -> ChatRuntime<Arc<ScriptedSession>, StdRng> {
        ChatRuntime::new(
            Arc::new(session),
            Arc::new(ConversationStore::new()),
            WeatherTool::new(StdRng::seed_from_u64(42)),
            TurnLimits::new(timeout, CancellationToken::new()),
        )
    }

    fn runtime(session: ScriptedSession) -> ChatRuntime<Arc<ScriptedSession>, StdRng> {
        runtime_with(session, Duration::from_secs(5))
    }

    fn weather_call(id: &str, location: &str) -> ToolCall {
        ToolCall::new(id, persona::WEATHER_TOOL_NAME, json!({ "location": location }))
    }

    fn texts(runtime: &ChatRuntime<Arc<ScriptedSession>, StdRng>) -> Vec<(Role, String)> {
        runtime
            .store()
            .messages()
            .into_iter()
            .map(|m| (m.role, m.text))
            .collect()
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let rt = runtime(
            ScriptedSession::new().with_reply(ScriptedReply::text(&["Coorg is ", "lovely in July."])),
        );

        let summary = rt.send_message("Tell me about Coorg").await.unwrap().unwrap();

        assert!(!summary.used_tool);
        assert_eq!(
            texts(&rt),
            vec![
                (Role::User, "Tell me about Coorg".to_string()),
                (Role::Bot, "Coorg is lovely in July.".to_string()),
            ]
        );
        assert!(!rt.store().is_busy());
    }

    #[tokio::test]
    async fn test_image_tag_moves_background() {
        let rt = runtime(ScriptedSession::new().with_reply(ScriptedReply::text(&[
            "Munnar is misty. [IMAGE: Mun",
            "nar, Kerala] Enjoy the tea gardens!",
        ])));

        rt.send_message("Tell me about Munnar").await.unwrap().unwrap();

        let messages = rt.store().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "Munnar is misty. Enjoy the tea gardens!");
        assert!(!messages[1].text.contains("[IMAGE:"));

        let display = rt.store().display();
        assert_eq!(display.current_location_label, "Munnar, Kerala");
        assert_eq!(
            display.background_image_url,
            "https://source.unsplash.com/1920x1080/?Munnar,india,monsoon"
        );
    }

    #[tokio::test]
    async fn test_weather_round_trip() {
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![Ok(StreamFragment::call(weather_call(
                "call-1", "Munnar",
            )))]))
            .with_reply(ScriptedReply::text(&["Expect about ", "22°C with drizzle."]));
        let rt = runtime(session);

        let summary = rt
            .send_message("What's the weather in Munnar?")
            .await
            .unwrap()
            .unwrap();

        assert!(summary.used_tool);
        let texts = texts(&rt);
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1], (Role::Bot, "Checking the weather for Munnar... 🌿".to_string()));
        assert_eq!(texts[2], (Role::Bot, "Expect about 22°C with drizzle.".to_string()));

        let messages = rt.store().messages();
        assert!(messages[1].id.starts_with("bot-tool-"));
        assert!(messages[2].id.starts_with("bot-final-"));

        let inputs = rt.session.recorded_inputs();
        assert_eq!(inputs.len(), 2);
        assert_eq!(
            inputs[0],
            SessionInput::Message("What's the weather in Munnar?".to_string())
        );
        let SessionInput::ToolResponse(responses) = &inputs[1] else {
            panic!("expected a tool response, got {:?}", inputs[1]);
        };
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "call-1");
        assert_eq!(responses[0].name, persona::WEATHER_TOOL_NAME);
        let result = &responses[0].response["result"];
        assert_eq!(result["location"], "Munnar");
        assert!(result["temperature"].as_str().unwrap().ends_with("°C"));
        assert!(!rt.store().is_busy());
    }

    #[tokio::test]
    async fn test_extra_tool_calls_ignored() {
        let fragment = StreamFragment {
            text: None,
            function_calls: vec![weather_call("call-1", "Coorg"), weather_call("call-2", "Goa")],
        };
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![Ok(fragment)]))
            .with_reply(ScriptedReply::text(&["Coorg is drizzly."]));
        let rt = runtime(session);

        rt.send_message("Weather in Coorg and Goa?").await.unwrap().unwrap();

        let inputs = rt.session.recorded_inputs();
        assert_eq!(inputs.len(), 2);
        let SessionInput::ToolResponse(responses) = &inputs[1] else {
            panic!("expected a tool response");
        };
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, "call-1");
        // One status line only
        assert_eq!(
            texts(&rt)
                .iter()
                .filter(|(_, t)| t.starts_with("Checking the weather"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_follow_up_tool_calls_not_answered() {
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![Ok(StreamFragment::call(weather_call(
                "call-1", "Coorg",
            )))]))
            .with_reply(ScriptedReply::Fragments(vec![
                Ok(StreamFragment::text("Rainy and green.")),
                Ok(StreamFragment::call(weather_call("call-2", "Coorg"))),
            ]));
        let rt = runtime(session);

        rt.send_message("Coorg weather?").await.unwrap().unwrap();

        assert_eq!(rt.session.recorded_inputs().len(), 2);
        assert_eq!(texts(&rt).last().unwrap().1, "Rainy and green.");
    }

    #[tokio::test]
    async fn test_missing_location_gets_error_payload() {
        let call = ToolCall::new("call-1", persona::WEATHER_TOOL_NAME, json!({}));
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![Ok(StreamFragment::call(call))]))
            .with_reply(ScriptedReply::text(&["Which place did you have in mind?"]));
        let rt = runtime(session);

        rt.send_message("What's the weather?").await.unwrap().unwrap();

        let texts = texts(&rt);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1].1, "Which place did you have in mind?");

        let inputs = rt.session.recorded_inputs();
        let SessionInput::ToolResponse(responses) = &inputs[1] else {
            panic!("expected a tool response");
        };
        assert_eq!(
            responses[0].response,
            json!({"error": "missing required argument: location"})
        );
    }

    #[tokio::test]
    async fn test_text_then_tool_call() {
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![
                Ok(StreamFragment::text("Let me check.")),
                Ok(StreamFragment::call(weather_call("call-1", "Agumbe"))),
            ]))
            .with_reply(ScriptedReply::text(&["Heavy showers expected."]));
        let rt = runtime(session);

        rt.send_message("Agumbe weather?").await.unwrap().unwrap();

        let bot: Vec<String> = texts(&rt)
            .into_iter()
            .filter(|(r, _)| *r == Role::Bot)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(
            bot,
            vec![
                "Let me check.".to_string(),
                "Checking the weather for Agumbe... 🌿".to_string(),
                "Heavy showers expected.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_rejections() {
        let rt = runtime(ScriptedSession::new());

        assert_eq!(rt.begin_turn("   ").err(), Some(SubmitError::EmptyMessage));
        assert!(rt.store().messages().is_empty());

        let ticket = rt.begin_turn("Top 5 spots").unwrap();
        assert_eq!(rt.begin_turn("Travel tips").err(), Some(SubmitError::Busy));
        assert_eq!(rt.store().messages().len(), 1);
        assert!(rt.store().is_busy());

        drop(ticket);
        assert!(!rt.store().is_busy());
    }

    #[tokio::test]
    async fn test_open_failure_apologises() {
        let rt = runtime(
            ScriptedSession::new()
                .with_reply(ScriptedReply::OpenError(LlmError::rate_limit("quota exceeded"))),
        );

        let result = rt.send_message("Top 5 spots").await.unwrap();

        assert!(matches!(result, Err(TurnError::Transport(_))));
        assert_eq!(
            texts(&rt),
            vec![
                (Role::User, "Top 5 spots".to_string()),
                (Role::Bot, persona::APOLOGY.to_string()),
            ]
        );
        assert!(!rt.store().is_busy());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_text() {
        let rt = runtime(ScriptedSession::new().with_reply(ScriptedReply::Fragments(vec![
            Ok(StreamFragment::text("The Western Ghats ")),
            Err(LlmError::network("connection reset")),
        ])));

        let result = rt.send_message("Travel tips").await.unwrap();

        assert!(result.is_err());
        let texts = texts(&rt);
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1].1, "The Western Ghats ");
        assert_eq!(texts[2].1, persona::APOLOGY);
        assert!(!rt.store().is_busy());
    }

    #[tokio::test]
    async fn test_follow_up_failure_apologises_after_status() {
        let session = ScriptedSession::new()
            .with_reply(ScriptedReply::Fragments(vec![Ok(StreamFragment::call(weather_call(
                "call-1", "Goa",
            )))]))
            .with_reply(ScriptedReply::OpenError(LlmError::server_error("overloaded")));
        let rt = runtime(session);

        let result = rt.send_message("Goa weather?").await.unwrap();

        assert!(result.is_err());
        let texts = texts(&rt);
        assert_eq!(texts[1].1, "Checking the weather for Goa... 🌿");
        assert_eq!(texts[2].1, persona::APOLOGY);
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        let rt = runtime_with(
            ScriptedSession::new().with_reply(ScriptedReply::Stall(vec![StreamFragment::text(
                "Hmm",
            )])),
            Duration::from_millis(50),
        );

        let result = rt.send_message("Top 5 spots").await.unwrap();

        assert!(matches!(result, Err(TurnError::Timeout(_))));
        assert_eq!(texts(&rt).last().unwrap().1, persona::APOLOGY);
        assert!(!rt.store().is_busy());

        // Input is accepted again afterwards
        assert!(rt.begin_turn("Travel tips").is_ok());
    }

    #[tokio::test]
    async fn test_busy_events_bracket_turn() {
        let rt = runtime(ScriptedSession::new().with_reply(ScriptedReply::text(&["Hi!"])));
        let (_, mut rx) = rt.store().subscribe();

        rt.send_message("Hello").await.unwrap().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(ChatEvent::MessageAppended { .. })));
        assert!(matches!(events.get(1), Some(ChatEvent::BusyChanged { busy: true })));
        assert!(matches!(events.last(), Some(ChatEvent::BusyChanged { busy: false })));
    }
}
