use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::session::StateSnapshot;

/// Everything the pipeline knows how to record. The tags are what lands in
/// exported logs, so they stay snake_case and stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    QuestionShown,
    ResponseSubmitted,
    HintRequested,
    LifeLost,
    SessionEnded,
    PeriodicSnapshot,
    KeyDown,
    KeyUp,
    OptionTapped,
    ShotFired,
    ShotHit,
    EndGamePressed,
    FeedbackShown,
    SandboxOpened,
    SandboxClosed,
}

impl EventKind {
    /// Kinds that must reach the durable side channel the moment they are
    /// recorded, not on the next capacity flush.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            EventKind::SessionStarted
                | EventKind::SessionEnded
                | EventKind::ResponseSubmitted
                | EventKind::LifeLost
        )
    }
}

/// Why a session reached its terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameOverCause {
    LivesLost,
    TimeUp,
    UserQuit,
}

/// One recorded transition, frozen with the session state as of that
/// instant. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub session_id: String,
    pub state: StateSnapshot,
    pub payload: Value,
}

/// Counts derived from a batch at finalize time; computed over the same
/// event list the batch carries, so the two always agree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_events: usize,
    pub questions_shown: usize,
    pub answers_submitted: usize,
}

impl BatchSummary {
    pub fn from_events(events: &[LogEvent]) -> Self {
        Self {
            total_events: events.len(),
            questions_shown: events
                .iter()
                .filter(|e| e.kind == EventKind::QuestionShown)
                .count(),
            answers_submitted: events
                .iter()
                .filter(|e| e.kind == EventKind::ResponseSubmitted)
                .count(),
        }
    }
}

/// What the host callback receives: streamed critical events while the
/// session runs, then one rollup at finalize. The `channel` tag lets the
/// receiver tell the two apart in serialized form.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Emission {
    Event {
        event: LogEvent,
    },
    Batch {
        session_id: String,
        cause: GameOverCause,
        summary: BatchSummary,
        events: Vec<LogEvent>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::session::SessionState;
    use serde_json::json;

    fn event(kind: EventKind) -> LogEvent {
        LogEvent {
            kind,
            timestamp: Utc::now(),
            elapsed_ms: 0,
            session_id: "s".into(),
            state: SessionState::new(&GameConfig::default()).snapshot(),
            payload: json!({}),
        }
    }

    #[test]
    fn test_critical_set_is_exactly_four_kinds() {
        let critical: Vec<EventKind> = [
            EventKind::SessionStarted,
            EventKind::QuestionShown,
            EventKind::ResponseSubmitted,
            EventKind::HintRequested,
            EventKind::LifeLost,
            EventKind::SessionEnded,
            EventKind::PeriodicSnapshot,
            EventKind::KeyDown,
            EventKind::KeyUp,
            EventKind::OptionTapped,
            EventKind::ShotFired,
            EventKind::ShotHit,
            EventKind::EndGamePressed,
            EventKind::FeedbackShown,
            EventKind::SandboxOpened,
            EventKind::SandboxClosed,
        ]
        .into_iter()
        .filter(|k| k.is_critical())
        .collect();
        assert_eq!(
            critical,
            vec![
                EventKind::SessionStarted,
                EventKind::ResponseSubmitted,
                EventKind::LifeLost,
                EventKind::SessionEnded,
            ]
        );
    }

    #[test]
    fn test_kind_tags_are_snake_case() {
        assert_eq!(EventKind::SessionStarted.to_string(), "session_started");
        assert_eq!(EventKind::PeriodicSnapshot.to_string(), "periodic_snapshot");
        assert_eq!(
            serde_json::to_string(&EventKind::LifeLost).unwrap(),
            "\"life_lost\""
        );
    }

    #[test]
    fn test_summary_counts_match_event_list() {
        let events = vec![
            event(EventKind::SessionStarted),
            event(EventKind::QuestionShown),
            event(EventKind::ResponseSubmitted),
            event(EventKind::QuestionShown),
            event(EventKind::ResponseSubmitted),
            event(EventKind::LifeLost),
            event(EventKind::SessionEnded),
        ];
        let summary = BatchSummary::from_events(&events);
        assert_eq!(summary.total_events, 7);
        assert_eq!(summary.questions_shown, 2);
        assert_eq!(summary.answers_submitted, 2);
    }

    #[test]
    fn test_emission_channels_carry_distinct_tags() {
        let single = Emission::Event {
            event: event(EventKind::LifeLost),
        };
        let value = serde_json::to_value(&single).unwrap();
        assert_eq!(value["channel"], "event");

        let batch = Emission::Batch {
            session_id: "s".into(),
            cause: GameOverCause::TimeUp,
            summary: BatchSummary::from_events(&[]),
            events: vec![],
        };
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["channel"], "batch");
        assert_eq!(value["cause"], "time_up");
    }

    #[test]
    fn test_log_event_round_trips_through_json() {
        let ev = event(EventKind::QuestionShown);
        let text = serde_json::to_string(&ev).unwrap();
        let back: LogEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, ev);
    }
}
