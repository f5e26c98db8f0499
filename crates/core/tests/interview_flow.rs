use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use voicedesk_core::{
    ConversationState, EntryKind, EventSink, KeyValueStore, LogEvent, MemoryStore,
    PersonaDescriptor, SessionEffect, StateStore, ToolContext, ToolRegistry, Transcript,
    prompt::resume_context,
    store::{mark_user_session, purge_stale_sessions},
};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<LogEvent>>,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: LogEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Minimal stand-in for the session driver: dispatch, then apply effects.
struct Harness {
    persona: PersonaDescriptor,
    registry: ToolRegistry,
    state: ConversationState,
    transcript: Transcript,
    store: StateStore,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        let persona = PersonaDescriptor::career();
        Self {
            registry: ToolRegistry::for_persona(&persona),
            state: ConversationState::new(persona.storage_prefix),
            transcript: Transcript::new(),
            store: StateStore::new(kv, persona.storage_prefix),
            sink: Arc::new(RecordingSink::default()),
            persona,
        }
    }

    async fn call(&mut self, name: &str, args: Value) -> Value {
        let (result, effects) = {
            let mut ctx = ToolContext::new(&mut self.state, &self.persona);
            let result = self.registry.dispatch(&mut ctx, name, &args.to_string());
            (result, ctx.into_effects())
        };
        for effect in effects {
            match effect {
                SessionEffect::Persist if !self.state.concluded => {
                    self.store.persist(&self.state, &self.transcript).unwrap()
                }
                SessionEffect::Persist => {}
                SessionEffect::ClearSaved => self.store.clear().unwrap(),
                SessionEffect::SaveSummary(summary) => {
                    self.store.save_summary(&summary).unwrap();
                }
                SessionEffect::Notice(text) => {
                    self.transcript.push(EntryKind::System, text);
                }
                SessionEffect::Say(text) => {
                    self.transcript.push(EntryKind::Assistant, text);
                }
                SessionEffect::Publish(event) => self.sink.publish(event).await,
                SessionEffect::Pause | SessionEffect::Logout { .. } => {}
            }
        }
        result
    }
}

#[tokio::test]
async fn test_interview_pause_and_resume() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    mark_user_session(kv.as_ref(), Some("Isha"), None).unwrap();

    let mut first = Harness::new(kv.clone());
    first.transcript.push(EntryKind::Assistant, "Hi! What's your name?");
    first.transcript.complete_user_turn("Isha");
    first
        .call("track_survey_response", json!({"question_id": "intro", "response": "Isha"}))
        .await;
    first
        .call(
            "track_survey_response",
            json!({"question_id": "academic_status", "response": "Second year physics"}),
        )
        .await;
    let stop = first.call("stop_conversation", json!({})).await;
    assert_eq!(stop["success"], json!(true));

    // A later visit with the login marker still set keeps the record.
    assert_eq!(purge_stale_sessions(kv.as_ref(), &["career"]).unwrap(), 0);

    let mut second = Harness::new(kv.clone());
    let stored = second.store.load().unwrap().expect("paused session saved");
    assert_eq!(stored.chat_history.len(), 2);
    second.state.resume_from(stored.state);
    second.transcript = Transcript::from_history(stored.chat_history);

    assert!(second.state.resuming);
    assert_eq!(second.state.participant_name.as_deref(), Some("Isha"));
    let context = resume_context(&second.persona, &second.state);
    assert!(context.contains("2 item(s) have already been answered: intro, academic_status."));

    let next = second.call("determine_next_question", json!({"completed_questions": []})).await;
    assert_eq!(next["next_question"], json!("career_confusion"));
}

#[tokio::test]
async fn test_summary_clears_active_record_for_good() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mut harness = Harness::new(kv.clone());

    harness
        .call("track_survey_response", json!({"question_id": "intro", "response": "Isha"}))
        .await;
    assert!(harness.store.load().unwrap().is_some());

    let result = harness
        .call(
            "end_session_summary",
            json!({"student_name": "Isha", "session_data": {}}),
        )
        .await;
    assert_eq!(result["summary_saved"], json!(true));
    assert!(harness.store.load().unwrap().is_none());

    // Later persists do not bring the cleared record back.
    harness.call("determine_next_question", json!({})).await;
    assert!(harness.store.load().unwrap().is_none());

    let summary = harness
        .store
        .load_summary(&harness.state.session_id)
        .unwrap()
        .expect("summary stored");
    assert_eq!(summary.total_answered, 1);

    let events = harness.sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "session_summary");
    assert_eq!(
        harness.transcript.entries().last().unwrap().text,
        "Session summary has been generated and saved."
    );
}

#[test]
fn test_fresh_login_drops_old_progress() {
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let store = StateStore::new(kv.clone(), "career");
    let mut state = ConversationState::new("career");
    state.record_answer("intro", "Isha", None, chrono::Utc::now());
    store.persist(&state, &Transcript::new()).unwrap();

    let removed = purge_stale_sessions(kv.as_ref(), &["career", "assistant", "portfolio"]).unwrap();
    assert_eq!(removed, 1);
    assert!(store.load().unwrap().is_none());
}
