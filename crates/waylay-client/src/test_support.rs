//! Helpers shared by the unit tests.

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// A tracing layer that records the messages of warning events.
struct WarningLayer {
    messages: Arc<Mutex<Vec<String>>>,
}

/// Visitor to extract the message field from events.
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

impl<S: Subscriber> Layer<S> for WarningLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(visitor.message);
        }
    }
}

/// Run `f` and return its result with the warnings it logged on this thread.
pub(crate) fn capture_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(WarningLayer {
        messages: Arc::clone(&messages),
    });
    let result = tracing::subscriber::with_default(subscriber, f);
    let warnings = messages.lock().map(|m| m.clone()).unwrap_or_default();
    (result, warnings)
}

/// An unsigned token carrying `claims`.
pub(crate) fn mint_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

/// Claims of a token valid for another hour.
pub(crate) fn valid_claims() -> Value {
    let now = chrono::Utc::now().timestamp();
    serde_json::json!({
        "tenant": "tenant-1",
        "domain": "acme.waylay.io",
        "sub": "users/alice",
        "iat": now,
        "exp": now + 3600,
    })
}
