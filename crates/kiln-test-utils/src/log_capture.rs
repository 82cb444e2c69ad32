//! A `tracing` layer that records events for assertions.

use std::fmt::{self, Write};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One recorded log event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    /// The formatted message followed by any extra fields as `name=value`.
    pub message: String,
    pub thread: Option<String>,
}

/// Shared sink of captured events.
///
/// # Example
///
/// ```rust
/// use kiln_test_utils::LogCapture;
///
/// let (_, logs) = LogCapture::capture(|| {
///     tracing::warn!("Failed to load 'a.tex': bad header");
///     tracing::debug!("noise");
/// });
/// assert_eq!(logs.warnings_containing("a.tex"), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer feeding this capture.
    pub fn layer(&self) -> CaptureLayer {
        CaptureLayer {
            events: Arc::clone(&self.events),
        }
    }

    /// Run `f` with a capture installed as the current thread's subscriber.
    ///
    /// Events emitted on other threads are not seen; use [`global`](Self::global)
    /// for those.
    pub fn capture<R>(f: impl FnOnce() -> R) -> (R, LogCapture) {
        let capture = LogCapture::new();
        let subscriber = tracing_subscriber::registry().with(capture.layer());
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, capture)
    }

    /// A capture installed as the global default subscriber.
    ///
    /// Installed on first use and shared by every test in the binary, so
    /// assertions should filter by something unique to the test, such as a
    /// resource path.
    pub fn global() -> &'static LogCapture {
        static GLOBAL: OnceLock<LogCapture> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let capture = LogCapture::new();
            let subscriber = tracing_subscriber::registry().with(capture.layer());
            if tracing::subscriber::set_global_default(subscriber).is_err() {
                eprintln!("LogCapture::global: a global subscriber was already installed");
            }
            capture
        })
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Events at exactly `level`.
    pub fn count(&self, level: Level) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.level == level)
            .count()
    }

    /// Warnings whose message mentions `needle`.
    pub fn warnings_containing(&self, needle: &str) -> usize {
        self.containing(Level::WARN, needle)
    }

    /// Events at `level` whose message mentions `needle`.
    pub fn containing(&self, level: Level, needle: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.level == level && event.message.contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// The [`Layer`] half of a [`LogCapture`].
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let metadata = event.metadata();
        self.events.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            thread: thread::current().name().map(str::to_string),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.message, " {}={:?}", field.name(), value);
        }
    }
}
