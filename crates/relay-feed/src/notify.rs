//! Handshake notifications.
//!
//! Two independent suppressions apply per toast identity: a cooldown window
//! after each shown toast, and the notifier reporting an identical toast as
//! still visible. Neither affects order book state.

use crate::parser::BookEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Toast identity. At most one toast per identity is visible at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastId {
    HandshakeStarted,
    HandshakeCompleted,
}

impl ToastId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HandshakeStarted => "handshake-started",
            Self::HandshakeCompleted => "handshake-completed",
        }
    }

    /// Identity of the toast announcing `event`, if it announces one.
    pub fn for_event(event: &BookEvent) -> Option<Self> {
        match event {
            BookEvent::HandshakeStarted { .. } => Some(Self::HandshakeStarted),
            BookEvent::HandshakeCompleted { .. } => Some(Self::HandshakeCompleted),
            BookEvent::NewOrder(_) | BookEvent::OrderStateChange(_) => None,
        }
    }
}

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStatus {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub title: &'static str,
    pub description: &'static str,
    pub status: ToastStatus,
    pub duration: Duration,
    pub closable: bool,
}

impl Toast {
    pub fn handshake(id: ToastId, duration: Duration) -> Self {
        let (title, description) = match id {
            ToastId::HandshakeStarted => (
                "MPC Started",
                "A handshake with a counterparty has begun.",
            ),
            ToastId::HandshakeCompleted => (
                "MPC Finished",
                "A handshake with a counterparty has completed.",
            ),
        };
        Self {
            id,
            title,
            description,
            status: ToastStatus::Info,
            duration,
            closable: true,
        }
    }
}

/// Notification sink (the rendering layer).
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Whether a toast with this identity is currently visible.
    fn is_active(&self, id: ToastId) -> bool;

    fn show(&self, toast: Toast);
}

/// Per-identity cooldown.
#[derive(Debug)]
pub struct ToastGate {
    cooldown: Duration,
    cooldown_until: Mutex<HashMap<ToastId, Instant>>,
}

impl ToastGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            cooldown_until: Mutex::new(HashMap::new()),
        }
    }

    /// Pass if `id` is out of cooldown at `now`, starting a new cooldown.
    pub fn try_pass(&self, id: ToastId, now: Instant) -> bool {
        let mut until = self.cooldown_until.lock();
        if until.get(&id).is_some_and(|t| now < *t) {
            return false;
        }
        until.insert(id, now + self.cooldown);
        true
    }

    pub fn cooldown_until(&self, id: ToastId) -> Option<Instant> {
        self.cooldown_until.lock().get(&id).copied()
    }
}

/// Turns handshake events into de-duplicated toasts.
pub struct HandshakeNotifier {
    gate: ToastGate,
    notifier: Box<dyn Notifier>,
    duration: Duration,
}

impl HandshakeNotifier {
    pub fn new(notifier: Box<dyn Notifier>, cooldown: Duration, duration: Duration) -> Self {
        Self {
            gate: ToastGate::new(cooldown),
            notifier,
            duration,
        }
    }

    pub fn gate(&self) -> &ToastGate {
        &self.gate
    }

    /// Show the toast for `event` unless suppressed. Returns whether a toast
    /// was shown.
    pub fn notify(&self, event: &BookEvent, now: Instant) -> bool {
        let Some(id) = ToastId::for_event(event) else {
            return false;
        };
        if !self.gate.try_pass(id, now) {
            debug!(toast = %id, "Toast in cooldown");
            return false;
        }
        if self.notifier.is_active(id) {
            debug!(toast = %id, "Toast already visible");
            return false;
        }
        self.notifier.show(Toast::handshake(id, self.duration));
        true
    }
}

/// Notifier that logs toasts and treats each as visible for its duration.
#[derive(Debug, Default)]
pub struct LogNotifier {
    visible_until: Mutex<HashMap<ToastId, Instant>>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn is_active(&self, id: ToastId) -> bool {
        self.visible_until
            .lock()
            .get(&id)
            .is_some_and(|t| Instant::now() < *t)
    }

    fn show(&self, toast: Toast) {
        info!(toast = %toast.id, title = toast.title, "{}", toast.description);
        self.visible_until
            .lock()
            .insert(toast.id, Instant::now() + toast.duration);
    }
}
