//! Compile sessions.
//!
//! A compile session is one live editing surface bound to a single ruleset
//! view. The registry tracks the open sessions, swaps refreshed views into
//! them when the rule engine publishes changes, and toggles their mutability
//! while a scan or compile holds the engines. Sessions end only through an
//! explicit close from the presentation layer.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dragnet_protocol::{RulesetView, SessionId, UiEvent};

/// One live compile session and the view it is bound to.
#[derive(Debug, Clone)]
pub struct CompileSession {
    id: SessionId,
    view: RulesetView,
    enabled: bool,
}

impl CompileSession {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn view(&self) -> &RulesetView {
        &self.view
    }

    /// Whether the session may currently trigger compiles.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// The set of open compile sessions.
pub struct SessionRegistry {
    sessions: Vec<CompileSession>,
    /// Mutability applied to current and newly opened sessions.
    enabled: bool,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl SessionRegistry {
    pub fn new(ui: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self {
            sessions: Vec::new(),
            enabled: true,
            ui,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<&CompileSession> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    /// View currently bound to `id`, for recompile requests.
    pub fn view_of(&self, id: &SessionId) -> Option<RulesetView> {
        self.get(id).map(|s| s.view().clone())
    }

    /// Open a session bound to `view` and announce it. The new session
    /// inherits the current enabled state.
    pub fn open(&mut self, view: RulesetView) -> SessionId {
        let id = SessionId::new();
        info!(
            session = %id,
            ruleset = %view.display_name(),
            "compile session opened"
        );
        self.emit(UiEvent::SessionOpened {
            id: id.clone(),
            view: view.clone(),
        });
        self.sessions.push(CompileSession {
            id: id.clone(),
            view,
            enabled: self.enabled,
        });
        id
    }

    /// Drop the session the presentation layer closed. Returns whether a
    /// session was actually removed.
    pub fn close(&mut self, id: &SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id() != id);
        let removed = self.sessions.len() != before;
        if removed {
            info!(session = %id, "compile session closed");
        } else {
            warn!(session = %id, "close for unknown compile session ignored");
        }
        removed
    }

    /// Swap refreshed views into every session whose source appears in
    /// `views`. Sessions bound to sources the update does not mention keep
    /// their current view untouched; unchanged views produce no update.
    pub fn refresh(&mut self, views: &[RulesetView]) {
        for session in &mut self.sessions {
            let Some(updated) = views.iter().find(|v| v.same_source(&session.view)) else {
                continue;
            };
            if *updated == session.view {
                continue;
            }
            debug!(
                session = %session.id,
                ruleset = %updated.display_name(),
                revision = updated.revision(),
                "session view refreshed"
            );
            session.view = updated.clone();
            let event = UiEvent::SessionUpdated {
                id: session.id.clone(),
                view: session.view.clone(),
            };
            if self.ui.send(event).is_err() {
                warn!("presentation channel closed; dropping event");
            }
        }
    }

    /// Toggle mutability of all open sessions at once. Emits the change only
    /// when the value actually flips.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        for session in &mut self.sessions {
            session.enabled = enabled;
        }
        debug!(enabled, sessions = self.sessions.len(), "compile sessions toggled");
        self.emit(UiEvent::SessionsEnabled(enabled));
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            warn!("presentation channel closed; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (SessionRegistry, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionRegistry::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn view(path: &str) -> RulesetView {
        RulesetView::new(path).unwrap()
    }

    #[test]
    fn test_open_announces_and_registers() {
        let (mut registry, mut rx) = registry();
        let id = registry.open(view("/rules/a.yar"));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_some());
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [UiEvent::SessionOpened { id: opened, .. }] if *opened == id
        ));
    }

    #[test]
    fn test_close_removes_only_the_named_session() {
        let (mut registry, _rx) = registry();
        let a = registry.open(view("/rules/a.yar"));
        let b = registry.open(view("/rules/b.yar"));

        assert!(registry.close(&a));
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&b).is_some());

        // A second close of the same id is a no-op.
        assert!(!registry.close(&a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_refresh_swaps_matching_views() {
        let (mut registry, mut rx) = registry();
        let id = registry.open(view("/rules/a.yar"));
        drain(&mut rx);

        let recompiled = view("/rules/a.yar").compiled_ok();
        registry.refresh(&[recompiled.clone(), view("/rules/b.yar")]);

        assert_eq!(registry.view_of(&id), Some(recompiled));
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [UiEvent::SessionUpdated { id: updated, view }]
                if *updated == id && view.is_compiled()
        ));
    }

    #[test]
    fn test_refresh_carries_compile_errors() {
        let (mut registry, mut rx) = registry();
        let id = registry.open(view("/rules/a.yar"));
        drain(&mut rx);

        let failed = view("/rules/a.yar").compile_failed("undefined identifier \"foo\"");
        registry.refresh(&[failed]);

        let bound = registry.view_of(&id).unwrap();
        assert_eq!(bound.error(), Some("undefined identifier \"foo\""));
        assert!(!bound.is_compiled());
    }

    #[test]
    fn test_unrelated_refresh_leaves_session_untouched() {
        let (mut registry, mut rx) = registry();
        let id = registry.open(view("/rules/a.yar"));
        let bound = registry.view_of(&id).unwrap();
        drain(&mut rx);

        // Update mentions a different source only.
        registry.refresh(&[view("/rules/b.yar").compiled_ok()]);
        assert_eq!(registry.view_of(&id), Some(bound.clone()));
        assert!(drain(&mut rx).is_empty());

        // Update mentions the same source at the same revision.
        registry.refresh(&[bound.clone()]);
        assert_eq!(registry.view_of(&id), Some(bound));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_set_enabled_applies_to_all_sessions() {
        let (mut registry, mut rx) = registry();
        let a = registry.open(view("/rules/a.yar"));
        let b = registry.open(view("/rules/b.yar"));
        drain(&mut rx);

        registry.set_enabled(false);
        assert!(!registry.get(&a).unwrap().is_enabled());
        assert!(!registry.get(&b).unwrap().is_enabled());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [UiEvent::SessionsEnabled(false)]
        ));

        // Repeating the same state emits nothing.
        registry.set_enabled(false);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_sessions_opened_while_disabled_start_disabled() {
        let (mut registry, _rx) = registry();
        registry.set_enabled(false);
        let id = registry.open(view("/rules/a.yar"));
        assert!(!registry.get(&id).unwrap().is_enabled());

        registry.set_enabled(true);
        assert!(registry.get(&id).unwrap().is_enabled());
    }
}
