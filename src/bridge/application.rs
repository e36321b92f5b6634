//! Application open/quit state machine
//!
//! Closed is the initial state. The flags are written only by the pump when
//! the corresponding event arrives; everything else reads them through the
//! wait primitive. There is deliberately no guard against opening while
//! already open; callers check state first.

/// Application lifecycle flags
#[derive(Debug, Default)]
pub struct ApplicationState {
    opened: bool,
    quit: bool,
    config_full_name: Option<String>,
}

impl ApplicationState {
    /// True once the application reported a configuration as opened
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// True once the application confirmed shutdown
    pub fn has_quit(&self) -> bool {
        self.quit
    }

    /// Full path of the opened configuration, as reported by the application
    pub fn config_full_name(&self) -> Option<&str> {
        self.config_full_name.as_deref()
    }

    /// Clear the opened flag before issuing an open command, so a stale prior
    /// open cannot satisfy the wait
    pub(crate) fn clear_opened(&mut self) {
        self.opened = false;
        self.config_full_name = None;
    }

    /// Clear the quit flag before issuing a quit command
    pub(crate) fn clear_quit(&mut self) {
        self.quit = false;
    }

    pub(crate) fn on_open(&mut self, full_name: String) {
        self.config_full_name = Some(full_name);
        self.opened = true;
        self.quit = false;
    }

    pub(crate) fn on_quit(&mut self) {
        self.quit = true;
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_quit_transitions() {
        let mut app = ApplicationState::default();
        assert!(!app.is_open());

        app.on_open("C:\\configs\\demo.cfg".to_string());
        assert!(app.is_open());
        assert_eq!(app.config_full_name(), Some("C:\\configs\\demo.cfg"));

        app.on_quit();
        assert!(!app.is_open());
        assert!(app.has_quit());
    }

    #[test]
    fn clearing_removes_stale_confirmation() {
        let mut app = ApplicationState::default();
        app.on_open("a.cfg".to_string());

        app.clear_opened();
        assert!(!app.is_open());
        assert_eq!(app.config_full_name(), None);
    }
}
