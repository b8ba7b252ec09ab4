/// Phases of a presentation session.
///
/// `Break` and `Paused` are detours: leaving them returns to `Running`.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Running,
    Break,
    Paused,
    Debrief,
}

impl SessionPhase {
    pub fn allows_playback(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Phase entered once the operator confirms, or `None` at the end.
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome | Break | Paused => Running,
            Running => Debrief,
            Debrief => return None,
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Welcome => "welcome",
            SessionPhase::Running => "running",
            SessionPhase::Break => "break",
            SessionPhase::Paused => "paused",
            SessionPhase::Debrief => "debrief",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detours_return_to_running() {
        assert_eq!(SessionPhase::Break.next(), Some(SessionPhase::Running));
        assert_eq!(SessionPhase::Paused.next(), Some(SessionPhase::Running));
        assert_eq!(SessionPhase::Welcome.next(), Some(SessionPhase::Running));
    }

    #[test]
    fn debrief_is_terminal() {
        assert_eq!(SessionPhase::Running.next(), Some(SessionPhase::Debrief));
        assert_eq!(SessionPhase::Debrief.next(), None);
    }

    #[test]
    fn only_running_plays() {
        assert!(SessionPhase::Running.allows_playback());
        assert!(!SessionPhase::Paused.allows_playback());
        assert!(!SessionPhase::Welcome.allows_playback());
    }
}
