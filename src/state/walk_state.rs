/// Walk state definitions for the pagination walker
///
/// A walk moves `Init → FetchingPage(1) → Parsed(1) → FetchingPage(2) → ... → Done`.
/// A page that fails irrecoverably moves to `Aborted(n)`, from which the walk either
/// continues with the next page number or finishes, depending on the failure policy.
use std::fmt;

/// Represents the current state of a pagination walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalkState {
    /// Nothing fetched yet
    Init,

    /// The given page is being fetched and parsed
    FetchingPage(u32),

    /// The given page was fetched and parsed successfully
    Parsed(u32),

    /// The given page failed after exhausting retries
    Aborted(u32),

    /// The walk is over; no further pages will be fetched
    Done,
}

impl WalkState {
    /// Returns true if the walk cannot make further progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns the page number this state refers to, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::FetchingPage(n) | Self::Parsed(n) | Self::Aborted(n) => Some(*n),
            Self::Init | Self::Done => None,
        }
    }

    /// Checks whether moving from this state to `next` is a legal transition
    ///
    /// Page numbers only ever increase by one, so no page is visited twice.
    pub fn can_transition_to(&self, next: WalkState) -> bool {
        use WalkState::*;

        match (*self, next) {
            (Init, FetchingPage(1)) => true,
            (Init, Done) => true,
            (FetchingPage(n), Parsed(m)) | (FetchingPage(n), Aborted(m)) => n == m,
            (Parsed(n), FetchingPage(m)) | (Aborted(n), FetchingPage(m)) => m == n + 1,
            (Parsed(_), Done) | (Aborted(_), Done) => true,
            _ => false,
        }
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::FetchingPage(_) => "fetching",
            Self::Parsed(_) => "parsed",
            Self::Aborted(_) => "aborted",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WalkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page() {
            Some(n) => write!(f, "{}({})", self.label(), n),
            None => write!(f, "{}", self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(WalkState::Done.is_terminal());

        assert!(!WalkState::Init.is_terminal());
        assert!(!WalkState::FetchingPage(1).is_terminal());
        assert!(!WalkState::Parsed(1).is_terminal());
        assert!(!WalkState::Aborted(1).is_terminal());
    }

    #[test]
    fn test_page() {
        assert_eq!(WalkState::Init.page(), None);
        assert_eq!(WalkState::FetchingPage(3).page(), Some(3));
        assert_eq!(WalkState::Parsed(4).page(), Some(4));
        assert_eq!(WalkState::Aborted(5).page(), Some(5));
        assert_eq!(WalkState::Done.page(), None);
    }

    #[test]
    fn test_walk_starts_at_page_one() {
        assert!(WalkState::Init.can_transition_to(WalkState::FetchingPage(1)));
        assert!(!WalkState::Init.can_transition_to(WalkState::FetchingPage(2)));
        assert!(!WalkState::Init.can_transition_to(WalkState::Parsed(1)));
    }

    #[test]
    fn test_fetch_resolves_same_page() {
        let fetching = WalkState::FetchingPage(2);

        assert!(fetching.can_transition_to(WalkState::Parsed(2)));
        assert!(fetching.can_transition_to(WalkState::Aborted(2)));
        assert!(!fetching.can_transition_to(WalkState::Parsed(3)));
        assert!(!fetching.can_transition_to(WalkState::Done));
    }

    #[test]
    fn test_pages_advance_by_one() {
        assert!(WalkState::Parsed(1).can_transition_to(WalkState::FetchingPage(2)));
        assert!(WalkState::Aborted(2).can_transition_to(WalkState::FetchingPage(3)));

        assert!(!WalkState::Parsed(2).can_transition_to(WalkState::FetchingPage(2)));
        assert!(!WalkState::Parsed(2).can_transition_to(WalkState::FetchingPage(1)));
        assert!(!WalkState::Parsed(2).can_transition_to(WalkState::FetchingPage(4)));
    }

    #[test]
    fn test_done_is_final() {
        assert!(WalkState::Parsed(3).can_transition_to(WalkState::Done));
        assert!(WalkState::Aborted(3).can_transition_to(WalkState::Done));

        assert!(!WalkState::Done.can_transition_to(WalkState::FetchingPage(1)));
        assert!(!WalkState::Done.can_transition_to(WalkState::Init));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", WalkState::Init), "init");
        assert_eq!(format!("{}", WalkState::FetchingPage(2)), "fetching(2)");
        assert_eq!(format!("{}", WalkState::Aborted(7)), "aborted(7)");
        assert_eq!(format!("{}", WalkState::Done), "done");
    }
}
