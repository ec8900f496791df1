//! Tab and attendee-filter state for the notes list.
//!
//! Every `(mode, event)` pair resolves through [`transition`], and each state
//! maps to exactly one [`QueryPlan`].

use serde::{Deserialize, Serialize};

/// How many of the newest notes the untagged tab scans.
pub const UNTAGGED_LIMIT: usize = 200;
/// How many notes the recent tab shows without a filter.
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Recent,
    Untagged,
    #[default]
    ByAttendee,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViewMode::Recent => "recent",
            ViewMode::Untagged => "untagged",
            ViewMode::ByAttendee => "by-attendee",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    SelectTab(ViewMode),
    SelectAttendee(String),
    ClearAttendee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    Keep,
    Clear,
    Set(String),
}

/// The transition table.
pub fn transition(mode: ViewMode, event: &ViewEvent) -> (ViewMode, FilterAction) {
    match (mode, event) {
        (_, ViewEvent::SelectTab(ViewMode::ByAttendee)) => (ViewMode::ByAttendee, FilterAction::Clear),
        (_, ViewEvent::SelectTab(ViewMode::Untagged)) => (ViewMode::Untagged, FilterAction::Clear),
        (_, ViewEvent::SelectTab(ViewMode::Recent)) => (ViewMode::Recent, FilterAction::Keep),
        // The untagged tab has no attendee picker.
        (ViewMode::Untagged, ViewEvent::SelectAttendee(_)) => (ViewMode::Untagged, FilterAction::Keep),
        (mode, ViewEvent::SelectAttendee(id)) => (mode, FilterAction::Set(id.clone())),
        (mode, ViewEvent::ClearAttendee) => (mode, FilterAction::Clear),
    }
}

/// What the loader must fetch for a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Nothing to show yet; no backend call.
    Empty,
    ForAttendee(String),
    Untagged { limit: usize },
    Recent { limit: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotesView {
    mode: ViewMode,
    attendee: Option<String>,
}

impl NotesView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in `mode` with an optional filter, as if selected in that order.
    pub fn with(mode: ViewMode, attendee: Option<String>) -> Self {
        let mut view = Self::new();
        view.apply(&ViewEvent::SelectTab(mode));
        if let Some(id) = attendee {
            view.apply(&ViewEvent::SelectAttendee(id));
        }
        view
    }

    pub fn apply(&mut self, event: &ViewEvent) -> FilterAction {
        let (mode, action) = transition(self.mode, event);
        self.mode = mode;
        match &action {
            FilterAction::Keep => {}
            FilterAction::Clear => self.attendee = None,
            FilterAction::Set(id) => {
                let id = id.trim();
                self.attendee = (!id.is_empty()).then(|| id.to_string());
            }
        }
        action
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn attendee(&self) -> Option<&str> {
        self.attendee.as_deref()
    }

    pub fn plan(&self) -> QueryPlan {
        match (self.mode, self.attendee()) {
            (ViewMode::ByAttendee, None) => QueryPlan::Empty,
            (ViewMode::ByAttendee | ViewMode::Recent, Some(id)) => {
                QueryPlan::ForAttendee(id.to_string())
            }
            (ViewMode::Untagged, _) => QueryPlan::Untagged {
                limit: UNTAGGED_LIMIT,
            },
            (ViewMode::Recent, None) => QueryPlan::Recent {
                limit: RECENT_LIMIT,
            },
        }
    }

    /// Text shown when the list is empty.
    pub fn empty_message(&self) -> &'static str {
        match self.plan() {
            QueryPlan::Empty => "Select an attendee to see their notes",
            QueryPlan::ForAttendee(_) => "No notes for this attendee yet.",
            QueryPlan::Recent { .. } => "No recent notes.",
            QueryPlan::Untagged { .. } => "No untagged notes.",
        }
    }

    /// The attendee whose chips are emphasized; only the by-attendee tab does this.
    pub fn highlighted_attendee(&self) -> Option<&str> {
        match self.mode {
            ViewMode::ByAttendee => self.attendee(),
            _ => None,
        }
    }
}
