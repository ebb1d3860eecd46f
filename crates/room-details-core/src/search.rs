use tracing::trace;

/// Search-field presentation policy for sheets that host a searchable list.
///
/// While a search is active the sheet must not be swiped away, and a sheet
/// that disappears mid-search ends the search so the pushed-back view starts
/// clean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchPresentation {
    is_searching: bool,
}

impl SearchPresentation {
    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn begin_search(&mut self) {
        self.is_searching = true;
    }

    pub fn end_search(&mut self) {
        self.is_searching = false;
    }

    /// Interactive (swipe) dismissal is blocked while searching.
    pub fn interactive_dismiss_disabled(&self) -> bool {
        self.is_searching
    }

    /// Handle the view disappearing. Returns `true` when a search was dismissed.
    pub fn on_disappear(&mut self) -> bool {
        if !self.is_searching {
            return false;
        }
        trace!("dismissing search on disappear");
        self.is_searching = false;
        true
    }
}
