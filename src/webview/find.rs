// src/webview/find.rs
//! Find-on-page bookkeeping for one view.
//!
//! Each new search text gets a fresh request id; repeating the same text is a
//! "find next". Results from the renderer carry the id they answer, so updates
//! for superseded searches can be discarded.

use serde::{Deserialize, Serialize};

/// A search forwarded to the implementation. `req_id == 0` clears the search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    pub req_id: i32,
    pub text: String,
    pub match_case: bool,
    pub find_next: bool,
    pub forward: bool,
}

impl FindRequest {
    pub fn is_stop(&self) -> bool {
        self.req_id == 0
    }
}

#[derive(Debug, Default)]
pub struct FindOnPage {
    req_id: i32,
    text: String,
    number_of_matches: i32,
    active_match_ordinal: i32,
}

impl FindOnPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_request(&mut self, text: &str, match_case: bool, forward: bool) -> FindRequest {
        let find_next = self.text == text;
        if !find_next {
            self.text = text.to_string();
            self.number_of_matches = 0;
            self.active_match_ordinal = 0;
            if !text.is_empty() {
                self.req_id = self.req_id.wrapping_add(1);
                if self.req_id <= 0 {
                    self.req_id = 1;
                }
            }
        }
        FindRequest {
            req_id: if self.text.is_empty() { 0 } else { self.req_id },
            text: self.text.clone(),
            match_case,
            find_next,
            forward,
        }
    }

    /// Applies a result. `-1` leaves a field unchanged. Returns `false` for
    /// results answering an older request.
    pub fn apply_update(&mut self, req_id: i32, number_of_matches: i32, active_match_ordinal: i32) -> bool {
        if req_id != self.req_id {
            return false;
        }
        if number_of_matches != -1 {
            self.number_of_matches = number_of_matches;
        }
        if active_match_ordinal != -1 {
            self.active_match_ordinal = active_match_ordinal;
        }
        true
    }

    pub fn number_of_matches(&self) -> i32 {
        self.number_of_matches
    }

    /// Zero-based index of the highlighted match, `-1` when there is none.
    pub fn active_match_index(&self) -> i32 {
        self.active_match_ordinal - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_assign_a_new_id_per_text_and_reuse_it_for_find_next() {
        let mut find = FindOnPage::new();
        let first = find.make_request("needle", false, true);
        assert_eq!(first.req_id, 1);
        assert!(!first.find_next);

        let again = find.make_request("needle", false, false);
        assert_eq!(again.req_id, 1);
        assert!(again.find_next);
        assert!(!again.forward);

        let other = find.make_request("haystack", true, true);
        assert_eq!(other.req_id, 2);
        assert!(other.match_case);
    }

    #[test]
    fn it_should_send_a_stop_request_for_empty_text() {
        let mut find = FindOnPage::new();
        find.make_request("needle", false, true);
        let stop = find.make_request("", false, true);
        assert!(stop.is_stop());
        // The id counter does not move for a stop.
        assert_eq!(find.make_request("pin", false, true).req_id, 2);
    }

    #[test]
    fn it_should_wrap_the_request_id_to_one() {
        let mut find = FindOnPage {
            req_id: i32::MAX,
            ..FindOnPage::default()
        };
        assert_eq!(find.make_request("x", false, true).req_id, 1);
    }

    #[test]
    fn it_should_drop_stale_updates_and_keep_unchanged_fields() {
        let mut find = FindOnPage::new();
        find.make_request("a", false, true);
        find.make_request("b", false, true);

        assert!(!find.apply_update(1, 10, 1));
        assert_eq!(find.number_of_matches(), 0);

        assert!(find.apply_update(2, 4, -1));
        assert_eq!(find.number_of_matches(), 4);
        assert_eq!(find.active_match_index(), -1);

        assert!(find.apply_update(2, -1, 3));
        assert_eq!(find.number_of_matches(), 4);
        assert_eq!(find.active_match_index(), 2);
    }
}
