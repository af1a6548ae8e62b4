//! The on-call buddy and transition detection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The person currently on call, as resolved from the calendar.
///
/// `name` is always lowercase. Either field may be empty: an empty name means
/// nobody could be resolved, an empty contact means the name is missing from
/// the buddies directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buddy {
    pub name: String,
    pub contact: String,
}

impl Buddy {
    pub fn new(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self { name: name.into(), contact: contact.into() }
    }

    /// The "nobody is on call" value.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.contact.is_empty()
    }

    /// True when a name was resolved, whether or not a contact is known.
    pub fn is_resolved(&self) -> bool {
        !self.name.is_empty()
    }
}

impl fmt::Display for Buddy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<nobody>")
        } else if self.contact.is_empty() {
            write!(f, "{} (no contact)", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.contact)
        }
    }
}

/// Reports whether the on-call buddy changed between two resolutions.
pub fn has_changed(previous: &Buddy, current: &Buddy) -> bool {
    previous.name != current.name || previous.contact != current.contact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_buddy_is_not_a_change() {
        let buddies = [
            Buddy::empty(),
            Buddy::new("alice", "+1-555-0100"),
            Buddy::new("bob", ""),
        ];
        for buddy in &buddies {
            assert!(!has_changed(buddy, &buddy.clone()), "{} should equal itself", buddy);
        }
    }

    #[test]
    fn test_any_field_difference_is_a_change() {
        let alice = Buddy::new("alice", "+1-555-0100");
        assert!(has_changed(&alice, &Buddy::new("bob", "+1-555-0100")));
        assert!(has_changed(&alice, &Buddy::new("alice", "+1-555-0199")));
        assert!(has_changed(&alice, &Buddy::empty()));
        assert!(has_changed(&Buddy::empty(), &alice));
    }

    #[test]
    fn test_empty_and_resolved() {
        assert!(Buddy::empty().is_empty());
        assert!(!Buddy::empty().is_resolved());

        let unknown = Buddy::new("bob", "");
        assert!(!unknown.is_empty());
        assert!(unknown.is_resolved());
        assert_eq!(unknown.to_string(), "bob (no contact)");
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let json = serde_json::to_value(Buddy::new("alice", "+1-555-0100")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "alice", "contact": "+1-555-0100"}));
    }
}
