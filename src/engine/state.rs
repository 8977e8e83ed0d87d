use std::collections::HashSet;

use crate::model::MemberId;

/// The members of a group, in the order they joined.
#[derive(Debug, Default)]
pub struct Roster {
    members: Vec<MemberId>,
    known: HashSet<MemberId>,
}

impl Roster {
    /// Add `member`, returning false if it was already on the roster.
    pub fn insert(&mut self, member: &str) -> bool {
        if self.contains(member) {
            return false;
        }
        self.known.insert(member.to_string());
        self.members.push(member.to_string());
        true
    }

    fn contains(&self, member: &str) -> bool {
        self.known.contains(member)
    }

    pub fn as_slice(&self) -> &[MemberId] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_default_is_empty() {
        let roster = Roster::default();
        assert!(roster.as_slice().is_empty());
        assert!(!roster.contains("alice"));
    }

    #[test]
    fn roster_keeps_join_order_without_duplicates() {
        let mut roster = Roster::default();
        assert!(roster.insert("carol"));
        assert!(roster.insert("alice"));
        assert!(!roster.insert("carol"));

        assert_eq!(roster.as_slice(), ["carol", "alice"]);
        assert!(roster.contains("alice"));
        assert!(!roster.contains("bob"));
    }
}
