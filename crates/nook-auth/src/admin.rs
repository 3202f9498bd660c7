//! Admin allow-list for privileged room actions.

use std::collections::HashSet;

/// The set of public keys allowed to change room visibility, fixed at
/// startup. An empty set means nobody passes; there is no implicit
/// first-user or localhost escape hatch.
///
/// Membership is an exact, case-sensitive string comparison against the
/// hex key exactly as the signer presented it, and it is only consulted
/// after the signature over the action has verified.
#[derive(Debug, Clone, Default)]
pub struct AdminKeys {
    keys: HashSet<String>,
}

impl AdminKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated configuration value, trimming whitespace
    /// around entries and dropping empty ones.
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        )
    }

    pub fn is_admin(&self, pubkey: &str) -> bool {
        self.keys.contains(pubkey)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "036903c174e82ef03e7fd5d721f233fa7b86eea298fda2e27372015b32d2bc7a29";

    #[test]
    fn membership_is_exact() {
        let admins = AdminKeys::new([KEY]);
        assert!(admins.is_admin(KEY));
        assert!(!admins.is_admin(&KEY.to_uppercase()));
        assert!(!admins.is_admin(&format!(" {KEY}")));
        assert!(!admins.is_admin(&format!("{KEY} ")));
        assert!(!admins.is_admin(&KEY[..64]));
        assert!(!admins.is_admin(""));
    }

    #[test]
    fn empty_list_fails_closed() {
        let admins = AdminKeys::default();
        assert!(admins.is_empty());
        assert!(!admins.is_admin(KEY));
    }

    #[test]
    fn parse_trims_and_drops_empties() {
        let admins = AdminKeys::parse(&format!(" {KEY} , , 02abcd ,"));
        assert_eq!(admins.len(), 2);
        assert!(admins.is_admin(KEY));
        assert!(admins.is_admin("02abcd"));
        assert!(!admins.is_admin(&format!(" {KEY} ")));
    }

    #[test]
    fn parse_of_empty_string_is_empty() {
        assert!(AdminKeys::parse("").is_empty());
        assert!(AdminKeys::parse(" , ,").is_empty());
    }
}
