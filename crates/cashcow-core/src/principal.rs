//! The caller behind a request.

use crate::user::User;

/// Who is making a request.
///
/// Handlers branch on the variant; there is no sentinel user value.
#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    Authenticated(User),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    /// The authenticated user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(user) => Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::credential::PasswordCredential;

    #[test]
    fn test_variants() {
        assert!(Principal::Anonymous.is_anonymous());
        assert!(Principal::Anonymous.user().is_none());

        let user = User {
            id: 1,
            farmer_id: None,
            email: "a@b.co".into(),
            phone_number: None,
            first_name: "A".into(),
            last_name: "B".into(),
            middle_name: String::new(),
            password: PasswordCredential::from_phc("$argon2id$stub"),
            is_activated: true,
            is_deleted: false,
            is_verified: false,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let principal = Principal::Authenticated(user);
        assert!(!principal.is_anonymous());
        assert_eq!(principal.user().map(|u| u.id), Some(1));
    }
}
