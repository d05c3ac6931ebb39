/// Credentials accepted by a Subsonic-compatible server.
///
/// Docs: https://www.subsonic.org/pages/api.jsp (Authentication)
#[derive(Clone, PartialEq, Eq)]
pub enum SubsonicCredentials {
    /// Pre-computed `t = md5(password + salt)` together with its salt.
    Token {
        username: String,
        token: String,
        salt: String,
    },
    /// Legacy clear-text password. Only used when no salt is available.
    Password { username: String, password: String },
}

impl std::fmt::Debug for SubsonicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { username, .. } => f
                .debug_struct("Token")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

impl SubsonicCredentials {
    /// Picks the strongest scheme the supplied values allow.
    ///
    /// Precedence: token + salt, then password + salt (hashed here), then plain password.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
        salt: Option<String>,
    ) -> Option<Self> {
        let username = username.filter(|u| !u.is_empty())?;
        let password = password.filter(|p| !p.is_empty());
        let token = token.filter(|t| !t.is_empty());
        let salt = salt.filter(|s| !s.is_empty());

        match (token, password, salt) {
            (Some(token), _, Some(salt)) => Some(Self::Token {
                username,
                token,
                salt,
            }),
            (_, Some(password), Some(salt)) => Some(Self::Token {
                username,
                token: salted_token(&password, &salt),
                salt,
            }),
            (_, Some(password), None) => Some(Self::Password { username, password }),
            _ => None,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Token { username, .. } | Self::Password { username, .. } => username,
        }
    }
}

/// `md5(password + salt)` as lowercase hex.
pub fn salted_token(password: &str, salt: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", password, salt)))
}

/// Query parameters identifying the caller on every request.
pub fn auth_query_pairs(
    credentials: &SubsonicCredentials,
    api_version: &str,
    client_name: &str,
) -> Vec<(&'static str, String)> {
    let mut pairs = match credentials {
        SubsonicCredentials::Token {
            username,
            token,
            salt,
        } => vec![
            ("u", username.clone()),
            ("t", token.clone()),
            ("s", salt.clone()),
        ],
        SubsonicCredentials::Password { username, password } => {
            vec![("u", username.clone()), ("p", password.clone())]
        }
    };
    pairs.push(("v", api_version.to_string()));
    pairs.push(("c", client_name.to_string()));
    pairs.push(("f", "json".to_string()));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_salted_token_matches_reference_value() {
        // Example from the Subsonic API documentation.
        assert_eq!(
            salted_token("sesame", "c19b2d"),
            "26719a1196d2a940705a59634eb18eab"
        );
    }

    #[test]
    fn test_token_and_salt_take_precedence() {
        let creds =
            SubsonicCredentials::from_parts(some("alice"), some("pw"), some("tok"), some("salt"))
                .unwrap();
        assert_eq!(
            creds,
            SubsonicCredentials::Token {
                username: "alice".into(),
                token: "tok".into(),
                salt: "salt".into(),
            }
        );
    }

    #[test]
    fn test_password_with_salt_is_hashed() {
        let creds =
            SubsonicCredentials::from_parts(some("alice"), some("sesame"), None, some("c19b2d"))
                .unwrap();
        assert_eq!(
            creds,
            SubsonicCredentials::Token {
                username: "alice".into(),
                token: "26719a1196d2a940705a59634eb18eab".into(),
                salt: "c19b2d".into(),
            }
        );
    }

    #[test]
    fn test_plain_password_fallback() {
        let creds =
            SubsonicCredentials::from_parts(some("alice"), some("pw"), some("tok"), None).unwrap();
        assert!(matches!(creds, SubsonicCredentials::Password { .. }));
    }

    #[test]
    fn test_missing_user_or_secret() {
        assert!(SubsonicCredentials::from_parts(None, some("pw"), None, None).is_none());
        assert!(SubsonicCredentials::from_parts(some("alice"), None, None, some("salt")).is_none());
    }

    #[test]
    fn test_auth_query_pairs_token() {
        let creds = SubsonicCredentials::Token {
            username: "alice".into(),
            token: "tok".into(),
            salt: "salt".into(),
        };
        let pairs = auth_query_pairs(&creds, "1.16.1", "csv2pl");
        assert_eq!(
            pairs,
            vec![
                ("u", "alice".to_string()),
                ("t", "tok".to_string()),
                ("s", "salt".to_string()),
                ("v", "1.16.1".to_string()),
                ("c", "csv2pl".to_string()),
                ("f", "json".to_string()),
            ]
        );
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = SubsonicCredentials::Password {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }
}
