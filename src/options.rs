use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Settings every raw connection is opened with.
///
/// Mutating any of these on a live pool (through the pool's setters) drains
/// the pool first, so connections opened under different settings never mix.
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
    pub(crate) url: String,
    pub(crate) driver: Option<String>,
    pub(crate) credentials: Credentials,
    pub(crate) auto_commit: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl Default for ConnectionOptions {
    fn default() -> ConnectionOptions {
        ConnectionOptions {
            url: String::new(),
            driver: None,
            credentials: Credentials::default(),
            auto_commit: true,
        }
    }
}

impl Into<ConnectionOptions> for &str {
    fn into(self) -> ConnectionOptions {
        ConnectionOptions {
            url: String::from(self),
            ..Default::default()
        }
    }
}

impl ConnectionOptions {
    pub fn builder() -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder(ConnectionOptions::default())
    }

    pub fn into_builder(self) -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn password(&self) -> &str {
        &self.credentials.password
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Fingerprint of (url, username, password). Handles stamped with a
    /// different fingerprint are never mixed back into the idle set.
    pub(crate) fn type_code(&self) -> u64 {
        type_code_for(&self.url, &self.credentials.username, &self.credentials.password)
    }
}

pub(crate) fn type_code_for(url: &str, username: &str, password: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    username.hash(&mut hasher);
    password.hash(&mut hasher);
    hasher.finish()
}

pub struct ConnectionOptionsBuilder(ConnectionOptions);

impl ConnectionOptionsBuilder {
    pub fn url<T>(mut self, url: T) -> Self
    where
        T: Into<String>,
    {
        self.0.url = url.into();
        self
    }

    pub fn driver<T>(mut self, driver: T) -> Self
    where
        T: Into<String>,
    {
        self.0.driver = Some(driver.into());
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.0.credentials = Credentials {
            username: String::from(username),
            password: String::from(password),
        };
        self
    }

    pub fn auto_commit(mut self, auto_commit: bool) -> Self {
        self.0.auto_commit = auto_commit;
        self
    }

    pub fn build(self) -> ConnectionOptions {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let options = ConnectionOptions::builder()
            .url("db://localhost:5432/app")
            .driver("postgres")
            .credentials("root", "secret")
            .auto_commit(false)
            .build();

        assert_eq!(options.url(), "db://localhost:5432/app");
        assert_eq!(options.driver(), Some("postgres"));
        assert_eq!(options.username(), "root");
        assert_eq!(options.password(), "secret");
        assert!(!options.auto_commit());
    }

    #[test]
    fn type_code_tracks_credentials() {
        let a = ConnectionOptions::builder()
            .url("db://one")
            .credentials("root", "pw")
            .build();
        let b = ConnectionOptions::builder()
            .url("db://one")
            .credentials("root", "pw")
            .build();
        let c = ConnectionOptions::builder()
            .url("db://one")
            .credentials("root", "other")
            .build();

        assert_eq!(a.type_code(), b.type_code());
        assert_ne!(a.type_code(), c.type_code());
    }

    #[test]
    fn url_into_options() {
        let options: ConnectionOptions = "db://localhost:5432/app".into();

        assert_eq!(options.url(), "db://localhost:5432/app");
        assert!(options.auto_commit());
        assert_eq!(options.username(), "");
    }
}
