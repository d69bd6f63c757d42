use dirs::home_dir;
use duration_string::DurationString;
use log::debug;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// The time a single git command can take, if the configuration doesn't override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A custom error describing the error cases while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file cannot be read. The parameters are the path and the reason.
    #[error("cannot read configuration file {0}: {1}")]
    Unreadable(String, std::io::Error),
    /// The configuration is not valid JSON or a field is missing or has the wrong type.
    #[error("configuration is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A required field is present, but empty.
    #[error("field {0} cannot be empty")]
    EmptyField(String),
    /// The timeout cannot be parsed as a positive duration (e.g. "30s", "5m").
    #[error("cannot parse timeout {0}, use a positive number postfixed with s, m or h")]
    InvalidTimeout(String),
    /// The same slug is registered for more than one repository.
    #[error("slug {0} is defined more than once")]
    DuplicateSlug(String),
}

/// One repository that can be pulled, as it is written in the configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryConfig {
    pub slug: String,
    pub dir: String,
    pub branch: String,
}

/// The configuration document as it is written on the disk.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    homepage: String,
    port: String,
    token: String,
    #[serde(default)]
    timeout: Option<String>,
    repo: Vec<RepositoryConfig>,
}

/// A repository resolved from the configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryEntry {
    /// The public identifier used in the requests.
    pub slug: String,
    /// The directory of the working copy.
    pub location: PathBuf,
    /// The branch the working copy has to be on, before pulling.
    pub expected_branch: String,
}

/// The process-wide configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    pub homepage: String,
    pub address: String,
    pub token: String,
    pub timeout: Duration,
    pub repositories: Vec<RepositoryEntry>,
}

impl ProcessConfig {
    /// Read and parse the configuration file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Unreadable(path.to_string(), err))?;
        debug!("Loaded configuration from {path}.");

        Self::parse(&content)
    }

    /// Parse a configuration from a JSON document.
    ///
    /// Every field except `Timeout` is required, and missing or mistyped fields fail the
    /// whole configuration instead of failing later, at the first request.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(content)?;

        if raw.token.is_empty() {
            return Err(ConfigError::EmptyField(String::from("Token")));
        }
        if raw.port.is_empty() {
            return Err(ConfigError::EmptyField(String::from("Port")));
        }

        let timeout = match raw.timeout {
            Some(timeout) => parse_timeout(&timeout)?,
            None => DEFAULT_TIMEOUT,
        };

        let repositories = raw
            .repo
            .into_iter()
            .enumerate()
            .map(|(i, repo)| repo.into_entry(i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProcessConfig {
            homepage: raw.homepage,
            address: listen_address(&raw.port),
            token: raw.token,
            timeout,
            repositories,
        })
    }
}

impl RepositoryConfig {
    fn into_entry(self, index: usize) -> Result<RepositoryEntry, ConfigError> {
        for (name, value) in [("Slug", &self.slug), ("Dir", &self.dir), ("Branch", &self.branch)] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(format!("Repo[{index}].{name}")));
            }
        }

        Ok(RepositoryEntry {
            slug: self.slug,
            location: expand_home(&self.dir),
            expected_branch: self.branch,
        })
    }
}

// A zero timeout would kill every git command before it could start.
fn parse_timeout(timeout: &str) -> Result<Duration, ConfigError> {
    let duration: Duration = timeout
        .parse::<DurationString>()
        .map_err(|_| ConfigError::InvalidTimeout(timeout.to_string()))?
        .into();
    if duration.is_zero() {
        return Err(ConfigError::InvalidTimeout(timeout.to_string()));
    }

    Ok(duration)
}

/// Normalize the listen address, so it can be passed to the server.
///
/// Accepts "0.0.0.0:1234", ":1234" or a bare port "1234". The latter two listen on every
/// IPv6 and IPv4 interface.
pub fn listen_address(port: &str) -> String {
    if let Some(port) = port.strip_prefix(':') {
        format!("[::]:{port}")
    } else if port.chars().all(|ch| ch.is_ascii_digit()) {
        format!("[::]:{port}")
    } else {
        port.to_string()
    }
}

fn expand_home(dir: &str) -> PathBuf {
    match (dir.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(dir).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "Homepage": "https://example.com",
        "Port": ":8080",
        "Token": "secret",
        "Repo": [
            { "Slug": "blog", "Dir": "/srv/blog", "Branch": "master" },
            { "Slug": "docs", "Dir": "/srv/docs", "Branch": "main" }
        ]
    }"#;

    #[test]
    fn it_should_parse_the_configuration() -> Result<(), ConfigError> {
        let config = ProcessConfig::parse(CONFIG)?;

        assert_eq!("https://example.com", config.homepage);
        assert_eq!("[::]:8080", config.address);
        assert_eq!("secret", config.token);
        assert_eq!(DEFAULT_TIMEOUT, config.timeout);
        assert_eq!(
            vec![
                RepositoryEntry {
                    slug: String::from("blog"),
                    location: PathBuf::from("/srv/blog"),
                    expected_branch: String::from("master"),
                },
                RepositoryEntry {
                    slug: String::from("docs"),
                    location: PathBuf::from("/srv/docs"),
                    expected_branch: String::from("main"),
                },
            ],
            config.repositories
        );

        Ok(())
    }

    #[test]
    fn it_should_parse_the_timeout() -> Result<(), ConfigError> {
        let config = ProcessConfig::parse(
            r#"{ "Homepage": "", "Port": "8080", "Token": "t", "Timeout": "30s", "Repo": [] }"#,
        )?;

        assert_eq!(Duration::from_secs(30), config.timeout);
        assert_eq!("[::]:8080", config.address);

        Ok(())
    }

    #[test]
    fn it_should_fail_on_invalid_timeout() {
        let result = ProcessConfig::parse(
            r#"{ "Homepage": "", "Port": "8080", "Token": "t", "Timeout": "soon", "Repo": [] }"#,
        );

        assert!(
            matches!(result, Err(ConfigError::InvalidTimeout(_))),
            "{result:?} should be InvalidTimeout"
        );
    }

    #[test]
    fn it_should_fail_on_zero_timeout() {
        for timeout in ["0s", "0m"] {
            let result = ProcessConfig::parse(&format!(
                r#"{{ "Homepage": "", "Port": "8080", "Token": "t", "Timeout": "{timeout}", "Repo": [] }}"#
            ));

            match result {
                Err(ConfigError::InvalidTimeout(value)) => assert_eq!(timeout, value),
                other => panic!("{other:?} should be InvalidTimeout"),
            }
        }
    }

    #[test]
    fn it_should_fail_on_missing_repository_field() {
        let result = ProcessConfig::parse(
            r#"{ "Homepage": "", "Port": "8080", "Token": "t", "Repo": [{ "Slug": "blog", "Dir": "/srv/blog" }] }"#,
        );

        assert!(
            matches!(result, Err(ConfigError::Malformed(_))),
            "{result:?} should be Malformed"
        );
    }

    #[test]
    fn it_should_fail_on_mistyped_field() {
        let result = ProcessConfig::parse(
            r#"{ "Homepage": "", "Port": 8080, "Token": "t", "Repo": [] }"#,
        );

        assert!(
            matches!(result, Err(ConfigError::Malformed(_))),
            "{result:?} should be Malformed"
        );
    }

    #[test]
    fn it_should_fail_on_empty_branch() {
        let result = ProcessConfig::parse(
            r#"{ "Homepage": "", "Port": "8080", "Token": "t", "Repo": [{ "Slug": "blog", "Dir": "/srv/blog", "Branch": "" }] }"#,
        );

        match result {
            Err(ConfigError::EmptyField(field)) => assert_eq!("Repo[0].Branch", field),
            other => panic!("{other:?} should be EmptyField"),
        }
    }

    #[test]
    fn it_should_fail_on_empty_token() {
        let result =
            ProcessConfig::parse(r#"{ "Homepage": "", "Port": "8080", "Token": "", "Repo": [] }"#);

        assert!(
            matches!(result, Err(ConfigError::EmptyField(_))),
            "{result:?} should be EmptyField"
        );
    }

    #[test]
    fn it_should_fail_on_unreadable_file() {
        let result = ProcessConfig::load("/path/to/nowhere.json");

        assert!(
            matches!(result, Err(ConfigError::Unreadable(_, _))),
            "{result:?} should be Unreadable"
        );
    }

    #[test]
    fn it_should_normalize_listen_addresses() {
        assert_eq!("[::]:1234", listen_address(":1234"));
        assert_eq!("[::]:1234", listen_address("1234"));
        assert_eq!("0.0.0.0:1234", listen_address("0.0.0.0:1234"));
        assert_eq!("127.0.0.1:1234", listen_address("127.0.0.1:1234"));
    }

    #[test]
    fn it_should_expand_the_home_directory() {
        if let Some(home) = home_dir() {
            assert_eq!(home.join("blog"), expand_home("~/blog"));
        }
        assert_eq!(PathBuf::from("blog"), expand_home("blog"));
    }
}
