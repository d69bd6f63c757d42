use crate::config::{ConfigError, RepositoryEntry};
use std::collections::HashMap;

/// The repositories that can be pulled, keyed by their slug.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    entries: HashMap<String, RepositoryEntry>,
}

impl RepositoryRegistry {
    /// Create the registry from the configured repositories. Fails if a slug is used twice.
    pub fn new(repositories: Vec<RepositoryEntry>) -> Result<Self, ConfigError> {
        let mut entries = HashMap::with_capacity(repositories.len());
        for entry in repositories {
            if entries.contains_key(&entry.slug) {
                return Err(ConfigError::DuplicateSlug(entry.slug));
            }
            entries.insert(entry.slug.clone(), entry);
        }

        Ok(RepositoryRegistry { entries })
    }

    /// Find the repository for the slug coming from the request.
    pub fn lookup(&self, slug: &str) -> Option<&RepositoryEntry> {
        self.entries.get(slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(slug: &str, dir: &str) -> RepositoryEntry {
        RepositoryEntry {
            slug: String::from(slug),
            location: PathBuf::from(dir),
            expected_branch: String::from("master"),
        }
    }

    #[test]
    fn it_should_find_every_configured_slug() -> Result<(), ConfigError> {
        let registry =
            RepositoryRegistry::new(vec![entry("blog", "/srv/blog"), entry("docs", "/srv/docs")])?;

        assert_eq!(2, registry.len());
        assert_eq!(Some(&entry("blog", "/srv/blog")), registry.lookup("blog"));
        assert_eq!(Some(&entry("docs", "/srv/docs")), registry.lookup("docs"));

        Ok(())
    }

    #[test]
    fn it_should_not_find_unknown_slugs() -> Result<(), ConfigError> {
        let registry = RepositoryRegistry::new(vec![entry("blog", "/srv/blog")])?;

        assert_eq!(None, registry.lookup("unknown"));
        assert_eq!(None, registry.lookup(""));
        assert_eq!(None, registry.lookup("Blog"));
        assert_eq!(None, registry.lookup("blog "));

        Ok(())
    }

    #[test]
    fn it_should_reject_duplicate_slugs() {
        let result =
            RepositoryRegistry::new(vec![entry("blog", "/srv/blog"), entry("blog", "/srv/other")]);

        match result {
            Err(ConfigError::DuplicateSlug(slug)) => assert_eq!("blog", slug),
            other => panic!("{other:?} should be DuplicateSlug"),
        }
    }
}
