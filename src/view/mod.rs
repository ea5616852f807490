//! Named Views
//!
//! A view is a named query with a title, printed as a table or as a form.
//! The catalog combines the built-in views with views from the configuration;
//! a configured view replaces a built-in view of the same name.
//!
//! # Examples
//!
//! ```rust,ignore
//! use eventview::view::ViewCatalog;
//!
//! let catalog = ViewCatalog::with_views(&config.views)?;
//! let view = catalog.find("gc-pauses")?;
//! executor.add_query_str(&view.query)?;
//! ```

use crate::query::{closest, parse_query};
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_VIEWS: &str = include_str!("views.toml");

/// A named query
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewDefinition {
    /// Name used on the command line, e.g. `gc-pauses`
    pub name: String,
    pub category: String,
    /// Title printed above the output
    pub label: String,
    /// Print the first row as a form
    #[serde(default)]
    pub form: bool,
    pub query: String,
}

impl ViewDefinition {
    /// Check that the query parses
    pub fn validate(&self) -> Result<(), ViewError> {
        parse_query(&self.query)
            .map(|_| ())
            .map_err(|e| ViewError::Definition(format!("view '{}': {}", self.name, e)))
    }
}

/// Errors from looking up or loading views
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("Unknown view: '{name}'{}", did_you_mean(suggestion))]
    NotFound {
        name: String,
        suggestion: Option<String>,
    },

    #[error("Invalid view definition: {0}")]
    Definition(String),
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

#[derive(Deserialize)]
struct ViewFile {
    #[serde(default)]
    views: Vec<ViewDefinition>,
}

/// Views available by name
#[derive(Debug, Clone, Default)]
pub struct ViewCatalog {
    views: Vec<ViewDefinition>,
}

impl ViewCatalog {
    /// Catalog of the built-in views
    pub fn builtin() -> Result<Self, ViewError> {
        Self::from_toml(BUILTIN_VIEWS)
    }

    /// Catalog of the built-in views plus `views`
    pub fn with_views(views: &[ViewDefinition]) -> Result<Self, ViewError> {
        let mut catalog = Self::builtin()?;
        for view in views {
            catalog.add(view.clone())?;
        }
        Ok(catalog)
    }

    /// Parse a catalog from TOML with a `[[views]]` array
    pub fn from_toml(text: &str) -> Result<Self, ViewError> {
        let file: ViewFile =
            toml::from_str(text).map_err(|e| ViewError::Definition(e.to_string()))?;
        let mut catalog = Self::default();
        for view in file.views {
            catalog.add(view)?;
        }
        Ok(catalog)
    }

    /// Add a view, replacing any view with the same name
    pub fn add(&mut self, view: ViewDefinition) -> Result<(), ViewError> {
        view.validate()?;
        match self.views.iter_mut().find(|v| v.name == view.name) {
            Some(existing) => {
                tracing::debug!(view = %view.name, "Replacing view");
                *existing = view;
            }
            None => self.views.push(view),
        }
        Ok(())
    }

    /// Look up a view by name
    pub fn find(&self, name: &str) -> Result<&ViewDefinition, ViewError> {
        self.views
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ViewError::NotFound {
                name: name.to_string(),
                suggestion: closest(name, self.views.iter().map(|v| v.name.as_str())),
            })
    }

    pub fn views(&self) -> &[ViewDefinition] {
        &self.views
    }

    /// Views grouped by category, both in name order
    pub fn by_category(&self) -> Vec<(&str, Vec<&ViewDefinition>)> {
        let mut groups: Vec<(&str, Vec<&ViewDefinition>)> = Vec::new();
        for view in &self.views {
            match groups.iter_mut().find(|(c, _)| *c == view.category) {
                Some((_, views)) => views.push(view),
                None => groups.push((view.category.as_str(), vec![view])),
            }
        }
        groups.sort_by(|a, b| a.0.cmp(b.0));
        for (_, views) in &mut groups {
            views.sort_by(|a, b| a.name.cmp(&b.name));
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, query: &str) -> ViewDefinition {
        ViewDefinition {
            name: name.to_string(),
            category: "Custom".to_string(),
            label: name.to_string(),
            form: false,
            query: query.to_string(),
        }
    }

    #[test]
    fn test_builtin_views_parse() {
        let catalog = ViewCatalog::builtin().unwrap();
        assert!(catalog.views().len() >= 10);
        assert!(catalog.find("gc-pauses").unwrap().form);
        assert!(!catalog.find("hot-methods").unwrap().form);
    }

    #[test]
    fn test_find_suggests() {
        let catalog = ViewCatalog::builtin().unwrap();
        assert_eq!(
            catalog.find("gc-pause").unwrap_err(),
            ViewError::NotFound {
                name: "gc-pause".to_string(),
                suggestion: Some("gc-pauses".to_string()),
            }
        );
        assert!(catalog.find("GC").is_ok());
    }

    #[test]
    fn test_configured_views() {
        let custom = [
            view("gc", "SELECT gcId FROM GarbageCollection"),
            view("sleeps", "SELECT * FROM ThreadSleep"),
        ];
        let catalog = ViewCatalog::with_views(&custom).unwrap();
        assert_eq!(catalog.find("gc").unwrap().query, "SELECT gcId FROM GarbageCollection");
        assert!(catalog.find("sleeps").is_ok());

        let broken = [view("broken", "SELECT FROM")];
        assert!(matches!(
            ViewCatalog::with_views(&broken),
            Err(ViewError::Definition(_))
        ));
    }

    #[test]
    fn test_by_category() {
        let catalog = ViewCatalog::builtin().unwrap();
        let groups = catalog.by_category();
        let categories: Vec<&str> = groups.iter().map(|(c, _)| *c).collect();
        assert_eq!(categories, vec!["Application", "Environment", "JVM", "Recording"]);
        assert_eq!(groups[2].1[0].name, "gc");
    }
}
