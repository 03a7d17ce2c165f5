//! Migration catalog discovery
//!
//! Pairs `<id>.up.sql` and `<id>.down.sql` scripts from a [`ScriptSource`] into
//! [`MigrationDefinition`]s, ordered by id.

use crate::migration::migration::{MigrationDefinition, ScriptDirection};
use crate::migration::source::{EntryKind, ScriptSource};
use crate::migration::CatalogError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static SCRIPT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>.+)\.(?P<direction>up|down)\.sql$").unwrap()
});

/// Parse a script file name into its migration id and direction
///
/// # Example
/// - `1700000000000_create_users.up.sql` → (`1700000000000_create_users`, `Up`)
/// - `README.md` → `None`
pub fn parse_script_name(name: &str) -> Option<(&str, ScriptDirection)> {
    let caps = SCRIPT_NAME.captures(name)?;
    let id = caps.name("id")?.as_str();
    let direction = match caps.name("direction")?.as_str() {
        "up" => ScriptDirection::Up,
        _ => ScriptDirection::Down,
    };
    Some((id, direction))
}

#[derive(Default)]
struct Halves {
    up: Option<String>,
    down: Option<String>,
}

/// Every known migration, sorted ascending by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    definitions: Vec<MigrationDefinition>,
}

impl Catalog {
    /// Build the catalog from `source`
    ///
    /// Directories and files that are not migration scripts are skipped with a
    /// warning. Halves may be listed in any order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the source cannot be listed or read, if an id
    /// lacks one of its two scripts, or if a script appears twice.
    pub fn build(source: &dyn ScriptSource) -> Result<Self, CatalogError> {
        let mut pairs: BTreeMap<String, Halves> = BTreeMap::new();

        for entry in source.entries()? {
            if entry.kind == EntryKind::Directory {
                log::warn!("Skipping directory in migrations: {}", entry.name);
                continue;
            }

            let Some((id, direction)) = parse_script_name(&entry.name) else {
                log::warn!("Skipping file with invalid migration filename: {}", entry.name);
                continue;
            };

            let script = source.read(&entry.name)?;
            let halves = pairs.entry(id.to_string()).or_default();
            let slot = match direction {
                ScriptDirection::Up => &mut halves.up,
                ScriptDirection::Down => &mut halves.down,
            };
            if slot.is_some() {
                return Err(CatalogError::DuplicateScript {
                    id: id.to_string(),
                    direction,
                });
            }
            *slot = Some(script);
        }

        let definitions = pairs
            .into_iter()
            .map(|(id, halves)| match (halves.up, halves.down) {
                (Some(up), Some(down)) => Ok(MigrationDefinition::new(id, up, down)),
                (None, _) => Err(CatalogError::IncompletePair {
                    id,
                    missing: ScriptDirection::Up,
                }),
                (_, None) => Err(CatalogError::IncompletePair {
                    id,
                    missing: ScriptDirection::Down,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Discovered {} migration(s) in {}",
            definitions.len(),
            source.location()
        );
        Ok(Self { definitions })
    }

    /// Build a catalog from definitions that are already paired
    ///
    /// Definitions are sorted by id.
    pub fn from_definitions(mut definitions: Vec<MigrationDefinition>) -> Self {
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        Self { definitions }
    }

    pub fn definitions(&self) -> &[MigrationDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Look up a definition by id
    pub fn get(&self, id: &str) -> Option<&MigrationDefinition> {
        self.definitions
            .binary_search_by(|d| d.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.definitions[i])
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::source::MemorySource;

    #[test]
    fn test_parse_script_name() {
        assert_eq!(
            parse_script_name("1700000000000_init.up.sql"),
            Some(("1700000000000_init", ScriptDirection::Up))
        );
        assert_eq!(
            parse_script_name("1700000000000_init.down.sql"),
            Some(("1700000000000_init", ScriptDirection::Down))
        );
        assert_eq!(
            parse_script_name("1700_a.b.up.sql"),
            Some(("1700_a.b", ScriptDirection::Up))
        );
        assert_eq!(parse_script_name(".up.sql"), None);
        assert_eq!(parse_script_name("1700_init.sql"), None);
        assert_eq!(parse_script_name("1700_init.up.sql.bak"), None);
        assert_eq!(parse_script_name("README.md"), None);
    }

    #[test]
    fn test_pairs_halves_in_any_order() {
        // Down before up for 1_a, and ids listed out of order.
        let source = MemorySource::new()
            .with_file("2_b.up.sql", "CREATE TABLE b")
            .with_file("1_a.down.sql", "DROP TABLE a")
            .with_file("2_b.down.sql", "DROP TABLE b")
            .with_file("1_a.up.sql", "CREATE TABLE a");

        let catalog = Catalog::build(&source).unwrap();
        assert_eq!(
            catalog.definitions(),
            &[
                MigrationDefinition::new("1_a", "CREATE TABLE a", "DROP TABLE a"),
                MigrationDefinition::new("2_b", "CREATE TABLE b", "DROP TABLE b"),
            ]
        );
    }

    #[test]
    fn test_missing_down_is_fatal() {
        let source = MemorySource::new()
            .with_migration("1_a", "CREATE TABLE a", "DROP TABLE a")
            .with_file("2_b.up.sql", "CREATE TABLE b");

        match Catalog::build(&source) {
            Err(CatalogError::IncompletePair { id, missing }) => {
                assert_eq!(id, "2_b");
                assert_eq!(missing, ScriptDirection::Down);
            }
            other => panic!("expected IncompletePair, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_up_is_fatal() {
        let source = MemorySource::new().with_file("1_a.down.sql", "DROP TABLE a");
        assert!(matches!(
            Catalog::build(&source),
            Err(CatalogError::IncompletePair {
                missing: ScriptDirection::Up,
                ..
            })
        ));
    }

    #[test]
    fn test_skips_directories_and_stray_files() {
        let source = MemorySource::new()
            .with_dir("1_a.up.sql")
            .with_file("README.md", "docs")
            .with_file("notes.sql", "-- scratch")
            .with_migration("1_b", "CREATE TABLE b", "DROP TABLE b");

        let catalog = Catalog::build(&source).unwrap();
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["1_b"]);
    }

    #[test]
    fn test_duplicate_script_is_fatal() {
        let source = MemorySource::new()
            .with_migration("1_a", "CREATE TABLE a", "DROP TABLE a")
            .with_file("1_a.up.sql", "CREATE TABLE a2");

        assert!(matches!(
            Catalog::build(&source),
            Err(CatalogError::DuplicateScript {
                direction: ScriptDirection::Up,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_source() {
        let catalog = Catalog::build(&MemorySource::new()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.len(), 0);
    }

    #[test]
    fn test_scripts_kept_verbatim() {
        let up = "CREATE TABLE a (\n  id INTEGER\n);\n\n-- trailing comment\n";
        let source = MemorySource::new().with_migration("1_a", up, "DROP TABLE a;\n");
        let catalog = Catalog::build(&source).unwrap();
        assert_eq!(catalog.definitions()[0].up_script, up);
        assert_eq!(catalog.get("1_a").map(|d| d.down_script.as_str()), Some("DROP TABLE a;\n"));
        assert!(catalog.get("1_b").is_none());
    }

    #[test]
    fn test_from_definitions_sorts() {
        let catalog = Catalog::from_definitions(vec![
            MigrationDefinition::new("2", "u2", "d2"),
            MigrationDefinition::new("1", "u1", "d1"),
        ]);
        assert_eq!(catalog.ids().collect::<Vec<_>>(), vec!["1", "2"]);
    }
}
