//! Defined names
//!
//! A defined name maps an identifier to a reference (`Sheet1!$B$1`), a range
//! (`Sheet1!$A$1:$D$10`), a constant (`0.0725`) or a formula (`=SUM(Sales)`).
//! Names are case-insensitive and scoped either to the workbook or to one sheet;
//! a sheet-scoped name shadows a workbook-scoped one of the same name.

use ahash::AHashMap;

use crate::error::{Error, Result};

/// Scope of a named range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameScope {
    /// Available throughout the workbook (global)
    Workbook,
    /// Scoped to a specific sheet (local)
    Sheet(usize),
}

/// A named range definition
#[derive(Debug, Clone)]
pub struct NamedRange {
    /// Identifier assigned by the owning collection, unique for the workbook's lifetime
    pub id: u64,
    /// The name as written (e.g., "SalesData", "TaxRate")
    pub name: String,
    /// Scope of this name
    pub scope: NameScope,
    /// What the name refers to, as formula text with or without a leading `=`
    pub refers_to: String,
}

impl NamedRange {
    /// Create a new named range; the id is assigned when it is defined in a collection
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>, scope: NameScope) -> Self {
        Self {
            id: 0,
            name: name.into(),
            scope,
            refers_to: refers_to.into(),
        }
    }

    /// Check if the refers_to is a formula (starts with =)
    pub fn is_formula(&self) -> bool {
        self.refers_to.starts_with('=')
    }

    /// The refers_to expression without a leading `=`
    pub fn expression(&self) -> &str {
        self.refers_to.strip_prefix('=').unwrap_or(&self.refers_to)
    }
}

/// Collection of named ranges with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    ranges: AHashMap<(String, NameScope), NamedRange>,
    next_id: u64,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, scope: NameScope) -> (String, NameScope) {
        (name.to_lowercase(), scope)
    }

    /// Validate a defined name identifier
    ///
    /// Names start with a letter, `_` or `\`, contain only letters, digits, `_` and `.`,
    /// and must not look like a cell reference or a boolean literal.
    pub fn validate_name(name: &str) -> Result<()> {
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_alphabetic() || c == '_' || c == '\\')
            .unwrap_or(false);
        if !valid_start || !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return Err(Error::InvalidName(format!("'{}' is not a valid name", name)));
        }
        if crate::CellAddress::parse(name).is_ok()
            || name.eq_ignore_ascii_case("true")
            || name.eq_ignore_ascii_case("false")
        {
            return Err(Error::InvalidName(format!(
                "'{}' conflicts with a reference or literal",
                name
            )));
        }
        Ok(())
    }

    /// Define a new named range, returning its id
    ///
    /// Fails if the name is invalid or already exists in the same scope.
    pub fn define(&mut self, mut range: NamedRange) -> Result<u64> {
        Self::validate_name(&range.name)?;
        let key = Self::key(&range.name, range.scope);
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' already exists in this scope",
                range.name
            )));
        }
        self.next_id += 1;
        range.id = self.next_id;
        self.ranges.insert(key, range);
        Ok(self.next_id)
    }

    /// Define or replace a named range, returning its new id
    ///
    /// A replaced definition gets a fresh id, so caches keyed by id never see stale data.
    pub fn define_or_update(&mut self, mut range: NamedRange) -> Result<u64> {
        Self::validate_name(&range.name)?;
        self.next_id += 1;
        range.id = self.next_id;
        self.ranges.insert(Self::key(&range.name, range.scope), range);
        Ok(self.next_id)
    }

    /// Get a named range by name, as seen from `current_sheet`
    ///
    /// A name scoped to `current_sheet` wins over a workbook-scoped one.
    pub fn get(&self, name: &str, current_sheet: usize) -> Option<&NamedRange> {
        self.ranges
            .get(&Self::key(name, NameScope::Sheet(current_sheet)))
            .or_else(|| self.ranges.get(&Self::key(name, NameScope::Workbook)))
    }

    /// Get a named range by exact scope
    pub fn get_exact(&self, name: &str, scope: NameScope) -> Option<&NamedRange> {
        self.ranges.get(&Self::key(name, scope))
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<NamedRange> {
        self.ranges.remove(&Self::key(name, scope))
    }

    /// Iterate over all named ranges
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.values()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_range_formula() {
        let nr = NamedRange::new("Total", "=SUM(A1:A10)", NameScope::Workbook);
        assert!(nr.is_formula());
        assert_eq!(nr.expression(), "SUM(A1:A10)");

        let nr = NamedRange::new("TaxRate", "Sheet1!$B$1", NameScope::Workbook);
        assert!(!nr.is_formula());
        assert_eq!(nr.expression(), "Sheet1!$B$1");
    }

    #[test]
    fn test_collection_scope_lookup() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::new("Rate", "0.05", NameScope::Workbook))
            .unwrap();
        coll.define(NamedRange::new("Rate", "0.08", NameScope::Sheet(0)))
            .unwrap();

        assert_eq!(coll.get("Rate", 0).unwrap().refers_to, "0.08");
        assert_eq!(coll.get("Rate", 1).unwrap().refers_to, "0.05");
    }

    #[test]
    fn test_case_insensitive_and_duplicates() {
        let mut coll = NamedRangeCollection::new();
        coll.define(NamedRange::new("TaxRate", "0.05", NameScope::Workbook))
            .unwrap();

        assert!(coll.get("taxrate", 0).is_some());
        assert!(coll.get("TAXRATE", 0).is_some());
        assert!(coll
            .define(NamedRange::new("TAXRATE", "0.10", NameScope::Workbook))
            .is_err());
    }

    #[test]
    fn test_ids_are_unique_and_refresh_on_update() {
        let mut coll = NamedRangeCollection::new();
        let a = coll
            .define(NamedRange::new("A_", "1", NameScope::Workbook))
            .unwrap();
        let b = coll
            .define(NamedRange::new("B_", "2", NameScope::Workbook))
            .unwrap();
        assert_ne!(a, b);

        let updated = coll
            .define_or_update(NamedRange::new("A_", "3", NameScope::Workbook))
            .unwrap();
        assert_ne!(updated, a);
        assert_eq!(coll.get("a_", 0).unwrap().id, updated);
    }

    #[test]
    fn test_validate_name() {
        assert!(NamedRangeCollection::validate_name("Sales_2024").is_ok());
        assert!(NamedRangeCollection::validate_name("_hidden").is_ok());
        assert!(NamedRangeCollection::validate_name("A1").is_err());
        assert!(NamedRangeCollection::validate_name("1abc").is_err());
        assert!(NamedRangeCollection::validate_name("has space").is_err());
        assert!(NamedRangeCollection::validate_name("TRUE").is_err());
    }
}
