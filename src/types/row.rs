use crate::mapping::{CoercionError, FromValue};
use crate::types::SqlValue;

/// A single fetched record.
/// Columns keep the order the driver reported them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(
            columns.len(),
            values.len(),
            "row has {} columns but {} values",
            columns.len(),
            values.len()
        );
        let columns = columns
            .iter()
            .cloned()
            .zip(values.into_iter())
            .collect();
        Self { columns }
    }

    /// Appends a column. Mostly useful for building rows by hand in drivers and tests.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Builder-style variant of [`Row::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Gets a value by column name. Names are matched exactly.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Gets a value by column position.
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|(name, _)| name.as_str())
    }

    /// Converts the named column to `V`.
    /// A missing column reads as NULL.
    pub fn try_get<V: FromValue>(&self, name: &str) -> Result<V, CoercionError> {
        V::from_value(self.get(name).unwrap_or(&SqlValue::Null))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns true when the column is absent or NULL.
    pub fn is_null(&self, name: &str) -> bool {
        self.get(name).map_or(true, SqlValue::is_null)
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let values = vec![SqlValue::Int(1), SqlValue::from("John")];
        let row = Row::new(&columns, values);

        assert_eq!(row.get("id"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("name"), Some(&SqlValue::from("John")));
        assert!(row.get("missing").is_none());
        assert!(row.get("ID").is_none());
    }

    #[test]
    fn test_row_keeps_column_order() {
        let row = Row::default().with("b", 2).with("a", 1).with("c", 3);
        assert_eq!(row.columns(), vec!["b", "a", "c"]);
        assert_eq!(row.column_name(1), Some("a"));
        assert_eq!(row.value(2), Some(&SqlValue::Int(3)));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_row_null_handling() {
        let row = Row::default().with("a", SqlValue::Null).with("b", 1);
        assert!(row.is_null("a"));
        assert!(row.is_null("missing"));
        assert!(!row.is_null("b"));
        assert_eq!(row.try_get::<Option<i32>>("a").unwrap(), None);
        assert_eq!(row.try_get::<i32>("b").unwrap(), 1);
        assert!(row.try_get::<i32>("missing").is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "row has 2 columns but 1 values")]
    fn test_row_rejects_value_count_mismatch() {
        let columns = vec!["id".to_string(), "name".to_string()];
        Row::new(&columns, vec![SqlValue::Int(1)]);
    }
}
