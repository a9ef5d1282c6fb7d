//! Validated value types shared across the TherapistTrack crates.
//!
//! Anything that reaches the document store has already been through one of these wrappers, so
//! downstream code never re-checks emptiness.

/// Errors raised while constructing a validated value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace.
    #[error("text cannot be empty")]
    EmptyText,
    /// The input list contained no items.
    #[error("list cannot be empty")]
    EmptyList,
}

/// A string that holds at least one non-whitespace character.
///
/// Leading and trailing whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and wraps it, rejecting blank values.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::EmptyText`] if nothing remains after trimming.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::EmptyText);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An ordered list with at least one item.
///
/// Phones, mails, template categories and template fields are all stored this way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyList<T>(Vec<T>);

impl<T> NonEmptyList<T> {
    /// Wraps `items`, rejecting an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::EmptyList`] if `items` is empty.
    pub fn new(items: Vec<T>) -> Result<Self, TypesError> {
        if items.is_empty() {
            return Err(TypesError::EmptyList);
        }
        Ok(Self(items))
    }

    pub fn first(&self) -> &T {
        // Construction guarantees at least one element.
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl NonEmptyList<NonEmptyText> {
    /// Builds a list of non-blank strings, rejecting an empty list or any blank entry.
    ///
    /// # Errors
    ///
    /// Returns [`TypesError::EmptyList`] for an empty input and [`TypesError::EmptyText`] for
    /// the first blank entry.
    pub fn from_texts<S: AsRef<str>>(items: &[S]) -> Result<Self, TypesError> {
        let texts = items
            .iter()
            .map(NonEmptyText::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(texts)
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|t| t.as_str().to_owned()).collect()
    }
}

impl<'a, T> IntoIterator for &'a NonEmptyList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: serde::Serialize> serde::Serialize for NonEmptyList<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: serde::Deserialize<'de>> serde::Deserialize<'de> for NonEmptyList<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        NonEmptyList::new(items).map_err(serde::de::Error::custom)
    }
}
