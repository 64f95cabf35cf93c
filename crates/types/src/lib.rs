//! Small validated value types shared across the seneca crates.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// A FHIR reference was not of the form `Type/id`
    #[error("Invalid resource reference: {0}")]
    InvalidReference(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
/// Used for identifiers that must never be blank: backend ids, MRNs, server-internal ids
/// and the scope identifier some backends require for patient lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
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

/// A relative FHIR literal reference such as `Medication/8842` or `Patient/e63wRTbPfr1p8UW81d8Seiw3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    resource_type: NonEmptyText,
    id: NonEmptyText,
}

impl ResourceReference {
    /// Parse a `Type/id` reference.
    ///
    /// Only the first `/` separates type from id, so ids containing `/` survive intact.
    ///
    /// # Errors
    ///
    /// Returns `TextError::InvalidReference` when either half is missing or blank.
    pub fn parse(reference: &str) -> Result<Self, TextError> {
        let (resource_type, id) = reference
            .split_once('/')
            .ok_or_else(|| TextError::InvalidReference(reference.to_owned()))?;

        let resource_type = NonEmptyText::new(resource_type)
            .map_err(|_| TextError::InvalidReference(reference.to_owned()))?;
        let id =
            NonEmptyText::new(id).map_err(|_| TextError::InvalidReference(reference.to_owned()))?;

        Ok(Self { resource_type, id })
    }

    pub fn resource_type(&self) -> &str {
        self.resource_type.as_str()
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }
}
