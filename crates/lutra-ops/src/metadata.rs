//! Format metadata carried alongside operator data.
//!
//! Readers attach descriptive key/value pairs (name, id, comments) to the
//! operators they build. The composer merges the metadata of its inputs so
//! provenance survives optimization.

/// Key/value metadata attached to an operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatMetadata {
    name: String,
    attributes: Vec<(String, String)>,
}

impl FormatMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Element name (e.g. a LUT name from the source file).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the element name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The attribute list in insertion order.
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Adds an attribute, replacing an existing one with the same key.
    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(attr) = self.attributes.iter_mut().find(|(k, _)| *k == key) {
            attr.1 = value;
        } else {
            self.attributes.push((key, value));
        }
    }

    /// Merges another element's attributes into this one.
    ///
    /// Attributes already present keep their value; the other element's
    /// remaining attributes are appended in order.
    pub fn combine(&mut self, other: &FormatMetadata) {
        if self.name.is_empty() {
            self.name = other.name.clone();
        }
        for (key, value) in &other.attributes {
            if !self.attributes.iter().any(|(k, _)| k == key) {
                self.attributes.push((key.clone(), value.clone()));
            }
        }
    }
}
