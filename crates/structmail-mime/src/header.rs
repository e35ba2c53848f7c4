//! Header fields.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
}

impl Field {
    fn named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Header fields in the order they were added.
///
/// Lookups ignore case; names are written back as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// An empty header block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping earlier fields of the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Replaces every field called `name` by a single one at the position of
    /// the first, or appends it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let field = Field {
            name: name.into(),
            value: value.into(),
        };
        let Some(first) = self.fields.iter().position(|f| f.named(&field.name)) else {
            self.fields.push(field);
            return;
        };
        let mut index = 0;
        self.fields.retain(|f| {
            index += 1;
            index - 1 == first || !f.named(&field.name)
        });
        self.fields[first] = field;
    }

    /// Value of the first field called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.named(name))
            .map(|f| f.value.as_str())
    }

    /// Whether no field has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    /// Reads a header block up to the first empty line.
    ///
    /// Folded lines are joined with a single space and lines that are not
    /// `name: value` are dropped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        for line in text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)) {
            if line.is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some(last) = headers.fields.last_mut() {
                    last.value.push(' ');
                    last.value.push_str(line.trim());
                }
            } else if let Some((name, value)) = line.split_once(':') {
                headers.add(name.trim(), value.trim());
            } else {
                // a continuation after a dropped line must not attach to the field before it
                headers.fields.push(Field {
                    name: String::new(),
                    value: String::new(),
                });
            }
        }
        headers.fields.retain(|f| !f.name.is_empty());
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fields
            .iter()
            .try_for_each(|field| write!(f, "{}: {}\r\n", field.name, field.value))
    }
}
