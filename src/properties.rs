//! Document and custom properties

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;

use crate::error::{Result, XlsxError};
use crate::types::MAX_PROPERTY_LEN;

/// Summary information stored in `docProps/core.xml` and `docProps/app.xml`
///
/// Empty strings are omitted from the output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocProperties {
    pub title: String,
    pub subject: String,
    pub author: String,
    pub manager: String,
    pub company: String,
    pub category: String,
    pub keywords: String,
    pub comments: String,
    pub status: String,
    pub hyperlink_base: String,
    /// Creation time; the time of `close()` when unset
    pub created: Option<DateTime<Utc>>,
}

impl DocProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn set_subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn set_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    pub fn set_manager(mut self, manager: &str) -> Self {
        self.manager = manager.to_string();
        self
    }

    pub fn set_company(mut self, company: &str) -> Self {
        self.company = company.to_string();
        self
    }

    pub fn set_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn set_keywords(mut self, keywords: &str) -> Self {
        self.keywords = keywords.to_string();
        self
    }

    pub fn set_comments(mut self, comments: &str) -> Self {
        self.comments = comments.to_string();
        self
    }

    pub fn set_status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn set_hyperlink_base(mut self, base: &str) -> Self {
        self.hyperlink_base = base.to_string();
        self
    }

    pub fn set_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }
}

/// Value of a user-defined document property
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Text(String),
    Number(f64),
    Integer(i32),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl From<&str> for CustomValue {
    fn from(s: &str) -> Self {
        CustomValue::Text(s.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(s: String) -> Self {
        CustomValue::Text(s)
    }
}

impl From<f64> for CustomValue {
    fn from(v: f64) -> Self {
        CustomValue::Number(v)
    }
}

impl From<i32> for CustomValue {
    fn from(v: i32) -> Self {
        CustomValue::Integer(v)
    }
}

impl From<bool> for CustomValue {
    fn from(v: bool) -> Self {
        CustomValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for CustomValue {
    fn from(v: DateTime<Utc>) -> Self {
        CustomValue::DateTime(v)
    }
}

impl From<NaiveDateTime> for CustomValue {
    fn from(v: NaiveDateTime) -> Self {
        CustomValue::DateTime(v.and_utc())
    }
}

/// Insertion-ordered custom properties; setting a name again replaces its value in place
#[derive(Debug, Clone, Default)]
pub(crate) struct CustomProperties {
    entries: IndexMap<String, CustomValue>,
}

impl CustomProperties {
    pub fn set(&mut self, name: &str, value: CustomValue) -> Result<()> {
        if name.is_empty() {
            return Err(XlsxError::ParameterInvalid(
                "custom property name must not be empty".to_string(),
            ));
        }
        check_length(name)?;
        match &value {
            CustomValue::Text(text) => check_length(text)?,
            CustomValue::Number(n) if !n.is_finite() => {
                return Err(XlsxError::ParameterInvalid(format!(
                    "custom property '{}' is not a finite number",
                    name
                )))
            }
            _ => {}
        }

        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CustomValue)> {
        self.entries.iter()
    }
}

fn check_length(text: &str) -> Result<()> {
    let length = text.chars().count();
    if length > MAX_PROPERTY_LEN {
        return Err(XlsxError::StringTooLong {
            length,
            limit: MAX_PROPERTY_LEN,
        });
    }
    Ok(())
}
