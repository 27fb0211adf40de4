use std::fmt;

use bigquery_resources::query::QueryParameter;
use bigquery_resources::table::FieldType;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

use crate::table::TableRef;

/// A GoogleSQL statement along with its named parameters.
///
/// Values are never spliced into the SQL text, they're sent as `queryParameters` and
/// referenced as `@name` in the statement.
///
/// ```
/// use bigquery_facade::Statement;
///
/// let statement = Statement::new("DELETE FROM `p.d.t` WHERE _id = @id").bind("id", "5");
/// assert_eq!(statement.parameters().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    parameters: Vec<QueryParameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Binds `value` to `@name`. Binding the same name twice keeps the last value.
    pub fn bind(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        let param = value.into().into_parameter(name);
        self.parameters
            .retain(|existing| existing.name.as_deref() != Some(name));
        self.parameters.push(param);
        self
    }

    #[inline]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[inline]
    pub fn parameters(&self) -> &[QueryParameter] {
        &self.parameters
    }

    pub(crate) fn into_parts(self) -> (String, Vec<QueryParameter>) {
        (self.sql, self.parameters)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// `None` binds a typed `NULL`.
    String(Option<String>),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Date(Date),
    StringArray(Vec<String>),
}

impl ParamValue {
    fn into_parameter(self, name: &str) -> QueryParameter {
        let param = match self {
            Self::String(value) => QueryParameter::scalar(FieldType::String, value),
            Self::Int64(value) => QueryParameter::scalar(FieldType::Integer, Some(value.to_string())),
            Self::Float64(value) => QueryParameter::scalar(FieldType::Float, Some(float_literal(value))),
            Self::Bool(value) => QueryParameter::scalar(FieldType::Bool, Some(value.to_string())),
            // formatting only fails for years outside of 0..=9999
            Self::Timestamp(value) => QueryParameter::scalar(
                FieldType::Timestamp,
                Some(value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())),
            ),
            Self::Date(value) => QueryParameter::scalar(FieldType::Date, Some(value.to_string())),
            Self::StringArray(values) => QueryParameter::array(FieldType::String, values),
        };

        param.named(name)
    }
}

/// FLOAT64 parameter values spell out infinities, where `f64`'s `Display` uses `inf`.
fn float_literal(value: f64) -> String {
    if !value.is_infinite() {
        value.to_string()
    } else if value.is_sign_positive() {
        "Infinity".to_owned()
    } else {
        "-Infinity".to_owned()
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for ParamValue {
                #[inline]
                fn from(value: $t) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    String => String,
    Option<String> => String,
    i64 => Int64,
    f64 => Float64,
    bool => Bool,
    OffsetDateTime => Timestamp,
    Date => Date,
    Vec<String> => StringArray,
}

impl From<&str> for ParamValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(Some(value.to_owned()))
    }
}

/// Quotes an identifier (or dotted path) in backticks, escaping embedded backticks and
/// backslashes.
pub fn quote_identifier(ident: &str) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push('`');

    for ch in ident.chars() {
        if matches!(ch, '`' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }

    quoted.push('`');
    quoted
}

/// The fully qualified, quoted `project.dataset.table` path of a table.
pub fn quote_table(project_id: &str, table: &TableRef) -> String {
    quote_identifier(&format!(
        "{project_id}.{}.{}",
        table.dataset_id(),
        table.table_id()
    ))
}
