use serde::de;
use serde::ser::SerializeMap;

use crate::row::TableRow;
use crate::table::{FieldType, TableSchema};
use crate::{DatasetReference, ErrorProto, util};

/// Body of a `jobs.query` request.
///
/// Only GoogleSQL is supported, so `useLegacySql` is always sent as `false`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub use_legacy_sql: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_mode: Option<ParameterMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_parameters: Vec<QueryParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub dry_run: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            use_legacy_sql: false,
            parameter_mode: None,
            query_parameters: Vec::new(),
            default_dataset: None,
            timeout_ms: None,
            max_results: None,
            location: None,
            request_id: None,
            dry_run: false,
        }
    }

    /// Adds a named parameter, switching the request into named parameter mode.
    pub fn with_parameter(mut self, parameter: QueryParameter) -> Self {
        self.parameter_mode = Some(ParameterMode::Named);
        self.query_parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&QueryParameter> {
        self.query_parameters
            .iter()
            .find(|param| param.name.as_deref() == Some(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    Positional,
    Named,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parameter_type: QueryParameterType,
    pub parameter_value: QueryParameterValue,
}

impl QueryParameter {
    /// A scalar parameter. `None` binds SQL `NULL`.
    pub fn scalar(ty: FieldType, value: Option<String>) -> Self {
        Self {
            name: None,
            parameter_type: QueryParameterType::Scalar(ty),
            parameter_value: QueryParameterValue::Scalar(value),
        }
    }

    pub fn array(element_type: FieldType, values: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: None,
            parameter_type: QueryParameterType::Array(Box::new(QueryParameterType::Scalar(
                element_type,
            ))),
            parameter_value: QueryParameterValue::Array(
                values
                    .into_iter()
                    .map(|value| QueryParameterValue::Scalar(Some(value)))
                    .collect(),
            ),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The bound scalar value, if this is a non-null scalar parameter.
    pub fn scalar_value(&self) -> Option<&str> {
        match self.parameter_value {
            QueryParameterValue::Scalar(ref value) => value.as_deref(),
            QueryParameterValue::Array(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParameterType {
    Scalar(FieldType),
    Array(Box<QueryParameterType>),
}

macro_rules! serialize_map {
    (
        $serializer:expr;
        $($key:literal => $value:expr),* $(,)?
    ) => {{
        const LEN: usize = [$($key),*].len();

        let mut map = $serializer.serialize_map(Some(LEN))?;
        $(
            map.serialize_entry($key, &$value)?;
        )*
        map.end()
    }};
}

impl serde::Serialize for QueryParameterType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Scalar(ty) => serialize_map!(serializer; "type" => ty.as_sql_str()),
            Self::Array(element_type) => serialize_map! {
                serializer;
                "type" => "ARRAY",
                "arrayType" => element_type,
            },
        }
    }
}

impl<'de> serde::Deserialize<'de> for QueryParameterType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawQueryParamType {
            #[serde(rename = "type")]
            ty: String,
            array_type: Option<QueryParameterType>,
        }

        let RawQueryParamType { ty, array_type } = serde::Deserialize::deserialize(deserializer)?;

        match (ty.as_str(), array_type) {
            ("ARRAY", Some(element_type)) => Ok(Self::Array(Box::new(element_type))),
            ("ARRAY", None) => Err(de::Error::missing_field("arrayType")),
            (_, Some(_)) => Err(de::Error::custom(format!(
                "'arrayType' given for non-array type '{ty}'"
            ))),
            (other, None) => {
                let ty: FieldType = serde::Deserialize::deserialize(
                    de::IntoDeserializer::<D::Error>::into_deserializer(other),
                )?;
                Ok(Self::Scalar(ty))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParameterValue {
    Scalar(Option<String>),
    Array(Vec<QueryParameterValue>),
}

impl serde::Serialize for QueryParameterValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Scalar(scalar) => serialize_map!(serializer; "value" => scalar),
            Self::Array(array) => serialize_map!(serializer; "arrayValues" => array),
        }
    }
}

impl<'de> serde::Deserialize<'de> for QueryParameterValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawValue {
            value: Option<String>,
            array_values: Option<Vec<QueryParameterValue>>,
        }

        let RawValue {
            value,
            array_values,
        } = serde::Deserialize::deserialize(deserializer)?;

        match (value, array_values) {
            (None, Some(values)) => Ok(Self::Array(values)),
            (value, None) => Ok(Self::Scalar(value)),
            (Some(_), Some(_)) => Err(de::Error::custom(
                "expected one of 'value' and 'arrayValues', got both",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Response of both `jobs.query` and `jobs.getQueryResults`.
///
/// Rows are left in their wire form, since decoding them needs the schema, which is only
/// guaranteed to be present once `job_complete` is true.
#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<JobReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<TableRow>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub total_rows: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub num_dml_affected_rows: Option<i64>,
    #[serde(default, skip_serializing_if = "util::is_false")]
    pub cache_hit: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "util::int64::optional"
    )]
    pub total_bytes_processed: Option<i64>,
}
