use super::Unset;
use crate::table::{FieldMode, FieldType, TableFieldSchema};

/// Builds a [`TableFieldSchema`]: the type is picked first, the mode last.
///
/// ```
/// use bigquery_resources::table::{FieldMode, TableFieldSchema};
///
/// let field = TableFieldSchema::builder("_id").string().required();
/// assert_eq!(field.mode, FieldMode::Required);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TableFieldSchemaBuilder<Ty> {
    name: String,
    ty: Ty,
    description: Option<String>,
    fields: Vec<TableFieldSchema>,
}

impl TableFieldSchemaBuilder<Unset> {
    pub(crate) const fn new(name: String) -> Self {
        Self {
            name,
            ty: Unset,
            description: None,
            fields: Vec::new(),
        }
    }

    fn with_type(self, ty: FieldType) -> TableFieldSchemaBuilder<FieldType> {
        TableFieldSchemaBuilder {
            name: self.name,
            ty,
            description: self.description,
            fields: self.fields,
        }
    }

    /// A `RECORD` column made of the given nested fields.
    pub fn record(
        mut self,
        fields: impl IntoIterator<Item = TableFieldSchema>,
    ) -> TableFieldSchemaBuilder<FieldType> {
        self.fields.extend(fields);
        self.with_type(FieldType::Record)
    }
}

macro_rules! define_ty_builder_fn {
    ($($name:ident($ty_variant:ident)),* $(,)?) => {
        impl TableFieldSchemaBuilder<Unset> {
            $(
                #[inline]
                pub fn $name(self) -> TableFieldSchemaBuilder<FieldType> {
                    self.with_type(FieldType::$ty_variant)
                }
            )*
        }
    };
}

define_ty_builder_fn! {
    string(String),
    bytes(Bytes),
    int(Integer),
    float(Float),
    numeric(Numeric),
    bool(Bool),
    json(Json),
    timestamp(Timestamp),
    date(Date),
    time(Time),
    datetime(DateTime),
}

impl<Ty> TableFieldSchemaBuilder<Ty> {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

macro_rules! define_mode_builder_fn {
    ($($name:ident($mode_variant:ident)),* $(,)?) => {
        impl TableFieldSchemaBuilder<FieldType> {
            $(
                #[inline]
                pub fn $name(self) -> TableFieldSchema {
                    self.build_with_mode(FieldMode::$mode_variant)
                }
            )*
        }
    };
}

define_mode_builder_fn! {
    required(Required),
    repeated(Repeated),
    nullable(Nullable),
}

impl TableFieldSchemaBuilder<FieldType> {
    fn build_with_mode(self, mode: FieldMode) -> TableFieldSchema {
        TableFieldSchema {
            name: self.name,
            ty: self.ty,
            mode,
            description: self.description,
            fields: self.fields,
        }
    }
}
