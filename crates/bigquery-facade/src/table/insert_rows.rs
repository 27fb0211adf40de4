/// `tabledata.insertAll` body that serializes borrowed rows directly, wrapping each one
/// with a fresh `insertId`.
pub(super) struct InsertRows<'a, R> {
    options: InsertRowOptions,
    rows: &'a [R],
}

impl<'a, R> InsertRows<'a, R>
where
    R: serde::Serialize,
{
    pub(super) fn new(options: InsertRowOptions, rows: &'a [R]) -> Self {
        Self { options, rows }
    }
}

impl<R> serde::Serialize for InsertRows<'_, R>
where
    R: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let field_count = self.options.ignore_unknown_values as usize
            + self.options.skip_invalid_rows as usize
            + 1;

        let mut map = serializer.serialize_map(Some(field_count))?;

        if self.options.ignore_unknown_values {
            map.serialize_entry("ignoreUnknownValues", &true)?;
        }

        if self.options.skip_invalid_rows {
            map.serialize_entry("skipInvalidRows", &true)?;
        }

        map.serialize_entry("rows", &RowIter(self.rows))?;

        map.end()
    }
}

/// Streaming insert flags. Both default to off, so a single bad row rejects the whole
/// request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertRowOptions {
    pub skip_invalid_rows: bool,
    pub ignore_unknown_values: bool,
}

struct RowIter<'a, R>(&'a [R]);

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RowWrapper<'a, R> {
    insert_id: uuid::Uuid,
    json: &'a R,
}

impl<R> serde::Serialize for RowIter<'_, R>
where
    R: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.0.iter().map(|json| RowWrapper {
            insert_id: uuid::Uuid::new_v4(),
            json,
        }))
    }
}
