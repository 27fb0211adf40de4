// used for `#[serde(skip_serializing_if = "is_false")]` attrs
#[inline]
pub(crate) fn is_false(b: &bool) -> bool {
    !*b
}

/// (De)serializes 64 bit integers, which the REST API encodes as JSON strings.
/// Plain JSON numbers are accepted as well when deserializing.
pub(crate) mod int64 {
    use serde::de;

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(Int64Visitor)
    }

    pub(crate) struct Int64Visitor;

    impl de::Visitor<'_> for Int64Visitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a 64 bit integer, or a string containing one")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            i64::try_from(v).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            v.parse()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }

    pub mod optional {
        pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            match value {
                Some(value) => serializer.collect_str(value),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            #[derive(serde::Deserialize)]
            struct Wrapper(#[serde(with = "super")] i64);

            let opt: Option<Wrapper> = serde::Deserialize::deserialize(deserializer)?;
            Ok(opt.map(|Wrapper(value)| value))
        }
    }
}
