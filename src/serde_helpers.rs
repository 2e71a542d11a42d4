//! Serde helpers for the storefront backend's loosely typed JSON.
//!
//! When the `tracing` feature is enabled, REST responses are also checked for
//! fields the SDK does not model, so API drift shows up in logs.

#[cfg(feature = "api")]
use {serde::de::DeserializeOwned, serde_json::Value};

/// A `serde_as` type that deserializes strings or integers as `String`.
///
/// Use with `#[serde_as(as = "StringFromAny")]` for `String` fields
/// or `#[serde_as(as = "Option<StringFromAny>")]` for `Option<String>`.
pub struct StringFromAny;

impl<'de> serde_with::DeserializeAs<'de, String> for StringFromAny {
    fn deserialize_as<D>(deserializer: D) -> std::result::Result<String, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize as _;

        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Id {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Id::deserialize(deserializer)? {
            Id::Text(text) => text,
            Id::Signed(n) => n.to_string(),
            Id::Unsigned(n) => n.to_string(),
        })
    }
}

impl serde_with::SerializeAs<String> for StringFromAny {
    fn serialize_as<S>(source: &String, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(source)
    }
}

/// Deserialize a REST response, logging any field the target type ignores.
///
/// Unknown fields never fail deserialization. On failure the offending path is
/// logged before the error is returned.
#[cfg(all(feature = "api", feature = "tracing"))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    use std::any::type_name;

    let type_name = type_name::<T>();
    tracing::trace!(%type_name, json = %value, "deserializing JSON");

    let original = value.clone();
    let mut unknown_paths: Vec<String> = Vec::new();

    let result = serde_ignored::deserialize(value, |path| {
        unknown_paths.push(path.to_string());
    });

    let parsed: T = match result {
        Ok(parsed) => parsed,
        Err(e) => {
            let json = original.to_string();
            let mut de = serde_json::Deserializer::from_str(&json);
            let path_result: Result<T, _> = serde_path_to_error::deserialize(&mut de);
            if let Err(path_err) = path_result {
                let path = path_err.path().to_string();
                tracing::error!(
                    %type_name,
                    %path,
                    value = %describe(lookup_value(&original, &path)),
                    error = %path_err.inner(),
                    "deserialization failed"
                );
            }
            return Err(e.into());
        }
    };

    for path in unknown_paths {
        tracing::warn!(
            %type_name,
            field = %path,
            value = %describe(lookup_value(&original, &path)),
            "unknown field in API response"
        );
    }

    Ok(parsed)
}

/// Pass-through deserialization when tracing is disabled.
#[cfg(all(feature = "api", not(feature = "tracing")))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// Resolve a `serde_ignored` / `serde_path_to_error` path against a JSON value.
///
/// Both crates render paths as dot-separated segments with `?` standing in for
/// `Option` layers and bracketed or bare numeric array indices. The path is
/// rewritten into a JSON pointer and resolved with [`Value::pointer`].
#[cfg(all(feature = "api", feature = "tracing"))]
fn lookup_value<'value>(value: &'value Value, path: &str) -> Option<&'value Value> {
    let pointer: String = path
        .split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty() && *segment != "?")
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect();

    value.pointer(&pointer)
}

#[cfg(all(feature = "api", feature = "tracing"))]
fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unable to retrieve>".to_owned(), Value::to_string)
}
