use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(with_path)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(with_path)
}

fn with_path(err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    Error::Document {
        path,
        message: err.into_inner().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Sheet {
        name: String,
        rows: Vec<Vec<String>>,
    }

    #[test]
    fn errors_name_the_offending_location() {
        let src = br#"{"name": "s", "rows": [["a"], ["b", 2]]}"#;
        let err = from_slice_with_path::<Sheet>(src).unwrap_err();
        match err {
            Error::Document { path, .. } => assert_eq!(path, "rows[1][1]"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
