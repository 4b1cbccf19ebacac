use serde_json::{Map, Value};
use crate::core::errors::ApiError;

const RENDERING_POLICIES: [&str; 2] = ["listing", "generate"];
const PROVIDER_NAMES: [&str; 2] = ["openai", "llama"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
        validate_u64_field(
            server,
            "server.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_non_empty_string_field(
            retrieval,
            "retrieval.embeddings_path",
            "embeddings_path",
        )?;
        validate_non_empty_string_field(retrieval, "retrieval.metadata_path", "metadata_path")?;
        validate_u64_field(retrieval, "retrieval.dimension", "dimension", 1, 65_536)?;
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 1_000)?;
        validate_enum_field(
            retrieval,
            "retrieval.rendering",
            "rendering",
            &RENDERING_POLICIES,
        )?;
        validate_enum_field(
            retrieval,
            "retrieval.generator_provider",
            "generator_provider",
            &PROVIDER_NAMES,
        )?;
        validate_optional_string_field(retrieval, "retrieval.listing_header", "listing_header")?;

        if let Some(columns) = expect_optional_object(retrieval, "columns")? {
            validate_non_empty_string_field(columns, "retrieval.columns.content", "content")?;
            for key in ["title", "category", "score", "price"] {
                validate_optional_string_field(
                    columns,
                    &format!("retrieval.columns.{}", key),
                    key,
                )?;
            }
        }
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_non_empty_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_non_empty_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_optional_string_field(embedding, "embedding.api_key", "api_key")?;
    }

    if let Some(providers) = expect_optional_object(root, "providers")? {
        for (name, value) in providers {
            let path_prefix = format!("providers.{}", name);
            if !PROVIDER_NAMES.contains(&name.as_str()) {
                return Err(ApiError::BadRequest(format!(
                    "Invalid config at '{}': unknown provider (expected one of: {})",
                    path_prefix,
                    PROVIDER_NAMES.join(", ")
                )));
            }
            let entry = value
                .as_object()
                .ok_or_else(|| config_type_error(&path_prefix, "object"))?;
            validate_non_empty_string_field(
                entry,
                &format!("{}.base_url", path_prefix),
                "base_url",
            )?;
            validate_non_empty_string_field(entry, &format!("{}.model", path_prefix), "model")?;
            validate_optional_string_field(entry, &format!("{}.api_key", path_prefix), "api_key")?;
            validate_f64_field(
                entry,
                &format!("{}.temperature", path_prefix),
                "temperature",
                0.0,
                2.0,
            )?;
            validate_u64_field(
                entry,
                &format!("{}.max_tokens", path_prefix),
                "max_tokens",
                1,
                1_000_000,
            )?;
            validate_u64_field(
                entry,
                &format!("{}.timeout_secs", path_prefix),
                "timeout_secs",
                1,
                3_600,
            )?;
        }
    }

    if let Some(prompt) = expect_optional_object(root, "prompt")? {
        validate_non_empty_string_field(prompt, "prompt.system", "system")?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_non_empty_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::BadRequest(format!(
            "Invalid config at '{}': expected one of: {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
