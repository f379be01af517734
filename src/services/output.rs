use crate::domain::models::{ErrorBody, JsonErr, JsonOut};
use crate::error::BdtiError;
use serde::Serialize;

/// Writes the `{ok: true, data}` envelope to stdout.
fn print_envelope<T: Serialize>(data: T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&JsonOut { ok: true, data })?
    );
    Ok(())
}

/// Lists `data` as one JSON array, or one text row per item.
pub fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        return print_envelope(data);
    }
    for item in data {
        println!("{}", row(item));
    }
    Ok(())
}

pub fn print_one<T: Serialize>(
    json: bool,
    data: T,
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        return print_envelope(data);
    }
    println!("{}", row(&data));
    Ok(())
}

/// Error envelope for `--json`; anything that is not a [`BdtiError`] reports `INTERNAL`.
pub fn error_body(err: &anyhow::Error) -> JsonErr {
    let code = err
        .downcast_ref::<BdtiError>()
        .map(|e| e.code())
        .unwrap_or("INTERNAL");
    JsonErr {
        ok: false,
        error: ErrorBody {
            code: code.to_string(),
            message: format!("{err:#}"),
        },
    }
}

pub fn print_error(json: bool, err: &anyhow::Error) {
    if json {
        match serde_json::to_string_pretty(&error_body(err)) {
            Ok(s) => println!("{s}"),
            Err(_) => eprintln!("error: {err:#}"),
        }
    } else {
        eprintln!("error: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_carries_domain_code() {
        let err = anyhow::Error::new(BdtiError::DataModelNotPresent("Energy".into()));
        let body = serde_json::to_value(error_body(&err)).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"]["code"], "DATA_MODEL_NOT_PRESENT");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Energy"));

        let other = anyhow::anyhow!("boom");
        assert_eq!(error_body(&other).error.code, "INTERNAL");
    }
}
