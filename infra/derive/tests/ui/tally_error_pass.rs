use std::borrow::Cow;

#[tally_derive::tally_error]
pub enum RelayError {
    #[error("Decode failed{}: {source}", format_context(.context))]
    Decode {
        #[source]
        source: std::num::ParseIntError,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn attempts(raw: &str) -> Result<u32, RelayError> {
    let parsed = raw.parse::<u32>().context("attempt counter")?;
    if parsed == 0 {
        return Err("zero attempts".into());
    }
    Ok(parsed)
}

fn main() {
    assert_eq!(attempts("3").ok(), Some(3));
    assert!(attempts("x").unwrap_err().to_string().contains("attempt counter"));
    let _ = attempts("0").unwrap_err();
}
