use std::borrow::Cow;
use std::path::PathBuf;

#[tally_derive::tally_error]
pub enum SnapshotError {
    #[error("Cannot write '{}'{}: {source}", .path.display(), format_context(.context))]
    Write { path: PathBuf, source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Corrupt snapshot{}: {source}", format_context(.context))]
    Decode {
        #[source]
        source: std::num::ParseIntError,
        context: Option<Cow<'static, str>>,
    },
}

fn write(path: &str) -> Result<(), SnapshotError> {
    std::fs::write(path, b"").map_err(|source| SnapshotError::Write {
        path: PathBuf::from(path),
        source,
        context: None,
    })
}

fn main() {
    let decoded: Result<u8, SnapshotError> = "x".parse::<u8>().context("header");
    assert!(decoded.unwrap_err().to_string().contains("header"));

    let err = write("/nonexistent-dir/snapshot").context("flushing").unwrap_err();
    assert!(matches!(err, SnapshotError::Write { context: Some(_), .. }));
}
