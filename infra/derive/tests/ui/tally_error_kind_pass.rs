use std::borrow::Cow;
use tally_derive::tally_error;
use tally_domain::error::{Classify, ErrorKind};

#[tally_error]
pub enum StoreError {
    #[kind(Conflict)]
    #[error("Version conflict{}: {message}", format_context(.context))]
    VersionConflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {
    let err = StoreError::VersionConflict { message: "row".into(), context: None };
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
