#[test]
fn tally_macros_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/tally_error_pass.rs");
    t.pass("tests/ui/tally_error_kind_pass.rs");
    t.pass("tests/ui/tally_error_payload_pass.rs");
    t.pass("tests/ui/tally_slice_pass.rs");
}
