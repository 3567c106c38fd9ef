#[tally_derive::tally_slice]
pub struct Counter {
    pub label: String,
}

fn main() {
    let counter = Counter::new(CounterInner { label: "orders".to_owned() });
    let cloned = counter.clone();
    assert_eq!(cloned.label, "orders");
}
