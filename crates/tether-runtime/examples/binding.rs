//! Module binding example
//!
//! Exposes typed Rust functions as a module, then calls them the way a
//! script would: through `require` and the adapted callables.
//!
//! Run with: cargo run --example binding -p tether-runtime

use std::collections::HashMap;
use tether_runtime::{from_value, to_script, HostFunction, HostValue, IntoHost, Module, State};
use tether_runtime::{StatePool, Value, Variadic};

fn foo_bar(a: i64, b: i64, c: HashMap<String, String>) -> (String, String, Vec<HostValue>) {
    (
        "foo".to_string(),
        "bar".to_string(),
        vec![a.into_host(), b.into_host(), c.into_host()],
    )
}

fn sdump(values: Variadic<HostValue>) -> String {
    values
        .iter()
        .map(|value| format!("{:#?}", value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn new_state() -> State {
    let mut state = State::new();
    Module::new("module")
        .function("foo_bar", HostFunction::new(foo_bar))
        .function("sdump", HostFunction::new(sdump))
        .register(&mut state);
    state
}

fn main() {
    let pool = StatePool::new(new_state);
    let mut state = pool.acquire_guard();

    // local module = require("module")
    let require = state.get_global("require");
    let module = state
        .call(&require, &[Value::from("module")], 1)
        .expect("require failed")
        .remove(0);
    let exports = module.as_table().expect("module is a table");

    // local foo, bar, list = module.foo_bar(1, 2, {x = "y"})
    let foo_bar = exports.raw_get(&Value::from("foo_bar"));
    let arg = to_script(HashMap::from([("x", "y")])).expect("map converts");
    let results = state
        .call(&foo_bar, &[Value::Number(1.0), Value::Number(2.0), arg], 3)
        .expect("foo_bar failed");
    println!("{} {}", results[0], results[1]);

    // print(module.sdump(list))
    let sdump = exports.raw_get(&Value::from("sdump"));
    let dumped = state
        .call(&sdump, &results[2..], 1)
        .expect("sdump failed");
    println!("{}", dumped[0]);

    // Arity errors surface as script errors
    match state.call(&foo_bar, &[Value::Number(1.0)], 3) {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("error: {}", e),
    }

    println!("{:?}", from_value(&results[2]).expect("list decodes"));

    drop(state);
    pool.shutdown();
}
