//! Transform example
//!
//! Sends a host map through a script-side function and reads the result
//! back off the stack.
//!
//! Run with: cargo run --example transform -p tether-runtime

use std::collections::HashMap;
use tether_runtime::{from_value, to_value, CallParams, Function, HostValue, State, StatePool, Value};

fn new_state() -> State {
    let mut state = State::new();

    // function transform(v) v["hello"] = "world"; return v end
    let transform = Function::new("transform", |state: &mut State| {
        let v = state.get(1);
        match v.as_table() {
            Some(table) => {
                if let Err(e) = table.raw_set(Value::from("hello"), Value::from("world")) {
                    return Err(state.arg_error(1, e.to_string()));
                }
            }
            None => {
                let message = format!("table expected, got {}", v.type_name());
                return Err(state.arg_error(1, message));
            }
        }
        state.push(v);
        Ok(1)
    });
    state.set_global("transform", Value::Function(transform));
    state
}

fn main() {
    let pool = StatePool::new(new_state);
    let mut state = pool.acquire();

    let input = HostValue::map([("how you", "doin?")]);
    let input = to_value(&input).expect("input converts");

    let transform = state.get_global("transform");
    state
        .call_by_param(
            CallParams {
                function: transform,
                nret: 1,
                protect: true,
            },
            &[input],
        )
        .expect("transform failed");

    let output = state.get(-1);
    state.pop(1);

    let output: HashMap<String, String> = match from_value(&output).expect("output decodes") {
        HostValue::Map(entries) => entries
            .into_iter()
            .filter_map(|(k, v)| match (k, v) {
                (HostValue::String(k), HostValue::String(v)) => Some((k, v)),
                _ => None,
            })
            .collect(),
        other => panic!("unexpected output: {:?}", other),
    };
    println!("{:#?}", output);

    pool.release(state);
    pool.shutdown();
}
