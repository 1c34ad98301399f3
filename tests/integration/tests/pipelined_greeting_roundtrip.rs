use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use piper_gateway::{demo_method_dispatcher, METHOD_APPEND_SUFFIX, METHOD_MAKE_GREETING};
use piper_session::{
    establish_connection, in_memory_transport_pair, IssuerHandle, MethodDispatcher,
};
use piper_wire::Param;
use serde_json::json;
use tokio::time::timeout;

const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Wires a caller to a responder running the demo methods, both driven on
/// their own tasks over an in-memory duplex transport.
fn connect_demo_peers() -> IssuerHandle {
    let (caller_half, responder_half) = in_memory_transport_pair();

    let (_responder_issuer, responder_driver) =
        establish_connection(responder_half, Arc::new(demo_method_dispatcher()));
    tokio::spawn(responder_driver.run());

    let (issuer, caller_driver) =
        establish_connection(caller_half, Arc::new(MethodDispatcher::new()));
    tokio::spawn(caller_driver.run());

    issuer
}

#[tokio::test]
async fn pipelined_greeting_chains_without_an_extra_round_trip() {
    let issuer = connect_demo_peers();

    let greeting = issuer
        .call_pipelined(METHOD_MAKE_GREETING, vec![Param::literal(json!("Alice"))])
        .expect("call sent");
    let decorated = issuer
        .call_pipelined(
            METHOD_APPEND_SUFFIX,
            vec![Param::Reference(greeting), Param::literal(json!("!!!"))],
        )
        .expect("call sent");

    let decorated_value = timeout(TEST_DEADLINE, issuer.await_reference(decorated))
        .await
        .expect("deadline")
        .expect("value");
    assert_eq!(decorated_value, json!("Hello, Alice!!!"));

    let greeting_value = timeout(TEST_DEADLINE, issuer.await_reference(greeting))
        .await
        .expect("deadline")
        .expect("value");
    assert_eq!(greeting_value, json!("Hello, Alice!"));
}

#[tokio::test]
async fn many_concurrent_greetings_correlate_by_id() {
    let issuer = connect_demo_peers();

    let names = ["Alice", "Bob", "Carol", "Dana", "Eve", "Frank", "Grace", "Heidi"];
    let calls = names.iter().map(|name| {
        let issuer = issuer.clone();
        async move {
            issuer
                .call_immediate(METHOD_MAKE_GREETING, vec![Param::literal(json!(name))])
                .await
        }
    });
    let results = timeout(TEST_DEADLINE, join_all(calls))
        .await
        .expect("deadline");
    for (name, result) in names.iter().zip(results) {
        assert_eq!(result.expect("value"), json!(format!("Hello, {name}!")));
    }
}

#[tokio::test]
async fn chained_pipelined_suffixes_apply_in_order() {
    let issuer = connect_demo_peers();

    let greeting = issuer
        .call_pipelined(METHOD_MAKE_GREETING, vec![Param::literal(json!("Ivy"))])
        .expect("call sent");
    let mut latest = greeting;
    for suffix in ["?", "!", "."] {
        latest = issuer
            .call_pipelined(
                METHOD_APPEND_SUFFIX,
                vec![Param::Reference(latest), Param::literal(json!(suffix))],
            )
            .expect("call sent");
    }

    let value = timeout(TEST_DEADLINE, issuer.await_reference(latest))
        .await
        .expect("deadline")
        .expect("value");
    assert_eq!(value, json!("Hello, Ivy!?!."));
}

#[tokio::test]
async fn handler_argument_failure_reaches_the_caller_as_an_exception() {
    let issuer = connect_demo_peers();

    let failure = timeout(
        TEST_DEADLINE,
        issuer.call_immediate(METHOD_MAKE_GREETING, vec![Param::literal(json!(42))]),
    )
    .await
    .expect("deadline")
    .expect_err("failure");
    assert!(failure
        .to_string()
        .contains("expects a string argument at position 0"));

    // The connection survives the failed call.
    let value = timeout(
        TEST_DEADLINE,
        issuer.call_immediate(METHOD_MAKE_GREETING, vec![Param::literal(json!("Judy"))]),
    )
    .await
    .expect("deadline")
    .expect("value");
    assert_eq!(value, json!("Hello, Judy!"));
}
