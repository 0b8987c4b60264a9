//! Integration tests for the HTTP tool server.
//!
//! Binds a real server on an ephemeral port and drives it through the
//! HTTP client transport.

use conclave_tools::{
    ArgKind, HttpToolClient, Lookup, ToolError, ToolRegistry, ToolServer, ToolTransport, catalog,
};
use serde_json::json;
use std::net::TcpListener;
use std::time::Duration;

/// Start a tool server on an ephemeral port, returning its base URL.
async fn spawn_server(registry: ToolRegistry) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let server = ToolServer::new(registry);
    let bind_addr = addr.to_string();
    tokio::spawn(async move {
        server.serve(&bind_addr).await.expect("server run");
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://{}", addr)
}

fn full_registry() -> ToolRegistry {
    ToolRegistry::new()
        .register(conclave_tools::UserLookupTool::new(
            conclave_tools::UserStore::seeded(),
        ))
        .register(conclave_tools::ProductLookupTool::new(
            conclave_tools::ProductStore::seeded(),
        ))
}

#[tokio::test]
async fn test_list_tools() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let schemas = client.list_schemas().await.expect("schemas");
    let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["lookup_product", "lookup_user"]);

    let user = &schemas[1];
    assert_eq!(user.args.len(), 1);
    assert_eq!(user.args[0].name, "id");
    assert_eq!(user.args[0].kind, ArgKind::String);
    assert!(user.args[0].required);
}

#[tokio::test]
async fn test_invoke_hit() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let lookup = client
        .invoke("lookup_product", json!({"sku": "SKU-123"}))
        .await
        .expect("lookup");

    let payload = lookup.payload().expect("hit");
    assert_eq!(payload["price"], 19.99);
}

#[tokio::test]
async fn test_invoke_miss_is_ok_with_empty_payload() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let lookup = client
        .invoke("lookup_user", json!({"id": "no-such-user"}))
        .await
        .expect("lookup");

    assert_eq!(lookup, Lookup::Miss);
}

#[tokio::test]
async fn test_invoke_unknown_tool() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let err = client
        .invoke("lookup_weather", json!({}))
        .await
        .expect_err("unknown tool");

    assert!(matches!(err, ToolError::UnknownTool { .. }));
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_invoke_invalid_arguments() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let err = client
        .invoke("lookup_user", json!({"id": 7}))
        .await
        .expect_err("wrong type");
    assert!(matches!(err, ToolError::InvalidArguments { .. }));

    let err = client
        .invoke("lookup_user", json!({}))
        .await
        .expect_err("missing arg");
    assert!(matches!(err, ToolError::InvalidArguments { .. }));
}

#[tokio::test]
async fn test_repeat_invocations_are_idempotent() {
    let url = spawn_server(catalog::product_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let args = json!({"sku": "PDO1234"});
    let first = client
        .invoke("lookup_product", args.clone())
        .await
        .expect("first");
    let second = client
        .invoke("lookup_product", args)
        .await
        .expect("second");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_invocations_do_not_interfere() {
    let url = spawn_server(full_registry()).await;
    let client = HttpToolClient::new(&url).expect("client");

    let mut handles = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                client.invoke("lookup_user", json!({"id": "K1234"})).await
            } else {
                client
                    .invoke("lookup_product", json!({"sku": "SKU-123"}))
                    .await
            }
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let lookup = handle.await.expect("join").expect("lookup");
        let payload = lookup.payload().expect("hit");
        if i % 2 == 0 {
            assert_eq!(payload["name"], "Kira Han");
        } else {
            assert_eq!(payload["price"], 19.99);
        }
    }
}

#[tokio::test]
async fn test_unreachable_server() {
    let client = HttpToolClient::new("http://127.0.0.1:1").expect("client");
    let err = client.list_schemas().await.expect_err("unreachable");
    assert!(matches!(err, ToolError::Unreachable { .. }));
    assert!(!err.is_recoverable());
}
