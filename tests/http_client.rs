// reqwest clients resolving through the DNS cache, served by a local
// mockito server so no external network access is needed.

mod common;

use common::{test_cache, StubResolver};
use dialcache::{cached_client_builder, ResolutionError};
use std::error::Error;

#[tokio::test]
async fn test_client_resolves_through_cache() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ok")
        .with_status(200)
        .with_body("OK")
        .expect(2)
        .create_async()
        .await;
    let port = server.socket_address().port();

    let resolver = StubResolver::new().with_host("storage.test", &["127.0.0.1"]);
    let cache = test_cache(resolver.clone());
    let client = cached_client_builder(cache.clone()).no_proxy().build().unwrap();

    for _ in 0..2 {
        let response = client
            .get(format!("http://storage.test:{}/ok", port))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(response.text().await.unwrap(), "OK");
    }

    mock.assert_async().await;
    // Both requests were served from a single resolution
    assert_eq!(resolver.calls(), 1);
    assert_eq!(cache.hosts().await, vec!["storage.test".to_string()]);
    cache.stop();
}

#[tokio::test]
async fn test_client_surfaces_resolution_failure() {
    let resolver = StubResolver::new();
    resolver.set_failing(true);
    let cache = test_cache(resolver);
    let client = cached_client_builder(cache.clone()).no_proxy().build().unwrap();

    let err = client
        .get("http://unknown.test:8080/")
        .send()
        .await
        .unwrap_err();

    // The resolver failure is the root cause of the request error
    let mut source = err.source();
    let mut resolution = None;
    while let Some(cause) = source {
        if let Some(e) = cause.downcast_ref::<ResolutionError>() {
            resolution = Some(e);
            break;
        }
        source = cause.source();
    }
    match resolution {
        Some(ResolutionError::Lookup { host, .. }) => assert_eq!(host, "unknown.test"),
        other => panic!("expected lookup failure in error chain, got {:?}", other),
    }
    cache.stop();
}
