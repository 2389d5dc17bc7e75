//! Resolve and render through the real HTTP client against a mocked API.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rgen_rancher::RancherClient;
use rgen_testing::{fixtures, MockRancher};
use rgen_watcher::{Dispatcher, RenderPipeline, Scope, TemplateJob};
use serde_json::json;
use tempfile::TempDir;

const IDS: &str = "{% for c in containers %}{{c.id}};{% endfor %}";

async fn render(mock: &MockRancher, scope: Scope, template: &str) -> String {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("template.j2");
    let destination = dir.path().join("out");
    fs::write(&source, template).unwrap();

    let client = RancherClient::new(
        &mock.endpoint(),
        &MockRancher::credentials(),
        Duration::from_secs(5),
    )
    .unwrap();
    let dispatcher = Dispatcher::new(
        scope,
        Arc::new(client),
        RenderPipeline::new(vec![TemplateJob::new(&source, &destination)], None),
        None,
    );

    let reconciliation = dispatcher.reconcile("test").await;
    assert_eq!(reconciliation.report.rendered, 1);
    fs::read_to_string(&destination).unwrap()
}

#[tokio::test]
async fn test_all_instances_render_ids() {
    let mock = MockRancher::start().await;
    mock.mount_instances(vec![json!({"id": 1, "type": "container", "state": "running"})])
        .await;

    assert_eq!(render(&mock, Scope::AllInstances, IDS).await, "1;");
}

#[tokio::test]
async fn test_templates_see_instance_fields() {
    let mock = MockRancher::start().await;
    mock.mount_instances(vec![json!({
        "id": "1i10",
        "type": "container",
        "state": "running",
        "primaryIpAddress": "10.42.232.33",
        "labels": {"io.rancher.stack.name": "web"}
    })])
    .await;

    let template = "{% for c in containers %}{{ c.primaryIpAddress }};{% endfor %}";
    assert_eq!(
        render(&mock, Scope::Stack("web".into()), template).await,
        "10.42.232.33;"
    );
}

#[tokio::test]
async fn test_stack_scope_filters_by_label() {
    let mock = MockRancher::start().await;
    mock.mount_instances(vec![
        fixtures::container("1i1", "running", "web", "app"),
        fixtures::container("1i2", "running", "db", "mysql"),
        fixtures::unlabeled_container("1i3", "running"),
        fixtures::container("1i4", "stopped", "web", "worker"),
    ])
    .await;

    assert_eq!(
        render(&mock, Scope::Stack("web".into()), IDS).await,
        "1i1;1i4;"
    );
    assert_eq!(render(&mock, Scope::Stack("none".into()), IDS).await, "");
}

#[tokio::test]
async fn test_stack_services_render_in_configured_order() {
    let mock = MockRancher::start().await;
    mock.mount_service("s", "svc1", vec![fixtures::container("X", "running", "s", "svc1")])
        .await;
    mock.mount_service("s", "svc2", vec![fixtures::container("Y", "running", "s", "svc2")])
        .await;

    let forward = Scope::StackServices {
        stack: "s".into(),
        services: vec!["svc1".into(), "svc2".into()],
    };
    assert_eq!(render(&mock, forward, IDS).await, "X;Y;");

    let reversed = Scope::StackServices {
        stack: "s".into(),
        services: vec!["svc2".into(), "svc1".into()],
    };
    assert_eq!(render(&mock, reversed, IDS).await, "Y;X;");
}

#[tokio::test]
async fn test_api_outage_renders_empty() {
    let mock = MockRancher::start().await;
    mock.mount_outage().await;

    for scope in [
        Scope::AllInstances,
        Scope::Stack("web".into()),
        Scope::StackServices {
            stack: "web".into(),
            services: vec!["app".into()],
        },
    ] {
        assert_eq!(render(&mock, scope, IDS).await, "");
    }
}
