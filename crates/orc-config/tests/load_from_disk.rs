use std::io::Write;

use orc_config::{load_providers, load_routing};

#[test]
fn loads_providers_and_missing_routing_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let providers_path = dir.path().join("providers.yaml");
    let mut f = std::fs::File::create(&providers_path).unwrap();
    writeln!(
        f,
        r#"
providers:
  - name: local-acp
    kind: acp
    model_id: agent-1
    context_window: 200000
    cost_per_input_token: 0
    cost_per_output_token: 0
    max_concurrency: 2
    config_path: /etc/agent.toml
"#
    )
    .unwrap();

    let catalog = load_providers(&providers_path).unwrap();
    assert_eq!(catalog.len(), 1);

    let routing_path = dir.path().join("routing.yaml");
    let routing = load_routing(&routing_path).unwrap();
    assert!(routing.complexity_kind.is_empty());
}

#[test]
fn missing_providers_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(load_providers(&missing).is_err());
}
