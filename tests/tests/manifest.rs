use std::fs;

use alloy::primitives::address;
use eyre::Result;
use scripts::{
    commands::verify_code,
    errors::DeployError,
    manifest::{read_deployment, read_manifest, SinkOutcome},
    orchestrator::orchestrate,
};
use serde_json::json;
use tests::{
    fixtures::{test_networks, TestProject, TEST_NETWORK},
    mock_chain::MockChain,
    utils::global_setup,
};

#[tokio::test]
async fn test_failed_instantiation_writes_no_manifest() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    let failing = project.artifact("B", &["address"])?;
    project.artifact("C", &["address"])?;
    fs::create_dir_all(project.root().join("frontend"))?;
    let config = project.config(json!({
        "units": [
            { "name": "A", "artifact": "A.json" },
            { "name": "B", "artifact": "B.json", "args": [{ "unit": "A" }] },
            { "name": "C", "artifact": "C.json", "args": [{ "unit": "B" }] }
        ],
        "destinations": [
            { "path": "deployments", "required": true },
            { "path": "frontend", "required": false }
        ],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    chain.revert_on(failing);
    let err = orchestrate(&chain, &config, TEST_NETWORK)
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::TransactionFailure { label, .. } if label == "B"));
    // C is never submitted once B fails
    assert_eq!(chain.submissions().len(), 2);
    assert!(!project.manifest_path("deployments").exists());
    assert!(!project.manifest_path("frontend").exists());

    Ok(())
}

#[tokio::test]
async fn test_missing_optional_destination_skipped() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    fs::create_dir_all(project.root().join("sdk"))?;
    let config = project.config(json!({
        "units": [{ "name": "A", "artifact": "A.json" }],
        "destinations": [
            { "path": "deployments", "required": true },
            { "path": "frontend/src/deployments", "required": false },
            { "path": "sdk", "required": false }
        ],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let report = orchestrate(&chain, &config, TEST_NETWORK).await?;

    assert_eq!(
        report.sinks,
        vec![
            SinkOutcome::Written(project.manifest_path("deployments")),
            SinkOutcome::Skipped(project.root().join("frontend/src/deployments")),
            SinkOutcome::Written(project.manifest_path("sdk")),
        ]
    );
    assert!(!project.root().join("frontend").exists());

    let a = report.manifest.address_of("A")?;
    assert_eq!(read_deployment("A", &project.manifest_path("deployments"))?, a);
    assert_eq!(read_deployment("A", &project.manifest_path("sdk"))?, a);

    Ok(())
}

#[tokio::test]
async fn test_redeploy_replaces_manifest() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    project.artifact("B", &[])?;
    let config = project.config(json!({
        "units": [
            { "name": "A", "artifact": "A.json" },
            { "name": "B", "artifact": "B.json" }
        ],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let first = orchestrate(&chain, &config, TEST_NETWORK).await?;
    let second = orchestrate(&chain, &config, TEST_NETWORK).await?;

    // The second run deploys fresh units and overwrites the manifest
    let manifest = read_manifest(&project.manifest_path("deployments"))?;
    assert_eq!(manifest, second.manifest);
    assert_ne!(first.manifest.address_of("A")?, second.manifest.address_of("A")?);

    Ok(())
}

#[tokio::test]
async fn test_inspect_detects_missing_code() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    let config = project.config(json!({
        "units": [{ "name": "A", "artifact": "A.json" }],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    orchestrate(&chain, &config, TEST_NETWORK).await?;
    let manifest = read_manifest(&project.manifest_path("deployments"))?;
    assert!(verify_code(&chain, &manifest).await?.is_empty());

    let stale = project.root().join("stale.json");
    let nowhere = address!("00000000000000000000000000000000deadbeef");
    fs::write(
        &stale,
        json!({ "Ghost": { "address": nowhere.to_string(), "artifacts": [] } }).to_string(),
    )?;
    let manifest = read_manifest(&stale)?;
    assert_eq!(verify_code(&chain, &manifest).await?, vec!["Ghost".to_string()]);

    let err = read_manifest(&project.root().join("missing.json")).unwrap_err();
    assert!(err.to_string().contains("has the system been deployed?"));

    Ok(())
}
