use alloy::primitives::{Address, TxKind};
use eyre::Result;
use scripts::{errors::DeployError, orchestrator::orchestrate, topology::resolve};
use serde_json::json;
use tests::{
    fixtures::{address_word, test_networks, TestProject, TEST_NETWORK},
    mock_chain::{MockChain, MOCK_DEPLOYER, MOCK_GAS_ESTIMATE},
    utils::global_setup,
};

#[tokio::test]
async fn test_two_unit_deployment() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    let code_a = project.artifact("A", &[])?;
    let code_b = project.artifact("B", &["address"])?;
    let config = project.config(json!({
        "units": [
            { "name": "B", "artifact": "B.json", "args": [{ "unit": "A" }] },
            { "name": "A", "artifact": "A.json" }
        ],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let report = orchestrate(&chain, &config, TEST_NETWORK).await?;

    // A is deployed first, and B's constructor receives A's address
    let a = report.manifest.address_of("A")?;
    let b = report.manifest.address_of("B")?;
    assert_eq!(a, MOCK_DEPLOYER.create(0));
    assert_eq!(b, MOCK_DEPLOYER.create(1));

    let submissions = chain.submissions();
    assert_eq!(submissions.len(), 2);
    let (a_hash, a_kind, a_input, _) = &submissions[0];
    let (b_hash, b_kind, b_input, _) = &submissions[1];
    assert_eq!((*a_kind, *b_kind), (TxKind::Create, TxKind::Create));
    assert_eq!(a_input, &code_a);
    assert!(b_input.starts_with(&code_b));
    assert_eq!(&b_input[code_b.len()..], address_word(a).as_slice());

    // A's instantiation is confirmed before B's is submitted
    assert!(chain.confirmation_index(*a_hash) < chain.submission_index(*b_hash));

    let manifest = std::fs::read_to_string(project.manifest_path("deployments"))?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest)?;
    assert_eq!(manifest["A"]["address"], json!(a.to_string()));
    assert_eq!(manifest["B"]["address"], json!(b.to_string()));
    assert!(manifest["B"]["artifacts"].is_array());

    Ok(())
}

#[tokio::test]
async fn test_cycle_fails_before_any_submission() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("A", &["address"])?;
    project.artifact("B", &["address"])?;
    let config = project.config(json!({
        "units": [
            { "name": "A", "artifact": "A.json", "args": [{ "unit": "B" }] },
            { "name": "B", "artifact": "B.json", "args": [{ "unit": "A" }] }
        ],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let err = orchestrate(&chain, &config, TEST_NETWORK)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DeployError::CyclicDependency(vec!["A".into(), "B".into(), "A".into()])
    );
    assert!(chain.events().is_empty());
    assert!(!project.manifest_path("deployments").exists());

    Ok(())
}

#[tokio::test]
async fn test_plan_never_forward_references() -> Result<()> {
    let mut project = TestProject::new()?;
    for name in ["Token", "Oracle", "Auction", "Rewards", "Pool"] {
        project.artifact(name, &["address", "address"])?;
    }
    let config = project.config(json!({
        "units": [
            { "name": "Pool", "artifact": "Pool.json", "class": "pool",
              "args": [{ "unit": "Token" }, { "unit": "Auction" }] },
            { "name": "Rewards", "artifact": "Rewards.json", "class": "reward-system",
              "args": [{ "unit": "Pool" }, { "unit": "Token" }] },
            { "name": "Auction", "artifact": "Auction.json", "class": "auction",
              "args": [{ "unit": "Oracle" }, { "unit": "Token" }] },
            { "name": "Oracle", "artifact": "Oracle.json", "args": ["deployer", "deployer"] },
            { "name": "Token", "artifact": "Token.json", "args": ["deployer", "deployer"] }
        ],
        "networks": test_networks()
    }))?;

    let plan = resolve(&config)?;
    for unit in &config.units {
        let position = plan.position(&unit.name).unwrap();
        for dep in unit.dependencies() {
            let dep_position = plan.position(&dep.to_string()).unwrap();
            assert!(dep_position < position, "{} placed before {}", unit.name, dep);
        }
    }

    // Resolution is deterministic
    assert_eq!(plan, resolve(&config)?);
    assert_eq!(
        plan.unit_order(),
        vec!["Oracle", "Token", "Auction", "Pool", "Rewards"]
    );

    Ok(())
}

#[tokio::test]
async fn test_gas_committed_is_sum_of_declared_limits() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("Token", &["address"])?;
    project.artifact("Vault", &["address"])?;
    let config = project.config(json!({
        "units": [
            { "name": "Token", "artifact": "Token.json", "args": ["deployer"], "gas_limit": 2000000 },
            { "name": "Vault", "artifact": "Vault.json", "args": [{ "unit": "Token" }] }
        ],
        "wiring": [
            { "target": "Token", "signature": "setVault(address)", "args": [{ "unit": "Vault" }],
              "gas_limit": 50000 }
        ],
        "grants": [
            { "target": "Token", "role": "MINTER_ROLE", "grantee": { "unit": "Vault" } }
        ],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let report = orchestrate(&chain, &config, TEST_NETWORK).await?;

    let declared: Vec<u64> = chain
        .submissions()
        .into_iter()
        .map(|(_, _, _, gas_limit)| gas_limit.unwrap())
        .collect();
    let buffered = MOCK_GAS_ESTIMATE * 120 / 100;
    assert_eq!(declared, vec![2_000_000, buffered, 50_000, buffered]);
    assert_eq!(report.gas_committed, declared.iter().sum::<u64>());
    assert_eq!(report.transactions, 4);

    Ok(())
}

#[tokio::test]
async fn test_chain_id_mismatch_rejected() -> Result<()> {
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    let config = project.config(json!({
        "units": [{ "name": "A", "artifact": "A.json" }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new().with_chain_id(1);
    let err = orchestrate(&chain, &config, TEST_NETWORK)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Configuration(msg) if msg.contains("chain id")));
    assert!(chain.events().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_undeclared_network_and_missing_deployer_rejected() -> Result<()> {
    let mut project = TestProject::new()?;
    project.artifact("A", &[])?;
    let config = project.config(json!({
        "units": [{ "name": "A", "artifact": "A.json" }],
        "networks": test_networks()
    }))?;

    let chain = MockChain::new();
    let err = orchestrate(&chain, &config, "holesky").await.unwrap_err();
    assert!(err.is_pre_execution());

    let chain = MockChain::new().with_deployer(Address::ZERO);
    let err = orchestrate(&chain, &config, TEST_NETWORK)
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Configuration(_)));
    assert!(chain.events().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_independent_units_submitted_before_confirmation() -> Result<()> {
    global_setup();
    let mut project = TestProject::new()?;
    project.artifact("Token", &[])?;
    project.artifact("Vault", &["address"])?;
    project.artifact("Oracle", &[])?;
    project.artifact("Registry", &[])?;
    let config = project.config(json!({
        "units": [
            { "name": "Token", "artifact": "Token.json" },
            { "name": "Vault", "artifact": "Vault.json", "args": [{ "unit": "Token" }] },
            { "name": "Oracle", "artifact": "Oracle.json" },
            { "name": "Registry", "artifact": "Registry.json" }
        ],
        "destinations": [{ "path": "deployments", "required": true }],
        "networks": test_networks()
    }))?;

    let plan = resolve(&config)?;
    assert_eq!(plan.blocking_count(), 1);

    let chain = MockChain::new();
    orchestrate(&chain, &config, TEST_NETWORK).await?;

    let hashes: Vec<_> = chain.submissions().into_iter().map(|(hash, ..)| hash).collect();
    assert_eq!(hashes.len(), 4);
    let (token, independent) = (hashes[0], &hashes[1..]);

    // Token has a dependent, so it is confirmed before anything else is sent
    let token_confirmed = chain.confirmation_index(token).unwrap();
    for hash in independent {
        assert!(token_confirmed < chain.submission_index(*hash).unwrap());
    }

    // The units nothing depends on are all in flight before the first of
    // them is confirmed
    let last_submitted = independent
        .iter()
        .map(|hash| chain.submission_index(*hash).unwrap())
        .max()
        .unwrap();
    let first_confirmed = independent
        .iter()
        .map(|hash| chain.confirmation_index(*hash).unwrap())
        .min()
        .unwrap();
    assert!(last_submitted < first_confirmed);

    Ok(())
}
