//! Tests for the provisioned-infra record.

use super::*;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct StoreFixture {
    _tmp: TempDir,
    path: Utf8PathBuf,
    store: InfraStore,
}

#[fixture]
fn store_fixture() -> StoreFixture {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = Utf8PathBuf::from_path_buf(tmp.path().join("snowlift.toml"))
        .unwrap_or_else(|raw| panic!("temp path should be utf8: {}", raw.display()));
    let root = path
        .parent()
        .unwrap_or_else(|| panic!("temp path should have a parent directory"));
    let discovery = ConfigDiscovery::builder(APP_NAME)
        .env_var(CONFIG_ENV_VAR)
        .config_file_name(CONFIG_FILE_NAME)
        .dotfile_name(DOTFILE_NAME)
        .project_file_name(PROJECT_FILE_NAME)
        .clear_project_roots()
        .add_project_root(root)
        .build();
    StoreFixture {
        _tmp: tmp,
        path,
        store: InfraStore::with_discovery(discovery),
    }
}

#[fixture]
fn infra() -> ProvisionedInfra {
    ProvisionedInfra {
        database: String::from("ML_ACCELERATOR"),
        compute_pool: String::from("ML_ACCELERATOR_POOL"),
        stage: String::from("ML_ACCELERATOR.PUBLIC.DEV_STAGE"),
        network_rule: String::from("ML_ACCELERATOR.PUBLIC.ALLOW_ALL_INTEGRATION_RULE"),
        integration: String::from("ALLOW_ALL_INTEGRATION"),
    }
}

#[rstest]
fn save_then_load_returns_record(store_fixture: StoreFixture, infra: ProvisionedInfra) {
    let written = store_fixture
        .store
        .save(&infra)
        .unwrap_or_else(|err| panic!("save record: {err}"));
    assert_eq!(written, store_fixture.path);

    let loaded = store_fixture
        .store
        .load()
        .unwrap_or_else(|err| panic!("load record: {err}"));
    assert_eq!(loaded, Some(infra));
}

#[rstest]
fn save_preserves_other_tables(store_fixture: StoreFixture, infra: ProvisionedInfra) {
    std::fs::write(&store_fixture.path, "connection_name = \"prod\"\n")
        .unwrap_or_else(|err| panic!("seed config: {err}"));
    store_fixture
        .store
        .save(&infra)
        .unwrap_or_else(|err| panic!("save record: {err}"));

    let contents =
        read_file(&store_fixture.path).unwrap_or_else(|err| panic!("read config: {err}"));
    assert!(contents.contains("connection_name = \"prod\""));
    assert!(contents.contains("[provisioned]"));
}

#[rstest]
fn clear_removes_record(store_fixture: StoreFixture, infra: ProvisionedInfra) {
    store_fixture
        .store
        .save(&infra)
        .unwrap_or_else(|err| panic!("save record: {err}"));

    assert!(matches!(store_fixture.store.clear(), Ok(true)));
    assert!(matches!(store_fixture.store.load(), Ok(None)));
    assert!(matches!(store_fixture.store.clear(), Ok(false)));
}

#[rstest]
fn clear_without_file_is_noop(store_fixture: StoreFixture) {
    assert!(matches!(store_fixture.store.clear(), Ok(false)));
    assert!(!store_fixture.path.exists());
}

#[rstest]
fn load_rejects_malformed_record(store_fixture: StoreFixture) {
    std::fs::write(&store_fixture.path, "[provisioned]\ndatabase = 3\n")
        .unwrap_or_else(|err| panic!("seed config: {err}"));
    let Err(err) = store_fixture.store.load() else {
        panic!("malformed record should be rejected");
    };
    assert!(matches!(err, InfraStoreError::InvalidStructure { .. }));
}

#[rstest]
#[case("not = [")]
#[case("provisioned =")]
fn parse_toml_rejects_invalid_content(store_fixture: StoreFixture, #[case] contents: &str) {
    let Err(InfraStoreError::Parse { path, .. }) = parse_toml(&store_fixture.path, contents) else {
        panic!("parse should fail");
    };
    assert_eq!(path, store_fixture.path);
}
