#![cfg(unix)]

mod common;

use std::{path::PathBuf, sync::Arc, time::Duration};

use mineward::{
    BootstrapError, Bootstrapper, EngineConfig, InstanceMeta, LoaderType, MetadataStore,
    bootstrap::FABRIC_LAUNCH_JAR,
};

const FABRIC_INSTALLER: &str = r#"
echo "$@" > installer-args.txt
cp launch-template.sh fabric-server-launch.jar
cp launch-template.sh server.jar
echo "Installed fabric loader"
"#;

const BROKEN_INSTALLER: &str = r#"
echo "Could not reach maven" >&2
exit 2
"#;

const LAZY_INSTALLER: &str = r#"
echo "Nothing to do"
"#;

const NO_LICENSE_SERVER: &str = r#"
echo "[12:00:00] [main/INFO]: Loading"
"#;

const FAILING_SERVER: &str = r#"
if [ ! -f eula.txt ]; then
    echo "eula=false" > eula.txt
    exit 0
fi
echo "[12:00:01] [Server thread/ERROR]: Failed to start the Minecraft server"
exec sleep 30
"#;

const CRASHING_SERVER: &str = r#"
if [ ! -f eula.txt ]; then
    echo "eula=false" > eula.txt
    exit 0
fi
echo "[12:00:01] [Server thread/INFO]: Starting minecraft server version 1.20.1"
exit 1
"#;

const HANGING_SERVER: &str = r#"
if [ ! -f eula.txt ]; then
    exec sleep 30
fi
"#;

fn bootstrapper() -> Bootstrapper {
    Bootstrapper::new(Arc::new(common::fake_java_config()))
}

async fn downloaded(loader: LoaderType) -> (tempfile::TempDir, MetadataStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = MetadataStore::new(dir.path());
    let meta = InstanceMeta::downloaded(
        "alpha",
        "1.20.1",
        loader,
        "1G",
        "https://example.invalid/server.jar",
    );
    store.write(&meta).await.unwrap();
    (dir, store)
}

async fn assert_not_initialized(store: &MetadataStore) {
    assert!(!store.read().await.unwrap().initialized);
}

#[tokio::test]
async fn fabric_bootstrap_switches_to_launch_jar() {
    let (dir, store) = downloaded(LoaderType::Fabric).await;
    common::write_script(dir.path(), "fabric-installer.jar", FABRIC_INSTALLER).await;
    common::write_script(dir.path(), "launch-template.sh", common::SERVER_SCRIPT).await;

    let meta = bootstrapper().run(&store).await.unwrap();

    assert_eq!(meta.server_jar, PathBuf::from(FABRIC_LAUNCH_JAR));
    assert!(meta.initialized);
    assert_eq!(store.read().await.unwrap(), meta);

    let eula = tokio::fs::read_to_string(dir.path().join("eula.txt"))
        .await
        .unwrap();
    assert!(eula.contains("eula=true"));
    assert!(!eula.contains("eula=false"));

    let args = tokio::fs::read_to_string(dir.path().join("installer-args.txt"))
        .await
        .unwrap();
    assert_eq!(
        args.trim_end(),
        format!(
            "server -mcversion 1.20.1 -loader latest -downloadMinecraft -dir {}",
            dir.path().display()
        )
    );
}

#[tokio::test]
async fn vanilla_bootstrap_keeps_server_jar() {
    let (dir, store) = downloaded(LoaderType::Vanilla).await;
    common::write_script(dir.path(), "server.jar", common::SERVER_SCRIPT).await;

    let meta = bootstrapper().run(&store).await.unwrap();

    assert_eq!(meta.server_jar, PathBuf::from("server.jar"));
    assert!(meta.initialized);
}

#[tokio::test]
async fn initialized_instance_is_refused() {
    let (dir, store) = downloaded(LoaderType::Vanilla).await;
    common::write_script(dir.path(), "server.jar", common::SERVER_SCRIPT).await;
    store.update(|m| m.initialized = true).await.unwrap();

    let err = bootstrapper().run(&store).await.unwrap_err();
    assert!(
        matches!(err, BootstrapError::AlreadyInitialized(ref name) if name == "alpha"),
        "{err:?}"
    );
    assert!(!dir.path().join("eula.txt").exists());
}

#[tokio::test]
async fn failing_installer_aborts() {
    let (dir, store) = downloaded(LoaderType::Fabric).await;
    common::write_script(dir.path(), "fabric-installer.jar", BROKEN_INSTALLER).await;

    let err = bootstrapper().run(&store).await.unwrap_err();
    assert!(matches!(err, BootstrapError::InstallerFailed(Some(2))), "{err:?}");
    assert_not_initialized(&store).await;
}

#[tokio::test]
async fn installer_without_launch_jar_is_missing_artifact() {
    let (dir, store) = downloaded(LoaderType::Fabric).await;
    common::write_script(dir.path(), "fabric-installer.jar", LAZY_INSTALLER).await;

    let err = bootstrapper().run(&store).await.unwrap_err();
    match err {
        BootstrapError::MissingArtifact(path) => {
            assert_eq!(path, dir.path().join(FABRIC_LAUNCH_JAR))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_not_initialized(&store).await;
}

#[tokio::test]
async fn server_that_writes_no_license_aborts() {
    let (dir, store) = downloaded(LoaderType::Forge).await;
    common::write_script(dir.path(), "server.jar", NO_LICENSE_SERVER).await;

    let err = bootstrapper().run(&store).await.unwrap_err();
    assert!(matches!(err, BootstrapError::MissingLicense(_)), "{err:?}");
    assert_not_initialized(&store).await;
}

#[tokio::test]
async fn priming_failure_aborts() {
    let (dir, store) = downloaded(LoaderType::Vanilla).await;
    common::write_script(dir.path(), "server.jar", FAILING_SERVER).await;

    let err = bootstrapper().run(&store).await.unwrap_err();
    assert!(matches!(err, BootstrapError::PrimingFailed), "{err:?}");
    assert_not_initialized(&store).await;

    // The license was still accepted before priming.
    let eula = tokio::fs::read_to_string(dir.path().join("eula.txt"))
        .await
        .unwrap();
    assert_eq!(eula.trim_end(), "eula=true");
}

#[tokio::test]
async fn priming_exit_aborts() {
    let (dir, store) = downloaded(LoaderType::Vanilla).await;
    common::write_script(dir.path(), "server.jar", CRASHING_SERVER).await;

    let err = bootstrapper().run(&store).await.unwrap_err();
    assert!(matches!(err, BootstrapError::PrimingExited(Some(1))), "{err:?}");
    assert_not_initialized(&store).await;
}

#[tokio::test]
async fn hanging_license_run_times_out() {
    let (dir, store) = downloaded(LoaderType::Vanilla).await;
    common::write_script(dir.path(), "server.jar", HANGING_SERVER).await;
    let config = EngineConfig {
        bootstrap_timeout_ms: Some(500),
        ..common::fake_java_config()
    };

    let started = std::time::Instant::now();
    let err = Bootstrapper::new(Arc::new(config))
        .run(&store)
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            BootstrapError::Timeout { step: "license", after } if after == Duration::from_millis(500)
        ),
        "{err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_not_initialized(&store).await;
    assert!(!dir.path().join("eula.txt").exists());
}
