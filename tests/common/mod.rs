#![allow(dead_code)]

use std::{path::Path, time::Duration};

use axum::Router;
use mineward::{EngineConfig, InstanceEvent, JavaRuntime};
use tokio::net::TcpListener;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

/// Stands in for `java`: skips JVM flags up to `-jar`, then runs the "jar"
/// (a shell script) with the remaining arguments.
pub const FAKE_JAVA_SRC: &str = r#"
jar=""
while [ $# -gt 0 ]; do
    if [ "$1" = "-jar" ]; then
        jar="$2"
        shift 2
        break
    fi
    shift
done
exec sh "$jar" "$@"
"#;

/// Behaves like a vanilla server: the first run only writes the license
/// file, later runs start up, echo commands and exit on `stop`.
pub const SERVER_SCRIPT: &str = r#"
if [ ! -f eula.txt ]; then
    printf '#By changing the setting below to TRUE you are indicating your agreement to our EULA.\neula=false\n' > eula.txt
    echo "[12:00:00] [main/WARN]: You need to agree to the EULA in order to run the server."
    exit 0
fi
echo "[12:00:01] [Server thread/INFO]: Starting minecraft server version 1.20.1"
echo "[12:00:02] [Server thread/INFO]: Preparing level \"world\""
echo '[12:00:03] [Server thread/INFO]: Done (1.234s)! For help, type "help"'
while read -r line; do
    echo "[12:00:04] [Server thread/INFO]: received $line"
    if [ "$line" = "stop" ]; then
        echo "[12:00:05] [Server thread/INFO]: Stopping server"
        exit 0
    fi
done
"#;

pub fn fake_java_config() -> EngineConfig {
    EngineConfig {
        java_path: "/bin/sh".into(),
        jvm_args: vec![
            "-c".to_string(),
            FAKE_JAVA_SRC.to_string(),
            "java".to_string(),
        ],
        max_retries: 2,
        retry_delay_ms: 0,
        settle_delay_ms: 0,
        ready_timeout_ms: Some(10_000),
        bootstrap_timeout_ms: Some(20_000),
        ..EngineConfig::default()
    }
}

pub fn fake_java() -> JavaRuntime {
    JavaRuntime::from_config(&fake_java_config())
}

pub async fn write_script(dir: &Path, name: &str, body: &str) {
    tokio::fs::write(dir.join(name), body).await.unwrap();
}

/// Serves `build(base_url)` on an ephemeral local port and returns the base
/// URL, without a trailing slash.
pub async fn serve<F>(build: F) -> String
where
    F: FnOnce(&str) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(&base);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

/// Collects events until `done` accepts one, or gives up after `limit`.
pub async fn collect_until<F>(
    stream: &mut BroadcastStream<InstanceEvent>,
    limit: Duration,
    mut done: F,
) -> Vec<InstanceEvent>
where
    F: FnMut(&InstanceEvent) -> bool,
{
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(limit, async {
        while let Some(Ok(event)) = stream.next().await {
            let finished = done(&event);
            seen.push(event);
            if finished {
                break;
            }
        }
    })
    .await;
    seen
}
