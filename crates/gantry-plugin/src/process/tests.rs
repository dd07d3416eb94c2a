//! Unit tests for launching, calling, and closing plugin processes.

use std::time::Duration;

use gantry_config::HostConfig;
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn config() -> HostConfig {
    HostConfig {
        shutdown_grace: Duration::from_millis(50),
        ..HostConfig::default()
    }
    .with_plugin_env("GANTRY_SHARED", "host")
    .with_plugin_env("GANTRY_OVERRIDDEN", "host")
}

#[rstest]
fn server_address_is_the_last_argument() {
    let launch = PluginLaunch::new("/opt/plugins/pulumi-resource-aws")
        .server_addr("127.0.0.1:4000")
        .arg("--logtostderr")
        .args(["-v", "9"]);

    assert_eq!(launch.name(), "pulumi-resource-aws");
    assert_eq!(launch.argv(), ["--logtostderr", "-v", "9", "127.0.0.1:4000"]);
}

#[rstest]
fn launch_environment_overrides_host_environment(config: HostConfig) {
    let launch = PluginLaunch::new("plugin")
        .env("GANTRY_OVERRIDDEN", "launch")
        .env("GANTRY_ONLY_LAUNCH", "launch");

    let env = launch.environment(&config);
    assert_eq!(env.get("GANTRY_SHARED").map(String::as_str), Some("host"));
    assert_eq!(env.get("GANTRY_OVERRIDDEN").map(String::as_str), Some("launch"));
    assert_eq!(env.get("GANTRY_ONLY_LAUNCH").map(String::as_str), Some("launch"));
}

#[rstest]
fn missing_binary_fails_at_launch(config: HostConfig) {
    let launch = PluginLaunch::new("/nonexistent/gantry-plugin-binary");
    let err = PluginProcess::launch(&launch, &config).expect_err("binary is missing");
    assert!(matches!(err, PluginError::BinaryNotFound { .. }), "{err}");
}

#[cfg(unix)]
mod unix {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    /// Answers each framed request with the request itself as the result.
    const ECHO_PLUGIN: &str = r#"
cr=$(printf '\r')
while IFS= read -r header; do
  len=${header#Content-Length: }
  len=${len%"$cr"}
  IFS= read -r blank
  body=$(head -c "$len")
  id=$(printf '%s' "$body" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  reply="{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":$body}"
  printf 'Content-Length: %s\r\n\r\n%s' "${#reply}" "$reply"
done
"#;

    fn shell(script: &str, config: &HostConfig) -> PluginProcess {
        let launch = PluginLaunch::new("sh").arg("-c").arg(script).with_name("echo");
        PluginProcess::launch(&launch, config).expect("launch sh")
    }

    #[rstest]
    fn calls_round_trip_through_the_child(config: HostConfig) {
        let plugin = shell(ECHO_PLUGIN, &config);
        assert!(plugin.pid().is_some());

        for attempt in 0..3 {
            let result = plugin
                .call("echo", json!({"attempt": attempt}))
                .expect("echo call");
            assert_eq!(result["method"], "echo");
            assert_eq!(result["params"], json!({"attempt": attempt}));
        }

        plugin.close().expect("close");
    }

    #[rstest]
    fn child_runs_in_its_working_directory_with_the_server_address(config: HostConfig) {
        let temp_dir = TempDir::new().expect("create temp dir");
        // `sh -c` binds the trailing server address to `$0`.
        let script = [r#"printf '%s' "$0" > address"#, ECHO_PLUGIN].concat();
        let launch = PluginLaunch::new("sh")
            .arg("-c")
            .arg(script)
            .server_addr("127.0.0.1:4000")
            .working_dir(temp_dir.path());
        let plugin = PluginProcess::launch(&launch, &config).expect("launch sh");

        plugin.call("echo", json!({})).expect("echo call");
        plugin.close().expect("close");

        let recorded =
            std::fs::read_to_string(temp_dir.path().join("address")).expect("address file");
        assert_eq!(recorded, "127.0.0.1:4000");
    }

    #[rstest]
    fn close_is_idempotent_and_stops_calls(config: HostConfig) {
        let plugin = shell(ECHO_PLUGIN, &config);

        plugin.close().expect("first close");
        plugin.close().expect("second close");

        assert!(!plugin.is_running());
        assert_eq!(plugin.pid(), None);
        let err = plugin.call("echo", Value::Null).expect_err("closed");
        assert_eq!(err.code, RpcCode::Unavailable);
    }

    #[rstest]
    fn close_kills_plugins_that_ignore_eof(config: HostConfig) {
        let launch = PluginLaunch::new("sleep").arg("30");
        let plugin = PluginProcess::launch(&launch, &config).expect("launch sleep");

        let started = Instant::now();
        plugin.close().expect("close");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[rstest]
    fn close_unblocks_an_in_flight_call(config: HostConfig) {
        // `cat` echoes the request back, which is skipped as a
        // plugin-initiated message, so the call waits until the child dies.
        let launch = PluginLaunch::new("cat");
        let plugin = Arc::new(PluginProcess::launch(&launch, &config).expect("launch cat"));

        let worker = Arc::clone(&plugin);
        let caller = thread::spawn(move || worker.call("hang", json!({})));
        thread::sleep(Duration::from_millis(100));
        plugin.close().expect("close");

        let err = caller.join().expect("caller thread").expect_err("channel died");
        assert_eq!(err.code, RpcCode::Unavailable);
    }
}
