//! Shared fixtures for unit tests.

use std::collections::BTreeSet;

use rstest::fixture;

use crate::manifest::{
    AppSpec, CelerySettings, DEFAULT_WSGI_APP, NodeSettings, ProcessPool, ServerConfig, Tier,
};

/// A server section pointing at a documentation address.
#[fixture]
pub fn server() -> ServerConfig {
    ServerConfig {
        host: String::from("203.0.113.7"),
        port: 22,
        user: String::from("deploy"),
        ssh_key_path: String::from("~/.ssh/deploy_ed25519"),
        web_group: String::from("www-data"),
        access_log_template: String::from("/var/log/{{ project_name }}/access.log"),
        error_log_template: String::from("/var/log/{{ project_name }}/error.log"),
    }
}

/// A cold app named `acme` with one backend path and no sidecars.
#[fixture]
pub fn app() -> AppSpec {
    app_named("acme")
}

/// A cold app with the given name, one backend path and no sidecars.
pub fn app_named(name: &str) -> AppSpec {
    AppSpec {
        project_name: name.to_owned(),
        domain: format!("{name}.example"),
        tier: Tier::Cold,
        backend_paths: vec![String::from("/api")],
        process: ProcessPool {
            worker_class: String::from("gthread"),
            workers: 2,
            threads: 4,
            timeout: 30,
            graceful_timeout: 20,
            max_requests: 1000,
            max_requests_jitter: 100,
        },
        memory_limit: String::from("512M"),
        cpu_quota: Some(String::from("50%")),
        wsgi_app: String::from(DEFAULT_WSGI_APP),
        node: None,
        celery: None,
        source: None,
        legacy_project_names: BTreeSet::new(),
        cron: Vec::new(),
    }
}

/// Enables both sidecars on `app`.
pub fn with_sidecars(mut app: AppSpec) -> AppSpec {
    app.node = Some(NodeSettings {
        dir: String::from("frontend"),
        port: 3000,
        start_cmd: String::from("npm run start"),
    });
    app.celery = Some(CelerySettings {
        queue: String::from("default"),
        app: String::from("config"),
    });
    app
}
