//! Host paths and systemd unit names derived from a project name.
//!
//! Every location the reconciler touches is a pure function of the project
//! name, which is what lets a former name be purged without knowing anything
//! else about the app it used to belong to.

/// Root under which project checkouts live.
pub const APPS_ROOT: &str = "/srv/apps";

/// Directory holding shared unit templates and per-unit drop-in directories.
pub const SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Directory holding available nginx site files.
pub const SITES_AVAILABLE_DIR: &str = "/etc/nginx/sites-available";

/// Directory holding enabled nginx site links.
pub const SITES_ENABLED_DIR: &str = "/etc/nginx/sites-enabled";

/// Directory holding system cron files.
pub const CRON_DIR: &str = "/etc/cron.d";

/// Prefix of the cron files this tool owns.
pub const CRON_FILE_PREFIX: &str = "stageops-";

/// The systemd units one project may own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitNames {
    /// Gunicorn service, `app@NAME.service`.
    pub app_service: String,
    /// Gunicorn socket, `app@NAME.socket`.
    pub app_socket: String,
    /// Frontend service, `node@NAME.service`.
    pub node_service: String,
    /// Worker service, `celery@NAME.service`.
    pub celery_service: String,
}

impl UnitNames {
    /// Derives the unit names for `project_name`.
    #[must_use]
    pub fn for_project(project_name: &str) -> Self {
        Self {
            app_service: format!("app@{project_name}.service"),
            app_socket: format!("app@{project_name}.socket"),
            node_service: format!("node@{project_name}.service"),
            celery_service: format!("celery@{project_name}.service"),
        }
    }

    /// Returns every unit, service before socket.
    #[must_use]
    pub fn all(&self) -> [&str; 4] {
        [
            &self.app_service,
            &self.app_socket,
            &self.node_service,
            &self.celery_service,
        ]
    }
}

/// Filesystem locations owned by one project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    /// The project name the paths derive from.
    pub project_name: String,
    /// Checkout directory.
    pub project_dir: String,
    /// Python virtual environment.
    pub venv_dir: String,
    /// Environment file sourced by units and cron jobs.
    pub env_file: String,
    /// Log directory.
    pub log_dir: String,
    /// Runtime directory holding the socket.
    pub runtime_dir: String,
    /// Gunicorn socket path.
    pub socket_path: String,
    /// Site file under `sites-available`.
    pub site_available: String,
    /// Site link under `sites-enabled`.
    pub site_enabled: String,
    /// File under `/etc/cron.d`.
    pub cron_file: String,
    /// Unit names for this project.
    pub units: UnitNames,
}

impl ProjectPaths {
    /// Derives every path for `project_name`.
    #[must_use]
    pub fn for_project(project_name: &str) -> Self {
        let project_dir = format!("{APPS_ROOT}/{project_name}");
        let runtime_dir = format!("/run/{project_name}");
        Self {
            project_name: project_name.to_owned(),
            venv_dir: format!("{project_dir}/venv"),
            env_file: format!("{project_dir}/.env"),
            log_dir: format!("/var/log/{project_name}"),
            socket_path: format!("{runtime_dir}/gunicorn.sock"),
            site_available: format!("{SITES_AVAILABLE_DIR}/{project_name}.conf"),
            site_enabled: format!("{SITES_ENABLED_DIR}/{project_name}.conf"),
            cron_file: format!("{CRON_DIR}/{CRON_FILE_PREFIX}{project_name}"),
            units: UnitNames::for_project(project_name),
            project_dir,
            runtime_dir,
        }
    }

    /// Returns the `bin` directory of the virtual environment.
    #[must_use]
    pub fn venv_bin(&self) -> String {
        format!("{}/bin", self.venv_dir)
    }

    /// Returns the drop-in directory of every unit, in [`UnitNames::all`] order.
    #[must_use]
    pub fn dropin_dirs(&self) -> Vec<String> {
        self.units.all().iter().map(|unit| dropin_dir(unit)).collect()
    }

    /// Resolves a directory relative to the project dir unless it is absolute.
    #[must_use]
    pub fn resolve(&self, dir: &str) -> String {
        if dir.starts_with('/') {
            dir.to_owned()
        } else {
            let relative = dir.trim_start_matches("./").trim_end_matches('/');
            if relative.is_empty() || relative == "." {
                self.project_dir.clone()
            } else {
                format!("{}/{relative}", self.project_dir)
            }
        }
    }
}

/// Returns the drop-in directory for `unit`.
#[must_use]
pub fn dropin_dir(unit: &str) -> String {
    format!("{SYSTEMD_DIR}/{unit}.d")
}

/// Returns the override file inside the drop-in directory for `unit`.
#[must_use]
pub fn dropin_file(unit: &str) -> String {
    format!("{}/override.conf", dropin_dir(unit))
}

/// Returns the installed path of a shared unit template such as `app@.service`.
#[must_use]
pub fn unit_template_path(template: &str) -> String {
    format!("{SYSTEMD_DIR}/{template}")
}
