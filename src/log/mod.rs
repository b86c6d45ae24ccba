use std::path::Path;

use log::{debug, info};
use log4rs::config::{Config, Deserializers, RawConfig};

/// Initializes logging from `log4rs.yml` in the working directory when
/// present, falling back to the embedded default configuration (console plus
/// the `minting-service.log` file appender).
pub fn init_logging() {
    let deserializers = Deserializers::default();

    let config_path = "log4rs.yml";
    let path = Path::new(config_path);

    if path.exists() {
        match log4rs::init_file(path, deserializers) {
            Ok(_) => {
                info!(
                    path = config_path;
                    "Logging initialized from external configuration"
                );
                return;
            },
            Err(e) => {
                panic!("Failed to load external log4rs.yml: {}", e);
            },
        }
    }

    let yaml_content = include_str!("../../resources/default_log4rs.yml");
    let raw_config: RawConfig =
        serde_yaml::from_str(yaml_content).expect("Embedded logging configuration is invalid YAML");

    let (appenders, errors) = raw_config.appenders_lossy(&deserializers);
    if !errors.is_empty() {
        panic!("Errors parsing embedded appenders: {:?}", errors);
    }

    let config = Config::builder()
        .appenders(appenders)
        .loggers(raw_config.loggers())
        .build(raw_config.root())
        .expect("Failed to build logging config");

    log4rs::init_config(config).expect("Failed to initialize logging from embedded config");

    debug!("Logging initialized from embedded defaults (no external log4rs.yml found)");
}
