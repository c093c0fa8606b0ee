use std::{net::SocketAddr, path::PathBuf, time::Duration};

use educe::Educe;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct PersistentConfig {
    pub tunnel: TunnelOpt,
    pub registry: RegistryOpt,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct TunnelOpt {
    #[educe(Default(expression = "[::]:6666".parse().unwrap()))]
    pub provider_addr: SocketAddr,

    #[educe(Default(expression = "[::]:5555".parse().unwrap()))]
    pub probe_addr: SocketAddr,

    #[educe(Default = None)]
    pub tls_cert: Option<PathBuf>,

    #[educe(Default = None)]
    pub tls_key: Option<PathBuf>,

    #[serde(with = "humantime_serde")]
    #[educe(Default(expression = Duration::from_secs(30)))]
    pub auth_timeout: Duration,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct RegistryOpt {
    #[educe(Default(expression = "127.0.0.1:8080".parse().unwrap()))]
    pub listen_addr: SocketAddr,
}

impl PersistentConfig {
    pub fn export_to_file(&self, file_path: &PathBuf, format: &str) -> eyre::Result<()> {
        use std::{fs, io::Write};

        match format.to_lowercase().as_str() {
            "yaml" => {
                let content = serde_yaml::to_string(&self)?;
                let mut file = fs::File::create(file_path)?;
                file.write_all(content.as_bytes())?;
            }
            "toml" => {
                let content = toml::to_string_pretty(&self)?;
                let mut file = fs::File::create(file_path)?;
                file.write_all(content.as_bytes())?;
            }
            _ => return Err(eyre::eyre!("Unsupported file format: {}", format)),
        }

        Ok(())
    }

    pub fn load(config_path: Option<String>, config_dir: Option<PathBuf>) -> eyre::Result<Self> {
        let mut figment = Figment::new();

        if let Some(config_dir) = config_dir {
            let toml_file = config_dir.join("config.toml");
            if toml_file.exists() {
                figment = figment.merge(Toml::file(toml_file));
            }
            let yaml_file = config_dir.join("config.yaml");
            if yaml_file.exists() {
                figment = figment.merge(Yaml::file(yaml_file));
            }
        } else {
            if std::path::Path::new("config.toml").exists() {
                figment = figment.merge(Toml::file("config.toml"));
            }
            if std::path::Path::new("config.yaml").exists() {
                figment = figment.merge(Yaml::file("config.yaml"));
            }
        }

        if let Some(config_path) = config_path {
            if config_path.ends_with(".yaml") || config_path.ends_with(".yml") {
                figment = figment.merge(Yaml::file(config_path));
            } else {
                figment = figment.merge(Toml::file(config_path));
            }
        }

        figment = figment.merge(Env::prefixed("CARDLINK_").split("_"));

        Ok(figment.extract()?)
    }
}
