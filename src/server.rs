use std::{env, path::PathBuf, sync::OnceLock};
use tokio::{fs::{create_dir_all, read_to_string, File}, io::AsyncWriteExt, sync::Mutex};
use serde::{Deserialize, Serialize};
use nanoid::nanoid;
use clap::Parser;
use crate::{error::{Error, Result}, tools::log::{log_info, LogServiceType}};


static CONFIG: OnceLock<Mutex<ServerConfig>> = OnceLock::new();


const ENV_SERVERID: &str = "VISAGE_SERVERID";
const ENV_PORT: &str = "VISAGE_PORT";
const ENV_DIR: &str = "VISAGE_DIR";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_serverid")]
    pub id: String,
    pub port: Option<u16>,
    /// Name of the storage bucket files are keyed under.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Secret used to sign presigned storage URLs.
    #[serde(default = "default_token")]
    pub token: String,
    /// Cosine similarity at or above which a face is assigned to an
    /// existing person instead of founding a new one.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_true")]
    pub auto_download_models: bool,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    serverid: Option<String>,

    #[arg(short = 'k', long)]
    docker: bool,

    #[arg(short, long)]
    dir: Option<String>,
}

pub async fn initialize_config() -> ServerConfig {
    let local_path = get_server_local_path().await.expect("Unable to create local server path");
    log_info(LogServiceType::Register, format!("LocalPath: {:?}", local_path));
    let config = get_config_with_overrides().await.expect("Unable to load server config");
    let _ = CONFIG.set(Mutex::new(config.clone()));
    config
}

pub async fn get_server_local_path() -> Result<PathBuf> {
    let args = Args::parse();

    let dir_path = if let Some(argdir) = args.dir {
        PathBuf::from(&argdir)
    } else if let Ok(val) = env::var(ENV_DIR) {
        PathBuf::from(&val)
    } else if args.docker {
        PathBuf::from("/config")
    } else {
        let Some(mut dir_path) = dirs::config_local_dir() else { return Err(Error::ServerUnableToAccessServerLocalFolder); };
        dir_path.push("visage");
        dir_path
    };


    let Ok(_) = create_dir_all(&dir_path).await else { return Err(Error::ServerUnableToAccessServerLocalFolder); };

    Ok(dir_path)
}

pub async fn get_server_port() -> u16 {
    let config_port = get_config().await.port;
    env::var(ENV_PORT).ok().and_then(|p| p.parse::<u16>().ok()).or(config_port).unwrap_or(8080)
}

pub async fn get_config() -> ServerConfig {
    let config = CONFIG.get().expect("Config not initialized");
    config.lock().await.clone()
}

async fn get_config_with_overrides() -> Result<ServerConfig> {
    let path = get_server_file_path("config.json").await?;
    let mut config: ServerConfig = if let Ok(content) = read_to_string(&path).await {
        serde_json::from_str(&content).map_err(|_| Error::ServerMalformatedConfigFile)?
    } else {
        serde_json::from_str("{}").map_err(|_| Error::ServerMalformatedConfigFile)?
    };
    if let Ok(id) = env::var(ENV_SERVERID) {
        config.id = id;
    }
    let args = Args::parse();
    if let Some(id) = args.serverid {
        config.id = id;
    }

    // The generated id and signing secret must survive restarts.
    let mut file = File::create(&path).await?;
    file.write_all(serde_json::to_string_pretty(&config)?.as_bytes()).await?;

    Ok(config)
}

pub async fn get_server_file_path_array(paths: Vec<&str>) -> Result<PathBuf> {
    let mut path = get_server_local_path().await?;
    for p in paths {
        path.push(p);
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    Ok(path)
}

pub async fn get_server_file_path(name: &str) -> Result<PathBuf> {
    get_server_file_path_array(vec![name]).await
}

pub async fn get_database_path() -> Result<PathBuf> {
    get_server_file_path_array(vec!["dbs", "database.db"]).await
}

pub async fn get_bucket_path() -> Result<PathBuf> {
    let path = get_server_file_path_array(vec!["bucket"]).await?;
    create_dir_all(&path).await?;
    Ok(path)
}

pub async fn get_models_path() -> Result<PathBuf> {
    let path = get_server_file_path_array(vec!["models"]).await?;
    create_dir_all(&path).await?;
    Ok(path)
}

fn default_serverid() -> String {
    if let Ok(id) = env::var(ENV_SERVERID) {
        id
    } else {
        nanoid!()
    }
}

fn default_bucket() -> String {
    "media".to_owned()
}

fn default_token() -> String {
    nanoid!(32)
}

fn default_match_threshold() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}
