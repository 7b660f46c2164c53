use tracing_subscriber::EnvFilter;

pub enum LogServiceType {
    Register,
    Database,
    Storage,
    Recognition,
    Other
}
impl LogServiceType {
    fn as_str(&self) -> &'static str {
        match self {
            LogServiceType::Register => "REGISTER",
            LogServiceType::Database => "DATABASE",
            LogServiceType::Storage => "STORAGE",
            LogServiceType::Recognition => "RECOGNITION",
            LogServiceType::Other => "OTHER"
        }
    }
}

pub fn init() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_ansi(false)
        .try_init();
}

pub fn log_info(service: LogServiceType, message: String) {
    tracing::info!(service = service.as_str(), "{}", message)
}

pub fn log_error(service: LogServiceType, message: String) {
    tracing::error!(service = service.as_str(), "{}", message)
}
