use super::*;

pub const DEFAULT_PRICE_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_CONSUMPTION_INTERVAL_MINUTES: u32 = 60;
pub const DEFAULT_UPDATE_OFFSET_SECONDS: u32 = 15;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_BLOCK_HOURS: usize = 3;

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            price_interval_minutes: DEFAULT_PRICE_INTERVAL_MINUTES,
            consumption_interval_minutes: DEFAULT_CONSUMPTION_INTERVAL_MINUTES,
            update_offset_seconds: DEFAULT_UPDATE_OFFSET_SECONDS,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/stromspot.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: ApiEnvironment::default(),
            credentials: CredentialsConfig::default(),
            zip_code: String::new(),
            contract_id: None,
            timezone: "Europe/Berlin".to_string(),
            schedule: ScheduleConfig::default(),
            block_hours: DEFAULT_BLOCK_HOURS,
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
