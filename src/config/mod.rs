mod settings;

pub use settings::{
    LogConfig, LogFormat, PresenceConfig, ServerConfig, Settings, WebSocketConfig,
};
