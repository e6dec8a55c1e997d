pub mod config;
pub mod subscriber;

pub use config::MqttConfig;
pub use subscriber::run_mqtt_subscriber;
