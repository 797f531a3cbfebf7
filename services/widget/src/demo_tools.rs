//! Stand-in implementations of the client capabilities for a terminal host.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc, sync::Mutex};
use tracing::{debug, info};
use voicewidget_client::tools::{
    CHANGE_BRIGHTNESS, ClientTool, FLASH_SCREEN, GET_BATTERY_LEVEL, ToolError, ToolRegistry,
    brightness_argument,
};

/// Reads the charge level from sysfs; hosts without a battery report full.
pub struct BatteryLevel {
    capacity_path: PathBuf,
}

impl Default for BatteryLevel {
    fn default() -> Self {
        Self {
            capacity_path: PathBuf::from("/sys/class/power_supply/BAT0/capacity"),
        }
    }
}

#[async_trait]
impl ClientTool for BatteryLevel {
    async fn call(&self, _parameters: Value) -> Result<Value, ToolError> {
        let level = match tokio::fs::read_to_string(&self.capacity_path).await {
            Ok(text) => text
                .trim()
                .parse::<f64>()
                .map(|percent| (percent / 100.0).clamp(0.0, 1.0))
                .map_err(|e| ToolError::Failed(format!("unreadable capacity: {}", e)))?,
            Err(e) => {
                debug!(error = %e, "No battery found, reporting full");
                1.0
            }
        };
        Ok(json!(level))
    }
}

/// Keeps a brightness level in memory.
#[derive(Default)]
pub struct Brightness {
    level: Mutex<f64>,
}

#[async_trait]
impl ClientTool for Brightness {
    async fn call(&self, parameters: Value) -> Result<Value, ToolError> {
        let level = brightness_argument(&parameters)?;
        let mut current = self
            .level
            .lock()
            .map_err(|_| ToolError::Failed("brightness state poisoned".into()))?;
        *current = level;
        info!(level, "Brightness changed");
        Ok(json!({ "brightness": level }))
    }
}

pub struct FlashScreen;

#[async_trait]
impl ClientTool for FlashScreen {
    async fn call(&self, _parameters: Value) -> Result<Value, ToolError> {
        // Terminal bell plus reverse video for a moment.
        println!("\x07\x1b[7m  *** FLASH ***  \x1b[0m");
        Ok(json!({ "flashed": true }))
    }
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::new()
        .register(GET_BATTERY_LEVEL, Arc::new(BatteryLevel::default()))
        .register(CHANGE_BRIGHTNESS, Arc::new(Brightness::default()))
        .register(FLASH_SCREEN, Arc::new(FlashScreen))
}
