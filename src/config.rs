use crate::browser;
use crate::engine::geometry::{Size, SoftEdges};
use crate::engine::tilemap::TileMap;
use crate::engine::DEFAULT_FRAME_MS;
use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Everything tunable without a rebuild, served next to the wasm as json.
/// Missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    pub width: f64,
    pub height: f64,
    /// milliseconds per fixed update
    pub frame_ms: f32,
    /// off | error | warn | info | debug | trace
    pub log_level: String,
    pub breakout: BreakoutConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakoutConfig {
    pub paddle: Size,
    pub paddle_speed: f64,
    /// the paddle top is soft so the ball can be caught a little late
    pub paddle_edges: SoftEdges,
    pub ball_size: f64,
    pub ball_speed: f64,
    pub brick: Size,
    /// one char per brick, '#' is a brick, anything else is empty
    pub level: Vec<String>,
    pub sprite_sheet: Option<String>,
    pub sprite_image: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            width: 600.0,
            height: 600.0,
            frame_ms: DEFAULT_FRAME_MS,
            log_level: "info".to_string(),
            breakout: BreakoutConfig::default(),
        }
    }
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        BreakoutConfig {
            paddle: Size {
                width: 90.0,
                height: 14.0,
            },
            paddle_speed: 7.0,
            paddle_edges: SoftEdges {
                top: 0.25,
                ..SoftEdges::HARD
            },
            ball_size: 10.0,
            ball_speed: 5.0,
            brick: Size {
                width: 60.0,
                height: 24.0,
            },
            level: vec![
                String::new(),
                String::new(),
                " ######## ".to_string(),
                " ######## ".to_string(),
                " ##    ## ".to_string(),
                " ######## ".to_string(),
            ],
            sprite_sheet: None,
            sprite_image: None,
        }
    }
}

impl GameConfig {
    /// Fetch + validate, anything wrong falls back to the defaults
    pub async fn load(path: &str) -> Self {
        let loaded = browser::fetch_json::<GameConfig>(path)
            .await
            .with_context(|| format!("Failed to load config from : {}", path))
            .and_then(|config| config.validate().map(|()| config));
        match loaded {
            Ok(config) => config,
            Err(err) => {
                warn!("{:#}, using defaults", err);
                GameConfig::default()
            }
        }
    }

    pub fn log_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| anyhow!("Unknown log level : '{}'", self.log_level))
    }

    pub fn validate(&self) -> Result<()> {
        self.log_filter()?;
        let breakout = &self.breakout;
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("frame_ms", self.frame_ms as f64),
            ("breakout.paddle.width", breakout.paddle.width),
            ("breakout.paddle.height", breakout.paddle.height),
            ("breakout.paddle_speed", breakout.paddle_speed),
            ("breakout.ball_size", breakout.ball_size),
            ("breakout.ball_speed", breakout.ball_speed),
            ("breakout.brick.width", breakout.brick.width),
            ("breakout.brick.height", breakout.brick.height),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| !(*value > 0.0)) {
            return Err(anyhow!("Config '{}' must be positive, got {}", name, value));
        }
        breakout.paddle_edges.validate()?;
        TileMap::parse(&breakout.level, breakout.brick, |_| ())
            .context("Config 'breakout.level' has no bricks to lay out")?;
        if breakout.sprite_sheet.is_some() != breakout.sprite_image.is_some() {
            return Err(anyhow!(
                "Config 'breakout.sprite_sheet' and 'breakout.sprite_image' go together"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();
        config.validate().unwrap();
        assert_eq!(config.log_filter().unwrap(), LevelFilter::Info);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: GameConfig = serde_json::from_str(
            r###"{ "log_level": "debug", "breakout": { "ball_speed": 8.5, "level": ["##"] } }"###,
        )
        .unwrap();
        assert_eq!(config.log_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(config.breakout.ball_speed, 8.5);
        assert_eq!(config.breakout.level, vec!["##".to_string()]);
        assert_eq!(config.width, 600.0);
        assert_eq!(config.breakout.paddle_speed, 7.0);
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = GameConfig::default();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.breakout.ball_speed = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("breakout.ball_speed"));

        let mut config = GameConfig::default();
        config.breakout.paddle_edges.top = 1.5;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.breakout.sprite_sheet = Some("bricks.json".into());
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.breakout.level = vec![];
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.breakout.level = vec![String::new(), String::new()];
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("breakout.level"));
    }
}
