use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InitError {
    #[error("Canvas element is not defined")]
    MissingCanvas,
    #[error("Node is not a canvas element")]
    NotACanvas,
    #[error("Options must be an object")]
    InvalidOptions,
    #[error("options.images is not defined")]
    MissingImages,
    #[error("options.images must be a non-empty array")]
    EmptyImages,
    #[error("options.images must only contain strings")]
    NonStringImage,
}

#[derive(Debug, Error, PartialEq)]
pub enum OptionError {
    #[error("{0} is not a valid option")]
    Unknown(String),
    #[error("{0} is not allowed in setOption")]
    ReadOnly(String),
    #[error("invalid value for {option}: expected {expected}")]
    InvalidValue {
        option: String,
        expected: &'static str,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum PreloadMode {
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "partial")]
    Partial,
    #[strum(serialize = "none")]
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum FillMode {
    #[strum(serialize = "cover")]
    Cover,
    #[strum(serialize = "contain")]
    Contain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum TouchScrollMode {
    #[strum(serialize = "preventPageScroll")]
    PreventPageScroll,
    #[strum(serialize = "allowPageScroll")]
    AllowPageScroll,
    #[strum(serialize = "pageScrollTimer")]
    PageScrollTimer,
}

/// Dynamically typed option value used by `getOption`/`setOption`.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Unset,
}

impl OptionValue {
    fn as_bool(&self, option: &str) -> Result<bool, OptionError> {
        match self {
            OptionValue::Bool(value) => Ok(*value),
            _ => Err(invalid(option, "a boolean")),
        }
    }

    fn as_positive_number(&self, option: &str) -> Result<f64, OptionError> {
        match self {
            OptionValue::Number(value) if value.is_finite() && *value > 0.0 => Ok(*value),
            _ => Err(invalid(option, "a positive number")),
        }
    }

    fn as_variant<T: FromStr>(&self, option: &str, expected: &'static str) -> Result<T, OptionError> {
        match self {
            OptionValue::Text(text) => text.parse().map_err(|_| invalid(option, expected)),
            _ => Err(invalid(option, expected)),
        }
    }
}

fn invalid(option: &str, expected: &'static str) -> OptionError {
    OptionError::InvalidValue {
        option: option.to_string(),
        expected,
    }
}

/// Option names accepted by `setOption` and handled by the core.
pub const WRITABLE_OPTIONS: &[&str] = &[
    "fps",
    "loop",
    "reverse",
    "inversion",
    "ratio",
    "fillMode",
    "draggable",
    "dragModifier",
    "touchScrollMode",
    "pageScrollTimerDelay",
];

/// Callback option names, stored and invoked by the browser shell.
pub const CALLBACK_OPTIONS: &[&str] = &[
    "onPreloadFinished",
    "onPosterLoaded",
    "onAnimationEnd",
    "onBeforeFrame",
    "onAfterFrame",
];

/// Which part of the player has to react to an accepted option change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionEffect {
    None,
    Duration,
    CanvasSize,
    Drag,
    DragInput,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub images: Vec<String>,
    pub preload: PreloadMode,
    pub preload_number: usize,
    pub poster: Option<String>,
    pub fps: f64,
    pub loop_playback: bool,
    pub autoplay: bool,
    pub reverse: bool,
    pub ratio: Option<f64>,
    pub fill_mode: FillMode,
    pub draggable: bool,
    pub inversion: bool,
    pub drag_modifier: f64,
    pub touch_scroll_mode: TouchScrollMode,
    pub page_scroll_timer_delay: f64,
}

impl Settings {
    pub fn new(images: Vec<String>) -> Result<Settings, InitError> {
        if images.is_empty() {
            return Err(InitError::EmptyImages);
        }
        Ok(Settings {
            images,
            preload: PreloadMode::All,
            preload_number: 0,
            poster: None,
            fps: 30.0,
            loop_playback: false,
            autoplay: false,
            reverse: false,
            ratio: None,
            fill_mode: FillMode::Cover,
            draggable: false,
            inversion: false,
            drag_modifier: 1.0,
            touch_scroll_mode: TouchScrollMode::PageScrollTimer,
            page_scroll_timer_delay: 1500.0,
        })
    }

    pub fn total_images(&self) -> u32 {
        self.images.len() as u32
    }

    /// Number of images to request right after construction.
    pub fn initial_preload_count(&self) -> usize {
        match self.preload {
            PreloadMode::All => self.images.len(),
            PreloadMode::Partial if self.preload_number == 0 => self.images.len(),
            PreloadMode::Partial => self.preload_number,
            PreloadMode::None => 0,
        }
    }

    pub fn get(&self, option: &str) -> Result<OptionValue, OptionError> {
        let value = match option {
            "images" => OptionValue::List(self.images.clone()),
            "preload" => OptionValue::Text(self.preload.to_string()),
            "preloadNumber" => OptionValue::Number(self.preload_number as f64),
            "poster" => self
                .poster
                .clone()
                .map_or(OptionValue::Unset, OptionValue::Text),
            "fps" => OptionValue::Number(self.fps),
            "loop" => OptionValue::Bool(self.loop_playback),
            "autoplay" => OptionValue::Bool(self.autoplay),
            "reverse" => OptionValue::Bool(self.reverse),
            "ratio" => self.ratio.map_or(OptionValue::Unset, OptionValue::Number),
            "fillMode" => OptionValue::Text(self.fill_mode.to_string()),
            "draggable" => OptionValue::Bool(self.draggable),
            "inversion" => OptionValue::Bool(self.inversion),
            "dragModifier" => OptionValue::Number(self.drag_modifier),
            "touchScrollMode" => OptionValue::Text(self.touch_scroll_mode.to_string()),
            "pageScrollTimerDelay" => OptionValue::Number(self.page_scroll_timer_delay),
            _ => return Err(OptionError::Unknown(option.to_string())),
        };
        Ok(value)
    }

    /// Apply a value from the constructor options. Accepts the init-only
    /// options on top of everything `set` accepts.
    pub fn set_initial(&mut self, option: &str, value: &OptionValue) -> Result<(), OptionError> {
        match option {
            "preload" => {
                self.preload = value.as_variant(option, "\"all\", \"partial\" or \"none\"")?;
            }
            "preloadNumber" => {
                self.preload_number = match value {
                    OptionValue::Number(count) if count.is_finite() && *count >= 0.0 => {
                        count.floor() as usize
                    }
                    _ => return Err(invalid(option, "a non-negative number")),
                };
            }
            "poster" => {
                self.poster = match value {
                    OptionValue::Text(src) => Some(src.clone()),
                    OptionValue::Unset => None,
                    _ => return Err(invalid(option, "a string")),
                };
            }
            "autoplay" => self.autoplay = value.as_bool(option)?,
            _ => {
                self.set(option, value)?;
            }
        }
        Ok(())
    }

    /// Apply a runtime option change. On error the previous value is kept.
    pub fn set(&mut self, option: &str, value: &OptionValue) -> Result<OptionEffect, OptionError> {
        if !WRITABLE_OPTIONS.contains(&option) {
            return Err(if self.get(option).is_ok() {
                OptionError::ReadOnly(option.to_string())
            } else {
                OptionError::Unknown(option.to_string())
            });
        }

        let effect = match option {
            "fps" => {
                self.fps = value.as_positive_number(option)?;
                OptionEffect::Duration
            }
            "loop" => {
                self.loop_playback = value.as_bool(option)?;
                OptionEffect::None
            }
            "reverse" => {
                self.reverse = value.as_bool(option)?;
                OptionEffect::None
            }
            "inversion" => {
                self.inversion = value.as_bool(option)?;
                OptionEffect::Drag
            }
            "ratio" => {
                self.ratio = match value {
                    OptionValue::Unset => None,
                    value => Some(value.as_positive_number(option)?),
                };
                OptionEffect::CanvasSize
            }
            "fillMode" => {
                self.fill_mode = value.as_variant(option, "\"cover\" or \"contain\"")?;
                OptionEffect::CanvasSize
            }
            "draggable" => {
                self.draggable = value.as_bool(option)?;
                OptionEffect::DragInput
            }
            "dragModifier" => {
                self.drag_modifier = match value {
                    OptionValue::Number(modifier) if modifier.is_finite() && *modifier != 0.0 => {
                        modifier.abs()
                    }
                    _ => return Err(invalid(option, "a non-zero number")),
                };
                OptionEffect::Drag
            }
            "touchScrollMode" => {
                self.touch_scroll_mode = value.as_variant(
                    option,
                    "\"preventPageScroll\", \"allowPageScroll\" or \"pageScrollTimer\"",
                )?;
                OptionEffect::Drag
            }
            "pageScrollTimerDelay" => {
                self.page_scroll_timer_delay = match value {
                    OptionValue::Number(delay) if delay.is_finite() && *delay >= 0.0 => *delay,
                    _ => return Err(invalid(option, "a non-negative number")),
                };
                OptionEffect::Drag
            }
            _ => unreachable!("option list and match arms are out of sync"),
        };
        Ok(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new(vec!["a.jpg".into(), "b.jpg".into(), "c.jpg".into()]).unwrap()
    }

    #[test]
    fn test_empty_images_rejected() {
        assert_eq!(Settings::new(vec![]), Err(InitError::EmptyImages));
    }

    #[test]
    fn test_defaults() {
        let settings = settings();
        assert_eq!(settings.fps, 30.0);
        assert_eq!(settings.fill_mode, FillMode::Cover);
        assert_eq!(settings.touch_scroll_mode, TouchScrollMode::PageScrollTimer);
        assert_eq!(settings.page_scroll_timer_delay, 1500.0);
        assert_eq!(settings.initial_preload_count(), 3);
    }

    #[test]
    fn test_partial_preload_count() {
        let mut settings = settings();
        settings.preload = PreloadMode::Partial;
        settings.preload_number = 2;
        assert_eq!(settings.initial_preload_count(), 2);
        settings.preload_number = 0;
        assert_eq!(settings.initial_preload_count(), 3);
        settings.preload = PreloadMode::None;
        assert_eq!(settings.initial_preload_count(), 0);
    }

    #[test]
    fn test_set_known_options() {
        let mut settings = settings();
        assert_eq!(
            settings.set("fps", &OptionValue::Number(60.0)),
            Ok(OptionEffect::Duration)
        );
        assert_eq!(settings.fps, 60.0);
        settings
            .set("fillMode", &OptionValue::Text("contain".into()))
            .unwrap();
        assert_eq!(settings.fill_mode, FillMode::Contain);
        settings.set("ratio", &OptionValue::Number(1.5)).unwrap();
        assert_eq!(settings.get("ratio"), Ok(OptionValue::Number(1.5)));
        settings.set("ratio", &OptionValue::Unset).unwrap();
        assert_eq!(settings.ratio, None);
    }

    #[test]
    fn test_drag_modifier_uses_absolute_value() {
        let mut settings = settings();
        settings.set("dragModifier", &OptionValue::Number(-2.5)).unwrap();
        assert_eq!(settings.drag_modifier, 2.5);
        assert!(settings.set("dragModifier", &OptionValue::Number(0.0)).is_err());
        assert_eq!(settings.drag_modifier, 2.5);
    }

    #[test]
    fn test_invalid_values_keep_previous() {
        let mut settings = settings();
        assert!(settings.set("fps", &OptionValue::Number(-1.0)).is_err());
        assert!(settings.set("loop", &OptionValue::Number(1.0)).is_err());
        assert!(settings
            .set("touchScrollMode", &OptionValue::Text("sideways".into()))
            .is_err());
        assert_eq!(settings.fps, 30.0);
        assert!(!settings.loop_playback);
        assert_eq!(settings.touch_scroll_mode, TouchScrollMode::PageScrollTimer);
    }

    #[test]
    fn test_unknown_and_read_only_options() {
        let mut settings = settings();
        assert_eq!(
            settings.set("speed", &OptionValue::Number(1.0)),
            Err(OptionError::Unknown("speed".into()))
        );
        assert_eq!(
            settings.set("images", &OptionValue::List(vec![])),
            Err(OptionError::ReadOnly("images".into()))
        );
        assert_eq!(
            settings.get("speed"),
            Err(OptionError::Unknown("speed".into()))
        );
    }

    #[test]
    fn test_initial_options() {
        let mut settings = settings();
        settings
            .set_initial("preload", &OptionValue::Text("partial".into()))
            .unwrap();
        settings
            .set_initial("preloadNumber", &OptionValue::Number(2.7))
            .unwrap();
        settings
            .set_initial("poster", &OptionValue::Text("poster.jpg".into()))
            .unwrap();
        settings.set_initial("autoplay", &OptionValue::Bool(true)).unwrap();
        settings.set_initial("fps", &OptionValue::Number(12.0)).unwrap();
        assert_eq!(settings.preload, PreloadMode::Partial);
        assert_eq!(settings.preload_number, 2);
        assert_eq!(settings.poster.as_deref(), Some("poster.jpg"));
        assert!(settings.autoplay);
        assert_eq!(settings.fps, 12.0);
        assert!(settings
            .set_initial("preload", &OptionValue::Text("some".into()))
            .is_err());
        assert!(settings.set("autoplay", &OptionValue::Bool(false)).is_err());
    }

    #[test]
    fn test_variant_round_trip_strings() {
        assert_eq!("pageScrollTimer".parse::<TouchScrollMode>(), Ok(TouchScrollMode::PageScrollTimer));
        assert_eq!(FillMode::Contain.to_string(), "contain");
        assert!("everything".parse::<PreloadMode>().is_err());
    }

    #[test]
    fn test_variant_names_are_case_sensitive() {
        assert!("Contain".parse::<FillMode>().is_err());
        assert_eq!(TouchScrollMode::AllowPageScroll.as_ref(), "allowPageScroll");
        assert_eq!(PreloadMode::None.as_ref(), "none");
    }
}
