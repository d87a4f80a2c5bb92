pub mod cache;

pub use cache::{fingerprint, MarkerCache, MarkerImage};

use crate::entity::GeoEntity;
use crate::error::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use tracing::{debug, info, warn};

/// 24-bit colour, written as `#rrggbb` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Blend towards black by `opacity` (terminal cells have no alpha)
    pub fn dimmed(self, opacity: f64) -> Rgb {
        let k = opacity.clamp(0.0, 1.0);
        Rgb(
            (self.0 as f64 * k).round() as u8,
            (self.1 as f64 * k).round() as u8,
            (self.2 as f64 * k).round() as u8,
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl TryFrom<String> for Rgb {
    type Error = MapError;

    fn try_from(s: String) -> Result<Self> {
        let hex = s.strip_prefix('#').unwrap_or(&s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(MapError::InvalidColor(s));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| MapError::InvalidColor(s.clone()))
        };
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

/// Visual style of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill_color: Rgb,
    pub fill_opacity: f64,
    pub stroke_color: Rgb,
    pub stroke_width: f64,
}

impl Style {
    /// Used when no style rule matches an entity
    pub const FALLBACK: Style = Style {
        fill_color: Rgb(0x9c, 0xa3, 0xaf),
        fill_opacity: 0.35,
        stroke_color: Rgb(0x6b, 0x72, 0x80),
        stroke_width: 1.0,
    };
}

impl Default for Style {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Marker emphasis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualState {
    Normal,
    Hover,
    Selected,
}

impl VisualState {
    pub fn as_str(self) -> &'static str {
        match self {
            VisualState::Normal => "normal",
            VisualState::Hover => "hover",
            VisualState::Selected => "selected",
        }
    }
}

/// Maps an entity to its style. `None` means no rule matched.
pub trait StyleResolver {
    fn resolve(&self, entity: &GeoEntity) -> Option<Style>;
}

impl<F> StyleResolver for F
where
    F: Fn(&GeoEntity) -> Option<Style>,
{
    fn resolve(&self, entity: &GeoEntity) -> Option<Style> {
        self(entity)
    }
}

/// Resolve with the fixed fallback
pub fn resolve_or_fallback(resolver: &dyn StyleResolver, entity: &GeoEntity) -> Style {
    resolver.resolve(entity).unwrap_or(Style::FALLBACK)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub segment: String,
    pub style: Style,
}

/// Segment-to-style rules loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Style for segments without a rule
    pub default: Option<Style>,
    pub rules: Vec<StyleRule>,
}

impl StyleConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Built-in palette used when no style file is given
    pub fn builtin() -> Self {
        let rule = |segment: &str, fill: Rgb, stroke: Rgb| StyleRule {
            segment: segment.to_string(),
            style: Style {
                fill_color: fill,
                fill_opacity: 0.5,
                stroke_color: stroke,
                stroke_width: 1.0,
            },
        };
        Self {
            default: None,
            rules: vec![
                rule("premium", Rgb(0xf5, 0x9e, 0x0b), Rgb(0xd9, 0x77, 0x06)),
                rule("standard", Rgb(0x3b, 0x82, 0xf6), Rgb(0x25, 0x63, 0xeb)),
                rule("commercial", Rgb(0x10, 0xb9, 0x81), Rgb(0x05, 0x96, 0x69)),
                rule("residential", Rgb(0xec, 0x48, 0x99), Rgb(0xdb, 0x27, 0x77)),
            ],
        }
    }
}

impl StyleResolver for StyleConfig {
    fn resolve(&self, entity: &GeoEntity) -> Option<Style> {
        self.rules
            .iter()
            .find(|r| r.segment.eq_ignore_ascii_case(&entity.segment))
            .map(|r| r.style.clone())
            .or_else(|| self.default.clone())
    }
}

/// Watches a style file and reloads it when its content changes.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by writing a new file and renaming it are still seen.
pub struct StyleWatcher {
    path: PathBuf,
    file_name: OsString,
    contents: Option<String>,
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

impl StyleWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| MapError::config(format!("not a style file: {}", path.display())))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, events) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "watching style file");

        Ok(Self {
            contents: fs::read_to_string(&path).ok(),
            path,
            file_name,
            _watcher: watcher,
            events,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending file events; returns the new rules after a change.
    /// Parse failures keep the old rules.
    pub fn poll(&mut self) -> Option<StyleConfig> {
        let mut touched = false;
        loop {
            match self.events.try_recv() {
                Ok(Ok(event)) => touched |= self.concerns(&event),
                Ok(Err(e)) => warn!(error = %e, "style watch error"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!(path = %self.path.display(), "style watcher stopped");
                    break;
                }
            }
        }
        if touched {
            self.reload()
        } else {
            None
        }
    }

    fn concerns(&self, event: &Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any)
            && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(self.file_name.as_os_str()))
    }

    fn reload(&mut self) -> Option<StyleConfig> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "style file unreadable, keeping previous rules");
                return None;
            }
        };
        if self.contents.as_deref() == Some(content.as_str()) {
            debug!(path = %self.path.display(), "style file content unchanged");
            return None;
        }
        let parsed = StyleConfig::from_json(&content);
        self.contents = Some(content);

        match parsed {
            Ok(config) => {
                info!(path = %self.path.display(), rules = config.rules.len(), "style rules reloaded");
                Some(config)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "style reload failed, keeping previous rules");
                None
            }
        }
    }
}
