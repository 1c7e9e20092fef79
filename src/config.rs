use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 다운로드할 오디오 포맷.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Flac,
    #[default]
    Both,
}

impl AudioFormat {
    /// URL이 설정된 포맷과 맞는지 확인한다 (대소문자 무시).
    pub fn accepts(self, url: &str) -> bool {
        let url = url.to_lowercase();
        match self {
            AudioFormat::Mp3 => url.contains(".mp3"),
            AudioFormat::Flac => url.contains(".flac"),
            AudioFormat::Both => url.contains(".mp3") || url.contains(".flac"),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Both => "both",
        })
    }
}

/// 사용할 브라우저. `Auto`는 Chrome, Edge, Firefox 순으로 시도한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowserChoice {
    #[default]
    Auto,
    Chrome,
    Edge,
    Firefox,
}

impl fmt::Display for BrowserChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrowserChoice::Auto => "auto",
            BrowserChoice::Chrome => "chrome",
            BrowserChoice::Edge => "edge",
            BrowserChoice::Firefox => "firefox",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_dir: PathBuf,
    pub audio_format: AudioFormat,
    pub browser: BrowserChoice,
    pub headless: bool,
    /// 파일 하나를 받은 뒤 쉬는 시간 (초).
    pub download_delay: f64,
    /// 페이지 이동 후 렌더링을 기다리는 시간 (초).
    pub page_delay: f64,
    /// 필수 요소가 나타날 때까지 기다리는 최대 시간 (초).
    pub page_timeout: f64,
    pub download_booklet: bool,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            audio_format: AudioFormat::Both,
            browser: BrowserChoice::Auto,
            headless: false,
            download_delay: 1.0,
            page_delay: 2.0,
            page_timeout: 10.0,
            download_booklet: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn download_delay(&self) -> Duration {
        secs(self.download_delay)
    }

    pub fn page_delay(&self) -> Duration {
        secs(self.page_delay)
    }

    pub fn page_timeout(&self) -> Duration {
        secs(self.page_timeout)
    }
}

/// 음수나 NaN 같은 잘못된 값은 0초로 취급한다.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("vgmdl")
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content),
        Err(e) => {
            log::warn!("설정 파일을 읽을 수 없습니다 ({}): {}", path.display(), e);
            Config::default()
        }
    }
}

fn parse_config(content: &str) -> Config {
    toml::from_str(content).unwrap_or_else(|e| {
        log::warn!("설정 파일 형식이 잘못되어 기본값을 사용합니다: {}", e);
        Config::default()
    })
}

pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("설정 디렉토리를 만들 수 없습니다")?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).context("설정 파일을 저장할 수 없습니다")?;
    Ok(path)
}
