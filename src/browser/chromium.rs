use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::browser::{BrowserBackend, BrowserError, PageSession};
use crate::config::Config;

/// 다운로드 사이에 브라우저가 한참 쉬어도 연결이 끊기지 않게 한다.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const EDGE_BINARIES: [&str; 4] = [
    "microsoft-edge",
    "microsoft-edge-stable",
    "msedge",
    "msedge.exe",
];

const EDGE_WINDOWS_PATHS: [&str; 2] = [
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Chrome,
    Edge,
}

/// DevTools 프로토콜로 조작하는 Chromium 계열 브라우저 (Chrome, Edge).
pub struct Chromium {
    flavor: Flavor,
}

impl Chromium {
    pub fn chrome() -> Self {
        Self {
            flavor: Flavor::Chrome,
        }
    }

    pub fn edge() -> Self {
        Self {
            flavor: Flavor::Edge,
        }
    }

    fn executable(&self) -> Result<PathBuf, BrowserError> {
        match self.flavor {
            Flavor::Chrome => headless_chrome::browser::default_executable()
                .map_err(|_| BrowserError::NotInstalled("Chrome")),
            Flavor::Edge => EDGE_BINARIES
                .iter()
                .find_map(|bin| which::which(bin).ok())
                .or_else(|| {
                    EDGE_WINDOWS_PATHS
                        .iter()
                        .map(PathBuf::from)
                        .find(|p| p.exists())
                })
                .ok_or(BrowserError::NotInstalled("Edge")),
        }
    }
}

/// 브라우저에 넘길 명령행 인자.
fn launch_args(config: &Config) -> Vec<OsString> {
    vec![
        OsString::from(format!("--user-agent={}", config.user_agent)),
        OsString::from("--disable-blink-features=AutomationControlled"),
    ]
}

impl BrowserBackend for Chromium {
    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::Chrome => "Chrome",
            Flavor::Edge => "Edge",
        }
    }

    fn launch(&self, config: &Config) -> Result<Box<dyn PageSession>, BrowserError> {
        let path = self.executable()?;
        log::debug!("{} 실행 파일: {}", self.name(), path.display());

        let args = launch_args(config);
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .path(Some(path))
            .args(args.iter().map(OsString::as_os_str).collect::<Vec<&OsStr>>())
            .idle_browser_timeout(IDLE_TIMEOUT)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| BrowserError::Launch(format!("{:#}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::Launch(format!("{:#}", e)))?;
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| BrowserError::Launch(format!("{:#}", e)))?;

        Ok(Box::new(ChromiumSession {
            tab,
            _browser: browser,
        }))
    }
}

/// 탭 하나를 쓰는 세션. `Browser`가 drop되면 브라우저 프로세스도 종료된다.
struct ChromiumSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

fn session_err(e: anyhow::Error) -> BrowserError {
    BrowserError::Session(format!("{:#}", e))
}

impl PageSession for ChromiumSession {
    fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(session_err)
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(true),
            Err(e) => {
                log::debug!("{} 요소를 기다리다 포기했습니다: {:#}", selector, e);
                Ok(false)
            }
        }
    }

    fn page_source(&mut self) -> Result<String, BrowserError> {
        self.tab.get_content().map_err(session_err)
    }

    fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }
}
